use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::{Error, Result};

/// Transport options for a single request.
///
/// Mirrors the keyword options of a typical HTTP client call. Deserializing
/// rejects unknown keys, so a typo surfaces as a malformed task rather than a
/// silently ignored option.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestOptions {
    /// Overrides the runner's default method. Case-insensitive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Query parameters. Numbers and booleans are rendered as text.
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "scalar_map"
    )]
    pub params: BTreeMap<String, String>,

    /// Raw request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    /// JSON request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,

    /// Per-request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

fn scalar_map<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key, s)),
            Value::Number(n) => Ok((key, n.to_string())),
            Value::Bool(b) => Ok((key, b.to_string())),
            other => Err(D::Error::custom(format!(
                "query parameter `{key}` must be a string, number or boolean, got {}",
                json_kind(&other)
            ))),
        })
        .collect()
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_json(mut self, json: Value) -> Self {
        self.json = Some(json);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout.as_secs_f64());
        self
    }

    /// The explicit method, if one was given.
    pub fn method(&self) -> Result<Option<Method>> {
        self.method.as_deref().map(parse_method).transpose()
    }

    pub fn timeout(&self) -> Result<Option<Duration>> {
        self.timeout
            .map(|secs| {
                Duration::try_from_secs_f64(secs)
                    .map_err(|_| Error::InvalidOptions("timeout must be a finite, non-negative number"))
            })
            .transpose()
    }

    /// Headers as sent on the wire.
    pub fn header_map(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }
        Ok(headers)
    }

    pub fn validate(&self) -> Result<()> {
        self.method()?;
        self.timeout()?;
        self.header_map()?;
        if self.data.is_some() && self.json.is_some() {
            return Err(Error::InvalidOptions("`data` and `json` are mutually exclusive"));
        }
        Ok(())
    }
}

pub(crate) fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| Error::InvalidMethod(method.to_string()))
}

/// A single unit of work: either a bare URL or a URL paired with options.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum Task {
    /// Issued with the runner's default method.
    Url(String),
    Configured(String, RequestOptions),
}

impl Task {
    pub fn url(&self) -> &str {
        match self {
            Task::Url(url) | Task::Configured(url, _) => url,
        }
    }

    pub fn options(&self) -> Option<&RequestOptions> {
        match self {
            Task::Url(_) => None,
            Task::Configured(_, options) => Some(options),
        }
    }

    /// The method this task is sent with: the `method` option when present,
    /// `default` otherwise.
    pub fn method(&self, default: &Method) -> Result<Method> {
        let explicit = match self.options() {
            Some(options) => options.method()?,
            None => None,
        };
        Ok(explicit.unwrap_or_else(|| default.clone()))
    }

    /// Check everything that would otherwise only fail once the request is
    /// built: the URL, and for configured tasks their options.
    pub fn validate(&self) -> Result<()> {
        Url::parse(self.url()).map_err(|e| Error::InvalidUrl {
            url: self.url().to_string(),
            reason: e.to_string(),
        })?;
        match self {
            Task::Url(_) => Ok(()),
            Task::Configured(_, options) => options.validate(),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.options().and_then(|o| o.method.as_deref()) {
            Some(method) => write!(f, "{} {}", method.to_ascii_uppercase(), self.url()),
            None => f.write_str(self.url()),
        }
    }
}

impl From<&str> for Task {
    fn from(url: &str) -> Self {
        Task::Url(url.to_string())
    }
}

impl From<String> for Task {
    fn from(url: String) -> Self {
        Task::Url(url)
    }
}

impl<S: Into<String>> From<(S, RequestOptions)> for Task {
    fn from((url, options): (S, RequestOptions)) -> Self {
        Task::Configured(url.into(), options)
    }
}

impl TryFrom<Value> for Task {
    type Error = Error;

    /// Accepts a JSON string or a `[url, {options}]` pair. Any other shape is
    /// an [`Error::InvalidTask`].
    fn try_from(value: Value) -> Result<Self> {
        let task = match value {
            Value::String(url) => Task::Url(url),
            Value::Array(items) if items.len() == 2 => {
                let mut items = items.into_iter();
                match (items.next(), items.next()) {
                    (Some(Value::String(url)), Some(Value::Object(mut options))) => {
                        // The address in the pair wins over an embedded `url` key.
                        options.remove("url");
                        let options: RequestOptions =
                            serde_json::from_value(Value::Object(options)).map_err(|e| {
                                Error::InvalidTask(format!("bad options for `{url}`: {e}"))
                            })?;
                        Task::Configured(url, options)
                    }
                    (url, options) => {
                        return Err(Error::InvalidTask(format!(
                            "pair of ({}, {})",
                            url.as_ref().map_or("nothing", json_kind),
                            options.as_ref().map_or("nothing", json_kind),
                        )))
                    }
                }
            }
            other => return Err(Error::InvalidTask(json_kind(&other).to_string())),
        };
        task.validate()?;
        Ok(task)
    }
}

impl Serialize for Task {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Task::Url(url) => url.serialize(serializer),
            Task::Configured(url, options) => (url, options).serialize(serializer),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
