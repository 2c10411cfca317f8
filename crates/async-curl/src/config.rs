use std::time::Duration;

use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};

use crate::task::parse_method;
use crate::{Error, Result};

pub const DEFAULT_METHOD: &str = "GET";
pub const DEFAULT_USER_AGENT: &str = concat!("async-curl/", env!("CARGO_PKG_VERSION"));

/// Client-wide settings shared by every request a runner issues.
#[cfg_attr(feature = "clap", derive(clap::Args))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurlConfig {
    /// Method used for tasks that do not set one
    #[cfg_attr(feature = "clap", arg(long, default_value = DEFAULT_METHOD))]
    pub default_method: String,

    /// User-Agent header sent with every request
    #[cfg_attr(feature = "clap", arg(long, default_value = DEFAULT_USER_AGENT))]
    pub user_agent: String,

    /// Total timeout per request, in seconds
    #[cfg_attr(feature = "clap", arg(long))]
    pub timeout_secs: Option<f64>,

    /// Connect timeout, in seconds
    #[cfg_attr(feature = "clap", arg(long))]
    pub connect_timeout_secs: Option<f64>,

    /// Treat non-2xx responses as errors instead of returning their body
    #[cfg_attr(feature = "clap", arg(long))]
    pub error_for_status: bool,
}

impl Default for CurlConfig {
    fn default() -> Self {
        Self {
            default_method: DEFAULT_METHOD.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: None,
            connect_timeout_secs: None,
            error_for_status: false,
        }
    }
}

fn secs(value: Option<f64>, what: &'static str) -> Result<Option<Duration>> {
    value
        .map(|s| Duration::try_from_secs_f64(s).map_err(|_| Error::InvalidOptions(what)))
        .transpose()
}

impl CurlConfig {
    pub fn default_method(&self) -> Result<Method> {
        parse_method(&self.default_method)
    }

    /// Build the shared HTTP client. Connection pooling and redirects are
    /// left to `reqwest` defaults.
    pub fn build_client(&self) -> Result<Client> {
        let mut builder = Client::builder().user_agent(self.user_agent.as_str());

        if let Some(timeout) = secs(self.timeout_secs, "timeout must be a finite, non-negative number")? {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = secs(
            self.connect_timeout_secs,
            "connect timeout must be a finite, non-negative number",
        )? {
            builder = builder.connect_timeout(timeout);
        }

        Ok(builder.build()?)
    }
}
