use reqwest::{Client, Method, RequestBuilder};

use crate::task::{RequestOptions, Task};
use crate::Result;

/// Issue a single request and return its decoded body text.
///
/// Transport errors are returned as-is. Non-2xx responses only become errors
/// when `error_for_status` is set.
pub async fn fetch(
    client: &Client,
    task: &Task,
    default_method: &Method,
    error_for_status: bool,
) -> Result<String> {
    let request = build_request(client, task, default_method)?;

    let response = request.send().await?;
    tracing::trace!("{} {} -> {}", task, response.url(), response.status());

    let response = if error_for_status {
        response.error_for_status()?
    } else {
        response
    };

    Ok(response.text().await?)
}

pub(crate) fn build_request(
    client: &Client,
    task: &Task,
    default_method: &Method,
) -> Result<RequestBuilder> {
    task.validate()?;
    let method = task.method(default_method)?;
    let request = client.request(method, task.url());

    match task.options() {
        Some(options) => apply_options(request, options),
        None => Ok(request),
    }
}

fn apply_options(mut request: RequestBuilder, options: &RequestOptions) -> Result<RequestBuilder> {
    if !options.params.is_empty() {
        request = request.query(&options.params);
    }

    if !options.headers.is_empty() {
        request = request.headers(options.header_map()?);
    }

    if let Some(data) = &options.data {
        request = request.body(data.clone());
    }
    if let Some(json) = &options.json {
        request = request.json(json);
    }
    if let Some(timeout) = options.timeout()? {
        request = request.timeout(timeout);
    }

    Ok(request)
}
