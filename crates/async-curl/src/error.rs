use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid task: {0}. Only a URL string or a [url, options] pair is supported")]
    InvalidTask(String),

    #[error("Invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Invalid request options: {0}")]
    InvalidOptions(&'static str),

    #[error("Invalid chunk size: {0}. Must be at least 1")]
    InvalidChunkSize(usize),

    #[error("Blocking call made from within an async runtime; use the async API instead")]
    InsideRuntime,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Serde JSON error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
