#![doc = include_str!("../README.md")]

pub mod config;
pub mod curl;
pub mod error;
pub mod request;
pub mod task;

pub use config::CurlConfig;
pub use curl::{AsyncCurl, BlockingChunks};
pub use error::{Error, Result};
pub use request::fetch;
pub use task::{RequestOptions, Task};
