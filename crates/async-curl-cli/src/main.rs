use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use async_curl::{AsyncCurl, CurlConfig};
use clap::builder::RangedU64ValueParser;
use clap::Parser;
use futures_util::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod input;
mod output;
mod shutdown;

use output::OutputFormat;

const MAX_CHUNK_SIZE: u64 = 4096;

/// Fetch many URLs concurrently, one fixed-size chunk at a time.
#[derive(Debug, Parser)]
#[command(name = "async-curl", version)]
pub struct App {
    /// URLs to fetch with the default method
    pub urls: Vec<String>,

    /// JSON array of tasks: URL strings or [url, {options}] pairs. `-` reads stdin
    #[clap(short = 'f', long)]
    pub task_file: Option<PathBuf>,

    /// Number of requests sent concurrently per chunk
    #[clap(
        short,
        long,
        default_value_t = 10,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_CHUNK_SIZE)
    )]
    pub chunk_size: usize,

    #[clap(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    #[clap(flatten)]
    pub config: CurlConfig,
}

/// Run every chunk, writing results as they complete. Stops early when
/// `shutdown` resolves; the chunk in flight is then abandoned.
///
/// Returns whether every task completed.
async fn run<W, S>(args: &App, out: &mut W, shutdown: S) -> Result<bool>
where
    W: Write,
    S: Future<Output = ()>,
{
    let tasks = input::load_tasks(&args.urls, args.task_file.as_deref())?;
    let mut curl = AsyncCurl::with_config(tasks, &args.config)?;
    tracing::info!(
        "Fetching {} tasks, {} at a time",
        curl.pending_len(),
        args.chunk_size
    );

    let mut n_chunks = 0usize;
    let succeeded = {
        let mut chunks = Box::pin(curl.run_tasks(args.chunk_size));
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    tracing::warn!("Shutdown requested after {} chunks", n_chunks);
                    break false;
                }
                chunk = chunks.next() => match chunk {
                    Some(Ok(bodies)) => {
                        n_chunks += 1;
                        output::write_chunk(out, args.output, &bodies)?;
                    }
                    Some(Err(e)) => {
                        tracing::error!("Chunk {} failed: {}", n_chunks + 1, e);
                        break false;
                    }
                    None => break true,
                }
            }
        }
    };

    tracing::info!(
        "Completed {} tasks in {} chunks, {} left pending",
        curl.completed().len(),
        n_chunks,
        curl.pending_len()
    );

    Ok(succeeded)
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<ExitCode> {
    let args = App::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "async_curl=info,async_curl_cli=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let mut stdout = io::stdout();
    if run(&args, &mut stdout, shutdown::shutdown_signal()).await? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
