use std::collections::VecDeque;

use futures_util::future::try_join_all;
use futures_util::stream::{self, Stream};
use reqwest::{Client, Method};
use serde_json::Value;
use tokio::runtime::{Handle, Runtime};
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::CurlConfig;
use crate::request::fetch;
use crate::task::Task;
use crate::{Error, Result};

pub type TaskId = Uuid;

/// Pending queue entry
#[derive(Debug, Clone)]
pub(crate) struct QueueEntry {
    /// Identifier
    pub id: TaskId,

    pub task: Task,

    /// Instant when this entry was queued
    pub queue_time: Instant,
}

impl QueueEntry {
    pub fn new(task: Task) -> Self {
        Self {
            id: Uuid::new_v4(),
            task,
            queue_time: Instant::now(),
        }
    }
}

/// Runs a queue of HTTP requests in fixed-size concurrent chunks.
///
/// ## Example
///
/// ```rust,no_run
/// # use async_curl::AsyncCurl;
/// # use futures_util::StreamExt;
/// # async fn run() -> async_curl::Result<()> {
/// let mut curl = AsyncCurl::new(["https://example.com/a", "https://example.com/b"])?;
///
/// let mut chunks = Box::pin(curl.run_tasks(10));
/// while let Some(bodies) = chunks.next().await {
///     println!("{:?}", bodies?);
/// }
/// # Ok(())
/// # }
/// ```
///
/// Each chunk is sent concurrently and awaited as a whole before the next one
/// starts. A failed request fails its whole chunk; the chunk's tasks then stay
/// pending.
#[derive(Debug)]
pub struct AsyncCurl {
    client: Client,
    default_method: Method,
    error_for_status: bool,
    pending: VecDeque<QueueEntry>,
    completed: Vec<Task>,
}

impl AsyncCurl {
    pub fn new<I, T>(tasks: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Task>,
    {
        Self::with_config(tasks, &CurlConfig::default())
    }

    pub fn with_config<I, T>(tasks: I, config: &CurlConfig) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Task>,
    {
        let client = config.build_client()?;
        Self::with_client(client, tasks, config)
    }

    /// Use an existing client. Only the method and status settings of
    /// `config` apply; the client's own settings are left as they are.
    pub fn with_client<I, T>(client: Client, tasks: I, config: &CurlConfig) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Task>,
    {
        let mut curl = Self {
            client,
            default_method: config.default_method()?,
            error_for_status: config.error_for_status,
            pending: VecDeque::new(),
            completed: Vec::new(),
        };
        curl.set_tasks(tasks)?;
        Ok(curl)
    }

    /// Replace the pending queue. Every task is validated first; on error the
    /// queue is left unchanged.
    pub fn set_tasks<I, T>(&mut self, tasks: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Task>,
    {
        let entries = tasks
            .into_iter()
            .map(|task| {
                let task = task.into();
                task.validate()?;
                Ok(QueueEntry::new(task))
            })
            .collect::<Result<VecDeque<_>>>()?;

        tracing::info!("Setting {} tasks", entries.len());
        self.pending = entries;
        Ok(())
    }

    pub fn append_task(&mut self, task: impl Into<Task>) -> Result<()> {
        let task = task.into();
        task.validate()?;
        tracing::info!("Appending task {}", task);
        self.pending.push_back(QueueEntry::new(task));
        Ok(())
    }

    /// Append a task given as JSON: a URL string or a `[url, {options}]` pair.
    pub fn try_append(&mut self, value: Value) -> Result<()> {
        let task = Task::try_from(value)?;
        self.append_task(task)
    }

    pub fn pending(&self) -> impl Iterator<Item = &Task> {
        self.pending.iter().map(|entry| &entry.task)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn completed(&self) -> &[Task] {
        &self.completed
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Issue a single request with this runner's client and defaults. The
    /// queues are not touched.
    pub async fn request(&self, task: &Task) -> Result<String> {
        fetch(&self.client, task, &self.default_method, self.error_for_status).await
    }

    async fn send(&self, entry: &QueueEntry) -> Result<String> {
        tracing::trace!(
            "Processing task {}, added {}ms ago",
            entry.id,
            entry.queue_time.elapsed().as_millis()
        );
        self.request(&entry.task).await
    }

    /// Run the next chunk of at most `chunk_size` tasks.
    ///
    /// Returns `None` once the pending queue is empty. Results are in the
    /// order the tasks were queued.
    pub async fn next_chunk(&mut self, chunk_size: usize) -> Option<Result<Vec<String>>> {
        if chunk_size == 0 {
            return Some(Err(Error::InvalidChunkSize(chunk_size)));
        }
        if self.pending.is_empty() {
            return None;
        }
        Some(self.process_chunk(chunk_size).await)
    }

    async fn process_chunk(&mut self, chunk_size: usize) -> Result<Vec<String>> {
        let n = chunk_size.min(self.pending.len());

        // Nothing is sent unless the whole chunk is well-formed.
        for entry in self.pending.range(..n) {
            entry.task.validate()?;
        }

        tracing::debug!(
            "Sending chunk of {} tasks, {} pending",
            n,
            self.pending.len()
        );
        let start = Instant::now();

        let requests = self.pending.range(..n).map(|entry| self.send(entry));
        let responses = try_join_all(requests).await.map_err(|e| {
            tracing::debug!(
                "Chunk of {} tasks failed after {}ms",
                n,
                start.elapsed().as_millis()
            );
            e
        })?;

        self.completed
            .extend(self.pending.drain(..n).map(|entry| entry.task));

        tracing::debug!(
            "Chunk of {} tasks done in {}ms, {} pending",
            n,
            start.elapsed().as_millis(),
            self.pending.len()
        );
        Ok(responses)
    }

    /// Lazily run every pending task, `chunk_size` at a time, yielding one
    /// list of response bodies per chunk.
    ///
    /// The stream ends when the queue is empty, or right after yielding the
    /// first error.
    pub fn run_tasks(
        &mut self,
        chunk_size: usize,
    ) -> impl Stream<Item = Result<Vec<String>>> + '_ {
        stream::unfold(Some(self), move |state| async move {
            let Some(curl) = state else {
                return None;
            };
            let Some(item) = curl.next_chunk(chunk_size).await else {
                return None;
            };
            let next = if item.is_ok() { Some(curl) } else { None };
            Some((item, next))
        })
    }

    /// Blocking counterpart of [`AsyncCurl::run_tasks`] for callers outside an
    /// async context. Fails with [`Error::InsideRuntime`] when called from
    /// within a tokio runtime.
    pub fn blocking_chunks(&mut self, chunk_size: usize) -> Result<BlockingChunks<'_>> {
        if Handle::try_current().is_ok() {
            return Err(Error::InsideRuntime);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(BlockingChunks {
            curl: Some(self),
            runtime,
            chunk_size,
        })
    }
}

/// Iterator returned by [`AsyncCurl::blocking_chunks`].
pub struct BlockingChunks<'a> {
    curl: Option<&'a mut AsyncCurl>,
    runtime: Runtime,
    chunk_size: usize,
}

impl Iterator for BlockingChunks<'_> {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        let curl = self.curl.as_mut()?;
        let item = self.runtime.block_on(curl.next_chunk(self.chunk_size))?;
        if item.is_err() {
            self.curl = None;
        }
        Some(item)
    }
}
