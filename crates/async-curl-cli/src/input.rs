use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use async_curl::Task;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("No tasks given. Pass URLs or --task-file")]
    NoTasks,

    #[error("Failed to read `{}`: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Malformed JSON in `{}`: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("`{}` must hold a JSON array of tasks", path.display())]
    NotAnArray { path: PathBuf },

    #[error("Task #{index} in `{}`: {source}", path.display())]
    Task {
        path: PathBuf,
        index: usize,
        source: async_curl::Error,
    },
}

/// Collect tasks from the command line URLs followed by the task file, if
/// any. A task file path of `-` reads from stdin.
pub fn load_tasks(urls: &[String], task_file: Option<&Path>) -> Result<Vec<Task>, InputError> {
    let mut tasks: Vec<Task> = urls.iter().cloned().map(Task::from).collect();

    if let Some(path) = task_file {
        let parsed = if path == Path::new("-") {
            read_tasks(io::stdin().lock(), path)?
        } else {
            let file = File::open(path).map_err(|source| InputError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            read_tasks(BufReader::new(file), path)?
        };
        tasks.extend(parsed);
    }

    if tasks.is_empty() {
        return Err(InputError::NoTasks);
    }
    Ok(tasks)
}

/// Parse a JSON task array from `reader`. `path` only labels errors.
pub fn read_tasks<R: Read>(mut reader: R, path: &Path) -> Result<Vec<Task>, InputError> {
    let mut raw = String::new();
    reader
        .read_to_string(&mut raw)
        .map_err(|source| InputError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    parse_tasks(&raw, path)
}

fn parse_tasks(raw: &str, path: &Path) -> Result<Vec<Task>, InputError> {
    let value: Value = serde_json::from_str(raw).map_err(|source| InputError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let Value::Array(items) = value else {
        return Err(InputError::NotAnArray {
            path: path.to_path_buf(),
        });
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            Task::try_from(item).map_err(|source| InputError::Task {
                path: path.to_path_buf(),
                index,
                source,
            })
        })
        .collect()
}
