// src/download/mod.rs

//! Fetch tasks
//!
//! A [`FetchTask`] downloads one URL into a [`Sink`]: memory for index
//! documents, a temporary file for package files. File sinks only ever
//! write to their temporary path; moving the result into place is the
//! caller's job once the whole batch is known to be good.

pub mod client;

pub use client::{HttpTransport, MemoryTransport, Transport};

use crate::error::Error;
use crate::filesystem::remove_file_if_exists;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Identifier handed out by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Queued,
    Running,
    Success,
    Failure,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Cancelled)
    }
}

/// Where downloaded bytes go
#[derive(Debug)]
pub enum Sink {
    Memory(Vec<u8>),
    File { temp: PathBuf },
}

/// Writer that refuses further bytes once `abort` is set
struct Abortable<'a, W: Write> {
    inner: W,
    abort: &'a AtomicBool,
}

impl<W: Write> Write for Abortable<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.abort.load(Ordering::Relaxed) {
            return Err(io::Error::new(client::ABORTED, "download aborted"));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[derive(Debug)]
pub struct FetchTask {
    id: Option<TaskId>,
    name: String,
    url: String,
    sink: Sink,
    state: TaskState,
    error: Option<String>,
    bytes: u64,
}

impl FetchTask {
    /// Task keeping the content in memory
    pub fn memory(name: &str, url: &str) -> Self {
        Self::with_sink(name, url, Sink::Memory(Vec::new()))
    }

    /// Task writing to `temp`
    pub fn file(name: &str, url: &str, temp: impl Into<PathBuf>) -> Self {
        Self::with_sink(name, url, Sink::File { temp: temp.into() })
    }

    fn with_sink(name: &str, url: &str, sink: Sink) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            url: url.to_string(),
            sink,
            state: TaskState::Idle,
            error: None,
            bytes: 0,
        }
    }

    pub fn id(&self) -> Option<TaskId> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: TaskId) {
        self.id = Some(id);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Description of the failure, if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Temporary file of a file task
    pub fn temp_path(&self) -> Option<&Path> {
        match &self.sink {
            Sink::File { temp } => Some(temp),
            Sink::Memory(_) => None,
        }
    }

    /// Downloaded bytes of a successful memory task
    pub fn content(&self) -> Option<&[u8]> {
        match (&self.sink, self.state) {
            (Sink::Memory(data), TaskState::Success) => Some(data),
            _ => None,
        }
    }

    /// Mark the task as waiting for a worker
    pub fn start(&mut self) {
        if self.state == TaskState::Idle {
            self.state = TaskState::Queued;
        }
    }

    /// Cancel a task that has not started running yet
    pub fn cancel(&mut self) {
        if !self.state.is_terminal() && self.state != TaskState::Running {
            self.finish(TaskState::Cancelled, None);
        }
    }

    /// Execute the download; always ends in a terminal state
    pub fn run(&mut self, transport: &dyn Transport, abort: &AtomicBool) {
        if self.state.is_terminal() {
            return;
        }
        if abort.load(Ordering::Relaxed) {
            self.finish(TaskState::Cancelled, None);
            return;
        }

        self.state = TaskState::Running;
        debug!("Fetching {} from {}", self.name, self.url);

        let result = match &mut self.sink {
            Sink::Memory(data) => {
                data.clear();
                transport.fetch(&self.url, &mut Abortable { inner: data, abort })
            }
            Sink::File { temp } => fetch_to_file(transport, &self.url, temp, abort),
        };

        match result {
            Ok(bytes) => {
                self.bytes = bytes;
                self.finish(TaskState::Success, None);
            }
            Err(Error::Cancelled(_)) => {
                self.discard();
                self.finish(TaskState::Cancelled, None);
            }
            Err(e) => {
                self.discard();
                self.finish(TaskState::Failure, Some(e.to_string()));
            }
        }
    }

    fn finish(&mut self, state: TaskState, error: Option<String>) {
        self.state = state;
        self.error = error;
    }

    /// Remove the temporary file of a file task
    pub fn discard(&self) {
        if let Sink::File { temp } = &self.sink
            && let Err(e) = remove_file_if_exists(temp)
        {
            warn!("Could not remove {}: {}", temp.display(), e);
        }
    }
}

fn fetch_to_file(
    transport: &dyn Transport,
    url: &str,
    temp: &Path,
    abort: &AtomicBool,
) -> crate::Result<u64> {
    if let Some(parent) = temp.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = File::create(temp)?;
    let mut writer = Abortable {
        inner: BufWriter::new(file),
        abort,
    };
    let bytes = transport.fetch(url, &mut writer)?;
    writer.flush()?;
    writer
        .inner
        .into_inner()
        .map_err(|e| e.into_error())?
        .sync_all()?;
    Ok(bytes)
}
