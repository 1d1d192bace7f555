// src/download/client.rs

//! Transports: how a URL's bytes reach a sink
//!
//! A transport is shared read-only by every worker, so implementations hold
//! no per-transfer state. Failures are reported once; retrying is left to
//! the next synchronization run.

use crate::config::NetworkOptions;
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::debug;
use url::Url;

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// Fetch-to-stream operation
pub trait Transport: Send + Sync {
    /// Write the content at `url` into `sink`, returning the byte count
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64>;
}

/// Error kind a sink uses to refuse further writes after an abort
pub(crate) const ABORTED: io::ErrorKind = io::ErrorKind::ConnectionAborted;

/// Copy `reader` into `sink` in chunks
///
/// A sink refusing a write with [`ABORTED`] surfaces as `Error::Cancelled`.
fn stream(reader: &mut dyn Read, sink: &mut dyn Write, url: &str) -> Result<u64> {
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];
    let mut total: u64 = 0;

    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(|e| Error::Download(format!("{url}: failed to read response: {e}")))?;
        if read == 0 {
            break;
        }

        sink.write_all(&buffer[..read]).map_err(|e| match e.kind() {
            ABORTED => Error::Cancelled(url.to_string()),
            _ => Error::Io(e),
        })?;
        total += read as u64;
    }

    sink.flush()?;
    Ok(total)
}

/// HTTP(S) transport over a blocking reqwest client, plus `file://` URLs
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(options: &NetworkOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.timeout())
            .user_agent(options.user_agent.clone())
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    fn fetch_file(&self, path: &Path, sink: &mut dyn Write, url: &str) -> Result<u64> {
        let mut file = File::open(path).map_err(|e| Error::Download(format!("{url}: {e}")))?;
        stream(&mut file, sink, url)
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
        let parsed = Url::parse(url).map_err(|e| Error::Download(format!("{url}: {e}")))?;

        if parsed.scheme() == "file" {
            let path = parsed
                .to_file_path()
                .map_err(|_| Error::Download(format!("{url}: not a local path")))?;
            return self.fetch_file(&path, sink, url);
        }

        debug!("GET {}", url);
        let mut response = self
            .client
            .get(parsed)
            .send()
            .map_err(|e| Error::Download(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Download(format!("{url}: HTTP {status}")));
        }

        stream(&mut response, sink, url)
    }
}

/// Transport serving canned responses, keyed by URL
///
/// Unknown URLs fail like a 404 would.
#[derive(Debug, Default, Clone)]
pub struct MemoryTransport {
    responses: HashMap<String, std::result::Result<Vec<u8>, String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&mut self, url: &str, body: impl Into<Vec<u8>>) {
        self.responses.insert(url.to_string(), Ok(body.into()));
    }

    pub fn fail(&mut self, url: &str, message: &str) {
        self.responses
            .insert(url.to_string(), Err(message.to_string()));
    }
}

impl Transport for MemoryTransport {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
        match self.responses.get(url) {
            Some(Ok(body)) => stream(&mut body.as_slice(), sink, url),
            Some(Err(message)) => Err(Error::Download(format!("{url}: {message}"))),
            None => Err(Error::Download(format!("{url}: HTTP 404 Not Found"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_transport() {
        let mut transport = MemoryTransport::new();
        transport.serve("https://example.com/a", "hello");
        transport.fail("https://example.com/b", "connection reset");

        let mut out = Vec::new();
        assert_eq!(transport.fetch("https://example.com/a", &mut out).unwrap(), 5);
        assert_eq!(out, b"hello");

        let err = transport.fetch("https://example.com/b", &mut out).unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        assert!(transport.fetch("https://example.com/c", &mut out).is_err());
    }

    #[test]
    fn test_http_transport_file_url() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, b"{}").unwrap();
        let url = Url::from_file_path(&path).unwrap();

        let transport = HttpTransport::new(&NetworkOptions::default()).unwrap();
        let mut out = Vec::new();
        assert_eq!(transport.fetch(url.as_str(), &mut out).unwrap(), 2);
        assert_eq!(out, b"{}");
    }

    struct Refusing;

    impl Write for Refusing {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(ABORTED, "aborted"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_refused_write_is_cancellation() {
        let mut transport = MemoryTransport::new();
        transport.serve("u", "data");
        let err = transport.fetch("u", &mut Refusing).unwrap_err();
        assert!(err.is_cancelled());
    }
}
