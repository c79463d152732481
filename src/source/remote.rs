//! Byte-range access to alignment and reference files served over HTTP.
//!
//! Index files are small and downloaded whole. Data files are read through
//! [`RangeReader`], a seekable reader that issues one `Range` request per
//! block, so noodles can seek to index chunks exactly as it does on disk.

use crate::{Error, Result};
use reqwest::{Client, StatusCode, header};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;
use tokio::runtime::Handle;

/// Bytes fetched per range request.
const BLOCK_SIZE: u64 = 64 * 1024;

/// Seekable byte stream a source can decode from.
pub(crate) trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Where a source's data file lives.
#[derive(Clone)]
pub(crate) enum Location {
    Local(PathBuf),
    Remote(RemoteFile),
}

impl Location {
    /// Open a fresh reader positioned at the start of the file.
    pub(crate) fn open(&self) -> Result<Box<dyn ReadSeek>> {
        match self {
            Location::Local(path) => {
                let file = File::open(path)
                    .map_err(|e| Error::NotFound(format!("failed to open {:?}: {}", path, e)))?;
                Ok(Box::new(file))
            }
            Location::Remote(remote) => Ok(Box::new(remote.reader())),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local(path) => write!(f, "{}", path.display()),
            Location::Remote(remote) => f.write_str(remote.url()),
        }
    }
}

/// A file of known length on an HTTP server.
#[derive(Clone)]
pub struct RemoteFile {
    client: Client,
    handle: Handle,
    url: String,
    length: u64,
}

impl RemoteFile {
    /// Resolve `url` with a HEAD request.
    ///
    /// Must be called inside a tokio runtime; readers created from the file
    /// block on that runtime.
    pub async fn open(client: Client, url: &str) -> Result<Self> {
        let length = content_length(&client, url).await?;
        Ok(Self {
            client,
            handle: Handle::current(),
            url: url.to_string(),
            length,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Seekable reader over the file.
    ///
    /// Reads block the calling thread, so use it from blocking or worker
    /// threads, never from an async task.
    pub fn reader(&self) -> RangeReader {
        RangeReader {
            file: self.clone(),
            position: 0,
            buffer: Vec::new(),
            buffer_start: 0,
        }
    }
}

/// Check if a URL exists via HEAD request.
pub async fn url_exists(client: &Client, url: &str) -> bool {
    client
        .head(url)
        .send()
        .await
        .map(|r| r.status().is_success())
        .unwrap_or(false)
}

/// Get the content length of a URL via HEAD request.
pub async fn content_length(client: &Client, url: &str) -> Result<u64> {
    let response = client
        .head(url)
        .send()
        .await
        .map_err(|e| Error::SourceUnavailable(format!("HTTP HEAD {} failed: {}", url, e)))?;

    check_status(url, response.status())?;

    response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| Error::SourceUnavailable(format!("{} sent no Content-Length", url)))
}

/// Download a whole file.
pub async fn download(client: &Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::SourceUnavailable(format!("HTTP GET {} failed: {}", url, e)))?;

    check_status(url, response.status())?;

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::SourceUnavailable(format!("failed to read {}: {}", url, e)))?;
    Ok(bytes.to_vec())
}

/// Download bytes `start..=end` of a file.
///
/// Servers that ignore `Range` answer with the whole body, which is sliced here.
async fn download_range(client: &Client, url: &str, start: u64, end: u64) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .header(header::RANGE, format!("bytes={}-{}", start, end))
        .send()
        .await
        .map_err(|e| Error::SourceUnavailable(format!("HTTP GET {} failed: {}", url, e)))?;

    let status = response.status();
    if status == StatusCode::RANGE_NOT_SATISFIABLE {
        return Ok(Vec::new());
    }
    check_status(url, status)?;

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::SourceUnavailable(format!("failed to read {}: {}", url, e)))?;

    if status == StatusCode::PARTIAL_CONTENT {
        return Ok(bytes.to_vec());
    }
    let from = (start as usize).min(bytes.len());
    let to = (end as usize).saturating_add(1).min(bytes.len());
    Ok(bytes[from..to].to_vec())
}

fn check_status(url: &str, status: StatusCode) -> Result<()> {
    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound(url.to_string()));
    }
    if !status.is_success() {
        return Err(Error::SourceUnavailable(format!("{} returned {}", url, status)));
    }
    Ok(())
}

/// Blocking, seekable view of a [`RemoteFile`] with a one-block cache.
pub struct RangeReader {
    file: RemoteFile,
    position: u64,
    buffer: Vec<u8>,
    buffer_start: u64,
}

impl RangeReader {
    fn buffered(&self) -> &[u8] {
        self.position
            .checked_sub(self.buffer_start)
            .and_then(|offset| self.buffer.get(offset as usize..))
            .unwrap_or_default()
    }

    fn fill(&mut self) -> io::Result<()> {
        let end = self.position.saturating_add(BLOCK_SIZE).min(self.file.length) - 1;
        let file = &self.file;
        let bytes = file
            .handle
            .block_on(download_range(&file.client, &file.url, self.position, end))
            .map_err(io::Error::other)?;

        if bytes.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{} ended at byte {}", file.url, self.position),
            ));
        }

        tracing::trace!("fetched {} bytes of {} at {}", bytes.len(), file.url, self.position);
        self.buffer = bytes;
        self.buffer_start = self.position;
        Ok(())
    }
}

impl Read for RangeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.position >= self.file.length {
            return Ok(0);
        }
        if self.buffered().is_empty() {
            self.fill()?;
        }

        let available = self.buffered();
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for RangeReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => self.file.length.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        self.position = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before the start of the file")
        })?;
        Ok(self.position)
    }
}
