//! Downloads granule assets to disk and reads byte ranges of remote files.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Error, Result};
use futures::StreamExt;
use indicatif::{MultiProgress, ProgressBar};
use reqwest::{
    header::{CONTENT_LENGTH, RANGE},
    StatusCode,
};

use crate::{
    assets::file_name,
    auth::Session,
    cli::{create_download_bar, create_progress_bar},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The destination already existed, nothing was requested.
    Skipped,
    Downloaded { bytes: u64 },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub bytes: u64,
}

/// Buffers incoming data and hands it to the inner writer in blocks of exactly
/// `chunk_size` bytes. Only the final block written by [`ChunkWriter::finish`]
/// may be shorter.
pub struct ChunkWriter<W: Write> {
    inner: W,
    buffer: Vec<u8>,
    chunk_size: usize,
    written: u64,
}

impl<W: Write> ChunkWriter<W> {
    pub fn new(inner: W, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        ChunkWriter {
            inner,
            buffer: Vec::with_capacity(chunk_size),
            chunk_size,
            written: 0,
        }
    }

    pub fn push(&mut self, mut data: &[u8]) -> io::Result<()> {
        while !data.is_empty() {
            let room = self.chunk_size - self.buffer.len();
            let take = room.min(data.len());
            self.buffer.extend_from_slice(&data[..take]);
            data = &data[take..];

            if self.buffer.len() == self.chunk_size {
                self.flush_block()?;
            }
        }

        Ok(())
    }

    fn flush_block(&mut self) -> io::Result<()> {
        self.inner.write_all(&self.buffer)?;
        self.written += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    /// Writes the remaining partial block and returns the inner writer and byte count.
    pub fn finish(mut self) -> io::Result<(W, u64)> {
        if !self.buffer.is_empty() {
            self.flush_block()?;
        }
        self.inner.flush()?;
        Ok((self.inner, self.written))
    }
}

/// Downloads `url` to `dest` unless `dest` already exists.
///
/// The body is staged in a temporary file next to `dest` so an interrupted or
/// failed transfer never leaves a file that a later run would skip.
pub async fn fetch(
    session: &Session,
    url: &str,
    dest: &Path,
    chunk_size: usize,
    progress: &ProgressBar,
) -> Result<FetchOutcome> {
    if dest.exists() {
        tracing::info!(path = %dest.display(), "already present, skipping");
        return Ok(FetchOutcome::Skipped);
    }

    let response = session
        .get(url)
        .send()
        .await
        .map_err(|e| Error::msg(format!("Failed to download file: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("Failed to download `{}`: {}", url, status));
    }

    if let Some(total_size) = response.content_length().filter(|&n| n > 0) {
        progress.set_length(total_size);
    }

    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let staging = tempfile::Builder::new()
        .prefix(".emit-")
        .suffix(".part")
        .tempfile_in(&parent)?;
    let mut writer = ChunkWriter::new(staging, chunk_size);
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| Error::msg(format!("Error reading chunk: {}", e)))?;
        writer.push(&chunk)?;
        progress.inc(chunk.len() as u64);
    }

    let (staging, bytes) = writer.finish()?;
    staging.persist(dest)?;

    tracing::info!(path = %dest.display(), bytes, "downloaded");
    Ok(FetchOutcome::Downloaded { bytes })
}

/// Downloads every URL into `dir`, named after the URL's last path segment.
pub async fn fetch_all(session: &Session, urls: &[String], dir: &Path, chunk_size: usize) -> Result<FetchSummary> {
    fs::create_dir_all(dir)?;

    let multi = MultiProgress::new();
    let overall = multi.add(create_progress_bar(urls.len() as u64, "Downloading files...".to_string()));
    let mut summary = FetchSummary::default();

    for url in urls {
        let Some(name) = file_name(url) else {
            tracing::warn!(%url, "no file name in URL, skipping");
            overall.inc(1);
            continue;
        };

        let bar = multi.add(create_download_bar(name.to_string()));
        let outcome = fetch(session, url, &dir.join(name), chunk_size, &bar).await;
        bar.finish_and_clear();

        match outcome? {
            FetchOutcome::Skipped => summary.skipped += 1,
            FetchOutcome::Downloaded { bytes } => {
                summary.downloaded += 1;
                summary.bytes += bytes;
            }
        }
        overall.inc(1);
    }

    overall.finish_with_message("Files downloaded");

    Ok(summary)
}

// -- Streaming ---------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// HDF5, which includes netCDF-4
    Hdf5,
    NetCdfClassic,
    Png,
    Unknown,
}

const HDF5_SIGNATURE: &[u8] = b"\x89HDF\r\n\x1a\n";
const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

impl FileFormat {
    pub fn detect(header: &[u8]) -> Self {
        if header.starts_with(HDF5_SIGNATURE) {
            FileFormat::Hdf5
        } else if header.starts_with(b"CDF\x01") || header.starts_with(b"CDF\x02") {
            FileFormat::NetCdfClassic
        } else if header.starts_with(PNG_SIGNATURE) {
            FileFormat::Png
        } else {
            FileFormat::Unknown
        }
    }
}

/// A remote file read on demand with HTTP range requests.
pub struct RemoteFile<'a> {
    session: &'a Session,
    url: String,
    len: Option<u64>,
}

impl<'a> RemoteFile<'a> {
    pub async fn open(session: &'a Session, url: &str) -> Result<RemoteFile<'a>> {
        let response = session.head(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Failed to open `{}`: {}", url, status));
        }

        // read the header itself, the body of a HEAD response is always empty
        let len = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        Ok(RemoteFile {
            session,
            url: url.to_string(),
            len,
        })
    }

    pub fn len(&self) -> Option<u64> {
        self.len
    }

    /// Reads up to `len` bytes starting at `offset`.
    pub async fn read_range(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }

        let response = self
            .session
            .get(&self.url)
            .header(RANGE, range_header(offset, len))
            .send()
            .await?;

        let skip = match response.status() {
            StatusCode::PARTIAL_CONTENT => 0,
            // the server ignored the range and sends the whole file
            StatusCode::OK => offset,
            StatusCode::RANGE_NOT_SATISFIABLE => return Ok(Vec::new()),
            other => return Err(anyhow!("Failed to read `{}`: {}", self.url, other)),
        };

        let mut stream = response.bytes_stream();
        let mut window = RangeWindow::new(skip, len);

        while let Some(chunk) = stream.next().await {
            if window.feed(&chunk?) {
                break;
            }
        }

        Ok(window.into_bytes())
    }
}

fn range_header(offset: u64, len: u64) -> String {
    format!("bytes={}-{}", offset, offset + len - 1)
}

/// Collects `len` bytes after skipping the first `skip` bytes of a stream.
struct RangeWindow {
    skip: u64,
    len: u64,
    bytes: Vec<u8>,
}

impl RangeWindow {
    fn new(skip: u64, len: u64) -> Self {
        RangeWindow {
            skip,
            len,
            bytes: Vec::new(),
        }
    }

    /// Returns true once the window is full.
    fn feed(&mut self, mut chunk: &[u8]) -> bool {
        if self.skip > 0 {
            let skipped = (self.skip as usize).min(chunk.len());
            chunk = &chunk[skipped..];
            self.skip -= skipped as u64;
        }

        let wanted = (self.len - self.bytes.len() as u64) as usize;
        let take = wanted.min(chunk.len());
        self.bytes.extend_from_slice(&chunk[..take]);

        self.bytes.len() as u64 >= self.len
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

// -- Tests -------------------------------------------------------------------
