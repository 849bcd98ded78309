use std::io;
use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use url::Url;

pub const CHUNK_SIZE: u64 = 10 * 1024 * 1024;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid upload url: {0}")]
    Url(#[from] url::ParseError),
    #[error("chunk at offset {offset} rejected with {status}: {body}")]
    ChunkRejected {
        status: StatusCode,
        offset: u64,
        body: String,
    },
}

#[derive(Clone)]
pub struct ChunkedUploader {
    http: Client,
    chunk_size: u64,
}

impl ChunkedUploader {
    pub fn new() -> Result<Self, UploadError> {
        Self::with_chunk_size(CHUNK_SIZE)
    }

    pub fn with_chunk_size(chunk_size: u64) -> Result<Self, UploadError> {
        Ok(Self {
            http: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            chunk_size: chunk_size.max(1),
        })
    }

    /// Transfers `source` to the session URL as sequential byte-range PUTs.
    /// Ranges are contiguous and strictly increasing; the first rejected
    /// chunk aborts the transfer with no further requests.
    pub async fn upload<R>(
        &self,
        session_url: &str,
        mut source: R,
        total_len: u64,
    ) -> Result<(), UploadError>
    where
        R: AsyncRead + Unpin,
    {
        let url = Url::parse(session_url)?;
        // One extra iteration when the length is an exact multiple of the
        // chunk size: the trailing read is empty and is still sent as a
        // zero-byte range.
        let chunk_count = total_len / self.chunk_size + 1;
        tracing::debug!(chunks = chunk_count, total = total_len, "starting chunked upload");

        let mut buffer = vec![0u8; self.chunk_size as usize];
        let mut start = 0u64;
        for chunk in 0..chunk_count {
            let filled = fill_buffer(&mut source, &mut buffer).await?;
            let end = start as i128 + filled as i128 - 1;
            let upload_range = format!("bytes {start}-{end}/{total_len}");
            tracing::debug!(chunk, bytes = filled, range = %upload_range, "sending chunk");

            let response = self
                .http
                .put(url.clone())
                .header(CONTENT_LENGTH, filled)
                .header(CONTENT_RANGE, upload_range)
                .body(buffer[..filled].to_vec())
                .send()
                .await?;
            let status = response.status();
            if !matches!(
                status,
                StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED
            ) {
                let body = response.text().await.unwrap_or_default();
                return Err(UploadError::ChunkRejected {
                    status,
                    offset: start,
                    body,
                });
            }
            start += filled as u64;
        }
        tracing::info!(bytes = start, "completed the chunked upload");
        Ok(())
    }
}

async fn fill_buffer<R>(source: &mut R, buffer: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buffer.len() {
        let read = source.read(&mut buffer[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}
