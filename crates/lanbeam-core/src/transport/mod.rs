//! Chunked file streaming over a device connection.
//!
//! A transfer is always shaped the same way:
//!
//! ```text
//! file_metadata ─► chunk ─► chunk ─► ... ─► transfer_complete
//! ```
//!
//! Every chunk except the last carries exactly `chunk_size` bytes. Chunk
//! boundaries mean nothing to the receiver; only the total, which always
//! equals the announced `filesize`, does. A zero-byte file still gets its
//! metadata record and completion marker.
//!
//! If a write fails the transfer stops on the spot and the completion marker
//! is never sent. A transfer only counts as done once the completion marker
//! has been written to the socket, not merely queued. There is no resume.

use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};
use crate::protocol::Frame;
use crate::session::Connection;

/// Summary of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    /// Name announced in the metadata record
    pub filename: String,
    /// Payload bytes sent
    pub bytes_sent: u64,
    /// Payload blocks sent
    pub chunks_sent: u64,
    /// Wall time from metadata to completion marker
    pub elapsed: Duration,
}

impl TransferReport {
    /// Average throughput in bytes per second.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn throughput_bps(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.bytes_sent as f64 / secs) as u64
        } else {
            self.bytes_sent
        }
    }
}

/// Streams files to a device in fixed-size binary chunks.
#[derive(Debug, Clone, Copy)]
pub struct ChunkedSender {
    chunk_size: usize,
}

impl Default for ChunkedSender {
    fn default() -> Self {
        Self::new(crate::DEFAULT_CHUNK_SIZE)
    }
}

impl ChunkedSender {
    /// Create a sender with the given chunk size (at least one byte).
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// The chunk size in bytes.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of payload blocks a file of `size` bytes is split into.
    #[must_use]
    pub fn chunk_count(&self, size: u64) -> u64 {
        size.div_ceil(self.chunk_size as u64)
    }

    /// Stream the file at `source_path` over `conn`.
    ///
    /// The size is read when the transfer starts, not taken from the offer.
    /// Exactly that many bytes are sent; a file that shrinks while it is
    /// being read aborts with [`Error::FileChanged`].
    ///
    /// # Errors
    ///
    /// - [`Error::FileNotFound`] or [`Error::Io`] if the file cannot be read.
    ///   Nothing has been sent to the device in the not-found case.
    /// - [`Error::ConnectionLost`] if a write fails, or if the connection
    ///   closes before the completion marker reaches the socket.
    pub async fn send(&self, conn: &Connection, source_path: &Path) -> Result<TransferReport> {
        let filename = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidPath(source_path.display().to_string()))?;

        let mut file = tokio::fs::File::open(source_path)
            .await
            .map_err(|e| map_open_error(e, source_path))?;
        let filesize = file.metadata().await?.len();

        tracing::info!(
            "Sending '{}' ({} bytes) to {}",
            filename,
            filesize,
            conn.address()
        );

        let started = Instant::now();
        conn.send(Frame::Metadata {
            filename: filename.clone(),
            filesize,
        })
        .await?;

        let mut reader = (&mut file).take(filesize);
        let mut bytes_sent: u64 = 0;
        let mut chunks_sent: u64 = 0;

        loop {
            let mut buffer = vec![0u8; self.chunk_size];
            let filled = read_full(&mut reader, &mut buffer).await?;
            if filled == 0 {
                break;
            }
            buffer.truncate(filled);

            conn.send(Frame::Chunk(buffer)).await?;
            bytes_sent += filled as u64;
            chunks_sent += 1;

            tracing::trace!(
                "Chunk {} sent to {} ({}/{} bytes)",
                chunks_sent,
                conn.address(),
                bytes_sent,
                filesize
            );
        }

        if bytes_sent != filesize {
            return Err(Error::FileChanged {
                path: source_path.to_path_buf(),
                expected: filesize,
                actual: bytes_sent,
            });
        }

        conn.send_confirmed(Frame::Complete).await?;

        let report = TransferReport {
            filename,
            bytes_sent,
            chunks_sent,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            "Sent '{}' to {}: {} bytes in {} chunks ({} B/s)",
            report.filename,
            conn.address(),
            report.bytes_sent,
            report.chunks_sent,
            report.throughput_bps()
        );
        Ok(report)
    }
}

fn map_open_error(err: std::io::Error, path: &Path) -> Error {
    if err.kind() == std::io::ErrorKind::NotFound {
        Error::FileNotFound(path.display().to_string())
    } else {
        Error::Io(err)
    }
}

/// Read until `buf` is full or the reader is exhausted.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
