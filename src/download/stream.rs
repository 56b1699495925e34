// Resource Fetcher - Album Download Engine
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Atomic body writer
//!
//! Bodies stream into a hidden `.part` file next to the target and are
//! renamed into place only after the last byte is flushed. A cancelled,
//! timed-out or failed transfer removes the temp file, so the final name
//! never holds a truncated file.

use crate::error::{FetchError, FetchErrorKind, FetcherError, Result};
use crate::file::paths::part_path;
use crate::http::client::BodyStream;
use futures_util::StreamExt;
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Write buffer size
const DOWNLOAD_BUFF_SZ: usize = 64 * 1024;

/// Flush every 1MB
const DATA_FLUSH_SZ: u64 = 1024 * 1024;

/// Limits applied while a body streams
#[derive(Debug, Clone, Copy)]
pub struct TransferLimits<'a> {
    /// Declared Content-Length; a shorter body fails with `IncompleteBody`
    pub expected_len: Option<u64>,
    /// End of the attempt's time budget
    pub deadline: Instant,
    pub cancel: &'a CancellationToken,
}

/// Stream `body` to `target` through a temp file
///
/// `on_chunk` is called with the size of every chunk written. Returns the
/// number of bytes written. Errors are `Fetch` (retryable), `Filesystem` or
/// `Cancelled`.
pub async fn write_atomically<F>(
    body: BodyStream,
    target: &Path,
    limits: TransferLimits<'_>,
    on_chunk: F,
) -> Result<u64>
where
    F: FnMut(u64) + Send,
{
    let temp = part_path(target);

    let written = match stream_to_file(body, &temp, limits, on_chunk).await {
        Ok(written) => written,
        Err(e) => {
            discard(&temp).await;
            return Err(e);
        }
    };

    if let Err(e) = fs::rename(&temp, target).await {
        discard(&temp).await;
        return Err(FetcherError::filesystem(target, &e));
    }

    debug!(path = %target.display(), bytes = written, "File written");
    Ok(written)
}

async fn stream_to_file<F>(
    mut body: BodyStream,
    temp: &Path,
    limits: TransferLimits<'_>,
    mut on_chunk: F,
) -> Result<u64>
where
    F: FnMut(u64) + Send,
{
    let file = File::create(temp).await.map_err(|e| create_error(temp, &e))?;
    let mut writer = BufWriter::with_capacity(DOWNLOAD_BUFF_SZ, file);

    let mut written = 0u64;
    let mut next_flush = DATA_FLUSH_SZ;

    loop {
        let chunk = tokio::select! {
            biased;
            _ = limits.cancel.cancelled() => return Err(FetcherError::Cancelled),
            _ = tokio::time::sleep_until(limits.deadline) => {
                return Err(FetchError::timeout(format!(
                    "body not complete after {} bytes",
                    written
                ))
                .into());
            }
            chunk = body.next() => chunk,
        };

        let bytes = match chunk {
            Some(chunk) => chunk?,
            None => break,
        };

        writer
            .write_all(&bytes)
            .await
            .map_err(|e| FetcherError::filesystem(temp, &e))?;

        written += bytes.len() as u64;
        on_chunk(bytes.len() as u64);

        if written >= next_flush {
            writer
                .flush()
                .await
                .map_err(|e| FetcherError::filesystem(temp, &e))?;
            next_flush = written + DATA_FLUSH_SZ;
        }
    }

    // Final flush
    writer
        .flush()
        .await
        .map_err(|e| FetcherError::filesystem(temp, &e))?;

    if let Some(expected) = limits.expected_len {
        if written < expected {
            return Err(FetchError::new(
                FetchErrorKind::IncompleteBody,
                format!("received {} of {} bytes", written, expected),
            )
            .into());
        }
    }

    Ok(written)
}

async fn discard(temp: &Path) {
    if let Err(e) = fs::remove_file(temp).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!(path = %temp.display(), error = %e, "Could not remove temp file");
        }
    }
}

/// A vanished or replaced output directory fails every later song as well
fn create_error(temp: &Path, err: &std::io::Error) -> FetcherError {
    let directory_gone = temp
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map_or(false, |dir| !dir.is_dir());
    if directory_gone {
        FetcherError::directory_unusable(temp, err)
    } else {
        FetcherError::filesystem(temp, err)
    }
}
