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


//! Album download orchestration
//!
//! # Per-album flow
//! 1. Truncate the catalog to `limit` songs (catalog order)
//! 2. For each song: skip if the target exists, otherwise fetch with
//!    retries and backup-URL failover, then write atomically
//! 3. Pause between songs that touched the network
//! 4. Aggregate outcomes into an [`AlbumResult`]
//!
//! # Failure containment
//! - Fetch errors are retried, then recorded as `Failed`; the album goes on
//! - A filesystem error fails one song, unless it is directory-wide
//!   (permissions, disk full), which stops the queue
//! - Cancellation is checked before each song, around every request and
//!   during backoff and politeness sleeps
//!
//! Songs are processed strictly one at a time.

use crate::download::config::DownloadConfig;
use crate::download::progress::{EventKind, ProgressEvent, ProgressReporter, ProgressTracker};
use crate::download::stream::{write_atomically, TransferLimits};
use crate::error::{FetchError, FetcherError, Result};
use crate::http::{resolve_filename, Transport};
use crate::models::{
    Album, AlbumResult, DownloadOutcome, FailureKind, Interruption, SkipReason, Song,
};
use crate::renumber::Numbering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Sequential album downloader
pub struct DownloadManager {
    transport: Arc<dyn Transport>,
    config: DownloadConfig,
    cancel: CancellationToken,
}

/// A download running on the tokio runtime
pub struct DownloadHandle {
    /// Progress events, ending with `AlbumCompleted`
    pub events: mpsc::UnboundedReceiver<ProgressEvent>,
    pub task: JoinHandle<Result<AlbumResult>>,
    cancel: CancellationToken,
}

impl DownloadHandle {
    /// Ask the download to stop; files already written are kept
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// How one song ended, from the album loop's point of view
enum SongStep {
    Done {
        outcome: DownloadOutcome,
        /// Whether any request was sent
        networked: bool,
    },
    Cancelled,
    Aborted {
        url: String,
        error: FetcherError,
        attempts: u32,
    },
}

/// Result of one successful request
enum Attempt {
    Written { bytes: u64, path: PathBuf },
    /// Server-suggested name already on disk
    Exists(PathBuf),
}

impl DownloadManager {
    /// Create new download manager
    ///
    /// Fails with `InvalidConfiguration` before any I/O.
    pub fn new(transport: Arc<dyn Transport>, config: DownloadConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Run the album download on the runtime and stream its events
    pub fn spawn(self, album: Album) -> DownloadHandle {
        let (reporter, events) = ProgressReporter::channel();
        let cancel = self.cancel.clone();
        let task = tokio::spawn(async move { self.download_album(&album, &reporter).await });

        DownloadHandle {
            events,
            task,
            cancel,
        }
    }

    /// Download every song of `album` into the output directory
    ///
    /// Only album-level problems are errors: an output directory that
    /// cannot be created. Everything else ends up in the [`AlbumResult`].
    pub async fn download_album(
        &self,
        album: &Album,
        reporter: &ProgressReporter,
    ) -> Result<AlbumResult> {
        let output_dir = &self.config.output_directory;
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| FetcherError::filesystem(output_dir, &e))?;

        let songs = album.limited(self.config.limit);
        let total = songs.len();
        let mut result = AlbumResult::new(total);

        info!(
            album = %album.title,
            source = %album.source,
            total,
            catalog = album.len(),
            output = %output_dir.display(),
            "Starting album download"
        );
        reporter.emit(EventKind::AlbumStarted {
            title: album.title.clone(),
            source: album.source.clone(),
            total,
        });

        for (position, song) in songs.iter().enumerate() {
            let index = position + 1;

            if self.cancel.is_cancelled() {
                info!(index, "Download cancelled");
                result.interrupted = Some(Interruption::Cancelled);
                skip_remaining(&songs[position..], index, SkipReason::Cancelled, &mut result, reporter);
                break;
            }

            reporter.emit(EventKind::SongStarted {
                index,
                total,
                title: song.title.clone(),
            });

            let numbering = if self.config.renumber {
                Some(Numbering::new(index, total))
            } else {
                None
            };

            match self.download_song(song, index, numbering, reporter).await {
                SongStep::Done { outcome, networked } => {
                    complete(index, song, outcome, &mut result, reporter);

                    if networked && index < total && !self.pause_between_songs().await {
                        info!(index, "Download cancelled");
                        result.interrupted = Some(Interruption::Cancelled);
                        skip_remaining(&songs[index..], index + 1, SkipReason::Cancelled, &mut result, reporter);
                        break;
                    }
                }
                SongStep::Cancelled => {
                    info!(index, "Download cancelled");
                    result.interrupted = Some(Interruption::Cancelled);
                    skip_remaining(&songs[position..], index, SkipReason::Cancelled, &mut result, reporter);
                    break;
                }
                SongStep::Aborted {
                    url,
                    error,
                    attempts,
                } => {
                    error!(index, error = %error, "Output directory unusable, stopping album");
                    let outcome = DownloadOutcome::Failed {
                        error_kind: FailureKind::Filesystem,
                        url,
                        message: error.to_string(),
                        attempts,
                    };
                    complete(index, song, outcome, &mut result, reporter);
                    result.interrupted = Some(Interruption::Aborted {
                        message: error.user_message(),
                    });
                    skip_remaining(&songs[index..], index + 1, SkipReason::Aborted, &mut result, reporter);
                    break;
                }
            }
        }

        info!(
            success = result.success_count,
            failed = result.failed_count,
            skipped = result.skipped_count,
            total = result.total,
            "Album download finished"
        );
        reporter.emit(EventKind::AlbumCompleted {
            result: result.clone(),
        });

        Ok(result)
    }

    /// Fetch one song, trying every candidate URL with the retry policy
    async fn download_song(
        &self,
        song: &Song,
        index: usize,
        numbering: Option<Numbering>,
        reporter: &ProgressReporter,
    ) -> SongStep {
        let predicted = self.target_path(&resolve_filename(
            &song.title,
            &song.source_url,
            None,
            self.config.filename_source,
            numbering,
        ));

        if !self.config.overwrite && predicted.exists() {
            debug!(index, path = %predicted.display(), "Target exists, skipping");
            return SongStep::Done {
                outcome: DownloadOutcome::Skipped {
                    reason: SkipReason::Exists,
                    path: Some(predicted),
                },
                networked: false,
            };
        }

        let policy = &self.config.retry;
        let mut attempts = 0u32;
        let mut last_failure: Option<(String, FetchError)> = None;

        for url in song.candidate_urls() {
            if last_failure.is_some() {
                info!(index, url, "Trying backup URL");
            }

            for attempt in 1..=policy.max_attempts {
                if self.cancel.is_cancelled() {
                    return SongStep::Cancelled;
                }
                attempts += 1;

                match self.attempt(song, url, index, numbering, &predicted, reporter).await {
                    Ok(Attempt::Written { bytes, path }) => {
                        info!(index, path = %path.display(), bytes, attempts, "Song downloaded");
                        return SongStep::Done {
                            outcome: DownloadOutcome::Success {
                                bytes_written: bytes,
                                final_path: path,
                                attempts,
                            },
                            networked: true,
                        };
                    }
                    Ok(Attempt::Exists(path)) => {
                        debug!(index, path = %path.display(), "Server-named target exists, skipping");
                        return SongStep::Done {
                            outcome: DownloadOutcome::Skipped {
                                reason: SkipReason::Exists,
                                path: Some(path),
                            },
                            networked: true,
                        };
                    }
                    Err(FetcherError::Fetch(e)) => {
                        warn!(index, url, attempt, error = %e, "Fetch attempt failed");

                        if attempt < policy.max_attempts {
                            let delay = policy.delay_for(attempt);
                            reporter.emit(EventKind::SongRetrying {
                                index,
                                attempt,
                                delay_ms: delay.as_millis() as u64,
                                error: e.to_string(),
                            });
                            last_failure = Some((url.to_string(), e));
                            if !self.sleep_or_cancel(delay).await {
                                return SongStep::Cancelled;
                            }
                        } else {
                            last_failure = Some((url.to_string(), e));
                        }
                    }
                    Err(FetcherError::Cancelled) => return SongStep::Cancelled,
                    Err(e) if e.is_album_fatal() => {
                        return SongStep::Aborted {
                            url: url.to_string(),
                            error: e,
                            attempts,
                        };
                    }
                    Err(e) => {
                        error!(index, url, error = %e, "Could not write song");
                        return SongStep::Done {
                            outcome: DownloadOutcome::Failed {
                                error_kind: FailureKind::Filesystem,
                                url: url.to_string(),
                                message: e.to_string(),
                                attempts,
                            },
                            networked: true,
                        };
                    }
                }
            }
        }

        let outcome = match last_failure {
            Some((url, e)) => {
                error!(index, url = %url, attempts, error = %e, "Song failed");
                DownloadOutcome::Failed {
                    error_kind: FailureKind::Fetch(e.kind),
                    url,
                    message: e.message,
                    attempts,
                }
            }
            // max_attempts >= 1 guarantees at least one attempt
            None => DownloadOutcome::Failed {
                error_kind: FailureKind::Filesystem,
                url: song.source_url.clone(),
                message: "no attempt was made".to_string(),
                attempts,
            },
        };

        SongStep::Done {
            outcome,
            networked: true,
        }
    }

    /// One request plus body transfer, bounded by the per-item timeout
    async fn attempt(
        &self,
        song: &Song,
        url: &str,
        index: usize,
        numbering: Option<Numbering>,
        predicted: &Path,
        reporter: &ProgressReporter,
    ) -> Result<Attempt> {
        let timeout = self.config.timeout;
        let deadline = Instant::now() + timeout;

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(FetcherError::Cancelled),
            response = tokio::time::timeout_at(deadline, self.transport.get(url, timeout)) => {
                match response {
                    Ok(response) => response?,
                    Err(_) => {
                        return Err(FetchError::timeout(format!(
                            "no response within {} s",
                            timeout.as_secs_f64()
                        ))
                        .into());
                    }
                }
            }
        };

        if !response.is_success() {
            return Err(FetchError::status(response.status, url).into());
        }

        let path = self.target_path(&resolve_filename(
            &song.title,
            &song.source_url,
            Some(&response.headers),
            self.config.filename_source,
            numbering,
        ));

        if !self.config.overwrite && path != predicted && path.exists() {
            return Ok(Attempt::Exists(path));
        }

        let expected_len = response.headers.content_length;
        let mut tracker = ProgressTracker::new(index, expected_len);
        let limits = TransferLimits {
            expected_len,
            deadline,
            cancel: &self.cancel,
        };

        let bytes = write_atomically(response.body, &path, limits, |chunk| {
            if let Some(event) = tracker.update(chunk) {
                reporter.emit(event);
            }
        })
        .await?;

        reporter.emit(tracker.finish());
        Ok(Attempt::Written { bytes, path })
    }

    fn target_path(&self, filename: &str) -> PathBuf {
        self.config.output_directory.join(filename)
    }

    /// Politeness delay; false when cancelled meanwhile
    async fn pause_between_songs(&self) -> bool {
        self.sleep_or_cancel(self.config.retry.inter_download_delay)
            .await
    }

    async fn sleep_or_cancel(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

fn complete(
    index: usize,
    song: &Song,
    outcome: DownloadOutcome,
    result: &mut AlbumResult,
    reporter: &ProgressReporter,
) {
    result.record(&outcome);
    reporter.emit(EventKind::SongCompleted {
        index,
        title: song.title.clone(),
        outcome,
    });
}

/// Record every song in `remaining` as skipped; `first_index` is the index
/// of `remaining[0]`
fn skip_remaining(
    remaining: &[Song],
    first_index: usize,
    reason: SkipReason,
    result: &mut AlbumResult,
    reporter: &ProgressReporter,
) {
    for (offset, song) in remaining.iter().enumerate() {
        let outcome = DownloadOutcome::Skipped { reason, path: None };
        complete(first_index + offset, song, outcome, result, reporter);
    }
}
