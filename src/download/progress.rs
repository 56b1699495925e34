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


//! Progress events
//!
//! The download manager reports through a [`ProgressReporter`], an unbounded
//! channel of [`ProgressEvent`]s. Front ends render them however they like;
//! [`ProgressEvent::to_marker`] gives the line format a parent GUI process
//! parses from CLI stderr.
//!
//! # Byte progress
//! - Moving-average speed over a 10 second window
//! - `SongProgress` at most every 200 ms, plus a final one per song

use crate::models::{AlbumResult, DownloadOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Prefix of machine-readable progress lines
pub const MARKER_PREFIX: &str = ">>>PROGRESS:";

/// Minimum interval between byte progress events for one song
const UPDATE_INTERVAL: Duration = Duration::from_millis(200);

/// One progress notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// What happened
///
/// Song indices are 1-based positions in download order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    AlbumStarted {
        title: String,
        source: String,
        /// Songs that will be processed, after the limit
        total: usize,
    },
    SongStarted {
        index: usize,
        total: usize,
        title: String,
    },
    SongProgress {
        index: usize,
        bytes: u64,
        total_bytes: Option<u64>,
        percent: Option<f64>,
        /// Bytes per second
        speed: f64,
    },
    SongRetrying {
        index: usize,
        /// Attempt that just failed
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    SongCompleted {
        index: usize,
        title: String,
        outcome: DownloadOutcome,
    },
    AlbumCompleted {
        result: AlbumResult,
    },
}

impl ProgressEvent {
    pub fn now(kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }

    /// `>>>PROGRESS:{json}` line without trailing newline
    pub fn to_marker(&self) -> String {
        // Serializing plain data with string keys cannot fail
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("{}{}", MARKER_PREFIX, json)
    }

    /// Parse a marker line; `None` for any other line
    pub fn from_marker(line: &str) -> Option<Self> {
        let json = line.trim_end().strip_prefix(MARKER_PREFIX)?;
        serde_json::from_str(json).ok()
    }

    /// Human-readable line for terminals
    pub fn display_string(&self) -> String {
        match &self.kind {
            EventKind::AlbumStarted { title, source, total } => {
                format!("Album: {} ({}, {} songs)", title, source, total)
            }
            EventKind::SongStarted { index, total, title } => {
                format!("[{}/{}] {}", index, total, title)
            }
            EventKind::SongProgress {
                bytes,
                percent,
                speed,
                ..
            } => match percent {
                Some(percent) => format!(
                    "  {:.1}% ({}) - {}",
                    percent,
                    bytes_string(*bytes),
                    speed_string(*speed)
                ),
                None => format!("  {} - {}", bytes_string(*bytes), speed_string(*speed)),
            },
            EventKind::SongRetrying {
                attempt,
                delay_ms,
                error,
                ..
            } => format!(
                "  attempt {} failed ({}), retrying in {} ms",
                attempt, error, delay_ms
            ),
            EventKind::SongCompleted { outcome, .. } => format!("  {}", outcome.describe()),
            EventKind::AlbumCompleted { result } => result.summary(),
        }
    }
}

/// Format bytes as human-readable string (e.g., "4.2 MB")
pub fn bytes_string(bytes: u64) -> String {
    let mb = bytes as f64 / 1_000_000.0;
    format!("{:.1} MB", mb)
}

/// Format speed as human-readable string (e.g., "2.5 MB/s")
pub fn speed_string(bytes_per_second: f64) -> String {
    format!("{:.1} MB/s", bytes_per_second / 1_000_000.0)
}

/// Sending half of the event stream
///
/// Cloneable; a dropped receiver silently discards events.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    sender: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl ProgressReporter {
    /// Reporter plus the receiving end of its stream
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// Reporter that drops every event
    pub fn silent() -> Self {
        Self { sender: None }
    }

    pub fn emit(&self, kind: EventKind) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(ProgressEvent::now(kind));
        }
    }
}

/// Speed tracker with moving average
///
/// Uses a sliding window to smooth out network fluctuations.
#[derive(Debug)]
pub struct SpeedTracker {
    samples: VecDeque<SpeedSample>,
    window_duration: Duration,
}

#[derive(Debug, Clone)]
struct SpeedSample {
    timestamp: Instant,
    /// Total bytes at this point in time
    position: u64,
}

impl SpeedTracker {
    /// Create new speed tracker with default 10-second window
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(10))
    }

    pub fn with_window(window_duration: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            window_duration,
        }
    }

    /// Add a position sample (total bytes downloaded so far)
    pub fn add_position(&mut self, position: u64) {
        self.add_sample(Instant::now(), position);
    }

    fn add_sample(&mut self, now: Instant, position: u64) {
        self.samples.push_back(SpeedSample {
            timestamp: now,
            position,
        });

        // Remove samples outside the window
        while let Some(sample) = self.samples.front() {
            if now.duration_since(sample.timestamp) > self.window_duration {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Current average speed in bytes per second
    pub fn average_speed(&self) -> f64 {
        let (first, last) = match (self.samples.front(), self.samples.back()) {
            (Some(first), Some(last)) if self.samples.len() >= 2 => (first, last),
            _ => return 0.0,
        };

        let bytes_delta = last.position.saturating_sub(first.position);
        let time_delta = last.timestamp.duration_since(first.timestamp).as_secs_f64();

        if time_delta > 0.0 {
            bytes_delta as f64 / time_delta
        } else {
            0.0
        }
    }
}

impl Default for SpeedTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte progress for the song currently streaming
///
/// Throttles `SongProgress` events to one per [`UPDATE_INTERVAL`].
#[derive(Debug)]
pub struct ProgressTracker {
    index: usize,
    total_bytes: Option<u64>,
    bytes: u64,
    speed_tracker: SpeedTracker,
    last_update: Option<Instant>,
    update_interval: Duration,
}

impl ProgressTracker {
    pub fn new(index: usize, total_bytes: Option<u64>) -> Self {
        Self {
            index,
            total_bytes: total_bytes.filter(|&n| n > 0),
            bytes: 0,
            speed_tracker: SpeedTracker::new(),
            last_update: None,
            update_interval: UPDATE_INTERVAL,
        }
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Record `chunk_len` more bytes
    ///
    /// Returns an event when enough time has passed since the last one.
    pub fn update(&mut self, chunk_len: u64) -> Option<EventKind> {
        self.bytes += chunk_len;
        self.speed_tracker.add_position(self.bytes);

        let now = Instant::now();
        let due = match self.last_update {
            Some(last) => now.duration_since(last) >= self.update_interval,
            None => true,
        };
        if due {
            self.last_update = Some(now);
            Some(self.snapshot())
        } else {
            None
        }
    }

    /// Final event, regardless of throttling
    pub fn finish(&mut self) -> EventKind {
        self.last_update = Some(Instant::now());
        self.snapshot()
    }

    fn snapshot(&self) -> EventKind {
        EventKind::SongProgress {
            index: self.index,
            bytes: self.bytes,
            total_bytes: self.total_bytes,
            percent: self
                .total_bytes
                .map(|total| (self.bytes as f64 / total as f64 * 100.0).min(100.0)),
            speed: self.speed_tracker.average_speed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SkipReason;

    #[test]
    fn test_marker_round_trip_shape() {
        let event = ProgressEvent::now(EventKind::SongStarted {
            index: 1,
            total: 3,
            title: "第1首 圣哉三一歌".to_string(),
        });
        let marker = event.to_marker();

        assert!(marker.starts_with(">>>PROGRESS:{"));
        let json: serde_json::Value = serde_json::from_str(&marker[MARKER_PREFIX.len()..]).unwrap();
        assert_eq!(json["type"], "song_started");
        assert_eq!(json["index"], 1);
        assert_eq!(json["title"], "第1首 圣哉三一歌");
        assert!(json["timestamp"].is_string());

        assert_eq!(ProgressEvent::from_marker(&marker), Some(event));
        assert_eq!(ProgressEvent::from_marker("plain log line"), None);
    }

    #[test]
    fn test_completed_event_carries_outcome() {
        let event = ProgressEvent::now(EventKind::SongCompleted {
            index: 2,
            title: "x".to_string(),
            outcome: DownloadOutcome::Skipped {
                reason: SkipReason::Exists,
                path: None,
            },
        });
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "song_completed");
        assert_eq!(json["outcome"]["status"], "skipped");
        assert_eq!(json["outcome"]["reason"], "exists");
    }

    #[tokio::test]
    async fn test_reporter_channel() {
        let (reporter, mut events) = ProgressReporter::channel();
        reporter.emit(EventKind::AlbumCompleted {
            result: AlbumResult::new(0),
        });
        drop(reporter);

        let event = events.recv().await.unwrap();
        assert!(matches!(event.kind, EventKind::AlbumCompleted { .. }));
        assert!(events.recv().await.is_none());

        // Emitting without a receiver is a no-op
        ProgressReporter::silent().emit(EventKind::AlbumCompleted {
            result: AlbumResult::new(0),
        });
    }

    #[test]
    fn test_speed_tracker() {
        let mut tracker = SpeedTracker::new();
        let start = Instant::now();
        tracker.add_sample(start, 0);
        tracker.add_sample(start + Duration::from_secs(1), 1_000_000);
        tracker.add_sample(start + Duration::from_secs(2), 2_000_000);

        let speed = tracker.average_speed();
        assert!((speed - 1_000_000.0).abs() < 1.0);
    }

    #[test]
    fn test_speed_window_drops_old_samples() {
        let mut tracker = SpeedTracker::with_window(Duration::from_secs(5));
        let start = Instant::now();
        tracker.add_sample(start, 0);
        tracker.add_sample(start + Duration::from_secs(10), 10_000);
        tracker.add_sample(start + Duration::from_secs(11), 12_000);

        assert!((tracker.average_speed() - 2_000.0).abs() < 1.0);
    }

    #[test]
    fn test_progress_tracker_throttles() {
        let mut tracker = ProgressTracker::new(1, Some(1000));

        // First update always reports
        assert!(tracker.update(100).is_some());
        // Immediately after: throttled
        assert!(tracker.update(100).is_none());

        match tracker.finish() {
            EventKind::SongProgress {
                bytes,
                total_bytes,
                percent,
                ..
            } => {
                assert_eq!(bytes, 200);
                assert_eq!(total_bytes, Some(1000));
                assert_eq!(percent, Some(20.0));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_length_has_no_percent() {
        let mut tracker = ProgressTracker::new(1, None);
        tracker.update(10);
        assert!(matches!(
            tracker.finish(),
            EventKind::SongProgress { percent: None, .. }
        ));
    }
}
