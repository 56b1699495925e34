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


//! Core data model: albums, songs and download outcomes
//!
//! Songs are built by adapters and never mutated afterwards; the download
//! pipeline derives filenames from them without writing back.

use crate::error::FetchErrorKind;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

/// A single fetchable item discovered on a catalog page
///
/// Identity is the source URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song {
    /// Site-specific identifier
    pub id: String,

    /// Display name, used to derive a filename when the server provides none
    pub title: String,

    /// Absolute URL of the remote file
    pub source_url: String,

    /// Track number shown on the catalog page, if any
    pub track_number: Option<u32>,

    /// Mirrors serving the same file, tried in order after the primary
    #[serde(default)]
    pub backup_urls: Vec<String>,
}

impl Song {
    pub fn new<I, T, U>(id: I, title: T, source_url: U) -> Self
    where
        I: Into<String>,
        T: Into<String>,
        U: Into<String>,
    {
        Self {
            id: id.into(),
            title: title.into(),
            source_url: source_url.into(),
            track_number: None,
            backup_urls: Vec::new(),
        }
    }

    pub fn with_track_number(mut self, track_number: Option<u32>) -> Self {
        self.track_number = track_number;
        self
    }

    pub fn with_backup_urls(mut self, urls: Vec<String>) -> Self {
        self.backup_urls = urls;
        self
    }

    /// Primary URL followed by every backup
    pub fn candidate_urls(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.source_url.as_str()).chain(self.backup_urls.iter().map(String::as_str))
    }
}

impl PartialEq for Song {
    fn eq(&self, other: &Self) -> bool {
        self.source_url == other.source_url
    }
}

impl Eq for Song {}

impl Hash for Song {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source_url.hash(state);
    }
}

/// Ordered collection of songs from one catalog URL
///
/// Song order is the presentation order on the source page and is never
/// re-sorted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Album {
    pub title: String,

    /// Catalog page URL
    pub source_url: String,

    /// Source site identifier (e.g. "izanmei.cc")
    pub source: String,

    pub songs: Vec<Song>,
}

impl Album {
    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// First `limit` songs in catalog order, or all of them
    pub fn limited(&self, limit: Option<usize>) -> &[Song] {
        match limit {
            Some(n) if n < self.songs.len() => &self.songs[..n],
            _ => &self.songs,
        }
    }
}

/// Why a song was not fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Target file exists and overwrite is disabled
    Exists,
    /// Album was cancelled before this song started
    Cancelled,
    /// A directory-wide filesystem failure stopped the queue
    Aborted,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Exists => "exists",
            SkipReason::Cancelled => "cancelled",
            SkipReason::Aborted => "aborted",
        }
    }
}

/// Last error that made a song fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Fetch(FetchErrorKind),
    Filesystem,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Fetch(kind) => write!(f, "{}", kind),
            FailureKind::Filesystem => write!(f, "filesystem"),
        }
    }
}

/// Terminal state of one song
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    Success {
        bytes_written: u64,
        final_path: PathBuf,
        attempts: u32,
    },
    Skipped {
        reason: SkipReason,
        path: Option<PathBuf>,
    },
    Failed {
        error_kind: FailureKind,
        /// URL of the last attempt
        url: String,
        message: String,
        attempts: u32,
    },
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadOutcome::Success { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DownloadOutcome::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, DownloadOutcome::Skipped { .. })
    }

    /// One-line description for logs and CLI output
    pub fn describe(&self) -> String {
        match self {
            DownloadOutcome::Success {
                bytes_written,
                final_path,
                attempts,
            } => format!(
                "saved {} ({} bytes, {} attempt{})",
                final_path.display(),
                bytes_written,
                attempts,
                if *attempts == 1 { "" } else { "s" }
            ),
            DownloadOutcome::Skipped { reason, .. } => format!("skipped ({})", reason.as_str()),
            DownloadOutcome::Failed {
                error_kind,
                url,
                message,
                attempts,
            } => format!(
                "failed after {} attempt{}: {} [{}] {}",
                attempts,
                if *attempts == 1 { "" } else { "s" },
                error_kind,
                url,
                message
            ),
        }
    }
}

/// Why the album loop stopped early
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interruption {
    Cancelled,
    Aborted { message: String },
}

/// Aggregate of every song outcome in one album run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumResult {
    pub success_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    pub total: usize,
    pub interrupted: Option<Interruption>,
}

impl AlbumResult {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: &DownloadOutcome) {
        match outcome {
            DownloadOutcome::Success { .. } => self.success_count += 1,
            DownloadOutcome::Failed { .. } => self.failed_count += 1,
            DownloadOutcome::Skipped { .. } => self.skipped_count += 1,
        }
    }

    /// Songs with a recorded outcome
    pub fn processed(&self) -> usize {
        self.success_count + self.failed_count + self.skipped_count
    }

    /// True when nothing failed and the run was not interrupted
    pub fn is_complete_success(&self) -> bool {
        self.failed_count == 0 && self.interrupted.is_none()
    }

    /// Multi-line summary block
    pub fn summary(&self) -> String {
        let rule = "=".repeat(60);
        let mut lines = vec![
            rule.clone(),
            "Download Summary".to_string(),
            rule.clone(),
            format!("  Success: {}", self.success_count),
            format!("  Failed:  {}", self.failed_count),
            format!("  Skipped: {}", self.skipped_count),
            format!("  Total:   {}", self.total),
        ];
        match &self.interrupted {
            Some(Interruption::Cancelled) => lines.push("  Stopped: cancelled".to_string()),
            Some(Interruption::Aborted { message }) => {
                lines.push(format!("  Stopped: {}", message))
            }
            None => {}
        }
        lines.push(rule);
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn song(id: &str, url: &str) -> Song {
        Song::new(id, format!("Song {}", id), url)
    }

    #[test]
    fn test_song_identity_is_source_url() {
        let a = song("1", "https://example.com/a.mp3");
        let mut b = song("2", "https://example.com/a.mp3");
        b.title = "Different".to_string();
        assert_eq!(a, b);

        let set: HashSet<Song> = vec![a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_limited_keeps_catalog_order() {
        let album = Album {
            title: "Hymns".to_string(),
            source_url: "https://example.com/album".to_string(),
            source: "example".to_string(),
            songs: (1..=12)
                .map(|i| song(&i.to_string(), &format!("https://example.com/{}.mp3", i)))
                .collect(),
        };

        let ids: Vec<&str> = album.limited(Some(5)).iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
        assert_eq!(album.limited(None).len(), 12);
        assert_eq!(album.limited(Some(50)).len(), 12);
    }

    #[test]
    fn test_candidate_urls_primary_first() {
        let s = song("1", "https://a.example/1.mp3")
            .with_backup_urls(vec!["https://b.example/1.mp3".to_string()]);
        let urls: Vec<&str> = s.candidate_urls().collect();
        assert_eq!(urls, vec!["https://a.example/1.mp3", "https://b.example/1.mp3"]);
    }

    #[test]
    fn test_album_result_counts() {
        let mut result = AlbumResult::new(3);
        result.record(&DownloadOutcome::Success {
            bytes_written: 10,
            final_path: PathBuf::from("a.mp3"),
            attempts: 1,
        });
        result.record(&DownloadOutcome::Skipped {
            reason: SkipReason::Exists,
            path: None,
        });
        result.record(&DownloadOutcome::Failed {
            error_kind: FailureKind::Fetch(FetchErrorKind::Timeout),
            url: "https://example.com/c.mp3".to_string(),
            message: "timed out".to_string(),
            attempts: 3,
        });

        assert_eq!(result.processed(), 3);
        assert!(!result.is_complete_success());
        assert!(result.summary().contains("Failed:  1"));
    }

    #[test]
    fn test_failed_outcome_describes_diagnosis() {
        let outcome = DownloadOutcome::Failed {
            error_kind: FailureKind::Fetch(FetchErrorKind::HttpStatus(503)),
            url: "https://example.com/c.mp3".to_string(),
            message: "unavailable".to_string(),
            attempts: 3,
        };
        let text = outcome.describe();
        assert!(text.contains("3 attempts"));
        assert!(text.contains("HTTP 503"));
        assert!(text.contains("https://example.com/c.mp3"));
    }
}
