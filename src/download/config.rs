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


//! Download configuration

use crate::error::{FetcherError, Result};
use crate::http::FilenameSource;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Retry and pacing policy for item fetches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts per URL, including the first
    pub max_attempts: u32,

    /// Delay after the first failed attempt; doubles for each further one
    #[serde(with = "millis")]
    pub base_delay: Duration,

    /// Upper bound for a single backoff delay
    #[serde(with = "millis")]
    pub max_delay: Duration,

    /// Politeness pause between songs that touched the network
    #[serde(with = "millis")]
    pub inter_download_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            inter_download_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the attempt following failed attempt number `attempt`
    ///
    /// `base_delay * 2^(attempt - 1)`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Album download configuration
///
/// Mirrors the CLI flags one to one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Directory the album is written into
    pub output_directory: PathBuf,

    /// Download only the first N songs in catalog order
    pub limit: Option<usize>,

    /// Per-attempt timeout, covering headers and body
    #[serde(with = "millis")]
    pub timeout: Duration,

    pub retry: RetryPolicy,

    /// Replace files that already exist instead of skipping them
    pub overwrite: bool,

    /// Prefix filenames with their position (`01_`, `02_`, ...)
    pub renumber: bool,

    /// Where final names come from
    ///
    /// With [`FilenameSource::Catalog`] every target path is known before any
    /// request, so a rerun over a finished album fetches nothing. With
    /// [`FilenameSource::Header`] a server-suggested name is only known after
    /// the response arrives: a rerun still skips the write, but sends one
    /// request per song whose server sends Content-Disposition.
    pub filename_source: FilenameSource,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("./downloads"),
            limit: None,
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            overwrite: false,
            renumber: false,
            filename_source: FilenameSource::Header,
        }
    }
}

impl DownloadConfig {
    pub fn new<P: Into<PathBuf>>(output_directory: P) -> Self {
        Self {
            output_directory: output_directory.into(),
            ..Default::default()
        }
    }

    /// Check the configuration before any network I/O
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(FetcherError::invalid_config("max_attempts must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(FetcherError::invalid_config("timeout must be greater than zero"));
        }
        if self.limit == Some(0) {
            return Err(FetcherError::invalid_config("limit must be at least 1"));
        }
        if self.output_directory.as_os_str().is_empty() {
            return Err(FetcherError::invalid_config("output directory is empty"));
        }
        Ok(())
    }
}

/// Durations as whole milliseconds
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DownloadConfig::default();
        assert_eq!(config.output_directory, PathBuf::from("./downloads"));
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.inter_download_delay, Duration::from_millis(500));
        assert!(!config.overwrite);
        assert!(!config.renumber);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            ..Default::default()
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(5));
        assert_eq!(policy.delay_for(200), Duration::from_secs(5));
    }

    #[test]
    fn test_backoff_is_monotone() {
        let policy = RetryPolicy::default();
        let mut previous = Duration::ZERO;
        for attempt in 1..64 {
            let delay = policy.delay_for(attempt);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = DownloadConfig::default();
        config.retry.max_attempts = 0;
        assert!(matches!(config.validate(), Err(FetcherError::InvalidConfiguration(_))));

        let mut config = DownloadConfig::default();
        config.timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = DownloadConfig::default();
        config.limit = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_uses_milliseconds() {
        let json = serde_json::to_value(DownloadConfig::default()).unwrap();
        assert_eq!(json["timeout"], 60_000);
        assert_eq!(json["retry"]["inter_download_delay"], 500);
        assert_eq!(json["filename_source"], "header");

        let parsed: DownloadConfig =
            serde_json::from_str(r#"{"limit": 5, "renumber": true}"#).unwrap();
        assert_eq!(parsed.limit, Some(5));
        assert!(parsed.renumber);
        assert_eq!(parsed.timeout, Duration::from_secs(60));
    }
}
