//! Error types for Resource Fetcher
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are split by how far they propagate:
//!
//! - **Album-level** (`UnsupportedUrl`, `Adapter`, `InvalidConfiguration`):
//!   surfaced to the caller immediately, before any item is fetched.
//! - **Item-level** (`Fetch`): retried up to the configured policy, then
//!   recorded as a failed outcome while the album continues.
//! - **Filesystem**: fatal for the item, or for the whole remaining queue when
//!   `directory_wide` is set (permissions, disk full).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias using our FetcherError type
pub type Result<T> = std::result::Result<T, FetcherError>;

/// Why a catalog page could not be turned into an album
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterErrorKind {
    /// Page does not exist (HTTP 404/410)
    NotFound,
    /// Page was fetched but contains no recognizable catalog
    ParseError,
    /// Host unreachable, timeout or non-success status
    NetworkError,
}

impl fmt::Display for AdapterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::ParseError => write!(f, "parse error"),
            Self::NetworkError => write!(f, "network error"),
        }
    }
}

/// Classification of a single failed fetch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchErrorKind {
    /// Attempt exceeded the per-item timeout
    Timeout,
    /// Server answered with a non-2xx status
    HttpStatus(u16),
    /// Connection refused, reset or dropped mid-body
    ConnectionReset,
    /// Body ended before the declared content length
    IncompleteBody,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::HttpStatus(code) => write!(f, "HTTP {}", code),
            Self::ConnectionReset => write!(f, "connection reset"),
            Self::IncompleteBody => write!(f, "incomplete body"),
        }
    }
}

/// A failed fetch attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new<S: Into<String>>(kind: FetchErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::new(FetchErrorKind::Timeout, message)
    }

    pub fn status(code: u16, url: &str) -> Self {
        Self::new(
            FetchErrorKind::HttpStatus(code),
            format!("server responded with status {} for {}", code, url),
        )
    }

    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::new(FetchErrorKind::ConnectionReset, message)
    }

    /// Map a reqwest error onto the fetch taxonomy
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(err.to_string())
        } else if let Some(status) = err.status() {
            Self::new(FetchErrorKind::HttpStatus(status.as_u16()), err.to_string())
        } else {
            Self::connection(err.to_string())
        }
    }

    /// Client errors other than 408/429 will not improve on retry, but the
    /// policy still retries them; this only feeds log levels and messages.
    pub fn is_transient(&self) -> bool {
        match self.kind {
            FetchErrorKind::HttpStatus(code) => code == 408 || code == 429 || code >= 500,
            _ => true,
        }
    }
}

/// Main error type for Resource Fetcher
#[derive(Error, Debug)]
pub enum FetcherError {
    // ===== Album-level Errors =====

    /// No registered adapter recognizes the URL
    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),

    /// Catalog page unreachable or unparsable
    #[error("Adapter {kind} for {url}: {message}")]
    Adapter {
        kind: AdapterErrorKind,
        url: String,
        message: String,
    },

    /// Configuration is invalid or incomplete
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ===== Item-level Errors =====

    /// A single fetch attempt failed
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Output directory or file could not be written
    #[error("Filesystem error at {}: {message}", path.display())]
    Filesystem {
        path: PathBuf,
        message: String,
        /// Permission or disk-space problem affecting every file in the directory
        directory_wide: bool,
    },

    // ===== General Errors =====

    /// Operation was cancelled by user or system
    #[error("Operation cancelled")]
    Cancelled,

    /// Generic input validation error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ===== External Library Errors =====

    /// HTTP client error from reqwest
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),
}

impl FetcherError {
    /// Create an Adapter error
    pub fn adapter<U: Into<String>, S: Into<String>>(
        kind: AdapterErrorKind,
        url: U,
        message: S,
    ) -> Self {
        FetcherError::Adapter {
            kind,
            url: url.into(),
            message: message.into(),
        }
    }

    /// Wrap an I/O error raised while touching `path`
    ///
    /// Permission and disk-space failures are flagged as directory-wide: every
    /// following item would fail the same way.
    pub fn filesystem(path: &Path, err: &std::io::Error) -> Self {
        FetcherError::Filesystem {
            path: path.to_path_buf(),
            message: err.to_string(),
            directory_wide: is_directory_wide(err),
        }
    }

    /// Wrap an I/O error that leaves the whole output directory unusable
    pub fn directory_unusable(path: &Path, err: &std::io::Error) -> Self {
        FetcherError::Filesystem {
            path: path.to_path_buf(),
            message: err.to_string(),
            directory_wide: true,
        }
    }

    /// Create an InvalidConfiguration error with a message
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        FetcherError::InvalidConfiguration(message.into())
    }

    /// Check if error is retryable by the per-item retry loop
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetcherError::Fetch(_) | FetcherError::ReqwestError(_))
    }

    /// Check if error must stop the whole album rather than one item
    pub fn is_album_fatal(&self) -> bool {
        match self {
            FetcherError::UnsupportedUrl(_)
            | FetcherError::Adapter { .. }
            | FetcherError::InvalidConfiguration(_)
            | FetcherError::Cancelled => true,
            FetcherError::Filesystem { directory_wide, .. } => *directory_wide,
            _ => false,
        }
    }

    /// Get user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            FetcherError::UnsupportedUrl(url) => {
                format!("No supported site recognizes '{}'.", url)
            }
            FetcherError::Adapter {
                kind: AdapterErrorKind::NotFound,
                url,
                ..
            } => {
                format!("The album page '{}' does not exist.", url)
            }
            FetcherError::Adapter {
                kind: AdapterErrorKind::ParseError,
                url,
                ..
            } => {
                format!("No songs could be found on '{}'. The page layout may have changed.", url)
            }
            FetcherError::Adapter {
                kind: AdapterErrorKind::NetworkError,
                url,
                message,
            } => {
                format!("Could not load '{}': {}. Check your connection and try again.", url, message)
            }
            FetcherError::Filesystem {
                path,
                directory_wide: true,
                message,
            } => {
                format!(
                    "Cannot write to '{}': {}. Check permissions and free disk space.",
                    path.display(),
                    message
                )
            }
            _ => self.to_string(),
        }
    }
}

/// ERROR_HANDLE_DISK_FULL, ERROR_DISK_FULL
#[cfg(windows)]
const DISK_FULL_CODES: &[i32] = &[39, 112];

/// ENOSPC
#[cfg(not(windows))]
const DISK_FULL_CODES: &[i32] = &[28];

fn is_directory_wide(err: &std::io::Error) -> bool {
    if err.kind() == std::io::ErrorKind::PermissionDenied {
        return true;
    }
    err.raw_os_error()
        .map_or(false, |code| DISK_FULL_CODES.contains(&code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_is_directory_wide() {
        let err = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        let wrapped = FetcherError::filesystem(Path::new("/music"), &err);
        assert!(wrapped.is_album_fatal());
    }

    #[cfg(unix)]
    #[test]
    fn test_disk_full_is_directory_wide_but_not_empty_is_not() {
        let full = std::io::Error::from_raw_os_error(28);
        assert!(FetcherError::filesystem(Path::new("/music/a.mp3"), &full).is_album_fatal());
        // ENOTEMPTY on Linux
        let not_empty = std::io::Error::from_raw_os_error(39);
        assert!(!FetcherError::filesystem(Path::new("/music/a.mp3"), &not_empty).is_album_fatal());
    }

    #[test]
    fn test_directory_unusable_stops_album() {
        let err = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert!(FetcherError::directory_unusable(Path::new("/music/.a.mp3.part"), &err).is_album_fatal());
    }

    #[test]
    fn test_not_found_is_item_level() {
        let err = std::io::Error::from(std::io::ErrorKind::NotFound);
        let wrapped = FetcherError::filesystem(Path::new("/music/a.mp3"), &err);
        assert!(!wrapped.is_album_fatal());
    }

    #[test]
    fn test_fetch_errors_are_retryable() {
        let err: FetcherError = FetchError::status(503, "https://example.com/a.mp3").into();
        assert!(err.is_retryable());
        assert!(!err.is_album_fatal());
    }

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::status(503, "u").is_transient());
        assert!(FetchError::status(429, "u").is_transient());
        assert!(!FetchError::status(404, "u").is_transient());
        assert!(FetchError::timeout("slow").is_transient());
    }

    #[test]
    fn test_adapter_user_message() {
        let err = FetcherError::adapter(
            AdapterErrorKind::ParseError,
            "https://www.izanmei.cc/album/x.html",
            "no songs",
        );
        assert!(err.user_message().contains("No songs could be found"));
        assert!(err.is_album_fatal());
    }
}
