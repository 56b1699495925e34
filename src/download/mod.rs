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


//! Album downloads
//!
//! This module turns an [`crate::models::Album`] into files on disk: retry
//! policy and configuration, the atomic body writer, the progress event
//! stream and the sequential [`DownloadManager`].

pub mod config;
pub mod manager;
pub mod progress;
pub mod stream;

// Re-export commonly used types
pub use config::{DownloadConfig, RetryPolicy};
pub use manager::{DownloadHandle, DownloadManager};
pub use progress::{EventKind, ProgressEvent, ProgressReporter};
