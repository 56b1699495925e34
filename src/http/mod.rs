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


//! HTTP plumbing and filename recovery
//!
//! This module covers the transport seam, Content-Disposition parsing and
//! mojibake repair. Nothing here touches the filesystem.

pub mod client;
pub mod headers;
pub mod mojibake;

// Re-export commonly used types
pub use client::{HttpResponse, ReqwestTransport, ResponseHeaders, Transport};
pub use headers::{filename_from_content_disposition, resolve_filename, FilenameSource};
pub use mojibake::repair_mojibake;
