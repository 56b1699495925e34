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


//! Site adapters
//!
//! An adapter turns one catalog URL into an [`Album`]. The
//! [`AdapterRegistry`] resolves a URL to the first adapter that recognizes
//! it, in registration order.

pub mod izanmei;
pub mod registry;

use crate::error::Result;
use crate::models::Album;
use async_trait::async_trait;

// Re-export commonly used types
pub use izanmei::IzanmeiAdapter;
pub use registry::AdapterRegistry;

/// Catalog parser for one website
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Short site identifier, e.g. `izanmei.cc`
    fn name(&self) -> &'static str;

    /// Whether this adapter handles `url`; must not perform I/O
    fn recognize(&self, url: &str) -> bool;

    /// Fetch and parse the catalog page at `url`
    ///
    /// Fails with [`crate::FetcherError::Adapter`]: `NotFound` when the page
    /// does not exist, `NetworkError` when it cannot be fetched, and
    /// `ParseError` when it lists no songs.
    async fn fetch_album(&self, url: &str) -> Result<Album>;
}
