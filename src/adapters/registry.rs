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


//! Adapter registry

use crate::adapters::{IzanmeiAdapter, SiteAdapter};
use crate::error::{FetcherError, Result};
use crate::http::Transport;
use std::sync::Arc;
use tracing::debug;

/// Ordered list of site adapters
///
/// Resolution is first-match in registration order. Adding a site means
/// appending one more adapter.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn SiteAdapter>>,
}

impl AdapterRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    /// Registry with every built-in adapter, sharing one transport
    pub fn with_defaults(transport: Arc<dyn Transport>) -> Self {
        Self::new().register(IzanmeiAdapter::new(transport))
    }

    /// Append an adapter (builder style)
    pub fn register<A: SiteAdapter + 'static>(mut self, adapter: A) -> Self {
        self.adapters.push(Arc::new(adapter));
        self
    }

    /// First adapter that recognizes `url`
    pub fn resolve(&self, url: &str) -> Result<Arc<dyn SiteAdapter>> {
        let adapter = self
            .adapters
            .iter()
            .find(|a| a.recognize(url))
            .cloned()
            .ok_or_else(|| FetcherError::UnsupportedUrl(url.to_string()))?;

        debug!(url, adapter = adapter.name(), "Resolved adapter");
        Ok(adapter)
    }

    /// Names of registered adapters, in resolution order
    pub fn supported_sites(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.supported_sites())
            .finish()
    }
}
