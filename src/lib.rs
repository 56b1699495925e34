//! Resource Fetcher: album download engine
//!
//! Turns a catalog URL into an ordered [`Album`] through a [`SiteAdapter`],
//! then downloads its songs sequentially with retries, atomic writes and a
//! progress event stream.
//!
//! ```no_run
//! # async fn run() -> resource_fetcher::Result<()> {
//! use resource_fetcher::{AdapterRegistry, DownloadConfig, ReqwestTransport};
//! use std::sync::Arc;
//!
//! let transport = Arc::new(ReqwestTransport::new()?);
//! let registry = AdapterRegistry::with_defaults(transport.clone());
//!
//! let url = "https://www.izanmei.cc/album/hymns-442-1.html";
//! let adapter = resource_fetcher::resolve_adapter(&registry, url)?;
//! let album = resource_fetcher::fetch_album(adapter.as_ref(), url).await?;
//!
//! let mut handle = resource_fetcher::download_album(transport, album, DownloadConfig::default())?;
//! while let Some(event) = handle.events.recv().await {
//!     println!("{}", event.display_string());
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod download;
pub mod error;
pub mod file;
pub mod http;
pub mod logging;
pub mod models;
pub mod renumber;

use std::sync::Arc;

pub use adapters::{AdapterRegistry, IzanmeiAdapter, SiteAdapter};
pub use download::{
    DownloadConfig, DownloadHandle, DownloadManager, EventKind, ProgressEvent, ProgressReporter,
    RetryPolicy,
};
pub use error::{AdapterErrorKind, FetchError, FetchErrorKind, FetcherError, Result};
pub use file::scanner::{renumber_directory, renumber_directory_with, RenumberOptions, RenumberResult};
pub use http::{FilenameSource, ReqwestTransport, Transport};
pub use models::{Album, AlbumResult, DownloadOutcome, SkipReason, Song};
pub use renumber::{apply_prefix, compute_padding};

/// First registered adapter that recognizes `url`
pub fn resolve_adapter(registry: &AdapterRegistry, url: &str) -> Result<Arc<dyn SiteAdapter>> {
    registry.resolve(url)
}

/// Fetch and parse the catalog page at `url`
pub async fn fetch_album(adapter: &dyn SiteAdapter, url: &str) -> Result<Album> {
    adapter.fetch_album(url).await
}

/// Start downloading `album` on the current tokio runtime
///
/// The handle's event stream ends with `AlbumCompleted`; its task resolves
/// to the same [`AlbumResult`].
pub fn download_album(
    transport: Arc<dyn Transport>,
    album: Album,
    config: DownloadConfig,
) -> Result<DownloadHandle> {
    Ok(DownloadManager::new(transport, config)?.spawn(album))
}
