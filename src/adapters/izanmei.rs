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


//! Adapter for izanmei.cc hymn albums
//!
//! Album pages list songs in a table: a `<td class="i">第N首</td>` cell with
//! the track number, followed by a `/song/{id}.html` link. Audio lives on a
//! separate CDN at `https://play.xiaoh.ai/song/p/{id}.mp3`.

use crate::adapters::SiteAdapter;
use crate::error::{AdapterErrorKind, FetchErrorKind, FetcherError, Result};
use crate::http::Transport;
use crate::models::{Album, Song};
use crate::renumber::extract_track_number;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const SITE_NAME: &str = "izanmei.cc";

/// CDN serving the audio files
pub const AUDIO_BASE: &str = "https://play.xiaoh.ai/song/p";

/// Title used when the page has no `<h1>`
pub const UNKNOWN_ALBUM_TITLE: &str = "未知专辑";

const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(30);

lazy_static! {
    static ref TITLE_RE: Regex = Regex::new(r"<h1[^>]*>([^<]+)</h1>").unwrap();
    static ref TRACK_CELL_RE: Regex = Regex::new(r#"(?s)<td\s+class="i"[^>]*>.*?第([0-9]+)首"#).unwrap();
    static ref SONG_LINK_RE: Regex =
        Regex::new(r#"<a\s+href="/song/([0-9]+)\.html"[^>]*>([^<]+)</a>"#).unwrap();
    static ref LOOSE_SONG_LINK_RE: Regex = Regex::new(r#"href="/song/([0-9]+)\.html"[^>]*>([^<]+)"#).unwrap();
    static ref NUMERIC_ENTITY_RE: Regex = Regex::new(r"&#(x[0-9A-Fa-f]+|[0-9]+);").unwrap();
}

/// izanmei.cc catalog adapter
pub struct IzanmeiAdapter {
    transport: Arc<dyn Transport>,
    backup_domains: Vec<String>,
    page_timeout: Duration,
}

impl IzanmeiAdapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            backup_domains: Vec::new(),
            page_timeout: DEFAULT_PAGE_TIMEOUT,
        }
    }

    /// Mirror hosts serving `/song/p/{id}.mp3`, e.g. `https://mirror.example`
    pub fn with_backup_domains(mut self, domains: Vec<String>) -> Self {
        self.backup_domains = domains;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    /// Parse an album page that has already been fetched
    pub fn parse_album(&self, html: &str, page_url: &str) -> Result<Album> {
        let title = TITLE_RE
            .captures(html)
            .map(|caps| decode_entities(caps[1].trim()))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNKNOWN_ALBUM_TITLE.to_string());

        let entries = song_entries(html);
        if entries.is_empty() {
            return Err(FetcherError::adapter(
                AdapterErrorKind::ParseError,
                page_url,
                "no songs found on page",
            ));
        }

        let songs = entries
            .into_iter()
            .map(|(track, id, name)| self.build_song(&track, &id, &name))
            .collect();

        Ok(Album {
            title,
            source_url: page_url.to_string(),
            source: SITE_NAME.to_string(),
            songs,
        })
    }

    fn build_song(&self, track: &str, id: &str, name: &str) -> Song {
        let title = format!("第{}首 {}", track, decode_entities(name.trim()));
        let backups = self
            .backup_domains
            .iter()
            .map(|domain| format!("{}/song/p/{}.mp3", domain.trim_end_matches('/'), id))
            .collect();

        Song::new(id, title, format!("{}/{}.mp3", AUDIO_BASE, id))
            .with_track_number(extract_track_number(track))
            .with_backup_urls(backups)
    }
}

/// `(track, song id, title)` triples in page order
///
/// Track cells and song links are paired positionally. Pages without track
/// cells are numbered sequentially.
fn song_entries(html: &str) -> Vec<(String, String, String)> {
    let tracks: Vec<&str> = TRACK_CELL_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    let links: Vec<(&str, &str)> = SONG_LINK_RE
        .captures_iter(html)
        .filter_map(|caps| Some((caps.get(1)?.as_str(), caps.get(2)?.as_str())))
        .collect();

    if !tracks.is_empty() && !links.is_empty() {
        return tracks
            .iter()
            .zip(links.iter())
            .map(|(track, (id, name))| (track.to_string(), id.to_string(), name.to_string()))
            .collect();
    }

    LOOSE_SONG_LINK_RE
        .captures_iter(html)
        .enumerate()
        .filter_map(|(i, caps)| {
            Some((
                (i + 1).to_string(),
                caps.get(1)?.as_str().to_string(),
                caps.get(2)?.as_str().to_string(),
            ))
        })
        .collect()
}

/// Decode the handful of entities that show up in song titles
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let named = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'");

    let numeric = NUMERIC_ENTITY_RE.replace_all(&named, |caps: &regex::Captures| {
        let code = &caps[1];
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse().ok(),
        };
        value
            .and_then(char::from_u32)
            .map(|c| c.to_string())
            .unwrap_or_else(|| caps[0].to_string())
    });

    // Last, so "&amp;lt;" stays "&lt;"
    numeric.replace("&amp;", "&")
}

fn is_izanmei_host(host: &str) -> bool {
    host == SITE_NAME || host.ends_with(".izanmei.cc")
}

#[async_trait]
impl SiteAdapter for IzanmeiAdapter {
    fn name(&self) -> &'static str {
        SITE_NAME
    }

    fn recognize(&self, url: &str) -> bool {
        match url::Url::parse(url) {
            Ok(parsed) => {
                matches!(parsed.scheme(), "http" | "https")
                    && parsed.host_str().map(is_izanmei_host).unwrap_or(false)
            }
            Err(_) => false,
        }
    }

    async fn fetch_album(&self, url: &str) -> Result<Album> {
        info!(url, "Fetching album page");

        let response = self
            .transport
            .get(url, self.page_timeout)
            .await
            .map_err(|e| FetcherError::adapter(AdapterErrorKind::NetworkError, url, e.to_string()))?;

        if !response.is_success() {
            let kind = match response.status {
                404 | 410 => AdapterErrorKind::NotFound,
                _ => AdapterErrorKind::NetworkError,
            };
            return Err(FetcherError::adapter(
                kind,
                url,
                format!("server responded with status {}", response.status),
            ));
        }

        let body = response.into_bytes().await.map_err(|e| {
            let kind = match e.kind {
                FetchErrorKind::HttpStatus(404) | FetchErrorKind::HttpStatus(410) => AdapterErrorKind::NotFound,
                _ => AdapterErrorKind::NetworkError,
            };
            FetcherError::adapter(kind, url, e.to_string())
        })?;

        let html = String::from_utf8_lossy(&body);
        let album = self.parse_album(&html, url)?;
        debug!(title = %album.title, songs = album.len(), "Parsed album page");
        Ok(album)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ReqwestTransport;

    const ALBUM_HTML: &str = r#"<!DOCTYPE html>
<html><body>
<h1 class="title">赞美诗（新编）</h1>
<table>
<tr><td class="i" style='width:58px;'>第101首</td>
<td><a href="/song/16975.html" target="_blank">圣哉三一歌</a></td></tr>
<tr><td class="i" style='width:58px;'>
  第102首</td>
<td><a href="/song/16976.html">三一来临歌</a></td></tr>
<tr><td class="i">第103首</td>
<td><a href="/song/16977.html">万世之宗 &amp; 赞美</a></td></tr>
</table>
</body></html>"#;

    fn adapter() -> IzanmeiAdapter {
        IzanmeiAdapter::new(Arc::new(ReqwestTransport::new().unwrap()))
    }

    #[test]
    fn test_recognize() {
        let adapter = adapter();
        assert!(adapter.recognize("https://www.izanmei.cc/album/hymns-442-1.html"));
        assert!(adapter.recognize("http://izanmei.cc/album/1.html"));
        assert!(!adapter.recognize("https://example.com/izanmei.cc"));
        assert!(!adapter.recognize("ftp://www.izanmei.cc/album/1.html"));
        assert!(!adapter.recognize("not a url"));
    }

    #[test]
    fn test_parse_album_with_track_cells() {
        let album = adapter()
            .parse_album(ALBUM_HTML, "https://www.izanmei.cc/album/hymns-442-1.html")
            .unwrap();

        assert_eq!(album.title, "赞美诗（新编）");
        assert_eq!(album.source, "izanmei.cc");
        assert_eq!(album.len(), 3);

        let first = &album.songs[0];
        assert_eq!(first.id, "16975");
        assert_eq!(first.title, "第101首 圣哉三一歌");
        assert_eq!(first.source_url, "https://play.xiaoh.ai/song/p/16975.mp3");
        assert_eq!(first.track_number, Some(101));

        assert_eq!(album.songs[1].title, "第102首 三一来临歌");
        assert_eq!(album.songs[2].title, "第103首 万世之宗 & 赞美");
    }

    #[test]
    fn test_parse_album_without_track_cells() {
        let html = r#"<html><ul>
<li><a href="/song/1.html">One</a></li>
<li><a href="/song/2.html">Two</a></li>
</ul></html>"#;
        let album = adapter().parse_album(html, "https://www.izanmei.cc/album/x.html").unwrap();

        assert_eq!(album.title, UNKNOWN_ALBUM_TITLE);
        assert_eq!(album.songs[0].title, "第1首 One");
        assert_eq!(album.songs[1].title, "第2首 Two");
        assert_eq!(album.songs[1].track_number, Some(2));
    }

    #[test]
    fn test_parse_album_without_songs() {
        let err = adapter()
            .parse_album("<html><h1>Empty</h1></html>", "https://www.izanmei.cc/album/x.html")
            .unwrap_err();
        assert!(matches!(
            err,
            FetcherError::Adapter { kind: AdapterErrorKind::ParseError, .. }
        ));
    }

    #[test]
    fn test_backup_urls_from_domains() {
        let adapter = adapter().with_backup_domains(vec![
            "https://mirror-a.example/".to_string(),
            "https://mirror-b.example".to_string(),
        ]);
        let album = adapter.parse_album(ALBUM_HTML, "https://www.izanmei.cc/album/1.html").unwrap();

        assert_eq!(
            album.songs[0].backup_urls,
            vec![
                "https://mirror-a.example/song/p/16975.mp3".to_string(),
                "https://mirror-b.example/song/p/16975.mp3".to_string(),
            ]
        );
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b"), "a & b");
        assert_eq!(decode_entities("&#22307;&#x54C9;"), "圣哉");
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
        assert_eq!(decode_entities("plain"), "plain");
    }
}
