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


//! Header-derived filenames
//!
//! # Naming pipeline
//! 1. Raw name: a well-formed Content-Disposition filename, or the catalog
//!    title plus an extension inferred from the URL suffix or content type
//! 2. Character cleanup for the filesystem
//! 3. Mojibake repair
//! 4. Length cap, leaving room for the numeric prefix
//! 5. Optional numeric prefix
//!
//! Every stage is a pure function and never fails.

use crate::file::paths::{
    clean_filename, fit_filename, split_extension, FALLBACK_NAME, MAX_FILENAME_BYTES,
};
use crate::http::client::ResponseHeaders;
use crate::http::mojibake::{decode_header_bytes, latin1_to_string, repair_mojibake};
use crate::renumber::Numbering;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Longest URL suffix accepted as an extension
const MAX_URL_EXTENSION_LEN: usize = 5;

lazy_static! {
    static ref EXTENDED_FILENAME_RE: Regex =
        Regex::new(r#"(?i)(?:^|;)\s*filename\*\s*=\s*"?([A-Za-z0-9_-]*)'[^']*'([^;"]+)"?"#).unwrap();
    static ref QUOTED_FILENAME_RE: Regex =
        Regex::new(r#"(?i)(?:^|;)\s*filename\s*=\s*"((?:[^"\\]|\\.)*)""#).unwrap();
    static ref TOKEN_FILENAME_RE: Regex =
        Regex::new(r#"(?i)(?:^|;)\s*filename\s*=\s*([^";\s][^;]*)"#).unwrap();
}

/// Which name wins when the server suggests one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilenameSource {
    /// Prefer a well-formed Content-Disposition filename
    #[default]
    Header,
    /// Always name files after the catalog title
    Catalog,
}

/// Filename suggested by a Content-Disposition header
///
/// `filename*=` (RFC 5987) wins over `filename=`. Returns `None` when the
/// header is absent, has no filename parameter, or names nothing usable.
pub fn filename_from_content_disposition(raw: &[u8]) -> Option<String> {
    let value = decode_header_bytes(raw);

    let name = extended_filename(&value)
        .or_else(|| {
            QUOTED_FILENAME_RE
                .captures(&value)
                .map(|caps| unescape_quoted(&caps[1]))
        })
        .or_else(|| {
            TOKEN_FILENAME_RE
                .captures(&value)
                .map(|caps| caps[1].trim().to_string())
        })
        .map(|name| percent_decode_lenient(&name))?;

    basename(&name)
}

fn extended_filename(value: &str) -> Option<String> {
    let caps = EXTENDED_FILENAME_RE.captures(value)?;
    let charset = caps[1].to_ascii_lowercase();
    let bytes = urlencoding::decode_binary(caps[2].trim().as_bytes());

    let decoded = if charset == "iso-8859-1" || charset == "latin1" {
        latin1_to_string(&bytes)
    } else {
        String::from_utf8_lossy(&bytes).into_owned()
    };
    // Already percent-decoded; stop the lenient pass from decoding twice
    Some(decoded.replace('%', "%25"))
}

fn unescape_quoted(quoted: &str) -> String {
    let mut out = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Percent-decode when the result is valid UTF-8, otherwise keep the input
fn percent_decode_lenient(name: &str) -> String {
    if !name.contains('%') {
        return name.to_string();
    }
    urlencoding::decode(name)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| name.to_string())
}

/// Last path component; servers occasionally send full paths
fn basename(name: &str) -> Option<String> {
    let last = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name).trim();
    if last.is_empty() || last == "." || last == ".." {
        None
    } else {
        Some(last.to_string())
    }
}

/// File extension for a media content type
pub fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    let ext = match mime.as_str() {
        "audio/mpeg" | "audio/mp3" | "audio/mpeg3" | "audio/x-mpeg" => "mp3",
        "audio/mp4" | "audio/x-m4a" | "audio/m4a" => "m4a",
        "audio/aac" | "audio/x-aac" => "aac",
        "audio/flac" | "audio/x-flac" => "flac",
        "audio/ogg" | "application/ogg" => "ogg",
        "audio/opus" => "opus",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "video/mp4" => "mp4",
        "video/webm" | "audio/webm" => "webm",
        _ => return None,
    };
    Some(ext)
}

/// Lower-cased extension of the last URL path segment
pub fn extension_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.last()?;
    let decoded = percent_decode_lenient(segment);
    match split_extension(&decoded) {
        (_, Some(ext)) if ext.len() <= MAX_URL_EXTENSION_LEN => Some(ext.to_ascii_lowercase()),
        _ => None,
    }
}

/// Raw filename from a catalog title
///
/// The extension comes from the URL suffix, then the content type. A title
/// that already ends with the extension is not extended twice.
pub fn catalog_filename(title: &str, url: &str, content_type: Option<&str>) -> String {
    let title = title.trim();
    let title = if title.is_empty() { FALLBACK_NAME } else { title };

    let ext = extension_from_url(url)
        .or_else(|| content_type.and_then(extension_from_content_type).map(str::to_string));

    match ext {
        Some(ext) => {
            let suffix = format!(".{}", ext);
            if title.to_ascii_lowercase().ends_with(&suffix) {
                title.to_string()
            } else {
                format!("{}{}", title, suffix)
            }
        }
        None => title.to_string(),
    }
}

/// Sanitize, repair and optionally number a raw filename
///
/// The result, prefix included, never exceeds [`MAX_FILENAME_BYTES`].
pub fn finalize_filename(raw: &str, numbering: Option<Numbering>) -> String {
    let cleaned = clean_filename(raw);
    let repaired = repair_mojibake(&cleaned);
    let name = if repaired == cleaned {
        cleaned
    } else {
        clean_filename(&repaired)
    };

    match numbering {
        Some(numbering) => {
            let budget = MAX_FILENAME_BYTES.saturating_sub(numbering.prefix_len());
            numbering.apply(&fit_filename(&name, budget))
        }
        None => fit_filename(&name, MAX_FILENAME_BYTES),
    }
}

/// Final filename for a song response
///
/// With `headers == None` this is the name predicted before any request.
pub fn resolve_filename(
    title: &str,
    url: &str,
    headers: Option<&ResponseHeaders>,
    source: FilenameSource,
    numbering: Option<Numbering>,
) -> String {
    let from_header = match source {
        FilenameSource::Header => headers
            .and_then(|h| h.content_disposition.as_deref())
            .and_then(filename_from_content_disposition),
        FilenameSource::Catalog => None,
    };

    let raw = from_header.unwrap_or_else(|| {
        catalog_filename(title, url, headers.and_then(|h| h.content_type.as_deref()))
    });

    finalize_filename(&raw, numbering)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disposition(value: &str) -> ResponseHeaders {
        ResponseHeaders {
            content_disposition: Some(value.as_bytes().to_vec()),
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_standard_filename() {
        assert_eq!(
            filename_from_content_disposition(br#"attachment; filename="song.mp3""#),
            Some("song.mp3".to_string())
        );
        assert_eq!(
            filename_from_content_disposition(b"attachment; filename=song.mp3"),
            Some("song.mp3".to_string())
        );
    }

    #[test]
    fn test_extract_rfc5987_format() {
        assert_eq!(
            filename_from_content_disposition(b"attachment; filename*=UTF-8''%E5%9C%A3%E5%93%89.mp3"),
            Some("圣哉.mp3".to_string())
        );
        assert_eq!(
            filename_from_content_disposition(b"attachment; filename*=UTF-8''test%20song.mp3"),
            Some("test song.mp3".to_string())
        );
    }

    #[test]
    fn test_extended_wins_over_plain() {
        let header = br#"attachment; filename="fallback.mp3"; filename*=UTF-8''real%20name.mp3"#;
        assert_eq!(
            filename_from_content_disposition(header),
            Some("real name.mp3".to_string())
        );
    }

    #[test]
    fn test_raw_utf8_header_bytes() {
        let header = "attachment; filename=\"圣哉三一歌.mp3\"";
        assert_eq!(
            filename_from_content_disposition(header.as_bytes()),
            Some("圣哉三一歌.mp3".to_string())
        );
    }

    #[test]
    fn test_malformed_headers_fall_back() {
        assert_eq!(filename_from_content_disposition(b"attachment"), None);
        assert_eq!(filename_from_content_disposition(b"inline; filename=\"\""), None);
        assert_eq!(filename_from_content_disposition(b"attachment; filename=\"../\""), None);
    }

    #[test]
    fn test_path_components_stripped() {
        assert_eq!(
            filename_from_content_disposition(br#"attachment; filename="C:\\music\\a.mp3""#),
            Some("a.mp3".to_string())
        );
    }

    #[test]
    fn test_extension_inference() {
        assert_eq!(extension_from_url("https://play.xiaoh.ai/song/p/16875.mp3"), Some("mp3".to_string()));
        assert_eq!(extension_from_url("https://example.com/stream?id=1"), None);
        assert_eq!(extension_from_content_type("audio/mpeg; charset=binary"), Some("mp3"));
        assert_eq!(extension_from_content_type("text/html"), None);
    }

    #[test]
    fn test_catalog_filename() {
        assert_eq!(
            catalog_filename("第1首 圣哉三一歌", "https://play.xiaoh.ai/song/p/16875.mp3", None),
            "第1首 圣哉三一歌.mp3"
        );
        assert_eq!(
            catalog_filename("intro.MP3", "https://example.com/x.mp3", None),
            "intro.MP3"
        );
        assert_eq!(
            catalog_filename("", "https://example.com/stream", Some("audio/ogg")),
            "unnamed.ogg"
        );
        assert_eq!(catalog_filename("raw", "https://example.com/stream", None), "raw");
    }

    #[test]
    fn test_header_preferred_over_title() {
        let headers = disposition(r#"attachment; filename="server name.mp3""#);
        let name = resolve_filename(
            "Catalog Title",
            "https://example.com/1.mp3",
            Some(&headers),
            FilenameSource::Header,
            None,
        );
        assert_eq!(name, "server name.mp3");
    }

    #[test]
    fn test_catalog_source_ignores_header() {
        let headers = disposition(r#"attachment; filename="server name.mp3""#);
        let name = resolve_filename(
            "Catalog Title",
            "https://example.com/1.mp3",
            Some(&headers),
            FilenameSource::Catalog,
            None,
        );
        assert_eq!(name, "Catalog Title.mp3");
    }

    #[test]
    fn test_mojibake_header_is_repaired() {
        let original = "圣哉三一歌.mp3";
        let mojibake = latin1_to_string(original.as_bytes());
        let headers = ResponseHeaders {
            content_disposition: Some(
                format!("attachment; filename=\"{}\"", mojibake).into_bytes(),
            ),
            ..Default::default()
        };
        let name = resolve_filename("x", "https://example.com/1.mp3", Some(&headers), FilenameSource::Header, None);
        assert_eq!(name, original);
    }

    #[test]
    fn test_long_mojibake_header_is_repaired_before_length_cap() {
        // 40 CJK characters: 124 bytes repaired, 244 bytes as mojibake
        let original = format!("{}.mp3", "圣哉三一歌".repeat(8));
        let mojibake = latin1_to_string(original.as_bytes());
        assert!(mojibake.len() > MAX_FILENAME_BYTES);
        let headers = disposition(&format!("attachment; filename=\"{}\"", mojibake));

        let name = resolve_filename("x", "https://example.com/1.mp3", Some(&headers), FilenameSource::Header, None);
        assert_eq!(name, original);

        let numbered = resolve_filename(
            "x",
            "https://example.com/1.mp3",
            Some(&headers),
            FilenameSource::Header,
            Some(Numbering::new(7, 42)),
        );
        assert_eq!(numbered, format!("07_{}", original));
    }

    #[test]
    fn test_length_cap_includes_prefix() {
        let title = "a".repeat(300);
        let name = resolve_filename(
            &title,
            "https://example.com/1.mp3",
            None,
            FilenameSource::Catalog,
            Some(Numbering::new(3, 120)),
        );
        assert_eq!(name.len(), MAX_FILENAME_BYTES);
        assert!(name.starts_with("003_aaa"));
        assert!(name.ends_with(".mp3"));

        let unnumbered = resolve_filename(&title, "https://example.com/1.mp3", None, FilenameSource::Catalog, None);
        assert_eq!(unnumbered.len(), MAX_FILENAME_BYTES);
    }

    #[test]
    fn test_numbering_applied_last() {
        let name = resolve_filename(
            "a/b",
            "https://example.com/1.mp3",
            None,
            FilenameSource::Header,
            Some(Numbering::new(3, 12)),
        );
        assert_eq!(name, "03_a_b.mp3");
    }
}
