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


//! Filename sanitization and temp-file naming
//!
//! # Sanitization rules
//! - Path separators and Windows-illegal characters become `_`
//! - ASCII control characters become `_`; any whitespace becomes a single space
//! - Leading/trailing spaces and trailing dots are trimmed
//! - Windows reserved device names get a leading `_` on every platform, so
//!   albums copied between machines keep working
//! - Names are capped at [`MAX_FILENAME_BYTES`] bytes, keeping the extension
//!
//! `sanitize_filename` is total and idempotent.

use std::path::{Path, PathBuf};

/// Maximum filename length in UTF-8 bytes
pub const MAX_FILENAME_BYTES: usize = 200;

/// Name used when nothing usable is left
pub const FALLBACK_NAME: &str = "unnamed";

/// Suffix of in-flight downloads
pub const PART_SUFFIX: &str = ".part";

/// Longest suffix treated as an extension when truncating
const MAX_EXTENSION_LEN: usize = 16;

const ILLEGAL_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Sanitize a filename for the local filesystem
pub fn sanitize_filename(name: &str) -> String {
    fit_filename(&clean_filename(name), MAX_FILENAME_BYTES)
}

/// Character rules of [`sanitize_filename`] without the length cap
///
/// The naming pipeline repairs mojibake between this and [`fit_filename`]:
/// UTF-8 read as Latin-1 takes up to twice the bytes of the real name.
pub fn clean_filename(name: &str) -> String {
    let mut replaced = String::with_capacity(name.len());
    let mut after_space = true;

    for c in name.chars() {
        let c = replace_char(c);
        if c == ' ' {
            if !after_space {
                replaced.push(' ');
            }
            after_space = true;
        } else {
            replaced.push(c);
            after_space = false;
        }
    }

    handle_windows_reserved_names(trim_name(&replaced))
}

/// Cap a cleaned name at `max_bytes`, keeping the extension
pub fn fit_filename(name: &str, max_bytes: usize) -> String {
    let truncated = truncate_preserving_extension(name, max_bytes);
    if truncated.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        truncated
    }
}

/// Replace a character that cannot appear in a filename
///
/// U+0080..=U+00FF pass through untouched, including NEL and NBSP: they are
/// legal in filenames and mojibake repair needs every one of them.
fn replace_char(c: char) -> char {
    match c {
        c if ('\u{80}'..='\u{FF}').contains(&c) => c,
        c if c.is_whitespace() => ' ',
        c if ILLEGAL_CHARS.contains(&c) => '_',
        c if c.is_ascii_control() => '_',
        c => c,
    }
}

fn trim_name(name: &str) -> &str {
    name.trim_start_matches(' ')
        .trim_end_matches(|c| c == ' ' || c == '.')
}

/// Prefix Windows reserved device names (`CON`, `COM1.mp3`, ...) with `_`
fn handle_windows_reserved_names(name: &str) -> String {
    let stem = name.split('.').next().unwrap_or(name).trim_end();
    let upper = stem.to_uppercase();

    if RESERVED_NAMES.iter().any(|reserved| upper == *reserved) {
        format!("_{}", name)
    } else {
        name.to_string()
    }
}

/// Split `name` into stem and extension (without the dot)
///
/// Dotfiles and suffixes that do not look like extensions yield `None`.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => {
            let ext = &name[idx + 1..];
            if !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
            {
                (&name[..idx], Some(ext))
            } else {
                (name, None)
            }
        }
        _ => (name, None),
    }
}

/// Cut `text` to at most `max_bytes` on a UTF-8 boundary
pub fn truncate_component(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }

    let mut index = max_bytes;
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    &text[..index]
}

/// Cap `name` at `max_bytes`, shortening the stem and keeping the extension
pub fn truncate_preserving_extension(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }

    match split_extension(name) {
        (stem, Some(ext)) => {
            let stem_budget = max_bytes.saturating_sub(ext.len() + 1);
            let stem = trim_name(truncate_component(stem, stem_budget));
            let stem = if stem.is_empty() { FALLBACK_NAME } else { stem };
            format!("{}.{}", stem, ext)
        }
        (_, None) => trim_name(truncate_component(name, max_bytes)).to_string(),
    }
}

/// Temp path an in-flight body is written to before the final rename
///
/// Lives in the same directory so the rename never crosses filesystems.
pub fn part_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| FALLBACK_NAME.to_string());
    target.with_file_name(format!(".{}{}", name, PART_SUFFIX))
}

/// True for hidden files and in-flight downloads
pub fn is_temp_or_hidden(name: &str) -> bool {
    name.starts_with('.') || name.ends_with(PART_SUFFIX)
}
