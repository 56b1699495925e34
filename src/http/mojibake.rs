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


//! Mojibake repair for filenames
//!
//! Targets one pattern: UTF-8 bytes that were decoded as Latin-1 or
//! Windows-1252 (`圣哉三一歌.mp3` arriving as `å\u{9c}£å\u{93}\u{89}...`).
//! The repair re-encodes the string as single-byte text and decodes the
//! bytes as UTF-8. The result is kept only when it decodes cleanly and has
//! at least [`MIN_IMPROVEMENT`] fewer suspicious code points than the input.

/// Suspicious code points the repair must remove to be accepted
pub const MIN_IMPROVEMENT: usize = 1;

/// Windows-1252 characters in 0x80..=0x9F that differ from Latin-1
const CP1252_HIGH: [(char, u8); 27] = [
    ('€', 0x80),
    ('‚', 0x82),
    ('ƒ', 0x83),
    ('„', 0x84),
    ('…', 0x85),
    ('†', 0x86),
    ('‡', 0x87),
    ('ˆ', 0x88),
    ('‰', 0x89),
    ('Š', 0x8A),
    ('‹', 0x8B),
    ('Œ', 0x8C),
    ('Ž', 0x8E),
    ('‘', 0x91),
    ('’', 0x92),
    ('“', 0x93),
    ('”', 0x94),
    ('•', 0x95),
    ('–', 0x96),
    ('—', 0x97),
    ('˜', 0x98),
    ('™', 0x99),
    ('š', 0x9A),
    ('›', 0x9B),
    ('œ', 0x9C),
    ('ž', 0x9E),
    ('Ÿ', 0x9F),
];

/// Repair a filename whose UTF-8 bytes were mis-decoded as single-byte text
///
/// Never fails and never returns an empty string for non-empty input;
/// anything that does not clearly improve is returned unchanged.
pub fn repair_mojibake(name: &str) -> String {
    if name.is_ascii() {
        return name.to_string();
    }

    let bytes = match encode_single_byte(name) {
        Some(bytes) => bytes,
        None => return name.to_string(),
    };

    let decoded = match String::from_utf8(bytes) {
        Ok(decoded) => decoded,
        Err(_) => return name.to_string(),
    };

    if decoded.is_empty() || decoded == name {
        return name.to_string();
    }

    if suspicion_score(&decoded) + MIN_IMPROVEMENT <= suspicion_score(name) {
        decoded
    } else {
        name.to_string()
    }
}

/// Decode raw header bytes: UTF-8 when valid, otherwise Latin-1
pub fn decode_header_bytes(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(text) => text.to_string(),
        Err(_) => latin1_to_string(raw),
    }
}

/// Interpret every byte as the Unicode code point of the same value
pub fn latin1_to_string(raw: &[u8]) -> String {
    raw.iter().map(|&b| b as char).collect()
}

/// Encode as Latin-1, accepting the Windows-1252 extras
fn encode_single_byte(text: &str) -> Option<Vec<u8>> {
    text.chars()
        .map(|c| {
            let code = c as u32;
            if code <= 0xFF {
                Some(code as u8)
            } else {
                cp1252_byte(c)
            }
        })
        .collect()
}

fn cp1252_byte(c: char) -> Option<u8> {
    CP1252_HIGH
        .iter()
        .find(|(ch, _)| *ch == c)
        .map(|(_, byte)| *byte)
}

/// Code points typical of mis-decoded UTF-8
fn suspicion_score(text: &str) -> usize {
    text.chars()
        .filter(|&c| {
            let code = c as u32;
            (0x80..=0xFF).contains(&code) || c == '\u{FFFD}' || cp1252_byte(c).is_some()
        })
        .count()
}
