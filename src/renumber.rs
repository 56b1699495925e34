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


//! Sortable numeric prefixes
//!
//! Both the download pipeline and [`crate::file::scanner::renumber_directory`]
//! go through [`compute_padding`] and [`apply_prefix`], so the same count
//! always produces the same names.

use lazy_static::lazy_static;
use regex::Regex;

/// Separator between the numeric prefix and the original name
pub const PREFIX_SEPARATOR: char = '_';

/// Largest track number accepted from a catalog or filename
pub const MAX_TRACK_NUMBER: u32 = 9999;

lazy_static! {
    static ref PREFIX_RE: Regex = Regex::new(r"^([0-9]+)_").unwrap();
    static ref DIGITS_RE: Regex = Regex::new(r"[0-9]+").unwrap();
}

/// Digit width needed to number `total_count` items
///
/// 1..=9 → 1, 10..=99 → 2, 100 and above → 3. A count of zero is treated
/// like one.
pub fn compute_padding(total_count: usize) -> usize {
    match total_count {
        0..=9 => 1,
        10..=99 => 2,
        _ => 3,
    }
}

/// Prefix `filename` with `index` zero-padded to `digit_width`
///
/// `index` is the 1-based position in download order.
pub fn apply_prefix(index: usize, digit_width: usize, filename: &str) -> String {
    format!(
        "{:0width$}{}{}",
        index,
        PREFIX_SEPARATOR,
        filename,
        width = digit_width
    )
}

/// Position of one item in a numbered sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Numbering {
    /// 1-based position in download order
    pub index: usize,
    pub width: usize,
}

impl Numbering {
    pub fn new(index: usize, total: usize) -> Self {
        Self {
            index,
            width: compute_padding(total),
        }
    }

    pub fn apply(&self, filename: &str) -> String {
        apply_prefix(self.index, self.width, filename)
    }

    /// Bytes [`Numbering::apply`] adds in front of a name
    pub fn prefix_len(&self) -> usize {
        self.index.to_string().len().max(self.width) + PREFIX_SEPARATOR.len_utf8()
    }
}

/// Remove a numeric prefix produced by [`apply_prefix`], if present
pub fn strip_prefix(filename: &str) -> &str {
    match PREFIX_RE.find(filename) {
        Some(m) if m.end() < filename.len() => &filename[m.end()..],
        _ => filename,
    }
}

/// Numeric prefix of `filename`, if present
pub fn existing_prefix(filename: &str) -> Option<usize> {
    PREFIX_RE
        .captures(filename)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// First run of digits in `name`, as a track number
///
/// Zero means "no track number"; very large values clamp to
/// [`MAX_TRACK_NUMBER`].
pub fn extract_track_number(name: &str) -> Option<u32> {
    let digits = DIGITS_RE.find(name)?.as_str();
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.len() > 4 {
        return Some(MAX_TRACK_NUMBER);
    }
    trimmed
        .parse::<u32>()
        .ok()
        .map(|n| n.min(MAX_TRACK_NUMBER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_boundaries() {
        assert_eq!(compute_padding(1), 1);
        assert_eq!(compute_padding(9), 1);
        assert_eq!(compute_padding(10), 2);
        assert_eq!(compute_padding(99), 2);
        assert_eq!(compute_padding(100), 3);
        assert_eq!(compute_padding(999), 3);
        assert_eq!(compute_padding(0), 1);
    }

    #[test]
    fn test_apply_prefix_widths() {
        assert_eq!(apply_prefix(1, 1, "第1首 圣哉三一歌.mp3"), "1_第1首 圣哉三一歌.mp3");
        assert_eq!(apply_prefix(5, 2, "test.mp3"), "05_test.mp3");
        assert_eq!(apply_prefix(42, 3, "yyy.mp3"), "042_yyy.mp3");
        assert_eq!(apply_prefix(100, 3, "aaa.mp3"), "100_aaa.mp3");
    }

    #[test]
    fn test_prefix_width_matches_padding_for_every_index() {
        for total in [1usize, 7, 9, 10, 42, 99, 100, 250] {
            let width = compute_padding(total);
            for index in 1..=total {
                let name = apply_prefix(index, width, "x.mp3");
                let digits = name.split(PREFIX_SEPARATOR).next().unwrap();
                assert_eq!(digits.len(), width, "total={} index={}", total, index);
            }
        }
    }

    #[test]
    fn test_prefix_len_matches_applied_prefix() {
        for (index, total) in [(1, 5), (7, 42), (42, 42), (5, 250), (1000, 1200)] {
            let numbering = Numbering::new(index, total);
            assert_eq!(numbering.apply("x").len(), numbering.prefix_len() + 1);
        }
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_prefix("01_song.mp3"), "song.mp3");
        assert_eq!(strip_prefix("song.mp3"), "song.mp3");
        assert_eq!(strip_prefix("1_第1首 one.mp3"), "第1首 one.mp3");
        // Nothing left after the prefix: keep as-is
        assert_eq!(strip_prefix("12_"), "12_");
        assert_eq!(existing_prefix("007_x.mp3"), Some(7));
        assert_eq!(existing_prefix("x.mp3"), None);
    }

    #[test]
    fn test_extract_track_number() {
        assert_eq!(extract_track_number("第101首"), Some(101));
        assert_eq!(extract_track_number("Track 07 - Intro"), Some(7));
        assert_eq!(extract_track_number("no digits"), None);
        assert_eq!(extract_track_number("000"), None);
        assert_eq!(extract_track_number("123456789012345678901"), Some(MAX_TRACK_NUMBER));
    }
}
