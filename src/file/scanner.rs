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


//! Directory renumbering
//!
//! Scans an album directory that was downloaded earlier and gives every
//! media file a sortable numeric prefix. Existing prefixes are stripped
//! before the new order is computed, so running twice renames nothing the
//! second time.

use crate::error::{FetcherError, Result};
use crate::file::paths::{is_temp_or_hidden, split_extension};
use crate::renumber::{extract_track_number, strip_prefix, Numbering};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Extensions considered media files by default
pub const DEFAULT_MEDIA_EXTENSIONS: [&str; 7] = ["mp3", "m4a", "aac", "flac", "ogg", "opus", "wav"];

/// Options for [`renumber_directory_with`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenumberOptions {
    /// Lower-case extensions to include
    pub extensions: Vec<String>,
    /// Plan only; leave the directory untouched
    pub dry_run: bool,
}

impl Default for RenumberOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_MEDIA_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            dry_run: false,
        }
    }
}

/// One planned or performed rename, as bare file names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

/// Renumbering results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenumberResult {
    pub directory: PathBuf,
    /// Renames performed, or planned when `dry_run` is set
    pub renamed: Vec<Rename>,
    /// Files that already carried the right prefix
    pub unchanged: usize,
    /// Renames blocked because the target name is taken
    pub conflicts: Vec<Rename>,
    /// Media files considered
    pub total: usize,
    pub dry_run: bool,
}

impl RenumberResult {
    pub fn summary(&self) -> String {
        format!(
            "{} {}, {} unchanged, {} conflicts, {} total",
            if self.dry_run { "Would rename" } else { "Renamed" },
            self.renamed.len(),
            self.unchanged,
            self.conflicts.len(),
            self.total
        )
    }
}

/// Media file found in the directory
#[derive(Debug)]
struct Entry {
    name: String,
    base: String,
    track: Option<u32>,
}

impl Entry {
    fn new(name: String) -> Self {
        let base = strip_prefix(&name).to_string();
        let track = extract_track_number(&base);
        Self { name, base, track }
    }

    /// Track number first (numbered before unnumbered), then base name
    fn order(&self, other: &Self) -> Ordering {
        let by_track = match (self.track, other.track) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_track
            .then_with(|| self.base.cmp(&other.base))
            .then_with(|| self.name.cmp(&other.name))
    }
}

/// Renumber media files in `directory` with the default options
pub async fn renumber_directory(directory: &Path) -> Result<RenumberResult> {
    renumber_directory_with(directory, &RenumberOptions::default()).await
}

/// Renumber media files in `directory`
///
/// 1. Collect media files, skipping hidden and `.part` files
/// 2. Strip any existing numeric prefix to get each file's base name
/// 3. Sort by track number found in the base name, then by base name
/// 4. Prefix with the 1-based position, padded for the file count
///
/// A file whose target name already belongs to another file is reported as a
/// conflict and left alone.
pub async fn renumber_directory_with(
    directory: &Path,
    options: &RenumberOptions,
) -> Result<RenumberResult> {
    if !directory.is_dir() {
        return Err(FetcherError::InvalidInput(format!(
            "Not a directory: {}",
            directory.display()
        )));
    }

    let mut entries = scan_media_files(directory, &options.extensions).await?;
    entries.sort_by(|a, b| a.order(b));

    let total = entries.len();
    info!(directory = %directory.display(), total, dry_run = options.dry_run, "Renumbering directory");

    let mut result = RenumberResult {
        directory: directory.to_path_buf(),
        renamed: Vec::new(),
        unchanged: 0,
        conflicts: Vec::new(),
        total,
        dry_run: options.dry_run,
    };

    let scanned: HashSet<String> = entries.iter().map(|e| e.name.clone()).collect();
    let mut taken = scanned.clone();

    for (position, entry) in entries.iter().enumerate() {
        let target = Numbering::new(position + 1, total).apply(&entry.base);

        if target == entry.name {
            result.unchanged += 1;
            continue;
        }

        let rename = Rename {
            from: entry.name.clone(),
            to: target,
        };

        let foreign = !scanned.contains(&rename.to) && directory.join(&rename.to).exists();
        if foreign || taken.contains(&rename.to) {
            warn!(from = %rename.from, to = %rename.to, "Target name taken, leaving file as is");
            result.conflicts.push(rename);
            continue;
        }

        if !options.dry_run {
            let from = directory.join(&rename.from);
            let to = directory.join(&rename.to);
            fs::rename(&from, &to)
                .await
                .map_err(|e| FetcherError::filesystem(&from, &e))?;
            debug!(from = %rename.from, to = %rename.to, "Renamed");
        }

        taken.remove(&rename.from);
        taken.insert(rename.to.clone());
        result.renamed.push(rename);
    }

    info!("{}", result.summary());
    Ok(result)
}

async fn scan_media_files(directory: &Path, extensions: &[String]) -> Result<Vec<Entry>> {
    let mut dir = fs::read_dir(directory)
        .await
        .map_err(|e| FetcherError::filesystem(directory, &e))?;

    let mut entries = Vec::new();
    while let Some(item) = dir
        .next_entry()
        .await
        .map_err(|e| FetcherError::filesystem(directory, &e))?
    {
        let file_type = match item.file_type().await {
            Ok(file_type) => file_type,
            Err(_) => continue,
        };
        if !file_type.is_file() {
            continue;
        }

        // Non-UTF-8 names cannot be produced by the downloader
        let name = match item.file_name().into_string() {
            Ok(name) => name,
            Err(_) => continue,
        };

        if is_temp_or_hidden(&name) || !is_media_file(&name, extensions) {
            continue;
        }

        entries.push(Entry::new(name));
    }

    Ok(entries)
}

fn is_media_file(name: &str, extensions: &[String]) -> bool {
    match split_extension(name) {
        (_, Some(ext)) => {
            let ext = ext.to_ascii_lowercase();
            extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
        }
        (_, None) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_scan_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = renumber_directory(temp_dir.path()).await.unwrap();

        assert_eq!(result.total, 0);
        assert!(result.renamed.is_empty());
        assert_eq!(result.unchanged, 0);
    }

    #[tokio::test]
    async fn test_missing_directory_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        assert!(matches!(
            renumber_directory(&missing).await,
            Err(FetcherError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_orders_by_track_number() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "第10首 ten.mp3");
        touch(temp_dir.path(), "第2首 two.mp3");
        touch(temp_dir.path(), "第1首 one.mp3");

        let result = renumber_directory(temp_dir.path()).await.unwrap();

        assert_eq!(result.renamed.len(), 3);
        assert_eq!(
            names(temp_dir.path()),
            vec!["1_第1首 one.mp3", "2_第2首 two.mp3", "3_第10首 ten.mp3"]
        );
    }

    #[tokio::test]
    async fn test_ignores_temp_hidden_and_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "a.mp3");
        touch(temp_dir.path(), ".b.mp3.part");
        touch(temp_dir.path(), ".hidden.mp3");
        touch(temp_dir.path(), "cover.jpg");

        let result = renumber_directory(temp_dir.path()).await.unwrap();

        assert_eq!(result.total, 1);
        assert!(temp_dir.path().join("1_a.mp3").exists());
        assert!(temp_dir.path().join("cover.jpg").exists());
        assert!(temp_dir.path().join(".b.mp3.part").exists());
    }

    #[tokio::test]
    async fn test_dry_run_leaves_files() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "b.mp3");
        touch(temp_dir.path(), "a.mp3");

        let options = RenumberOptions {
            dry_run: true,
            ..Default::default()
        };
        let result = renumber_directory_with(temp_dir.path(), &options).await.unwrap();

        assert!(result.dry_run);
        assert_eq!(
            result.renamed,
            vec![
                Rename { from: "a.mp3".into(), to: "1_a.mp3".into() },
                Rename { from: "b.mp3".into(), to: "2_b.mp3".into() },
            ]
        );
        assert_eq!(names(temp_dir.path()), vec!["a.mp3", "b.mp3"]);
    }

    #[tokio::test]
    async fn test_conflicting_target_left_alone() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "a.mp3");
        std::fs::create_dir(temp_dir.path().join("1_a.mp3")).unwrap();

        let result = renumber_directory(temp_dir.path()).await.unwrap();

        assert_eq!(result.total, 1);
        assert!(result.renamed.is_empty());
        assert_eq!(
            result.conflicts,
            vec![Rename { from: "a.mp3".into(), to: "1_a.mp3".into() }]
        );
        assert!(temp_dir.path().join("a.mp3").is_file());
    }

    #[tokio::test]
    async fn test_existing_prefix_replaced_when_count_changes() {
        let temp_dir = TempDir::new().unwrap();
        for i in 1..=9 {
            touch(temp_dir.path(), &format!("{}_第{}首.mp3", i, i));
        }
        touch(temp_dir.path(), "第10首.mp3");

        let result = renumber_directory(temp_dir.path()).await.unwrap();

        assert_eq!(result.renamed.len(), 10);
        assert!(temp_dir.path().join("01_第1首.mp3").exists());
        assert!(temp_dir.path().join("10_第10首.mp3").exists());
        assert!(!temp_dir.path().join("1_第1首.mp3").exists());
    }
}
