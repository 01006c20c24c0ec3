use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::util::write_json_pretty;

/// Reference transcript per 1-based page index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroundTruth {
    pages: BTreeMap<u32, String>,
}

impl GroundTruth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, page: u32, text: impl Into<String>) {
        self.pages.insert(page, text.into());
    }

    /// Reference text for `page`, empty when the page has no entry.
    pub fn text_for(&self, page: u32) -> &str {
        self.pages.get(&page).map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_pretty(path, self)
    }
}

/// Loads a JSON page map, a form-feed separated text file, or a directory of page files.
pub fn load(path: &Path) -> Result<GroundTruth> {
    let ground_truth = if path.is_dir() {
        load_directory(path)?
    } else if path.is_file() {
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let raw =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        if is_json {
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse ground truth {}", path.display()))?
        } else {
            parse_text(&raw)
        }
    } else {
        bail!("ground truth not found: {}", path.display());
    };

    info!(
        path = %path.display(),
        pages = ground_truth.len(),
        "loaded ground truth"
    );
    Ok(ground_truth)
}

fn parse_text(raw: &str) -> GroundTruth {
    let mut ground_truth = GroundTruth::new();
    if !raw.contains('\u{000C}') {
        ground_truth.insert(1, raw.trim());
        return ground_truth;
    }

    let mut pages: Vec<&str> = raw.split('\u{000C}').collect();
    while let Some(last_page) = pages.last() {
        if last_page.trim().is_empty() {
            pages.pop();
            continue;
        }
        break;
    }

    for (index, page) in pages.iter().enumerate() {
        ground_truth.insert(index as u32 + 1, page.trim());
    }
    ground_truth
}

fn load_directory(dir: &Path) -> Result<GroundTruth> {
    let pattern = Regex::new(r"^(?:.*_)?(\d+)$").context("failed to compile page name regex")?;
    let mut ground_truth = GroundTruth::new();

    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(page) = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| pattern.captures(stem))
            .and_then(|captures| captures.get(1))
            .and_then(|value| value.as_str().parse::<u32>().ok())
        else {
            warn!(path = %path.display(), "skipping file without a page number");
            continue;
        };

        let text =
            fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
        ground_truth.insert(page, text.trim());
    }

    Ok(ground_truth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_uses_string_page_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gt.json");

        let mut ground_truth = GroundTruth::new();
        ground_truth.insert(2, "second");
        ground_truth.insert(1, "first");
        ground_truth.save(&path).expect("save ground truth");

        let raw = fs::read_to_string(&path).expect("read saved json");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
        assert_eq!(value["1"], "first");
        assert_eq!(value["2"], "second");

        let loaded = load(&path).expect("load ground truth");
        assert_eq!(loaded, ground_truth);
    }

    #[test]
    fn form_feed_text_splits_into_pages() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gt.txt");
        fs::write(&path, "page one\n\u{000C}page two \n\u{000C}\n").expect("write text");

        let loaded = load(&path).expect("load text ground truth");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.text_for(1), "page one");
        assert_eq!(loaded.text_for(2), "page two");
        assert_eq!(loaded.text_for(3), "");
    }

    #[test]
    fn plain_text_is_a_single_page() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gt.txt");
        fs::write(&path, "  only page  \n").expect("write text");

        let loaded = load(&path).expect("load text ground truth");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.text_for(1), "only page");
    }

    #[test]
    fn directory_pages_are_keyed_by_trailing_number() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("page_3.txt"), "three").expect("write page");
        fs::write(dir.path().join("1.txt"), "one\n").expect("write page");
        fs::write(dir.path().join("notes.txt"), "ignored").expect("write notes");

        let loaded = load(dir.path()).expect("load directory ground truth");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.text_for(1), "one");
        assert_eq!(loaded.text_for(3), "three");
    }

    #[test]
    fn missing_ground_truth_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load(&dir.path().join("absent.json")).is_err());
    }
}
