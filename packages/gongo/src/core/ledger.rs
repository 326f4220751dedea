//! Persistent per-site dedup ledger.
//!
//! One normalized title per line in `processed_titles.txt` inside the site's
//! output directory. The set only grows during a run; entries are appended
//! as soon as an announcement is fully processed so an interrupted run does
//! not re-download what it already saved.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt as _;

pub const LEDGER_FILE: &str = "processed_titles.txt";

/// Whitespace- and case-insensitive comparison key for titles. Listing pages
/// and detail pages disagree about spacing often enough that raw equality
/// would re-scrape half the site.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub struct TitleLedger {
    path: PathBuf,
    titles: HashSet<String>,
}

impl TitleLedger {
    /// Load the ledger for `dir`, creating the directory if needed.
    pub async fn open(dir: &Path) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(LEDGER_FILE);
        let titles = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text
                .lines()
                .map(normalize_title)
                .filter(|t| !t.is_empty())
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => return Err(e),
        };
        Ok(Self { path, titles })
    }

    pub fn contains(&self, title: &str) -> bool {
        self.titles.contains(&normalize_title(title))
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Record a processed title in memory and append it to the ledger file.
    pub async fn record(&mut self, title: &str) -> std::io::Result<()> {
        let normalized = normalize_title(title);
        if normalized.is_empty() || !self.titles.insert(normalized.clone()) {
            return Ok(());
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{normalized}\n").as_bytes()).await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_ignores_spacing_and_case() {
        assert_eq!(
            normalize_title("  2025년  지원사업   공고 "),
            "2025년 지원사업 공고"
        );
        assert_eq!(normalize_title("Notice ABC"), normalize_title("notice  abc"));
    }

    #[tokio::test]
    async fn ledger_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut ledger = TitleLedger::open(dir.path()).await.unwrap();
            assert!(ledger.is_empty());
            ledger.record("첫 번째 공고").await.unwrap();
            ledger.record("두 번째 공고").await.unwrap();
            // Duplicate records are no-ops.
            ledger.record("첫  번째 공고").await.unwrap();
            assert_eq!(ledger.len(), 2);
        }
        let ledger = TitleLedger::open(dir.path()).await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(ledger.contains("첫 번째  공고"));
        assert!(ledger.contains("두 번째 공고"));
        assert!(!ledger.contains("세 번째 공고"));
    }
}
