use std::path::Path;

use anyhow::{bail, Context, Result};
use rand::seq::IndexedRandom;

/// Fallback search terms, one per line, used when a validator sends none.
#[derive(Debug, Clone)]
pub struct KeywordPool {
    words: Vec<String>,
}

impl KeywordPool {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading keywords file {}", path.display()))?;
        let pool = Self::from_lines(&raw);
        if pool.words.is_empty() {
            bail!("keywords file {} has no keywords", path.display());
        }
        Ok(pool)
    }

    pub fn from_lines(raw: &str) -> Self {
        let words = raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        Self { words }
    }

    pub fn random(&self) -> Option<&str> {
        self.words.choose(&mut rand::rng()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
