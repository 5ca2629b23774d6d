// src/seen.rs
//! Seen-set: identifiers already reported for a source, persisted as a JSON array.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Insertion-ordered set of identifiers. Only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSet {
    order: Vec<String>,
    index: HashSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Returns true if `id` was not present before.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.index.contains(&id) {
            return false;
        }
        self.index.insert(id.clone());
        self.order.push(id);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for SeenSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = SeenSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// File-backed store for one source's seen-set.
///
/// Not locked: concurrent runs for the same source must be serialized by
/// whatever schedules them.
#[derive(Debug, Clone)]
pub struct SeenStore {
    path: PathBuf,
}

impl SeenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<state_dir>/<source_id>_seen.json`
    pub fn for_source(state_dir: &Path, source_id: &str) -> Self {
        Self::new(state_dir.join(format!("{source_id}_seen.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty set. A present but unreadable file is an
    /// error: treating it as empty would re-announce every vacancy.
    pub async fn load(&self) -> Result<SeenSet> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SeenSet::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading seen-set {}", self.path.display()))
            }
        };
        if raw.trim().is_empty() {
            return Ok(SeenSet::new());
        }
        let ids: Vec<String> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing seen-set {}", self.path.display()))?;
        Ok(ids.into_iter().collect())
    }

    /// Rewrites the whole file via a temp file + rename.
    pub async fn save(&self, seen: &SeenSet) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating state dir {}", dir.display()))?;
        }
        let ids: Vec<&str> = seen.iter().collect();
        let body = serde_json::to_vec_pretty(&ids).context("serializing seen-set")?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent_and_ordered() {
        let mut s = SeenSet::new();
        assert!(s.insert("b"));
        assert!(s.insert("a"));
        assert!(!s.insert("b"));
        assert_eq!(s.iter().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(s.len(), 2);
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeenStore::for_source(dir.path(), "gauteng");
        let s = store.load().await.unwrap();
        assert!(s.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeenStore::for_source(dir.path(), "gauteng");
        std::fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().await.is_err());
    }
}
