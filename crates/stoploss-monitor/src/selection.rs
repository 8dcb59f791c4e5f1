//! Operator-maintained set of positions eligible for selected mode.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use stoploss_core::{Error, Result};
use tracing::warn;

/// Token ids the operator chose to protect, persisted as a flat JSON
/// array so it can be edited by hand between cycles.
#[derive(Debug, Clone)]
pub struct SelectionStore {
    path: PathBuf,
}

impl SelectionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the selected token ids. A missing file means nothing is
    /// selected; a malformed file is reported and treated the same so
    /// a hand-editing mistake never takes the monitor down.
    pub fn load(&self) -> BTreeSet<String> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeSet::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read selection file");
                return BTreeSet::new();
            }
        };
        match serde_json::from_str::<Vec<String>>(&contents) {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Selection file is not a JSON array of token ids, ignoring it"
                );
                BTreeSet::new()
            }
        }
    }

    /// Persist the selection atomically via a temp file rename.
    pub fn store(&self, token_ids: &BTreeSet<String>) -> Result<()> {
        let ids: Vec<&String> = token_ids.iter().collect();
        let json = serde_json::to_string_pretty(&ids)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Persistence(format!("create selection dir: {e}")))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|e| Error::Persistence(format!("write selection: {e}")))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| Error::Persistence(format!("commit selection: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty_selection() {
        let dir = TempDir::new().unwrap();
        let store = SelectionStore::new(dir.path().join("selected_positions.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_store_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = SelectionStore::new(dir.path().join("selected_positions.json"));
        let ids: BTreeSet<String> = ["0xaaa".to_string(), "0xbbb".to_string()].into();
        store.store(&ids).unwrap();
        assert_eq!(store.load(), ids);
    }

    #[test]
    fn test_malformed_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("selected_positions.json");
        fs::write(&path, "{\"not\": \"an array\"}").unwrap();
        let store = SelectionStore::new(path);
        assert!(store.load().is_empty());
    }
}
