//! Persistence of the in-memory state store between adapter runs.
//!
//! The store is written as pretty JSON to a sibling temporary file first and
//! then renamed over the target, so a crash never leaves a truncated file.
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::{debug, info};
use stocks_common::{MemoryStateStore, Result, StoreSnapshot};

/// Loads the store saved at `path`; a missing file yields an empty store.
pub fn load(path: &Path) -> Result<MemoryStateStore> {
    match fs::read_to_string(path) {
        Ok(text) => {
            let snapshot: StoreSnapshot = serde_json::from_str(&text)?;
            info!(
                "Loaded {} objects and {} states from {}",
                snapshot.objects.len(),
                snapshot.states.len(),
                path.display()
            );
            Ok(MemoryStateStore::from_snapshot(snapshot))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No state file at {}, starting empty", path.display());
            Ok(MemoryStateStore::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// Saves the store to `path`.
pub fn save(store: &MemoryStateStore, path: &Path) -> Result<()> {
    let snapshot = store.snapshot()?;
    let json = serde_json::to_vec_pretty(&snapshot)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    debug!("Saved state to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stocks_common::StateStore;
    use stocks_common::state::{State, StorageObject};

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = load(&dir.path().join("state.json")).unwrap();
        assert_eq!(store.snapshot().unwrap(), StoreSnapshot::default());
    }

    #[test]
    fn save_then_load_restores_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = MemoryStateStore::new();
        store
            .set_object_not_exists("quotes.AAPL.Name", StorageObject::state("Name", None, None, ""))
            .unwrap();
        store
            .set_state("quotes.AAPL.Name", State::acknowledged(json!("Apple Inc.")))
            .unwrap();
        save(&store, &path).unwrap();

        let restored = load(&path).unwrap();
        assert_eq!(restored.snapshot().unwrap(), store.snapshot().unwrap());
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ truncated").unwrap();
        assert!(load(&path).is_err());
    }
}
