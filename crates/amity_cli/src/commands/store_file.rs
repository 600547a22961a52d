//! Loading and saving the store snapshot file.

use amity_engine::MemoryStore;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Loads a store from a snapshot file.
pub fn load(path: &Path) -> Result<Arc<MemoryStore>, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {:?} (run `amity init`)", path).into());
    }
    let contents = fs::read_to_string(path)?;
    let snapshot: serde_json::Value = serde_json::from_str(&contents)?;
    let store = MemoryStore::from_snapshot(snapshot)?;
    debug!("Loaded store from {:?}", path);
    Ok(Arc::new(store))
}

/// Writes the store back to its snapshot file.
pub fn save(path: &Path, store: &MemoryStore) -> Result<(), Box<dyn std::error::Error>> {
    let contents = serde_json::to_string_pretty(&store.snapshot())?;
    fs::write(path, contents)?;
    debug!("Saved store to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        let store = MemoryStore::from_snapshot(json!({
            "users": { "u1": { "email": "alice@x.com" } }
        }))
        .unwrap();
        save(&path, &store).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.snapshot(), store.snapshot());
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let err = load(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("amity init"));
    }
}
