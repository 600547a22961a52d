//! Init command implementation.

use amity_engine::MemoryStore;
use std::path::Path;
use tracing::info;

use super::store_file;

/// Runs the init command.
pub fn run(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        return Err(format!("Store already exists at {:?} (use --force)", path).into());
    }
    info!("Creating store at {:?}", path);
    store_file::save(path, &MemoryStore::new())?;
    println!("✓ Created empty store at {:?}", path);
    Ok(())
}
