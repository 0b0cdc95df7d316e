//! Import command implementation.

use factdb_core::{Store, StoreConfig};
use std::path::Path;
use tracing::info;

/// Replaces the store at `path` with the contents of `input`.
///
/// The stream is fully validated before the store is touched, so a bad
/// file leaves the existing data in place.
pub fn run(path: &Path, input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!("Importing {:?} into {:?}", input, path);
    let data = std::fs::read(input)?;
    let store = Store::open_dir(path, StoreConfig::default())?;

    let summary = super::block_on(store.import(&data))??;

    println!("✓ Import complete");
    println!("  Basis:   {}", store.current_snapshot().basis());
    println!("  Entries: {}", summary.entries);
    println!("  Chunks:  {}", summary.chunks);
    Ok(())
}
