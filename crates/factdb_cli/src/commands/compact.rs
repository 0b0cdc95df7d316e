//! Compact command implementation.

use factdb_core::{backend_options, StoreConfig};
use factdb_storage::FileBackend;
use std::path::Path;
use tracing::info;

/// Rewrites the journal at `path` as a single record of live state.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !path.join("journal.log").exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    let backend = FileBackend::open(path, backend_options(&StoreConfig::default()), false)?;
    let before = backend.journal_len();
    info!("Compacting {:?}", path);
    let after = backend.compact()?;

    println!("✓ Journal compacted");
    println!("  Before: {} bytes", before);
    println!("  After:  {} bytes", after);
    if before > 0 {
        let saved = before.saturating_sub(after);
        println!("  Saved:  {:.1}%", saved as f64 * 100.0 / before as f64);
    }
    Ok(())
}
