//! Export command implementation.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Writes the whole store to `output`.
///
/// The store is opened through the normal API, so the export is a
/// consistent snapshot of the last committed transaction.
pub fn run(path: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!("Exporting {:?}", path);
    let store = super::open_existing(path)?;

    let file = File::create(output)?;
    let mut out = BufWriter::new(file);
    let summary = store.export(&mut out)?;
    out.flush()?;
    out.get_ref().sync_all()?;

    println!("✓ Export written");
    println!("  Path:    {:?}", output);
    println!("  Basis:   {}", store.current_snapshot().basis());
    println!("  Entries: {}", summary.entries);
    println!("  Chunks:  {}", summary.chunks);
    println!("  Size:    {} bytes", summary.bytes);
    for (index, count) in &summary.per_index {
        println!("    {:<14} {}", index.name(), count);
    }

    Ok(())
}
