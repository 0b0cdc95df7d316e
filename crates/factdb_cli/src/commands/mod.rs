//! CLI command implementations.

pub mod compact;
pub mod dump;
pub mod export;
pub mod import;
pub mod inspect;

use factdb_core::{Store, StoreConfig};
use std::path::Path;

/// Opens an existing store directory.
pub fn open_existing(path: &Path) -> Result<Store, Box<dyn std::error::Error>> {
    if !path.join("journal.log").exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    Ok(Store::open_dir(path, StoreConfig::default().create_if_missing(false))?)
}

/// Runs a future to completion on a single-threaded runtime.
pub fn block_on<F: std::future::Future>(future: F) -> Result<F::Output, Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}
