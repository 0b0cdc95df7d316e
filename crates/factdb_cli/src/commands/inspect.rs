//! Inspect command implementation.

use factdb_codec::IndexType;
use factdb_core::Snapshot;
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Journal size in bytes.
    pub journal_size: u64,
    /// Counter of the last committed transaction.
    pub basis_tx: u64,
    /// Registered attributes.
    pub attributes: Vec<AttributeInfo>,
    /// Raw key count per stored index.
    pub indexes: Vec<IndexCount>,
}

/// One attribute of the catalog.
#[derive(Debug, Serialize)]
pub struct AttributeInfo {
    /// Attribute id.
    pub id: u16,
    /// Symbolic name.
    pub ident: String,
    /// Value type name.
    pub value_type: &'static str,
    /// `one` or `many`.
    pub cardinality: String,
    /// In AVET.
    pub indexed: bool,
    /// Values identify one entity.
    pub unique: bool,
    /// Superseded values are dropped.
    pub no_history: bool,
}

/// Key count of one index.
#[derive(Debug, Serialize)]
pub struct IndexCount {
    /// Index name.
    pub name: &'static str,
    /// Number of keys.
    pub keys: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_existing(path)?;
    let journal_size = std::fs::metadata(path.join("journal.log"))?.len();
    let result = collect(path, journal_size, &store.current_snapshot());

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Gathers statistics from a snapshot.
pub fn collect(path: &Path, journal_size: u64, snapshot: &Snapshot) -> InspectResult {
    let attributes = snapshot
        .catalog()
        .iter()
        .map(|(id, ident, record)| AttributeInfo {
            id: id.as_u16(),
            ident: ident.to_string(),
            value_type: record.value_tag.name(),
            cardinality: record.cardinality.to_string(),
            indexed: record.indexed,
            unique: record.unique,
            no_history: record.no_history,
        })
        .collect();
    let indexes = IndexType::STORED
        .iter()
        .map(|index| IndexCount {
            name: index.name(),
            keys: snapshot.index_len(*index),
        })
        .collect();

    InspectResult {
        path: path.display().to_string(),
        journal_size,
        basis_tx: snapshot.basis().counter(),
        attributes,
        indexes,
    }
}

fn print_text_output(result: &InspectResult) {
    println!("FactDB Store Inspection");
    println!("=======================");
    println!();
    println!("Path:     {}", result.path);
    println!("Journal:  {}", format_size(result.journal_size));
    println!("Basis tx: {}", result.basis_tx);
    println!();
    println!("Attributes:");
    for attr in &result.attributes {
        let mut flags = Vec::new();
        if attr.indexed {
            flags.push("indexed");
        }
        if attr.unique {
            flags.push("unique");
        }
        if attr.no_history {
            flags.push("no-history");
        }
        println!(
            "  [{:>3}] {:<24} {:<8} {:<5} {}",
            attr.id,
            attr.ident,
            attr.value_type,
            attr.cardinality,
            flags.join(",")
        );
    }
    println!();
    println!("Indexes:");
    for index in &result.indexes {
        println!("  {:<14} {} keys", index.name, index.keys);
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
