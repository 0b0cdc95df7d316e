//! Dump command implementation.

use factdb_codec::{Datom, EntityId, IndexFamily, PartitionId, TxId};
use factdb_core::{SliceDescriptor, Snapshot, View};
use serde::Serialize;
use std::path::Path;

/// What to dump.
#[derive(Debug, Clone, Default)]
pub struct DumpOptions {
    /// Index family name.
    pub index: String,
    /// Entity filter, raw or `partition:counter`.
    pub entity: Option<String>,
    /// Transaction counter for an as-of read.
    pub as_of: Option<u64>,
    /// Whether to read history.
    pub history: bool,
    /// Maximum number of datoms.
    pub limit: Option<usize>,
}

/// Datom representation for output.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DatomInfo {
    /// Entity id, as `e:partition:counter`.
    pub entity: String,
    /// Attribute ident, or id if unknown.
    pub attribute: String,
    /// Rendered value.
    pub value: String,
    /// Value type name.
    pub value_type: &'static str,
    /// Transaction counter.
    pub tx: u64,
    /// Whether this is a retraction.
    pub retract: bool,
}

/// Runs the dump command.
pub fn run(path: &Path, options: &DumpOptions, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_existing(path)?;
    let datoms = collect(&store.current_snapshot(), options)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&datoms)?);
        }
        _ => {
            for d in &datoms {
                println!(
                    "{:<20} {:<24} {:<32} tx:{}{}",
                    d.entity,
                    d.attribute,
                    d.value,
                    d.tx,
                    if d.retract { " retract" } else { "" }
                );
            }
            println!("({} datoms)", datoms.len());
        }
    }

    Ok(())
}

/// Reads the requested datoms from `snapshot`.
pub fn collect(snapshot: &Snapshot, options: &DumpOptions) -> Result<Vec<DatomInfo>, Box<dyn std::error::Error>> {
    let view = match (options.as_of, options.history) {
        (Some(counter), _) => View::AsOf(TxId::from_counter(counter)),
        (None, true) => View::History,
        (None, false) => View::Current,
    };
    let snapshot = snapshot.with_view(view);

    let slice = match &options.entity {
        Some(raw) => {
            if options.index != IndexFamily::Eavt.name() {
                return Err("--entity only applies to the eavt index".into());
            }
            SliceDescriptor::entity(parse_entity(raw)?)
        }
        None => {
            let family = IndexFamily::from_name(&options.index).ok_or_else(|| {
                format!(
                    "unknown index '{}', expected one of: {}",
                    options.index,
                    factdb_core::family_names().join(", ")
                )
            })?;
            SliceDescriptor::all(family)
        }
    };

    let limit = options.limit.unwrap_or(usize::MAX);
    Ok(snapshot
        .datoms(&slice)?
        .iter()
        .take(limit)
        .map(|d| describe(&snapshot, d))
        .collect())
}

fn describe(snapshot: &Snapshot, d: &Datom) -> DatomInfo {
    let attribute = snapshot
        .catalog()
        .ident(d.attribute)
        .map_or_else(|| d.attribute.to_string(), str::to_string);
    DatomInfo {
        entity: d.entity.to_string(),
        attribute,
        value: d.value.to_string(),
        value_type: d.value.tag().name(),
        tx: d.tx.counter(),
        retract: d.is_retract,
    }
}

/// Parses `42`, `2:17` or `e:2:17`.
pub fn parse_entity(raw: &str) -> Result<EntityId, Box<dyn std::error::Error>> {
    let raw = raw.strip_prefix("e:").unwrap_or(raw);
    match raw.split_once(':') {
        Some((partition, counter)) => {
            let partition = PartitionId::new(partition.parse()?);
            Ok(EntityId::in_partition(partition, counter.parse()?))
        }
        None => Ok(EntityId::new(raw.parse()?)),
    }
}
