//! Export and import of raw index contents.
//!
//! ## Format
//!
//! ```text
//! | magic "MDBX" (4) | version u16 |
//! | chunk* |
//!
//! chunk:
//! | index u8 | count u32 | byte_len u32 | entry* (byte_len bytes) |
//!
//! entry:
//! | key_len u32 | key (without index byte) | value_len u32 | value |
//! ```
//!
//! Integers are little-endian. A chunk holds at most
//! [`MAX_CHUNK_ENTRIES`] entries and never mixes indexes. Every stored
//! index is exported, blob payloads included, so an import reproduces the
//! store byte for byte.

use crate::error::{CoreError, CoreResult};
use bytes::Bytes;
use factdb_codec::{IndexType, RawDatom, BLOB_HASH_SIZE};
use factdb_storage::KvSnapshot;
use std::collections::BTreeMap;
use std::io::Write;

/// Magic bytes opening an export.
pub const EXPORT_MAGIC: [u8; 4] = *b"MDBX";

/// Current export format version.
pub const EXPORT_VERSION: u16 = 1;

/// Largest number of entries in one chunk.
pub const MAX_CHUNK_ENTRIES: usize = 16_384;

const HEADER_SIZE: usize = 4 + 2;
const CHUNK_HEADER_SIZE: usize = 1 + 4 + 4;

/// What an export wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Entries written, over all indexes.
    pub entries: usize,
    /// Chunks written.
    pub chunks: usize,
    /// Total bytes written, header included.
    pub bytes: u64,
    /// Entries per index.
    pub per_index: BTreeMap<IndexType, usize>,
}

/// What an import loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Entries loaded, over all indexes.
    pub entries: usize,
    /// Chunks read.
    pub chunks: usize,
    /// Entries per index.
    pub per_index: BTreeMap<IndexType, usize>,
}

/// A fully validated import stream, ready to commit.
#[derive(Debug)]
pub(crate) struct ImportData {
    /// Full keys (index byte first) and values.
    pub entries: Vec<(Vec<u8>, Bytes)>,
    pub summary: ImportSummary,
}

fn len_u32(len: usize, what: &str) -> CoreResult<[u8; 4]> {
    u32::try_from(len)
        .map(u32::to_le_bytes)
        .map_err(|_| CoreError::invalid_operation(format!("{what} of {len} bytes is too large to export")))
}

/// Writes every stored index of `kv` to `out`.
pub(crate) fn export<W: Write>(kv: &KvSnapshot, out: &mut W) -> CoreResult<ExportSummary> {
    let mut summary = ExportSummary::default();
    out.write_all(&EXPORT_MAGIC)?;
    out.write_all(&EXPORT_VERSION.to_le_bytes())?;
    summary.bytes = HEADER_SIZE as u64;

    for index in IndexType::STORED {
        let byte = index.as_byte();
        let mut chunk = Vec::new();
        let mut count = 0usize;
        let mut flush = |chunk: &mut Vec<u8>, count: &mut usize, summary: &mut ExportSummary| -> CoreResult<()> {
            if *count == 0 {
                return Ok(());
            }
            out.write_all(&[byte])?;
            out.write_all(&len_u32(*count, "chunk count")?)?;
            out.write_all(&len_u32(chunk.len(), "chunk")?)?;
            out.write_all(chunk)?;
            summary.chunks += 1;
            summary.bytes += (CHUNK_HEADER_SIZE + chunk.len()) as u64;
            chunk.clear();
            *count = 0;
            Ok(())
        };

        for (key, value) in kv.range(&[byte], &[byte + 1]) {
            let body = &key[1..];
            chunk.extend_from_slice(&len_u32(body.len(), "key")?);
            chunk.extend_from_slice(body);
            chunk.extend_from_slice(&len_u32(value.len(), "value")?);
            chunk.extend_from_slice(&value);
            count += 1;
            *summary.per_index.entry(index).or_default() += 1;
            summary.entries += 1;
            if count == MAX_CHUNK_ENTRIES {
                flush(&mut chunk, &mut count, &mut summary)?;
            }
        }
        flush(&mut chunk, &mut count, &mut summary)?;
    }
    out.flush()?;
    Ok(summary)
}

/// Bounds-checked little-endian reader.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &str) -> CoreResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(CoreError::corrupt_import(format!(
                "truncated {what} at offset {}: need {n} bytes, have {}",
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self, what: &str) -> CoreResult<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &str) -> CoreResult<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, what: &str) -> CoreResult<usize> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
    }
}

fn check_key(index: IndexType, body: &[u8]) -> CoreResult<()> {
    if index == IndexType::BlobPayloads {
        if body.len() != BLOB_HASH_SIZE {
            return Err(CoreError::corrupt_import(format!(
                "blob payload key of {} bytes",
                body.len()
            )));
        }
        return Ok(());
    }
    RawDatom::decode(body)
        .map(|_| ())
        .map_err(|e| CoreError::corrupt_import(format!("undecodable {index} key: {e}")))
}

/// Parses and validates a whole export without touching any store.
///
/// # Errors
///
/// Returns [`CoreError::CorruptImport`] for a bad magic or version, an
/// unknown index, a truncated or overlong chunk, or an undecodable key.
pub(crate) fn parse(data: &[u8]) -> CoreResult<ImportData> {
    let mut reader = Reader::new(data);
    if reader.take(4, "header")? != EXPORT_MAGIC {
        return Err(CoreError::corrupt_import("bad magic"));
    }
    let version = reader.u16("header")?;
    if version != EXPORT_VERSION {
        return Err(CoreError::corrupt_import(format!("unsupported version {version}")));
    }

    let mut entries = Vec::new();
    let mut summary = ImportSummary::default();
    while reader.remaining() > 0 {
        let byte = reader.u8("chunk header")?;
        let index = IndexType::from_byte(byte)
            .filter(|i| IndexType::STORED.contains(i))
            .ok_or_else(|| CoreError::corrupt_import(format!("unknown index {byte}")))?;
        let count = reader.u32("chunk header")?;
        let byte_len = reader.u32("chunk header")?;
        if count > MAX_CHUNK_ENTRIES {
            return Err(CoreError::corrupt_import(format!(
                "chunk of {count} entries exceeds {MAX_CHUNK_ENTRIES}"
            )));
        }

        let mut chunk = Reader::new(reader.take(byte_len, "chunk")?);
        for _ in 0..count {
            let key_len = chunk.u32("entry")?;
            let body = chunk.take(key_len, "key")?;
            check_key(index, body)?;
            let value_len = chunk.u32("entry")?;
            let value = chunk.take(value_len, "value")?;

            let mut key = Vec::with_capacity(1 + body.len());
            key.push(byte);
            key.extend_from_slice(body);
            entries.push((key, Bytes::copy_from_slice(value)));
        }
        if chunk.remaining() != 0 {
            return Err(CoreError::corrupt_import(format!(
                "{} trailing bytes in {index} chunk",
                chunk.remaining()
            )));
        }
        summary.chunks += 1;
        summary.entries += count;
        *summary.per_index.entry(index).or_default() += count;
    }
    Ok(ImportData { entries, summary })
}
