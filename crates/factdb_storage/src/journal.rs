//! Journal record encoding.
//!
//! Each committed batch is one record:
//!
//! ```text
//! | magic "FDBJ" (4) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! The CRC covers magic, length and payload. All integers are little-endian.
//! The payload is:
//!
//! ```text
//! | seq (8) | flags (1) | op_count (4) | ops... |
//! op = | kind (1) | key_len (4) | key | [value_len (4) | value] |
//! ```
//!
//! `kind` is 1 for put and 2 for delete; only puts carry a value. Flag bit 0
//! marks a batch that clears the store before its ops apply.

use crate::batch::{BatchOp, WriteBatch};
use crate::error::{StorageError, StorageResult};
use std::io;

pub(crate) const JOURNAL_MAGIC: [u8; 4] = *b"FDBJ";

const HEADER_SIZE: usize = 8;
const CRC_SIZE: usize = 4;

const FLAG_CLEAR: u8 = 0x01;
const OP_PUT: u8 = 1;
const OP_DELETE: u8 = 2;

fn len_u32(len: usize, what: &str) -> StorageResult<u32> {
    u32::try_from(len).map_err(|_| {
        StorageError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{what} too large for a journal record: {len} bytes"),
        ))
    })
}

/// Encodes a batch committed at `seq` as a complete record.
pub(crate) fn encode_record(seq: u64, batch: &WriteBatch) -> StorageResult<Vec<u8>> {
    let mut payload = Vec::with_capacity(13 + batch.len() * 48);
    payload.extend_from_slice(&seq.to_le_bytes());
    payload.push(if batch.clears() { FLAG_CLEAR } else { 0 });
    payload.extend_from_slice(&len_u32(batch.len(), "batch")?.to_le_bytes());
    for op in batch.ops() {
        match op {
            BatchOp::Put { key, value } => {
                payload.push(OP_PUT);
                payload.extend_from_slice(&len_u32(key.len(), "key")?.to_le_bytes());
                payload.extend_from_slice(key);
                payload.extend_from_slice(&len_u32(value.len(), "value")?.to_le_bytes());
                payload.extend_from_slice(value);
            }
            BatchOp::Delete { key } => {
                payload.push(OP_DELETE);
                payload.extend_from_slice(&len_u32(key.len(), "key")?.to_le_bytes());
                payload.extend_from_slice(key);
            }
        }
    }

    let mut record = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    record.extend_from_slice(&JOURNAL_MAGIC);
    record.extend_from_slice(&len_u32(payload.len(), "payload")?.to_le_bytes());
    record.extend_from_slice(&payload);
    let crc = crc32fast::hash(&record);
    record.extend_from_slice(&crc.to_le_bytes());
    Ok(record)
}

/// Result of scanning a journal.
#[derive(Debug, Default)]
pub(crate) struct Replay {
    /// Decoded batches with their sequence numbers, in file order.
    pub records: Vec<(u64, WriteBatch)>,
    /// Length of the valid prefix of the file.
    pub valid_len: u64,
    /// Whether an incomplete record was found after the valid prefix.
    pub truncated: bool,
}

/// Scans `data` record by record.
///
/// An incomplete trailing record ends the scan and is reported through
/// [`Replay::truncated`]. A bad magic, a CRC mismatch, a malformed payload
/// or a non-increasing sequence number is corruption.
pub(crate) fn scan(data: &[u8]) -> StorageResult<Replay> {
    let mut replay = Replay::default();
    let mut offset = 0usize;
    let mut last_seq = 0u64;

    while offset < data.len() {
        let rest = &data[offset..];
        if rest.len() < HEADER_SIZE {
            replay.truncated = true;
            break;
        }
        if rest[..4] != JOURNAL_MAGIC {
            return Err(StorageError::corrupted(format!(
                "invalid journal magic at offset {offset}"
            )));
        }
        let payload_len = u32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
        let total = HEADER_SIZE + payload_len + CRC_SIZE;
        if rest.len() < total {
            replay.truncated = true;
            break;
        }

        let body_end = HEADER_SIZE + payload_len;
        let stored = u32::from_le_bytes([
            rest[body_end],
            rest[body_end + 1],
            rest[body_end + 2],
            rest[body_end + 3],
        ]);
        let computed = crc32fast::hash(&rest[..body_end]);
        if stored != computed {
            return Err(StorageError::corrupted(format!(
                "journal checksum mismatch at offset {offset}: stored {stored:#010x}, computed {computed:#010x}"
            )));
        }

        let (seq, batch) = decode_payload(&rest[HEADER_SIZE..body_end])
            .map_err(|message| StorageError::corrupted(format!("journal record at offset {offset}: {message}")))?;
        if seq <= last_seq {
            return Err(StorageError::corrupted(format!(
                "journal sequence {seq} at offset {offset} does not follow {last_seq}"
            )));
        }
        last_seq = seq;
        replay.records.push((seq, batch));
        offset += total;
        replay.valid_len = offset as u64;
    }

    Ok(replay)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.data.len());
        match end {
            Some(end) => {
                let out = &self.data[self.pos..end];
                self.pos = end;
                Ok(out)
            }
            None => Err(format!(
                "payload ends early: needed {n} bytes at {}, have {}",
                self.pos,
                self.data.len() - self.pos
            )),
        }
    }

    fn u8(&mut self) -> Result<u8, String> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, String> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, String> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_le_bytes(buf))
    }
}

fn decode_payload(payload: &[u8]) -> Result<(u64, WriteBatch), String> {
    let mut r = Reader { data: payload, pos: 0 };
    let seq = r.u64()?;
    let flags = r.u8()?;
    if flags & !FLAG_CLEAR != 0 {
        return Err(format!("unknown flags {flags:#04x}"));
    }
    let count = r.u32()?;

    let mut batch = WriteBatch::new();
    if flags & FLAG_CLEAR != 0 {
        batch.clear_all();
    }
    for _ in 0..count {
        match r.u8()? {
            OP_PUT => {
                let key_len = r.u32()? as usize;
                let key = r.take(key_len)?.to_vec();
                let value_len = r.u32()? as usize;
                let value = r.take(value_len)?.to_vec();
                batch.put(key, value);
            }
            OP_DELETE => {
                let key_len = r.u32()? as usize;
                batch.delete(r.take(key_len)?.to_vec());
            }
            kind => return Err(format!("unknown op kind {kind}")),
        }
    }
    if r.pos != payload.len() {
        return Err(format!("{} trailing bytes", payload.len() - r.pos));
    }
    Ok((seq, batch))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WriteBatch {
        let mut batch = WriteBatch::new();
        batch.put(vec![2, 1, 2], b"value".to_vec());
        batch.delete(vec![2, 9]);
        batch
    }

    #[test]
    fn scan_reads_back_batches() {
        let mut data = encode_record(1, &sample()).unwrap();
        let mut cleared = WriteBatch::new();
        cleared.clear_all();
        data.extend(encode_record(2, &cleared).unwrap());

        let replay = scan(&data).unwrap();
        assert!(!replay.truncated);
        assert_eq!(replay.valid_len, data.len() as u64);
        assert_eq!(replay.records.len(), 2);
        assert_eq!(replay.records[0], (1, sample()));
        assert!(replay.records[1].1.clears());
    }

    #[test]
    fn torn_tail_is_reported_not_fatal() {
        let first = encode_record(1, &sample()).unwrap();
        let second = encode_record(2, &sample()).unwrap();
        let mut data = first.clone();
        data.extend_from_slice(&second[..second.len() - 3]);

        let replay = scan(&data).unwrap();
        assert!(replay.truncated);
        assert_eq!(replay.valid_len, first.len() as u64);
        assert_eq!(replay.records.len(), 1);
    }

    #[test]
    fn flipped_byte_is_corruption() {
        let mut data = encode_record(1, &sample()).unwrap();
        data[12] ^= 0xFF;
        let err = scan(&data).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut data = encode_record(1, &sample()).unwrap();
        data[0] = b'X';
        assert!(scan(&data).unwrap_err().is_corruption());
    }

    #[test]
    fn sequence_must_increase() {
        let mut data = encode_record(5, &sample()).unwrap();
        data.extend(encode_record(5, &sample()).unwrap());
        assert!(scan(&data).unwrap_err().is_corruption());
    }
}
