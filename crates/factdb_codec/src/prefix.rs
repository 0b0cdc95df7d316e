//! Fixed-layout key prefix.
//!
//! ```text
//! offset  width  field
//! 0       8      entity     (u64, big-endian)
//! 8       2      attribute  (u16, big-endian)
//! 10      8      tx         (u64, big-endian)
//! 18      1      flags      (bit 0 = retract)
//! 19      1      value tag
//! ```
//!
//! The value's key bytes follow the prefix directly.

use crate::error::{CodecError, CodecResult};
use crate::ids::{AttributeId, EntityId, TxId};

/// Size of an encoded [`KeyPrefix`].
pub const KEY_PREFIX_SIZE: usize = 20;

/// Offset of the entity field.
pub const ENTITY_OFFSET: usize = 0;
/// Offset of the attribute field.
pub const ATTRIBUTE_OFFSET: usize = 8;
/// Offset of the transaction field.
pub const TX_OFFSET: usize = 10;
/// Offset of the flags byte.
pub const FLAGS_OFFSET: usize = 18;
/// Offset of the value tag byte.
pub const TAG_OFFSET: usize = 19;

/// Flag bit marking a retraction.
pub const FLAG_RETRACT: u8 = 0b0000_0001;

/// The sortable header of every index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyPrefix {
    /// Entity the datom is about.
    pub entity: EntityId,
    /// Attribute of the datom.
    pub attribute: AttributeId,
    /// Transaction that wrote the datom.
    pub tx: TxId,
    /// Whether the datom is a retraction.
    pub is_retract: bool,
    /// Raw value tag byte.
    pub value_tag: u8,
}

impl KeyPrefix {
    /// Encodes the prefix into its fixed 20-byte layout.
    #[must_use]
    pub fn encode(&self) -> [u8; KEY_PREFIX_SIZE] {
        let mut out = [0u8; KEY_PREFIX_SIZE];
        out[ENTITY_OFFSET..ATTRIBUTE_OFFSET].copy_from_slice(&self.entity.as_u64().to_be_bytes());
        out[ATTRIBUTE_OFFSET..TX_OFFSET].copy_from_slice(&self.attribute.as_u16().to_be_bytes());
        out[TX_OFFSET..FLAGS_OFFSET].copy_from_slice(&self.tx.as_u64().to_be_bytes());
        out[FLAGS_OFFSET] = if self.is_retract { FLAG_RETRACT } else { 0 };
        out[TAG_OFFSET] = self.value_tag;
        out
    }

    /// Appends the encoded prefix to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.encode());
    }

    /// Decodes a prefix from the start of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnexpectedEof`] if fewer than
    /// [`KEY_PREFIX_SIZE`] bytes are available.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let view = PrefixView::parse(bytes)
            .ok_or_else(|| CodecError::eof(KEY_PREFIX_SIZE, bytes.len()))?;
        Ok(Self {
            entity: EntityId::new(view.entity),
            attribute: AttributeId::new(view.attribute),
            tx: TxId::new(view.tx),
            is_retract: view.flags & FLAG_RETRACT != 0,
            value_tag: view.value_tag,
        })
    }
}

/// Borrowed, field-decoded view over an encoded key (without index byte).
///
/// Used by the comparators, which must not allocate.
#[derive(Debug, Clone, Copy)]
pub struct PrefixView<'a> {
    /// Raw entity id.
    pub entity: u64,
    /// Raw attribute id.
    pub attribute: u16,
    /// Raw transaction id.
    pub tx: u64,
    /// Flags byte.
    pub flags: u8,
    /// Value tag byte.
    pub value_tag: u8,
    /// Value key bytes following the prefix.
    pub value: &'a [u8],
}

impl<'a> PrefixView<'a> {
    /// Parses a key. Returns `None` if it is shorter than a prefix.
    #[must_use]
    pub fn parse(bytes: &'a [u8]) -> Option<Self> {
        let header = bytes.get(..KEY_PREFIX_SIZE)?;
        Some(Self {
            entity: u64::from_be_bytes(header[ENTITY_OFFSET..ATTRIBUTE_OFFSET].try_into().ok()?),
            attribute: u16::from_be_bytes(header[ATTRIBUTE_OFFSET..TX_OFFSET].try_into().ok()?),
            tx: u64::from_be_bytes(header[TX_OFFSET..FLAGS_OFFSET].try_into().ok()?),
            flags: header[FLAGS_OFFSET],
            value_tag: header[TAG_OFFSET],
            value: &bytes[KEY_PREFIX_SIZE..],
        })
    }

    /// Whether the retract flag is set.
    #[must_use]
    pub fn is_retract(&self) -> bool {
        self.flags & FLAG_RETRACT != 0
    }
}
