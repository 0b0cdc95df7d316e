//! The datom and its index key encoding.

use crate::error::{CodecError, CodecResult};
use crate::ids::{AttributeId, EntityId, TxId};
use crate::index::IndexType;
use crate::prefix::{KeyPrefix, PrefixView, KEY_PREFIX_SIZE};
use crate::value::{TaggedValue, ValueTag};
use std::fmt;

/// One immutable fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datom {
    /// Entity the fact is about.
    pub entity: EntityId,
    /// Attribute being asserted or retracted.
    pub attribute: AttributeId,
    /// The value.
    pub value: TaggedValue,
    /// Transaction that wrote the fact.
    pub tx: TxId,
    /// Whether this datom retracts an earlier assertion.
    pub is_retract: bool,
}

impl Datom {
    /// Creates an assertion.
    #[must_use]
    pub fn assert(entity: EntityId, attribute: AttributeId, value: TaggedValue, tx: TxId) -> Self {
        Self {
            entity,
            attribute,
            value,
            tx,
            is_retract: false,
        }
    }

    /// Creates a retraction marker.
    #[must_use]
    pub fn retract(entity: EntityId, attribute: AttributeId, value: TaggedValue, tx: TxId) -> Self {
        Self {
            entity,
            attribute,
            value,
            tx,
            is_retract: true,
        }
    }

    /// The retraction marker cancelling this datom in transaction `tx`.
    #[must_use]
    pub fn retraction_at(&self, tx: TxId) -> Self {
        Self::retract(self.entity, self.attribute, self.value.clone(), tx)
    }

    /// The key prefix of this datom.
    #[must_use]
    pub fn prefix(&self) -> KeyPrefix {
        KeyPrefix {
            entity: self.entity,
            attribute: self.attribute,
            tx: self.tx,
            is_retract: self.is_retract,
            value_tag: self.value.tag().as_byte(),
        }
    }

    /// Encodes the key without its index byte.
    #[must_use]
    pub fn encode_body(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(KEY_PREFIX_SIZE + 16);
        self.prefix().write_to(&mut out);
        self.value.write_key_bytes(&mut out);
        out
    }

    /// Encodes the full key for `index`.
    #[must_use]
    pub fn encode_key(&self, index: IndexType) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + KEY_PREFIX_SIZE + 16);
        out.push(index.as_byte());
        self.prefix().write_to(&mut out);
        self.value.write_key_bytes(&mut out);
        out
    }

    /// Whether `other` has the same entity, attribute and value.
    #[must_use]
    pub fn same_fact(&self, other: &Datom) -> bool {
        self.entity == other.entity && self.attribute == other.attribute && self.value == other.value
    }
}

impl fmt::Display for Datom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {} {} {}{}]",
            self.entity,
            self.attribute,
            self.value,
            self.tx,
            if self.is_retract { " retract" } else { "" }
        )
    }
}

/// A decoded key whose value has not been materialized yet.
///
/// Hashed blobs need their payload fetched from
/// [`IndexType::BlobPayloads`] before a [`Datom`] can be built.
#[derive(Debug, Clone, Copy)]
pub struct RawDatom<'a> {
    /// Decoded prefix.
    pub prefix: KeyPrefix,
    /// Value tag.
    pub tag: ValueTag,
    /// Value key bytes.
    pub value: &'a [u8],
}

impl<'a> RawDatom<'a> {
    /// Decodes a key body (without index byte).
    ///
    /// # Errors
    ///
    /// Fails on short input or an unknown value tag.
    pub fn decode(body: &'a [u8]) -> CodecResult<Self> {
        let view =
            PrefixView::parse(body).ok_or_else(|| CodecError::eof(KEY_PREFIX_SIZE, body.len()))?;
        let tag = ValueTag::from_byte(view.value_tag)
            .ok_or(CodecError::UnknownValueTag(view.value_tag))?;
        Ok(Self {
            prefix: KeyPrefix::decode(body)?,
            tag,
            value: view.value,
        })
    }

    /// The blob hash if this is a hashed-blob datom.
    #[must_use]
    pub fn blob_hash(&self) -> Option<u64> {
        if self.tag != ValueTag::HashedBlob {
            return None;
        }
        self.value.try_into().ok().map(u64::from_be_bytes)
    }

    /// Builds the datom, using `payload` for hashed blobs.
    ///
    /// # Errors
    ///
    /// Fails if the value bytes are invalid for the tag, or if a hashed
    /// blob has no (or a mismatching) payload.
    pub fn into_datom(self, payload: Option<&[u8]>) -> CodecResult<Datom> {
        let value = match (self.tag, payload) {
            (ValueTag::HashedBlob, Some(payload)) => {
                TaggedValue::decode_hashed_blob(self.value, payload)?
            }
            _ => TaggedValue::decode(self.tag, self.value)?,
        };
        Ok(Datom {
            entity: self.prefix.entity,
            attribute: self.prefix.attribute,
            value,
            tx: self.prefix.tx,
            is_retract: self.prefix.is_retract,
        })
    }
}

/// Key under which a hashed-blob payload is stored.
#[must_use]
pub fn blob_payload_key(hash: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(9);
    out.push(IndexType::BlobPayloads.as_byte());
    out.extend_from_slice(&hash.to_be_bytes());
    out
}

/// Splits a full key into its index and body.
///
/// # Errors
///
/// Fails on an empty key or an unknown index byte.
pub fn split_key(key: &[u8]) -> CodecResult<(IndexType, &[u8])> {
    let (first, body) = key.split_first().ok_or_else(|| CodecError::eof(1, 0))?;
    Ok((IndexType::try_from_byte(*first)?, body))
}
