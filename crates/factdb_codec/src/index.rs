//! Index identities.

use crate::error::{CodecError, CodecResult};
use std::fmt;

/// A physical sorted key range. The byte value leads every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum IndexType {
    /// Not an index. Never stored.
    None = 0,
    /// Every datom and retraction marker in commit order.
    TxLog = 1,
    /// Current datoms, entity first.
    EAVTCurrent = 2,
    /// Superseded datoms and their retractions, entity first.
    EAVTHistory = 3,
    /// Current datoms, attribute first.
    AEVTCurrent = 4,
    /// Superseded datoms, attribute first.
    AEVTHistory = 5,
    /// Current reference datoms, target first.
    VAETCurrent = 6,
    /// Superseded reference datoms, target first.
    VAETHistory = 7,
    /// Current datoms of indexed attributes, value first.
    AVETCurrent = 8,
    /// Superseded datoms of indexed attributes, value first.
    AVETHistory = 9,
    /// Hashed-blob payloads keyed by content hash.
    BlobPayloads = 10,
}

impl IndexType {
    /// Every stored index, in byte order.
    pub const STORED: [IndexType; 10] = [
        Self::TxLog,
        Self::EAVTCurrent,
        Self::EAVTHistory,
        Self::AEVTCurrent,
        Self::AEVTHistory,
        Self::VAETCurrent,
        Self::VAETHistory,
        Self::AVETCurrent,
        Self::AVETHistory,
        Self::BlobPayloads,
    ];

    /// Converts a byte to an index type.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::None),
            _ => Self::STORED.get(usize::from(b) - 1).copied(),
        }
    }

    /// Converts a byte to an index type, failing on unknown bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnknownIndexType`].
    pub fn try_from_byte(b: u8) -> CodecResult<Self> {
        Self::from_byte(b).ok_or(CodecError::UnknownIndexType(b))
    }

    /// Converts the index type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Short lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::TxLog => "txlog",
            Self::EAVTCurrent => "eavt-current",
            Self::EAVTHistory => "eavt-history",
            Self::AEVTCurrent => "aevt-current",
            Self::AEVTHistory => "aevt-history",
            Self::VAETCurrent => "vaet-current",
            Self::VAETHistory => "vaet-history",
            Self::AVETCurrent => "avet-current",
            Self::AVETHistory => "avet-history",
            Self::BlobPayloads => "blob-payloads",
        }
    }

    /// The logical family of a datom index.
    #[must_use]
    pub const fn family(self) -> Option<IndexFamily> {
        match self {
            Self::TxLog => Some(IndexFamily::TxLog),
            Self::EAVTCurrent | Self::EAVTHistory => Some(IndexFamily::Eavt),
            Self::AEVTCurrent | Self::AEVTHistory => Some(IndexFamily::Aevt),
            Self::VAETCurrent | Self::VAETHistory => Some(IndexFamily::Vaet),
            Self::AVETCurrent | Self::AVETHistory => Some(IndexFamily::Avet),
            Self::None | Self::BlobPayloads => None,
        }
    }

    /// Whether this is a history variant.
    #[must_use]
    pub const fn is_history(self) -> bool {
        matches!(
            self,
            Self::EAVTHistory | Self::AEVTHistory | Self::VAETHistory | Self::AVETHistory
        )
    }

    /// Whether keys in this index are datom keys.
    #[must_use]
    pub const fn holds_datoms(self) -> bool {
        self.family().is_some()
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A logical ordering over datoms, stored as a current and (except for
/// the transaction log) a history variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexFamily {
    /// `(entity, attribute, value, tx)`.
    Eavt,
    /// `(attribute, entity, value, tx)`.
    Aevt,
    /// `(attribute, value, entity, tx)`.
    Avet,
    /// `(value, attribute, entity, tx)`. Reference attributes only.
    Vaet,
    /// `(tx, entity, attribute, value)`.
    TxLog,
}

impl IndexFamily {
    /// All families.
    pub const ALL: [IndexFamily; 5] = [Self::Eavt, Self::Aevt, Self::Avet, Self::Vaet, Self::TxLog];

    /// The current variant. For the transaction log, the log itself.
    #[must_use]
    pub const fn current(self) -> IndexType {
        match self {
            Self::Eavt => IndexType::EAVTCurrent,
            Self::Aevt => IndexType::AEVTCurrent,
            Self::Avet => IndexType::AVETCurrent,
            Self::Vaet => IndexType::VAETCurrent,
            Self::TxLog => IndexType::TxLog,
        }
    }

    /// The history variant, if the family has one.
    #[must_use]
    pub const fn history(self) -> Option<IndexType> {
        match self {
            Self::Eavt => Some(IndexType::EAVTHistory),
            Self::Aevt => Some(IndexType::AEVTHistory),
            Self::Avet => Some(IndexType::AVETHistory),
            Self::Vaet => Some(IndexType::VAETHistory),
            Self::TxLog => None,
        }
    }

    /// Short lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Eavt => "eavt",
            Self::Aevt => "aevt",
            Self::Avet => "avet",
            Self::Vaet => "vaet",
            Self::TxLog => "txlog",
        }
    }

    /// Parses a family from its [`name`](IndexFamily::name).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|family| family.name() == name)
    }
}
