//! Tagged values and their key encoding.
//!
//! Every value is written into an index key as a tag byte (inside the
//! [`KeyPrefix`](crate::KeyPrefix)) followed by the value's key bytes. The
//! encodings are chosen so that a bytewise comparison gives numeric order
//! wherever possible; the few tags that need more (floats and
//! case-insensitive strings) are handled by [`compare_value_bytes`].

use crate::error::{CodecError, CodecResult};
use crate::ids::EntityId;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;

/// Width of a hashed-blob content hash inside a key.
pub const BLOB_HASH_SIZE: usize = 8;

/// Discriminant of a [`TaggedValue`].
///
/// The numeric value is part of the on-disk format and of the sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ValueTag {
    /// No value.
    Null = 0,
    /// Unsigned 8-bit integer.
    UInt8 = 1,
    /// Unsigned 16-bit integer.
    UInt16 = 2,
    /// Unsigned 32-bit integer.
    UInt32 = 3,
    /// Unsigned 64-bit integer.
    UInt64 = 4,
    /// Unsigned 128-bit integer.
    UInt128 = 5,
    /// Signed 16-bit integer.
    Int16 = 6,
    /// Signed 32-bit integer.
    Int32 = 7,
    /// Signed 64-bit integer.
    Int64 = 8,
    /// Signed 128-bit integer.
    Int128 = 9,
    /// 32-bit float.
    Float32 = 10,
    /// 64-bit float.
    Float64 = 11,
    /// ASCII string.
    Ascii = 12,
    /// UTF-8 string.
    Utf8 = 13,
    /// UTF-8 string compared case-insensitively.
    Utf8Insensitive = 14,
    /// Inline byte blob.
    Blob = 15,
    /// Large blob keyed by content hash, payload stored out of band.
    HashedBlob = 16,
    /// Reference to another entity.
    Reference = 17,
}

impl ValueTag {
    /// All tags in byte order.
    pub const ALL: [ValueTag; 18] = [
        Self::Null,
        Self::UInt8,
        Self::UInt16,
        Self::UInt32,
        Self::UInt64,
        Self::UInt128,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::Int128,
        Self::Float32,
        Self::Float64,
        Self::Ascii,
        Self::Utf8,
        Self::Utf8Insensitive,
        Self::Blob,
        Self::HashedBlob,
        Self::Reference,
    ];

    /// Converts a byte to a tag.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        Self::ALL.get(usize::from(b)).copied()
    }

    /// Converts the tag to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Human-readable name, also accepted by [`ValueTag::from_name`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::UInt8 => "u8",
            Self::UInt16 => "u16",
            Self::UInt32 => "u32",
            Self::UInt64 => "u64",
            Self::UInt128 => "u128",
            Self::Int16 => "i16",
            Self::Int32 => "i32",
            Self::Int64 => "i64",
            Self::Int128 => "i128",
            Self::Float32 => "f32",
            Self::Float64 => "f64",
            Self::Ascii => "ascii",
            Self::Utf8 => "utf8",
            Self::Utf8Insensitive => "utf8-insensitive",
            Self::Blob => "blob",
            Self::HashedBlob => "hashed-blob",
            Self::Reference => "ref",
        }
    }

    /// Parses a tag from its [`name`](ValueTag::name).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|tag| tag.name() == name)
    }

    /// Width of the key bytes for fixed-width tags.
    #[must_use]
    pub const fn fixed_width(self) -> Option<usize> {
        match self {
            Self::Null => Some(0),
            Self::UInt8 => Some(1),
            Self::UInt16 | Self::Int16 => Some(2),
            Self::UInt32 | Self::Int32 | Self::Float32 => Some(4),
            Self::UInt64 | Self::Int64 | Self::Float64 | Self::Reference => Some(8),
            Self::HashedBlob => Some(BLOB_HASH_SIZE),
            Self::UInt128 | Self::Int128 => Some(16),
            Self::Ascii | Self::Utf8 | Self::Utf8Insensitive | Self::Blob => None,
        }
    }
}

impl fmt::Display for ValueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value together with its type tag.
///
/// Ordering compares the tag first, then the value, and agrees with the
/// ordering of the encoded key bytes.
#[derive(Debug, Clone)]
pub enum TaggedValue {
    /// No value.
    Null,
    /// Unsigned 8-bit integer. Also used for flags.
    UInt8(u8),
    /// Unsigned 16-bit integer.
    UInt16(u16),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// Unsigned 128-bit integer.
    UInt128(u128),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Signed 128-bit integer.
    Int128(i128),
    /// 32-bit float.
    Float32(f32),
    /// 64-bit float.
    Float64(f64),
    /// ASCII string.
    Ascii(String),
    /// UTF-8 string.
    Utf8(String),
    /// Case-insensitive UTF-8 string. The original casing is stored.
    Utf8Insensitive(String),
    /// Inline byte blob.
    Blob(Vec<u8>),
    /// Large blob. Keys carry only the content hash.
    HashedBlob(Vec<u8>),
    /// Reference to another entity.
    Reference(EntityId),
}

impl TaggedValue {
    /// Returns the tag of this value.
    #[must_use]
    pub fn tag(&self) -> ValueTag {
        match self {
            Self::Null => ValueTag::Null,
            Self::UInt8(_) => ValueTag::UInt8,
            Self::UInt16(_) => ValueTag::UInt16,
            Self::UInt32(_) => ValueTag::UInt32,
            Self::UInt64(_) => ValueTag::UInt64,
            Self::UInt128(_) => ValueTag::UInt128,
            Self::Int16(_) => ValueTag::Int16,
            Self::Int32(_) => ValueTag::Int32,
            Self::Int64(_) => ValueTag::Int64,
            Self::Int128(_) => ValueTag::Int128,
            Self::Float32(_) => ValueTag::Float32,
            Self::Float64(_) => ValueTag::Float64,
            Self::Ascii(_) => ValueTag::Ascii,
            Self::Utf8(_) => ValueTag::Utf8,
            Self::Utf8Insensitive(_) => ValueTag::Utf8Insensitive,
            Self::Blob(_) => ValueTag::Blob,
            Self::HashedBlob(_) => ValueTag::HashedBlob,
            Self::Reference(_) => ValueTag::Reference,
        }
    }

    /// Appends the key encoding of this value to `out`.
    pub fn write_key_bytes(&self, out: &mut Vec<u8>) {
        match self {
            Self::Null => {}
            Self::UInt8(v) => out.push(*v),
            Self::UInt16(v) => out.extend_from_slice(&v.to_be_bytes()),
            Self::UInt32(v) => out.extend_from_slice(&v.to_be_bytes()),
            Self::UInt64(v) => out.extend_from_slice(&v.to_be_bytes()),
            Self::UInt128(v) => out.extend_from_slice(&v.to_be_bytes()),
            // Flipping the sign bit makes two's complement sort bytewise.
            Self::Int16(v) => out.extend_from_slice(&((*v as u16) ^ (1 << 15)).to_be_bytes()),
            Self::Int32(v) => out.extend_from_slice(&((*v as u32) ^ (1 << 31)).to_be_bytes()),
            Self::Int64(v) => out.extend_from_slice(&((*v as u64) ^ (1 << 63)).to_be_bytes()),
            Self::Int128(v) => out.extend_from_slice(&((*v as u128) ^ (1 << 127)).to_be_bytes()),
            Self::Float32(v) => out.extend_from_slice(&v.to_bits().to_be_bytes()),
            Self::Float64(v) => out.extend_from_slice(&v.to_bits().to_be_bytes()),
            Self::Ascii(s) | Self::Utf8(s) | Self::Utf8Insensitive(s) => {
                out.extend_from_slice(s.as_bytes());
            }
            Self::Blob(b) => out.extend_from_slice(b),
            Self::HashedBlob(b) => out.extend_from_slice(&content_hash(b).to_be_bytes()),
            Self::Reference(e) => out.extend_from_slice(&e.as_u64().to_be_bytes()),
        }
    }

    /// Returns the key encoding of this value.
    #[must_use]
    pub fn key_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_key_bytes(&mut out);
        out
    }

    /// Decodes a value from its key bytes.
    ///
    /// # Errors
    ///
    /// Fails on width mismatches, invalid strings, and for
    /// [`ValueTag::HashedBlob`], whose payload is not part of the key; use
    /// [`TaggedValue::decode_hashed_blob`] for those.
    pub fn decode(tag: ValueTag, bytes: &[u8]) -> CodecResult<Self> {
        if let Some(width) = tag.fixed_width() {
            if bytes.len() != width {
                return Err(CodecError::InvalidValueWidth {
                    tag: tag.name(),
                    expected: width,
                    actual: bytes.len(),
                });
            }
        }

        let value = match tag {
            ValueTag::Null => Self::Null,
            ValueTag::UInt8 => Self::UInt8(bytes[0]),
            ValueTag::UInt16 => Self::UInt16(u16::from_be_bytes(fixed(bytes)?)),
            ValueTag::UInt32 => Self::UInt32(u32::from_be_bytes(fixed(bytes)?)),
            ValueTag::UInt64 => Self::UInt64(u64::from_be_bytes(fixed(bytes)?)),
            ValueTag::UInt128 => Self::UInt128(u128::from_be_bytes(fixed(bytes)?)),
            ValueTag::Int16 => Self::Int16((u16::from_be_bytes(fixed(bytes)?) ^ (1 << 15)) as i16),
            ValueTag::Int32 => Self::Int32((u32::from_be_bytes(fixed(bytes)?) ^ (1 << 31)) as i32),
            ValueTag::Int64 => Self::Int64((u64::from_be_bytes(fixed(bytes)?) ^ (1 << 63)) as i64),
            ValueTag::Int128 => {
                Self::Int128((u128::from_be_bytes(fixed(bytes)?) ^ (1 << 127)) as i128)
            }
            ValueTag::Float32 => Self::Float32(f32::from_bits(u32::from_be_bytes(fixed(bytes)?))),
            ValueTag::Float64 => Self::Float64(f64::from_bits(u64::from_be_bytes(fixed(bytes)?))),
            ValueTag::Ascii => {
                if !bytes.is_ascii() {
                    return Err(CodecError::InvalidString { tag: tag.name() });
                }
                Self::Ascii(utf8(tag, bytes)?)
            }
            ValueTag::Utf8 => Self::Utf8(utf8(tag, bytes)?),
            ValueTag::Utf8Insensitive => Self::Utf8Insensitive(utf8(tag, bytes)?),
            ValueTag::Blob => Self::Blob(bytes.to_vec()),
            ValueTag::HashedBlob => {
                return Err(CodecError::MissingBlobPayload {
                    hash: u64::from_be_bytes(fixed(bytes)?),
                })
            }
            ValueTag::Reference => Self::Reference(EntityId::new(u64::from_be_bytes(fixed(bytes)?))),
        };
        Ok(value)
    }

    /// Rebuilds a hashed blob from its key bytes and out-of-band payload.
    ///
    /// # Errors
    ///
    /// Fails if the payload does not hash to the key's hash.
    pub fn decode_hashed_blob(key_bytes: &[u8], payload: &[u8]) -> CodecResult<Self> {
        let hash = u64::from_be_bytes(fixed(key_bytes)?);
        let actual = content_hash(payload);
        if actual != hash {
            return Err(CodecError::decoding_failed(format!(
                "hashed blob payload mismatch: key {hash:016x}, payload {actual:016x}"
            )));
        }
        Ok(Self::HashedBlob(payload.to_vec()))
    }

    /// Returns the content hash for hashed blobs.
    #[must_use]
    pub fn blob_hash(&self) -> Option<u64> {
        match self {
            Self::HashedBlob(b) => Some(content_hash(b)),
            _ => None,
        }
    }

    /// Returns the string slice for string values.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Ascii(s) | Self::Utf8(s) | Self::Utf8Insensitive(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the referenced entity for reference values.
    #[must_use]
    pub fn as_reference(&self) -> Option<EntityId> {
        match self {
            Self::Reference(e) => Some(*e),
            _ => None,
        }
    }

    /// Returns the value widened to `u64` for unsigned integers up to 64 bits.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt8(v) => Some(u64::from(*v)),
            Self::UInt16(v) => Some(u64::from(*v)),
            Self::UInt32(v) => Some(u64::from(*v)),
            Self::UInt64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value widened to `i64` for signed integers up to 64 bits.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int16(v) => Some(i64::from(*v)),
            Self::Int32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }
}

fn fixed<const N: usize>(bytes: &[u8]) -> CodecResult<[u8; N]> {
    bytes
        .try_into()
        .map_err(|_| CodecError::eof(N, bytes.len()))
}

fn utf8(tag: ValueTag, bytes: &[u8]) -> CodecResult<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidString { tag: tag.name() })
}

/// Content hash used for hashed-blob keys: the first 8 bytes of SHA-256.
#[must_use]
pub fn content_hash(payload: &[u8]) -> u64 {
    let digest = Sha256::digest(payload);
    let mut head = [0u8; BLOB_HASH_SIZE];
    head.copy_from_slice(&digest[..BLOB_HASH_SIZE]);
    u64::from_be_bytes(head)
}

/// Compares the key bytes of two values that share `tag`.
///
/// Tags are compared by the caller. Unknown tags and malformed widths fall
/// back to bytewise comparison so the order stays total.
#[must_use]
pub fn compare_value_bytes(tag: u8, a: &[u8], b: &[u8]) -> Ordering {
    match ValueTag::from_byte(tag) {
        Some(ValueTag::Float32) => match (fixed::<4>(a), fixed::<4>(b)) {
            (Ok(x), Ok(y)) => f32::from_bits(u32::from_be_bytes(x))
                .total_cmp(&f32::from_bits(u32::from_be_bytes(y))),
            _ => a.cmp(b),
        },
        Some(ValueTag::Float64) => match (fixed::<8>(a), fixed::<8>(b)) {
            (Ok(x), Ok(y)) => f64::from_bits(u64::from_be_bytes(x))
                .total_cmp(&f64::from_bits(u64::from_be_bytes(y))),
            _ => a.cmp(b),
        },
        Some(ValueTag::Utf8Insensitive) => {
            // Invalid UTF-8 sorts after every valid string.
            match (std::str::from_utf8(a), std::str::from_utf8(b)) {
                (Ok(x), Ok(y)) => compare_insensitive(x, y),
                (Ok(_), Err(_)) => Ordering::Less,
                (Err(_), Ok(_)) => Ordering::Greater,
                (Err(_), Err(_)) => a.cmp(b),
            }
        }
        _ => a.cmp(b),
    }
}

fn compare_insensitive(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

impl Ord for TaggedValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use TaggedValue as V;
        match (self, other) {
            (V::Null, V::Null) => Ordering::Equal,
            (V::UInt8(a), V::UInt8(b)) => a.cmp(b),
            (V::UInt16(a), V::UInt16(b)) => a.cmp(b),
            (V::UInt32(a), V::UInt32(b)) => a.cmp(b),
            (V::UInt64(a), V::UInt64(b)) => a.cmp(b),
            (V::UInt128(a), V::UInt128(b)) => a.cmp(b),
            (V::Int16(a), V::Int16(b)) => a.cmp(b),
            (V::Int32(a), V::Int32(b)) => a.cmp(b),
            (V::Int64(a), V::Int64(b)) => a.cmp(b),
            (V::Int128(a), V::Int128(b)) => a.cmp(b),
            (V::Float32(a), V::Float32(b)) => a.total_cmp(b),
            (V::Float64(a), V::Float64(b)) => a.total_cmp(b),
            (V::Ascii(a), V::Ascii(b)) | (V::Utf8(a), V::Utf8(b)) => {
                a.as_bytes().cmp(b.as_bytes())
            }
            (V::Utf8Insensitive(a), V::Utf8Insensitive(b)) => compare_insensitive(a, b),
            (V::Blob(a), V::Blob(b)) => a.cmp(b),
            (V::HashedBlob(a), V::HashedBlob(b)) => content_hash(a)
                .cmp(&content_hash(b))
                .then_with(|| a.cmp(b)),
            (V::Reference(a), V::Reference(b)) => a.as_u64().cmp(&b.as_u64()),
            _ => self.tag().cmp(&other.tag()),
        }
    }
}

impl PartialOrd for TaggedValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TaggedValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TaggedValue {}

impl fmt::Display for TaggedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::UInt8(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::UInt128(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Int128(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Ascii(s) | Self::Utf8(s) | Self::Utf8Insensitive(s) => write!(f, "{s:?}"),
            Self::Blob(b) => write!(f, "blob[{}]", b.len()),
            Self::HashedBlob(b) => write!(f, "hashed-blob[{}]:{:016x}", b.len(), content_hash(b)),
            Self::Reference(e) => write!(f, "{e}"),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for TaggedValue {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    u128 => UInt128,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    i128 => Int128,
    f32 => Float32,
    f64 => Float64,
    String => Utf8,
    Vec<u8> => Blob,
    EntityId => Reference,
}

impl From<&str> for TaggedValue {
    fn from(v: &str) -> Self {
        Self::Utf8(v.to_string())
    }
}

impl From<bool> for TaggedValue {
    fn from(v: bool) -> Self {
        Self::UInt8(u8::from(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_cmp(a: &TaggedValue, b: &TaggedValue) -> Ordering {
        a.tag()
            .as_byte()
            .cmp(&b.tag().as_byte())
            .then_with(|| compare_value_bytes(a.tag().as_byte(), &a.key_bytes(), &b.key_bytes()))
    }

    #[test]
    fn tag_bytes_round_trip() {
        for tag in ValueTag::ALL {
            assert_eq!(ValueTag::from_byte(tag.as_byte()), Some(tag));
            assert_eq!(ValueTag::from_name(tag.name()), Some(tag));
        }
        assert_eq!(ValueTag::from_byte(18), None);
    }

    #[test]
    fn signed_integers_sort_bytewise() {
        let values = [i64::MIN, -5, -1, 0, 1, 7, i64::MAX];
        for pair in values.windows(2) {
            let a = TaggedValue::Int64(pair[0]).key_bytes();
            let b = TaggedValue::Int64(pair[1]).key_bytes();
            assert!(a < b, "{} should sort before {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn decode_reverses_encode() {
        let values = vec![
            TaggedValue::Null,
            TaggedValue::UInt8(3),
            TaggedValue::UInt128(u128::MAX - 1),
            TaggedValue::Int16(-300),
            TaggedValue::Int128(-1),
            TaggedValue::Float32(-0.5),
            TaggedValue::Float64(1e300),
            TaggedValue::Ascii("plain".into()),
            TaggedValue::Utf8("héllo".into()),
            TaggedValue::Utf8Insensitive("MiXeD".into()),
            TaggedValue::Blob(vec![0, 1, 2]),
            TaggedValue::Reference(EntityId::new(99)),
        ];
        for value in values {
            let decoded = TaggedValue::decode(value.tag(), &value.key_bytes()).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn hashed_blob_keys_hold_only_the_hash() {
        let payload = vec![7u8; 4096];
        let value = TaggedValue::HashedBlob(payload.clone());
        let key = value.key_bytes();
        assert_eq!(key.len(), BLOB_HASH_SIZE);
        assert!(matches!(
            TaggedValue::decode(ValueTag::HashedBlob, &key),
            Err(CodecError::MissingBlobPayload { .. })
        ));
        let rebuilt = TaggedValue::decode_hashed_blob(&key, &payload).unwrap();
        assert_eq!(rebuilt, value);
        assert!(TaggedValue::decode_hashed_blob(&key, b"other").is_err());
    }

    #[test]
    fn insensitive_strings_compare_equal_across_case() {
        let a = TaggedValue::Utf8Insensitive("Alice".into());
        let b = TaggedValue::Utf8Insensitive("aLICE".into());
        assert_eq!(a, b);
        assert_eq!(key_cmp(&a, &b), Ordering::Equal);
    }

    #[test]
    fn invalid_insensitive_bytes_sort_after_valid_strings() {
        let tag = ValueTag::Utf8Insensitive.as_byte();
        let lower: &[u8] = b"a";
        let upper: &[u8] = b"Z";
        let invalid: &[u8] = &[0x5B, 0xFF];
        assert_eq!(compare_value_bytes(tag, lower, upper), Ordering::Less);
        assert_eq!(compare_value_bytes(tag, upper, invalid), Ordering::Less);
        assert_eq!(compare_value_bytes(tag, lower, invalid), Ordering::Less);
        assert_eq!(compare_value_bytes(tag, invalid, lower), Ordering::Greater);
        assert_eq!(compare_value_bytes(tag, invalid, &[0xFF]), Ordering::Less);
    }

    #[test]
    fn tags_order_before_values() {
        let small_tag = TaggedValue::UInt8(255);
        let large_tag = TaggedValue::Utf8(String::new());
        assert!(small_tag < large_tag);
        assert_eq!(key_cmp(&small_tag, &large_tag), Ordering::Less);
    }

    #[test]
    fn memory_order_matches_key_order_for_floats() {
        let values = [f64::NEG_INFINITY, -2.0, -0.0, 0.0, 3.5, f64::INFINITY];
        for pair in values.windows(2) {
            let a = TaggedValue::Float64(pair[0]);
            let b = TaggedValue::Float64(pair[1]);
            assert_eq!(a.cmp(&b), Ordering::Less);
            assert_eq!(key_cmp(&a, &b), Ordering::Less);
        }
    }

    #[test]
    fn wrong_width_is_rejected() {
        let result = TaggedValue::decode(ValueTag::UInt32, &[1, 2]);
        assert!(matches!(result, Err(CodecError::InvalidValueWidth { .. })));
    }
}
