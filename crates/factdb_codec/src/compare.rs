//! Comparator family.
//!
//! One comparator per index orders keys *without* their leading index
//! byte. [`compare_keys`] is the global comparator over full keys: the
//! index byte decides first, the matching per-index comparator decides the
//! rest. None of these allocate.
//!
//! Keys shorter than a [`KeyPrefix`](crate::KeyPrefix) sort before
//! well-formed keys and bytewise among themselves, so every comparator is a
//! total order even over malformed input.

use crate::index::IndexType;
use crate::prefix::PrefixView;
use crate::value::compare_value_bytes;
use std::cmp::Ordering;

/// Signature shared by every comparator.
pub type KeyComparator = fn(&[u8], &[u8]) -> Ordering;

#[inline]
fn cmp_value(a: &PrefixView<'_>, b: &PrefixView<'_>) -> Ordering {
    a.value_tag
        .cmp(&b.value_tag)
        .then_with(|| compare_value_bytes(a.value_tag, a.value, b.value))
}

#[inline]
fn cmp_retract(a: &PrefixView<'_>, b: &PrefixView<'_>) -> Ordering {
    a.flags.cmp(&b.flags)
}

#[inline]
fn with_views(a: &[u8], b: &[u8], f: impl Fn(&PrefixView<'_>, &PrefixView<'_>) -> Ordering) -> Ordering {
    match (PrefixView::parse(a), PrefixView::parse(b)) {
        (Some(x), Some(y)) => f(&x, &y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// `(entity, attribute, value, tx, retract)`.
#[must_use]
pub fn compare_eavt(a: &[u8], b: &[u8]) -> Ordering {
    with_views(a, b, |x, y| {
        x.entity
            .cmp(&y.entity)
            .then_with(|| x.attribute.cmp(&y.attribute))
            .then_with(|| cmp_value(x, y))
            .then_with(|| x.tx.cmp(&y.tx))
            .then_with(|| cmp_retract(x, y))
    })
}

/// `(attribute, entity, value, tx, retract)`.
#[must_use]
pub fn compare_aevt(a: &[u8], b: &[u8]) -> Ordering {
    with_views(a, b, |x, y| {
        x.attribute
            .cmp(&y.attribute)
            .then_with(|| x.entity.cmp(&y.entity))
            .then_with(|| cmp_value(x, y))
            .then_with(|| x.tx.cmp(&y.tx))
            .then_with(|| cmp_retract(x, y))
    })
}

/// `(attribute, value, entity, tx, retract)`.
#[must_use]
pub fn compare_avet(a: &[u8], b: &[u8]) -> Ordering {
    with_views(a, b, |x, y| {
        x.attribute
            .cmp(&y.attribute)
            .then_with(|| cmp_value(x, y))
            .then_with(|| x.entity.cmp(&y.entity))
            .then_with(|| x.tx.cmp(&y.tx))
            .then_with(|| cmp_retract(x, y))
    })
}

/// `(value, attribute, entity, tx, retract)`.
#[must_use]
pub fn compare_vaet(a: &[u8], b: &[u8]) -> Ordering {
    with_views(a, b, |x, y| {
        cmp_value(x, y)
            .then_with(|| x.attribute.cmp(&y.attribute))
            .then_with(|| x.entity.cmp(&y.entity))
            .then_with(|| x.tx.cmp(&y.tx))
            .then_with(|| cmp_retract(x, y))
    })
}

/// `(tx, entity, attribute, value, retract)`.
#[must_use]
pub fn compare_txlog(a: &[u8], b: &[u8]) -> Ordering {
    with_views(a, b, |x, y| {
        x.tx.cmp(&y.tx)
            .then_with(|| x.entity.cmp(&y.entity))
            .then_with(|| x.attribute.cmp(&y.attribute))
            .then_with(|| cmp_value(x, y))
            .then_with(|| cmp_retract(x, y))
    })
}

/// Plain byte order, for indexes that do not hold datoms.
#[must_use]
pub fn compare_bytes(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

/// Returns the comparator for keys of `index` (without index byte).
#[must_use]
pub fn comparator_for(index: IndexType) -> KeyComparator {
    match index {
        IndexType::TxLog => compare_txlog,
        IndexType::EAVTCurrent | IndexType::EAVTHistory => compare_eavt,
        IndexType::AEVTCurrent | IndexType::AEVTHistory => compare_aevt,
        IndexType::AVETCurrent | IndexType::AVETHistory => compare_avet,
        IndexType::VAETCurrent | IndexType::VAETHistory => compare_vaet,
        IndexType::None | IndexType::BlobPayloads => compare_bytes,
    }
}

/// Global comparator over full keys.
#[must_use]
pub fn compare_keys(a: &[u8], b: &[u8]) -> Ordering {
    match (a.split_first(), b.split_first()) {
        (Some((ia, ra)), Some((ib, rb))) => ia.cmp(ib).then_with(|| {
            match IndexType::from_byte(*ia) {
                Some(index) => comparator_for(index)(ra, rb),
                None => ra.cmp(rb),
            }
        }),
        _ => a.len().cmp(&b.len()),
    }
}

/// Prefix extractor for prefix-mode iteration.
///
/// EAVT keys group by `index byte + entity`; every other index groups by
/// its index byte.
#[must_use]
pub fn key_prefix(key: &[u8]) -> &[u8] {
    const ENTITY_END: usize = 1 + 8;
    match key.first().copied().and_then(IndexType::from_byte) {
        Some(IndexType::EAVTCurrent | IndexType::EAVTHistory) if key.len() >= ENTITY_END => {
            &key[..ENTITY_END]
        }
        Some(_) => &key[..1],
        None => key,
    }
}
