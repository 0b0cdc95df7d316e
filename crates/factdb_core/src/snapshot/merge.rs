//! Current/history merge and retraction cancellation.
//!
//! The current and history variants of a family share one comparator, so
//! a two-pointer merge yields a single stream in index order. Every family
//! with history orders `(E, A, V)` ahead of `T`, which places each retraction
//! directly after the assertion it cancels. [`cancel_retractions`] checks
//! that adjacency instead of assuming it.

use super::scan::Entry;
use crate::error::{CoreError, CoreResult};
use factdb_codec::{Datom, KeyComparator, TxId};
use std::cmp::Ordering;

/// Merges two index-ordered streams into one.
pub(crate) fn merge(cmp: KeyComparator, current: Vec<Entry>, history: Vec<Entry>) -> Vec<Datom> {
    let mut out = Vec::with_capacity(current.len() + history.len());
    let mut left = current.into_iter().peekable();
    let mut right = history.into_iter().peekable();
    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => cmp(&l.body, &r.body) != Ordering::Greater,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_left { left.next() } else { right.next() };
        if let Some(entry) = next {
            out.push(entry.datom);
        }
    }
    out
}

/// Drops every datom written after `as_of`.
pub(crate) fn filter_as_of(datoms: Vec<Datom>, as_of: TxId) -> Vec<Datom> {
    datoms.into_iter().filter(|d| d.tx <= as_of).collect()
}

/// Pairs each retraction with the assertion before it and drops both.
///
/// A retraction with no matching assertion pending means the indexes
/// disagree; that is reported rather than skipped.
pub(crate) fn cancel_retractions(datoms: Vec<Datom>) -> CoreResult<Vec<Datom>> {
    let mut out = Vec::with_capacity(datoms.len());
    let mut pending: Option<Datom> = None;
    for datom in datoms {
        if datom.is_retract {
            match pending.take() {
                Some(p) if p.same_fact(&datom) && datom.tx >= p.tx => {}
                other => {
                    tracing::warn!(
                        retraction = %datom,
                        pending = ?other.as_ref().map(ToString::to_string),
                        "retraction without a matching assertion"
                    );
                    return Err(CoreError::index_invariant(format!(
                        "retraction {datom} does not follow its assertion"
                    )));
                }
            }
        } else if let Some(p) = pending.replace(datom) {
            out.push(p);
        }
    }
    out.extend(pending);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use factdb_codec::{compare_eavt, AttributeId, EntityId, PartitionId, TaggedValue};

    fn tx(n: u64) -> TxId {
        TxId::from_counter(n)
    }

    fn e(n: u64) -> EntityId {
        EntityId::in_partition(PartitionId::ENTITY, n)
    }

    fn assert_at(entity: u64, value: &str, t: u64) -> Datom {
        Datom::assert(e(entity), AttributeId::new(10), TaggedValue::from(value), tx(t))
    }

    fn entry(datom: Datom) -> Entry {
        Entry {
            body: datom.encode_body(),
            datom,
        }
    }

    #[test]
    fn merge_interleaves_in_index_order() {
        let a1 = assert_at(1, "a", 1);
        let b2 = assert_at(1, "b", 2);
        let current = vec![entry(b2.clone())];
        let history = vec![entry(a1.clone()), entry(a1.retraction_at(tx(2)))];
        let merged = merge(compare_eavt, current, history);
        assert_eq!(merged, vec![a1.clone(), a1.retraction_at(tx(2)), b2]);
    }

    #[test]
    fn cancellation_reconstructs_state() {
        let a1 = assert_at(1, "a", 1);
        let b2 = assert_at(1, "b", 2);
        let stream = vec![a1.clone(), a1.retraction_at(tx(2)), b2.clone()];
        assert_eq!(cancel_retractions(stream.clone()).unwrap(), vec![b2]);
        assert_eq!(
            cancel_retractions(filter_as_of(stream, tx(1))).unwrap(),
            vec![a1]
        );
    }

    #[test]
    fn reasserted_value_survives() {
        let a1 = assert_at(1, "a", 1);
        let a3 = assert_at(1, "a", 3);
        let stream = vec![a1.clone(), a1.retraction_at(tx(2)), a3.clone()];
        assert_eq!(cancel_retractions(stream).unwrap(), vec![a3]);
    }

    #[test]
    fn orphan_retraction_is_an_invariant_breach() {
        let a1 = assert_at(1, "a", 1);
        let stray = assert_at(2, "a", 1).retraction_at(tx(2));
        let err = cancel_retractions(vec![a1, stray]).unwrap_err();
        assert!(matches!(err, CoreError::IndexInvariant { .. }));
    }

    #[test]
    fn retraction_before_assertion_tx_is_rejected() {
        let a3 = assert_at(1, "a", 3);
        let early = a3.retraction_at(tx(2));
        assert!(cancel_retractions(vec![a3, early]).is_err());
    }
}
