//! Bulk rewrites over a slice of current datoms.

use super::{TxContext, TxFunction};
use crate::error::CoreResult;
use crate::snapshot::{SliceDescriptor, View};
use factdb_codec::{Datom, TaggedValue};
use std::fmt;

/// What a scan function decides for one datom.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanAction {
    /// Leave the datom alone.
    Keep,
    /// Retract the datom and assert this value in its place.
    Replace(TaggedValue),
    /// Retract the datom.
    Retract,
}

/// A transaction function that visits every current datom of a slice and
/// rewrites the ones its function picks.
///
/// The scan runs inside the writer against the pre-transaction state, so
/// no commit can slip in between reading a datom and replacing it.
///
/// ```
/// use factdb_core::{ScanAction, ScanUpdate, SliceDescriptor, Transaction};
/// use factdb_core::codec::{AttributeId, TaggedValue};
///
/// let name = AttributeId::new(8);
/// let mut tx = Transaction::new();
/// tx.call_function(ScanUpdate::new(SliceDescriptor::attribute(name), |datom| {
///     match datom.value.as_str() {
///         Some(s) if s != s.trim() => ScanAction::Replace(TaggedValue::from(s.trim())),
///         _ => ScanAction::Keep,
///     }
/// }));
/// ```
pub struct ScanUpdate<F> {
    slice: SliceDescriptor,
    function: F,
}

impl<F> ScanUpdate<F>
where
    F: FnMut(&Datom) -> ScanAction + Send + 'static,
{
    /// Scans `slice` with `function`.
    pub fn new(slice: SliceDescriptor, function: F) -> Self {
        Self { slice, function }
    }
}

impl<F> TxFunction for ScanUpdate<F>
where
    F: FnMut(&Datom) -> ScanAction + Send + 'static,
{
    fn apply(self: Box<Self>, ctx: &mut TxContext<'_>) -> CoreResult<()> {
        let Self { slice, mut function } = *self;
        let datoms = ctx.snapshot().with_view(View::Current).datoms(&slice)?;
        let mut replaced = 0usize;
        let mut retracted = 0usize;
        for datom in &datoms {
            match function(datom) {
                ScanAction::Keep => {}
                ScanAction::Replace(value) => {
                    ctx.retract(datom.entity, datom.attribute, datom.value.clone());
                    ctx.add(datom.entity, datom.attribute, value);
                    replaced += 1;
                }
                ScanAction::Retract => {
                    ctx.retract(datom.entity, datom.attribute, datom.value.clone());
                    retracted += 1;
                }
            }
        }
        tracing::debug!(
            family = slice.family().name(),
            scanned = datoms.len(),
            replaced,
            retracted,
            "scan update"
        );
        Ok(())
    }
}

impl<F> fmt::Debug for ScanUpdate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanUpdate").field("slice", &self.slice).finish_non_exhaustive()
    }
}
