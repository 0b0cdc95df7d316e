//! Transactions: building, expansion and normalization.
//!
//! A [`Transaction`] is an ordered list of operations built on the caller's
//! side. Nothing is resolved until the writer dequeues it:
//!
//! 1. transaction functions run against the pre-transaction snapshot and
//!    their output is spliced in place, nested calls first
//! 2. pending entities are flattened into assertions
//! 3. the resulting operations are normalized into a minimal [`Delta`]
//!    against stored state
//!
//! Temporary ids come from [`Transaction::temp_id`] and are remapped to
//! permanent ids at commit.

mod normalize;
mod scan;

pub(crate) use normalize::{normalize, Delta};
pub use scan::{ScanAction, ScanUpdate};

use crate::error::{CoreError, CoreResult};
use crate::snapshot::Snapshot;
use factdb_codec::{AttributeId, EntityId, PartitionId, TaggedValue};
use std::collections::VecDeque;
use std::fmt;

/// An attribute named by id or by ident.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrRef {
    /// A dense attribute id.
    Id(AttributeId),
    /// A symbolic ident, resolved at commit.
    Ident(String),
}

impl From<AttributeId> for AttrRef {
    fn from(id: AttributeId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for AttrRef {
    fn from(ident: &str) -> Self {
        Self::Ident(ident.to_string())
    }
}

impl From<String> for AttrRef {
    fn from(ident: String) -> Self {
        Self::Ident(ident)
    }
}

impl fmt::Display for AttrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Ident(ident) => f.write_str(ident),
        }
    }
}

/// A data-transformation function run inside the writer.
///
/// It sees the snapshot the transaction is normalized against and may emit
/// more operations, including further calls. Any error aborts the whole
/// transaction.
pub trait TxFunction: Send + 'static {
    /// Runs the function.
    ///
    /// # Errors
    ///
    /// Whatever the function reports; the transaction is abandoned.
    fn apply(self: Box<Self>, ctx: &mut TxContext<'_>) -> CoreResult<()>;
}

impl<F> TxFunction for F
where
    F: FnOnce(&mut TxContext<'_>) -> CoreResult<()> + Send + 'static,
{
    fn apply(self: Box<Self>, ctx: &mut TxContext<'_>) -> CoreResult<()> {
        (*self)(ctx)
    }
}

/// An entity that does not exist yet, described by its facts.
///
/// Pending entities may reference each other through their temporary ids;
/// the references resolve when the transaction commits.
#[derive(Debug, Clone)]
pub struct PendingEntity {
    id: EntityId,
    facts: Vec<(AttrRef, TaggedValue)>,
}

impl PendingEntity {
    fn new(id: EntityId) -> Self {
        Self {
            id,
            facts: Vec::new(),
        }
    }

    /// The temporary id of this entity.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Adds a fact.
    #[must_use]
    pub fn with(mut self, attribute: impl Into<AttrRef>, value: impl Into<TaggedValue>) -> Self {
        self.facts.push((attribute.into(), value.into()));
        self
    }

    /// Adds a reference to another pending entity.
    #[must_use]
    pub fn refers_to(self, attribute: impl Into<AttrRef>, other: &PendingEntity) -> Self {
        self.with(attribute, TaggedValue::Reference(other.id))
    }

    fn flatten(self) -> impl Iterator<Item = Op> {
        let entity = self.id;
        self.facts.into_iter().map(move |(attribute, value)| Op {
            entity,
            attribute,
            value,
            retract: false,
        })
    }
}

pub(crate) enum TxOp {
    Assert(Op),
    Retract(Op),
    Call(Box<dyn TxFunction>),
    Entity(PendingEntity),
}

impl fmt::Debug for TxOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assert(op) => f.debug_tuple("Assert").field(op).finish(),
            Self::Retract(op) => f.debug_tuple("Retract").field(op).finish(),
            Self::Call(_) => f.write_str("Call(..)"),
            Self::Entity(p) => f.debug_tuple("Entity").field(p).finish(),
        }
    }
}

/// One flattened operation, before attribute resolution.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Op {
    pub entity: EntityId,
    pub attribute: AttrRef,
    pub value: TaggedValue,
    pub retract: bool,
}

fn op(entity: EntityId, attribute: impl Into<AttrRef>, value: impl Into<TaggedValue>, retract: bool) -> Op {
    Op {
        entity,
        attribute: attribute.into(),
        value: value.into(),
        retract,
    }
}

/// A batch of operations committed atomically.
///
/// # Example
///
/// ```
/// use factdb_core::Transaction;
///
/// let mut tx = Transaction::new();
/// let alice = tx.entity().with("person/name", "Alice");
/// let bob = tx.entity().with("person/name", "Bob").refers_to("person/friend", &alice);
/// tx.add_entity(alice).add_entity(bob);
/// assert_eq!(tx.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct Transaction {
    ops: Vec<TxOp>,
    next_temp: u64,
}

impl Transaction {
    /// Creates an empty transaction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a temporary id in the default entity partition.
    pub fn temp_id(&mut self) -> EntityId {
        self.temp_id_in(PartitionId::ENTITY)
    }

    /// Issues a temporary id that will be allocated in `partition`.
    pub fn temp_id_in(&mut self, partition: PartitionId) -> EntityId {
        issue(&mut self.next_temp, partition)
    }

    /// Asserts a fact.
    pub fn add(
        &mut self,
        entity: EntityId,
        attribute: impl Into<AttrRef>,
        value: impl Into<TaggedValue>,
    ) -> &mut Self {
        self.ops.push(TxOp::Assert(op(entity, attribute, value, false)));
        self
    }

    /// Retracts a fact.
    pub fn retract(
        &mut self,
        entity: EntityId,
        attribute: impl Into<AttrRef>,
        value: impl Into<TaggedValue>,
    ) -> &mut Self {
        self.ops.push(TxOp::Retract(op(entity, attribute, value, true)));
        self
    }

    /// Queues a closure as a transaction function.
    pub fn call<F>(&mut self, function: F) -> &mut Self
    where
        F: FnOnce(&mut TxContext<'_>) -> CoreResult<()> + Send + 'static,
    {
        self.call_function(function)
    }

    /// Queues a transaction function.
    pub fn call_function(&mut self, function: impl TxFunction) -> &mut Self {
        self.ops.push(TxOp::Call(Box::new(function)));
        self
    }

    /// Starts a pending entity with a fresh temporary id.
    pub fn entity(&mut self) -> PendingEntity {
        PendingEntity::new(self.temp_id())
    }

    /// Adds a pending entity's facts.
    pub fn add_entity(&mut self, entity: PendingEntity) -> &mut Self {
        self.ops.push(TxOp::Entity(entity));
        self
    }

    /// Number of queued operations, counting each call and entity once.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Runs functions and flattens entities into plain operations.
    ///
    /// # Errors
    ///
    /// Fails if a function fails, or with [`CoreError::UnknownTempId`] if an
    /// operation mentions a temporary id this transaction never issued.
    pub(crate) fn expand(self, snapshot: &Snapshot) -> CoreResult<Vec<Op>> {
        let Self { ops, mut next_temp } = self;
        let mut queue: VecDeque<TxOp> = ops.into();
        let mut out = Vec::new();
        while let Some(next) = queue.pop_front() {
            match next {
                TxOp::Assert(op) | TxOp::Retract(op) => out.push(op),
                TxOp::Entity(pending) => out.extend(pending.flatten()),
                TxOp::Call(function) => {
                    let mut ctx = TxContext {
                        snapshot,
                        emitted: Vec::new(),
                        next_temp: &mut next_temp,
                    };
                    function.apply(&mut ctx)?;
                    for emitted in ctx.emitted.into_iter().rev() {
                        queue.push_front(emitted);
                    }
                }
            }
        }
        for op in &out {
            check_temp(op.entity, next_temp)?;
            if let TaggedValue::Reference(target) = op.value {
                check_temp(target, next_temp)?;
            }
        }
        Ok(out)
    }
}

fn issue(counter: &mut u64, partition: PartitionId) -> EntityId {
    *counter += 1;
    EntityId::temp(partition, *counter)
}

fn check_temp(entity: EntityId, issued: u64) -> CoreResult<()> {
    if !entity.is_temp() || entity == EntityId::THIS_TX {
        return Ok(());
    }
    let sequence = entity.temp_sequence();
    if sequence == 0 || sequence > issued {
        return Err(CoreError::UnknownTempId { id: entity });
    }
    Ok(())
}

/// What a [`TxFunction`] sees and emits.
pub struct TxContext<'a> {
    snapshot: &'a Snapshot,
    emitted: Vec<TxOp>,
    next_temp: &'a mut u64,
}

impl TxContext<'_> {
    /// The state the transaction is normalized against.
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        self.snapshot
    }

    /// Emits an assertion.
    pub fn add(
        &mut self,
        entity: EntityId,
        attribute: impl Into<AttrRef>,
        value: impl Into<TaggedValue>,
    ) -> &mut Self {
        self.emitted.push(TxOp::Assert(op(entity, attribute, value, false)));
        self
    }

    /// Emits a retraction.
    pub fn retract(
        &mut self,
        entity: EntityId,
        attribute: impl Into<AttrRef>,
        value: impl Into<TaggedValue>,
    ) -> &mut Self {
        self.emitted.push(TxOp::Retract(op(entity, attribute, value, true)));
        self
    }

    /// Emits a nested call, run before anything queued after this one.
    pub fn call<F>(&mut self, function: F) -> &mut Self
    where
        F: FnOnce(&mut TxContext<'_>) -> CoreResult<()> + Send + 'static,
    {
        self.call_function(function)
    }

    /// Emits a nested transaction function.
    pub fn call_function(&mut self, function: impl TxFunction) -> &mut Self {
        self.emitted.push(TxOp::Call(Box::new(function)));
        self
    }

    /// Issues a temporary id in the default entity partition.
    pub fn temp_id(&mut self) -> EntityId {
        issue(self.next_temp, PartitionId::ENTITY)
    }

    /// Starts a pending entity.
    pub fn entity(&mut self) -> PendingEntity {
        PendingEntity::new(self.temp_id())
    }

    /// Emits a pending entity's facts.
    pub fn add_entity(&mut self, entity: PendingEntity) -> &mut Self {
        self.emitted.push(TxOp::Entity(entity));
        self
    }
}

impl fmt::Debug for TxContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxContext")
            .field("basis", &self.snapshot.basis())
            .field("emitted", &self.emitted.len())
            .finish()
    }
}
