//! Core types for tree patches.
//!
//! A patch describes edits to one container node and, through `children`,
//! to its descendants that were mutated in place. The variant always
//! matches the runtime kind of the node it targets.

use std::collections::BTreeMap;
use std::hash::Hash;

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

use crate::value::{Kind, MapKey, Value};

// ── Error ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("TARGET_MISSING")]
    TargetMissing,
    #[error("TARGET_KIND_MISMATCH: expected {expected}, found {found}")]
    TargetKindMismatch { expected: Kind, found: Kind },
    #[error("INVALID_KEY: {0}")]
    InvalidKey(String),
    #[error("UNSUPPORTED_FILTER_SHAPE")]
    UnsupportedFilterShape,
    #[error("DOUBLE_FINISH")]
    DoubleFinish,
    #[error("UNKNOWN_SUBSCRIBER: {0}")]
    UnknownSubscriber(String),
    #[error("CODEC: {0}")]
    Codec(String),
}

impl PatchError {
    pub(crate) fn mismatch(expected: Kind, found: Kind) -> Self {
        PatchError::TargetKindMismatch { expected, found }
    }
}

// ── Deletion ──────────────────────────────────────────────────────────────

/// Deleted keys of a map or set patch.
#[derive(Debug, Clone, PartialEq)]
pub enum Deletion<K: Hash + Eq> {
    /// The container was cleared.
    All,
    Keys(IndexSet<K>),
}

impl<K: Hash + Eq> Default for Deletion<K> {
    fn default() -> Self {
        Deletion::Keys(IndexSet::new())
    }
}

impl<K: Hash + Eq> Deletion<K> {
    pub fn is_all(&self) -> bool {
        matches!(self, Deletion::All)
    }

    /// True when nothing is deleted.
    pub fn is_empty(&self) -> bool {
        match self {
            Deletion::All => false,
            Deletion::Keys(keys) => keys.is_empty(),
        }
    }

    /// Names `key` as deleted. A no-op after a full clear.
    pub fn insert(&mut self, key: K) {
        if let Deletion::Keys(keys) = self {
            keys.insert(key);
        }
    }

    /// Stops naming `key` as deleted. A full clear is left as is.
    pub fn remove(&mut self, key: &K) {
        if let Deletion::Keys(keys) = self {
            keys.shift_remove(key);
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        match self {
            Deletion::All => false,
            Deletion::Keys(keys) => keys.contains(key),
        }
    }

    pub fn keys(&self) -> Option<&IndexSet<K>> {
        match self {
            Deletion::All => None,
            Deletion::Keys(keys) => Some(keys),
        }
    }
}

// ── Array operations ──────────────────────────────────────────────────────

/// A positional edit of a list, replayed strictly in recorded order.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayOperation {
    /// Assign a slot, padding with `Null` when past the end.
    Set { index: usize, value: Value },
    /// Empty a slot (leaves a `Null` hole, indices do not shift).
    Delete { index: usize },
    Splice {
        start: usize,
        delete_count: usize,
        items: Vec<Value>,
    },
    Shift,
    Unshift { items: Vec<Value> },
    /// Reverse the first `len` elements, `len` being the list length when
    /// the reversal was recorded.
    Reverse { len: usize },
}

impl ArrayOperation {
    pub fn name(&self) -> &'static str {
        match self {
            ArrayOperation::Set { .. } => "set",
            ArrayOperation::Delete { .. } => "delete",
            ArrayOperation::Splice { .. } => "splice",
            ArrayOperation::Shift => "shift",
            ArrayOperation::Unshift { .. } => "unshift",
            ArrayOperation::Reverse { .. } => "reverse",
        }
    }
}

// ── Patch variants ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectPatch {
    pub set: IndexMap<String, Value>,
    pub delete: IndexSet<String>,
    pub children: IndexMap<String, Patch>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayPatch {
    pub ops: Vec<ArrayOperation>,
    /// Keyed by position after `ops` has been applied.
    pub children: BTreeMap<usize, Patch>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapPatch {
    pub set: IndexMap<MapKey, Value>,
    pub delete: Deletion<MapKey>,
    pub children: IndexMap<String, Patch>,
    pub children_by_numeric_key: IndexMap<i64, Patch>,
}

/// Set members are opaque, so a set patch has no children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetPatch {
    pub add: IndexSet<MapKey>,
    pub delete: Deletion<MapKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    Object(ObjectPatch),
    Array(ArrayPatch),
    Map(MapPatch),
    Set(SetPatch),
}

impl Patch {
    /// Returns an empty patch for a container of `kind`.
    pub fn empty(kind: Kind) -> Option<Patch> {
        match kind {
            Kind::Object => Some(Patch::Object(ObjectPatch::default())),
            Kind::Array => Some(Patch::Array(ArrayPatch::default())),
            Kind::Map => Some(Patch::Map(MapPatch::default())),
            Kind::Set => Some(Patch::Set(SetPatch::default())),
            Kind::Scalar => None,
        }
    }

    /// Returns an empty patch of the same variant.
    pub fn empty_like(&self) -> Patch {
        match self {
            Patch::Object(_) => Patch::Object(ObjectPatch::default()),
            Patch::Array(_) => Patch::Array(ArrayPatch::default()),
            Patch::Map(_) => Patch::Map(MapPatch::default()),
            Patch::Set(_) => Patch::Set(SetPatch::default()),
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Patch::Object(_) => Kind::Object,
            Patch::Array(_) => Kind::Array,
            Patch::Map(_) => Kind::Map,
            Patch::Set(_) => Kind::Set,
        }
    }

    /// True when applying the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Patch::Object(p) => {
                p.set.is_empty()
                    && p.delete.is_empty()
                    && p.children.values().all(Patch::is_empty)
            }
            Patch::Array(p) => p.ops.is_empty() && p.children.values().all(Patch::is_empty),
            Patch::Map(p) => {
                p.set.is_empty()
                    && p.delete.is_empty()
                    && p.children.values().all(Patch::is_empty)
                    && p.children_by_numeric_key.values().all(Patch::is_empty)
            }
            Patch::Set(p) => p.add.is_empty() && p.delete.is_empty(),
        }
    }
}

impl From<ObjectPatch> for Patch {
    fn from(p: ObjectPatch) -> Self {
        Patch::Object(p)
    }
}

impl From<ArrayPatch> for Patch {
    fn from(p: ArrayPatch) -> Self {
        Patch::Array(p)
    }
}

impl From<MapPatch> for Patch {
    fn from(p: MapPatch) -> Self {
        Patch::Map(p)
    }
}

impl From<SetPatch> for Patch {
    fn from(p: SetPatch) -> Self {
        Patch::Set(p)
    }
}
