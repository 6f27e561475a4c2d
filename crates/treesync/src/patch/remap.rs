//! Index remapping for positional child patches.
//!
//! Child patches of a list are keyed by the position their element holds
//! once all of the patch's operations ran. Each new operation moves those
//! positions, so every pre-existing key is pushed through the remap of
//! each later operation, in order.

use std::collections::BTreeMap;

use super::types::ArrayOperation;

/// Index translation derived from one [`ArrayOperation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexRemap {
    /// One slot was overwritten or emptied; its old contents are gone.
    Drop { index: usize },
    Splice {
        start: usize,
        delete_count: usize,
        inserted: usize,
    },
    Shift,
    Unshift { count: usize },
    Reverse { len: usize },
}

impl IndexRemap {
    /// Returns the remap for `op`, or `None` when it moves nothing.
    pub fn for_op(op: &ArrayOperation) -> Option<IndexRemap> {
        match op {
            ArrayOperation::Set { index, .. } | ArrayOperation::Delete { index } => {
                Some(IndexRemap::Drop { index: *index })
            }
            ArrayOperation::Splice {
                start,
                delete_count,
                items,
            } => {
                if *delete_count == 0 && items.is_empty() {
                    return None;
                }
                Some(IndexRemap::Splice {
                    start: *start,
                    delete_count: *delete_count,
                    inserted: items.len(),
                })
            }
            ArrayOperation::Shift => Some(IndexRemap::Shift),
            ArrayOperation::Unshift { items } if items.is_empty() => None,
            ArrayOperation::Unshift { items } => Some(IndexRemap::Unshift { count: items.len() }),
            ArrayOperation::Reverse { len } if *len < 2 => None,
            ArrayOperation::Reverse { len } => Some(IndexRemap::Reverse { len: *len }),
        }
    }

    /// Maps an old position to its new one, or `None` if the element is gone.
    pub fn remap(&self, old: usize) -> Option<usize> {
        match *self {
            IndexRemap::Drop { index } => (old != index).then_some(old),
            IndexRemap::Splice {
                start,
                delete_count,
                inserted,
            } => {
                let end = start.saturating_add(delete_count);
                if old < start {
                    Some(old)
                } else if old < end {
                    None
                } else {
                    Some(old - delete_count + inserted)
                }
            }
            IndexRemap::Shift => old.checked_sub(1),
            IndexRemap::Unshift { count } => Some(old + count),
            IndexRemap::Reverse { len } => {
                if old < len {
                    Some(len - old - 1)
                } else {
                    Some(old)
                }
            }
        }
    }
}

/// Entries split by one remap.
#[derive(Debug)]
pub struct Remapped<T> {
    pub kept: BTreeMap<usize, T>,
    /// Entries whose element was removed, keyed by their old position.
    pub dropped: Vec<(usize, T)>,
}

/// Re-keys positional entries through the remap of `op`.
pub fn remap_entries<T>(entries: BTreeMap<usize, T>, op: &ArrayOperation) -> Remapped<T> {
    let Some(remap) = IndexRemap::for_op(op) else {
        return Remapped {
            kept: entries,
            dropped: Vec::new(),
        };
    };
    let mut kept = BTreeMap::new();
    let mut dropped = Vec::new();
    for (old, entry) in entries {
        match remap.remap(old) {
            Some(new) => {
                kept.insert(new, entry);
            }
            None => {
                log::trace!("{} at {old} removes positional entry", op.name());
                dropped.push((old, entry));
            }
        }
    }
    Remapped { kept, dropped }
}
