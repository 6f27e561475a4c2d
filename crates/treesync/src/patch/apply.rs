//! Patch apply logic.
//!
//! `apply` never touches its input: the patched container is a shallow
//! copy, untouched children stay shared with the input, and only the
//! subtrees reached through `children` are rebuilt. A failing apply
//! therefore leaves nothing half-written.

use std::sync::Arc;

use crate::mutate::apply_array_op;
use crate::value::{Entries, List, MapKey, Members, Record, Value};

use super::types::{ArrayPatch, Deletion, MapPatch, ObjectPatch, Patch, PatchError, SetPatch};

/// Applies `patch` to `tree` and returns the patched tree.
pub fn apply(tree: &Value, patch: &Patch) -> Result<Value, PatchError> {
    match (tree, patch) {
        (Value::Object(record), Patch::Object(p)) => {
            Ok(Value::Object(Arc::new(apply_object(record, p)?)))
        }
        (Value::Array(list), Patch::Array(p)) => Ok(Value::Array(Arc::new(apply_array(list, p)?))),
        (Value::Map(entries), Patch::Map(p)) => Ok(Value::Map(Arc::new(apply_map(entries, p)?))),
        (Value::Set(members), Patch::Set(p)) => Ok(Value::Set(Arc::new(apply_set(members, p)))),
        (tree, patch) => Err(PatchError::mismatch(patch.kind(), tree.kind())),
    }
}

/// Applies `patch` to an optional target; an absent target is an error.
pub fn apply_to(tree: Option<&Value>, patch: &Patch) -> Result<Value, PatchError> {
    apply(tree.ok_or(PatchError::TargetMissing)?, patch)
}

/// Applies each patch in turn.
pub fn apply_all<'a, I>(tree: &Value, patches: I) -> Result<Value, PatchError>
where
    I: IntoIterator<Item = &'a Patch>,
{
    let mut patches = patches.into_iter();
    let Some(first) = patches.next() else {
        return Ok(tree.clone());
    };
    let mut current = apply(tree, first)?;
    for patch in patches {
        current = apply(&current, patch)?;
    }
    Ok(current)
}

/// Replaces `slot` with the result of applying `child` to it.
fn patch_slot(slot: Option<&mut Value>, child: &Patch) -> Result<(), PatchError> {
    let slot = slot.ok_or(PatchError::TargetMissing)?;
    *slot = apply(slot, child)?;
    Ok(())
}

// ── Per-kind appliers ─────────────────────────────────────────────────────

fn apply_object(record: &Record, patch: &ObjectPatch) -> Result<Record, PatchError> {
    let mut out = record.clone();
    for key in &patch.delete {
        out.shift_remove(key);
    }
    for (key, value) in &patch.set {
        out.insert(key.clone(), value.clone());
    }
    for (key, child) in &patch.children {
        patch_slot(out.get_mut(key), child)?;
    }
    Ok(out)
}

fn apply_array(list: &List, patch: &ArrayPatch) -> Result<List, PatchError> {
    let mut out = list.clone();
    for op in &patch.ops {
        apply_array_op(&mut out, op)?;
    }
    for (index, child) in &patch.children {
        patch_slot(out.get_mut(*index), child)?;
    }
    Ok(out)
}

fn apply_map(entries: &Entries, patch: &MapPatch) -> Result<Entries, PatchError> {
    let mut out = match &patch.delete {
        Deletion::All => Entries::new(),
        Deletion::Keys(keys) => {
            let mut out = entries.clone();
            for key in keys {
                out.shift_remove(key);
            }
            out
        }
    };
    for (key, value) in &patch.set {
        out.insert(key.clone(), value.clone());
    }
    for (key, child) in &patch.children {
        patch_slot(out.get_mut(&MapKey::Str(key.clone())), child)?;
    }
    for (key, child) in &patch.children_by_numeric_key {
        patch_slot(out.get_mut(&MapKey::Num(*key)), child)?;
    }
    Ok(out)
}

fn apply_set(members: &Members, patch: &SetPatch) -> Members {
    let mut out = match &patch.delete {
        Deletion::All => Members::new(),
        Deletion::Keys(keys) => {
            let mut out = members.clone();
            for key in keys {
                out.shift_remove(key);
            }
            out
        }
    };
    out.extend(patch.add.iter().cloned());
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────
