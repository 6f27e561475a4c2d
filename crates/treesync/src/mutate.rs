//! Primitive edits shared by every container kind.
//!
//! The applier and the recorder both go through these helpers so that a
//! write performed live and the same write replayed from a patch can never
//! disagree.

use std::sync::Arc;

use crate::patch::{ArrayOperation, PatchError};
use crate::value::{Kind, MapKey, Value};

/// Addresses one slot of a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContainerKey {
    Field(String),
    Index(usize),
    Entry(MapKey),
}

impl ContainerKey {
    /// The container kind this key naturally addresses.
    fn natural_kind(&self) -> Kind {
        match self {
            ContainerKey::Field(_) => Kind::Object,
            ContainerKey::Index(_) => Kind::Array,
            ContainerKey::Entry(_) => Kind::Map,
        }
    }
}

fn invalid_key(key: &ContainerKey, kind: Kind) -> PatchError {
    PatchError::InvalidKey(format!("{key:?} on {kind}"))
}

fn not_a_container(key: &ContainerKey, value: &Value) -> PatchError {
    PatchError::mismatch(key.natural_kind(), value.kind())
}

// ── Reads ─────────────────────────────────────────────────────────────────

/// Reads the value stored under `key`. Set members are not addressable.
pub fn container_get<'a>(
    container: &'a Value,
    key: &ContainerKey,
) -> Result<Option<&'a Value>, PatchError> {
    match (container, key) {
        (Value::Object(record), ContainerKey::Field(k)) => Ok(record.get(k)),
        (Value::Array(list), ContainerKey::Index(i)) => Ok(list.get(*i)),
        (Value::Map(entries), ContainerKey::Entry(k)) => Ok(entries.get(k)),
        (v, key) if v.is_container() => Err(invalid_key(key, v.kind())),
        (v, key) => Err(not_a_container(key, v)),
    }
}

/// Mutable counterpart of [`container_get`], unsharing the container first.
pub fn container_get_mut<'a>(
    container: &'a mut Value,
    key: &ContainerKey,
) -> Result<Option<&'a mut Value>, PatchError> {
    match (container, key) {
        (Value::Object(record), ContainerKey::Field(k)) => Ok(Arc::make_mut(record).get_mut(k)),
        (Value::Array(list), ContainerKey::Index(i)) => Ok(Arc::make_mut(list).get_mut(*i)),
        (Value::Map(entries), ContainerKey::Entry(k)) => Ok(Arc::make_mut(entries).get_mut(k)),
        (v, key) if v.is_container() => Err(invalid_key(key, v.kind())),
        (v, key) => Err(not_a_container(key, v)),
    }
}

// ── Writes ────────────────────────────────────────────────────────────────

/// Stores `value` under `key` and returns what was there before.
///
/// For a set the key is the member and `value` is ignored; an already
/// present member is returned as the previous value.
pub fn container_set(
    container: &mut Value,
    key: ContainerKey,
    value: Value,
) -> Result<Option<Value>, PatchError> {
    match (container, key) {
        (Value::Object(record), ContainerKey::Field(k)) => Ok(Arc::make_mut(record).insert(k, value)),
        (Value::Array(list), ContainerKey::Index(index)) => {
            let removed = apply_array_op(Arc::make_mut(list), &ArrayOperation::Set { index, value })?;
            Ok(removed.into_iter().next())
        }
        (Value::Map(entries), ContainerKey::Entry(k)) => Ok(Arc::make_mut(entries).insert(k, value)),
        (Value::Set(members), ContainerKey::Entry(k)) => {
            if members.contains(&k) {
                Ok(Some(Value::from(k)))
            } else {
                Arc::make_mut(members).insert(k);
                Ok(None)
            }
        }
        (v, key) if v.is_container() => Err(invalid_key(&key, v.kind())),
        (v, key) => Err(not_a_container(&key, v)),
    }
}

/// Removes `key` and returns the removed value.
///
/// A list slot is emptied in place (see [`ArrayOperation::Delete`]).
pub fn container_remove(
    container: &mut Value,
    key: &ContainerKey,
) -> Result<Option<Value>, PatchError> {
    match (container, key) {
        (Value::Object(record), ContainerKey::Field(k)) => {
            if !record.contains_key(k) {
                return Ok(None);
            }
            Ok(Arc::make_mut(record).shift_remove(k))
        }
        (Value::Array(list), ContainerKey::Index(index)) => {
            if *index >= list.len() {
                return Ok(None);
            }
            let removed = apply_array_op(Arc::make_mut(list), &ArrayOperation::Delete { index: *index })?;
            Ok(removed.into_iter().next())
        }
        (Value::Map(entries), ContainerKey::Entry(k)) => {
            if !entries.contains_key(k) {
                return Ok(None);
            }
            Ok(Arc::make_mut(entries).shift_remove(k))
        }
        (Value::Set(members), ContainerKey::Entry(k)) => {
            if !members.contains(k) {
                return Ok(None);
            }
            Arc::make_mut(members).shift_remove(k);
            Ok(Some(Value::from(k.clone())))
        }
        (v, key) if v.is_container() => Err(invalid_key(key, v.kind())),
        (v, key) => Err(not_a_container(key, v)),
    }
}

/// Empties a container.
pub fn container_clear(container: &mut Value) -> Result<(), PatchError> {
    match container {
        Value::Object(record) => Arc::make_mut(record).clear(),
        Value::Array(list) => Arc::make_mut(list).clear(),
        Value::Map(entries) => Arc::make_mut(entries).clear(),
        Value::Set(members) => Arc::make_mut(members).clear(),
        v => return Err(PatchError::mismatch(Kind::Object, v.kind())),
    }
    Ok(())
}

/// Copies the top level of a container; every child stays shared.
pub fn shallow_clone(container: &Value) -> Result<Value, PatchError> {
    match container {
        Value::Object(record) => Ok(Value::Object(Arc::new((**record).clone()))),
        Value::Array(list) => Ok(Value::Array(Arc::new((**list).clone()))),
        Value::Map(entries) => Ok(Value::Map(Arc::new((**entries).clone()))),
        Value::Set(members) => Ok(Value::Set(Arc::new((**members).clone()))),
        v => Err(PatchError::mismatch(Kind::Object, v.kind())),
    }
}

// ── Lists ─────────────────────────────────────────────────────────────────

/// Applies one positional edit and returns the values it displaced.
///
/// Out-of-range `start`/`delete_count` are clamped the way a splice
/// clamps them; out-of-range deletes are no-ops. A reverse longer than the
/// list is `InvalidKey`, since child positions are mirrored against its
/// recorded length.
pub fn apply_array_op(list: &mut Vec<Value>, op: &ArrayOperation) -> Result<Vec<Value>, PatchError> {
    let displaced = match op {
        ArrayOperation::Set { index, value } => {
            if let Some(slot) = list.get_mut(*index) {
                return Ok(vec![std::mem::replace(slot, value.clone())]);
            }
            list.resize(*index, Value::Null);
            list.push(value.clone());
            Vec::new()
        }
        ArrayOperation::Delete { index } => match list.get_mut(*index) {
            Some(slot) => vec![std::mem::take(slot)],
            None => Vec::new(),
        },
        ArrayOperation::Splice {
            start,
            delete_count,
            items,
        } => {
            let start = (*start).min(list.len());
            let end = start.saturating_add(*delete_count).min(list.len());
            list.splice(start..end, items.iter().cloned()).collect()
        }
        ArrayOperation::Shift => {
            if list.is_empty() {
                Vec::new()
            } else {
                vec![list.remove(0)]
            }
        }
        ArrayOperation::Unshift { items } => {
            list.splice(0..0, items.iter().cloned());
            Vec::new()
        }
        ArrayOperation::Reverse { len } => {
            if *len > list.len() {
                return Err(PatchError::InvalidKey(format!(
                    "reverse of {len} on a list of {}",
                    list.len()
                )));
            }
            list[..*len].reverse();
            Vec::new()
        }
    };
    Ok(displaced)
}
