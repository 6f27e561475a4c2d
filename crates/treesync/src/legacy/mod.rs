//! Legacy flat patches.
//!
//! Older peers ship a list of root-relative path operations instead of a
//! tree-shaped [`Patch`](crate::patch::Patch). They are replayed here as
//! they arrive and take no part in combining or filtering.

use serde_json::{json, Value as Json};
use treesync_pointer::{parse_index, parse_path, PointerError};

use crate::mutate::{container_get_mut, container_remove, container_set, ContainerKey};
use crate::patch::{value_from_json, value_to_json, PatchError};
use crate::value::{Kind, MapKey, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum FlatOp {
    SetValue { path: String, value: Value },
    RemoveValue { path: String },
    InitMap { path: String },
    InitSet { path: String },
}

impl FlatOp {
    pub fn path(&self) -> &str {
        match self {
            FlatOp::SetValue { path, .. }
            | FlatOp::RemoveValue { path }
            | FlatOp::InitMap { path }
            | FlatOp::InitSet { path } => path,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FlatOp::SetValue { .. } => "set",
            FlatOp::RemoveValue { .. } => "remove",
            FlatOp::InitMap { .. } => "initMap",
            FlatOp::InitSet { .. } => "initSet",
        }
    }
}

fn pointer_err(err: PointerError) -> PatchError {
    PatchError::InvalidKey(err.to_string())
}

/// Picks the key a path step names inside `node`.
///
/// Map and set steps prefer an existing string key, then an existing
/// numeric key, and fall back to a string key.
fn resolve(node: &Value, step: &str) -> Result<ContainerKey, PatchError> {
    let entry_key = |present: &dyn Fn(&MapKey) -> bool| {
        let as_str = MapKey::Str(step.to_string());
        if present(&as_str) {
            return as_str;
        }
        match step.parse::<i64>().map(MapKey::Num) {
            Ok(num) if present(&num) => num,
            _ => as_str,
        }
    };
    match node {
        Value::Object(_) => Ok(ContainerKey::Field(step.to_string())),
        Value::Array(_) => parse_index(step)
            .map(ContainerKey::Index)
            .ok_or_else(|| PatchError::InvalidKey(step.to_string())),
        Value::Map(entries) => Ok(ContainerKey::Entry(entry_key(&|k| entries.contains_key(k)))),
        Value::Set(members) => Ok(ContainerKey::Entry(entry_key(&|k| members.contains(k)))),
        other => Err(PatchError::mismatch(Kind::Object, other.kind())),
    }
}

fn apply_one(root: &mut Value, op: &FlatOp) -> Result<(), PatchError> {
    let path = parse_path(op.path()).map_err(pointer_err)?;
    let Some((last, parents)) = path.split_last() else {
        return match op {
            FlatOp::SetValue { value, .. } => {
                *root = value.clone();
                Ok(())
            }
            FlatOp::InitMap { .. } => {
                *root = Value::map(Vec::<(MapKey, Value)>::new());
                Ok(())
            }
            FlatOp::InitSet { .. } => {
                *root = Value::set(Vec::<MapKey>::new());
                Ok(())
            }
            FlatOp::RemoveValue { .. } => Err(PatchError::InvalidKey("root".into())),
        };
    };

    let mut node = root;
    for step in parents {
        let key = resolve(node, step)?;
        node = container_get_mut(node, &key)?.ok_or(PatchError::TargetMissing)?;
    }
    let key = resolve(node, last)?;
    match op {
        FlatOp::SetValue { value, .. } => {
            container_set(node, key, value.clone())?;
        }
        FlatOp::InitMap { .. } => {
            container_set(node, key, Value::map(Vec::<(MapKey, Value)>::new()))?;
        }
        FlatOp::InitSet { .. } => {
            container_set(node, key, Value::set(Vec::<MapKey>::new()))?;
        }
        FlatOp::RemoveValue { path } => {
            if container_remove(node, &key)?.is_none() {
                log::trace!("remove of absent {path} ignored");
            }
        }
    }
    Ok(())
}

/// Replays `ops` on a copy of `tree`. On error `tree` is left untouched.
pub fn apply_flat<'a, I>(tree: &Value, ops: I) -> Result<Value, PatchError>
where
    I: IntoIterator<Item = &'a FlatOp>,
{
    let mut out = tree.clone();
    let mut count = 0usize;
    for op in ops {
        apply_one(&mut out, op)?;
        count += 1;
    }
    log::debug!("replayed {count} flat op(s)");
    Ok(out)
}

// ── JSON ──────────────────────────────────────────────────────────────────

pub fn to_json(ops: &[FlatOp]) -> Json {
    Json::Array(
        ops.iter()
            .map(|op| match op {
                FlatOp::SetValue { path, value } => {
                    json!({"op": op.name(), "path": path, "value": value_to_json(value)})
                }
                _ => json!({"op": op.name(), "path": op.path()}),
            })
            .collect(),
    )
}

pub fn from_json(v: &Json) -> Result<Vec<FlatOp>, PatchError> {
    let items = v
        .as_array()
        .ok_or_else(|| PatchError::Codec("flat patch must be an array".into()))?;
    items
        .iter()
        .map(|item| {
            let op = item
                .get("op")
                .and_then(Json::as_str)
                .ok_or_else(|| PatchError::Codec("missing op".into()))?;
            let path = item
                .get("path")
                .and_then(Json::as_str)
                .ok_or_else(|| PatchError::Codec("missing path".into()))?
                .to_string();
            match op {
                "set" => Ok(FlatOp::SetValue {
                    path,
                    value: value_from_json(item.get("value").unwrap_or(&Json::Null))?,
                }),
                "remove" => Ok(FlatOp::RemoveValue { path }),
                "initMap" => Ok(FlatOp::InitMap { path }),
                "initSet" => Ok(FlatOp::InitSet { path }),
                other => Err(PatchError::Codec(format!("unknown flat op: {other}"))),
            }
        })
        .collect()
}
