//! JSON codec for patches and tree values.
//!
//! Patches carry an explicit `kind` tag. Map and set keys encode as JSON
//! strings or JSON numbers, so `"1"` and `1` stay distinct; numeric-keyed
//! map children travel under their own `childrenByNumericKey` member.
//! Values that have no plain JSON form are wrapped in a single-member
//! object: `{"$map": [[k, v], ..]}`, `{"$set": [k, ..]}`, `{"$ts": ms}`.
//! A record that would read as one of those (a single member whose key
//! starts with `$`) is itself wrapped as `{"$obj": {..}}`.

use serde_json::{json, Map, Number, Value as Json};

use crate::patch::types::{
    ArrayOperation, ArrayPatch, Deletion, MapPatch, ObjectPatch, Patch, PatchError, SetPatch,
};
use crate::value::{MapKey, Value};

const MAP_TAG: &str = "$map";
const SET_TAG: &str = "$set";
const TIMESTAMP_TAG: &str = "$ts";
const RECORD_TAG: &str = "$obj";

fn codec_err(msg: impl Into<String>) -> PatchError {
    PatchError::Codec(msg.into())
}

// ── Keys ──────────────────────────────────────────────────────────────────

fn encode_key(key: &MapKey) -> Json {
    match key {
        MapKey::Str(s) => Json::String(s.clone()),
        MapKey::Num(n) => Json::from(*n),
    }
}

fn decode_key(v: &Json) -> Result<MapKey, PatchError> {
    match v {
        Json::String(s) => Ok(MapKey::Str(s.clone())),
        Json::Number(n) => n
            .as_i64()
            .map(MapKey::Num)
            .ok_or_else(|| PatchError::InvalidKey(n.to_string())),
        other => Err(PatchError::InvalidKey(other.to_string())),
    }
}

fn decode_index(s: &str) -> Result<usize, PatchError> {
    treesync_pointer::parse_index(s).ok_or_else(|| PatchError::InvalidKey(s.to_string()))
}

fn decode_numeric_key(s: &str) -> Result<i64, PatchError> {
    s.parse().map_err(|_| PatchError::InvalidKey(s.to_string()))
}

// ── Values ────────────────────────────────────────────────────────────────

/// Serializes a tree value.
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(n) => Json::from(*n),
        Value::Float(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
        Value::Str(s) => Json::String(s.clone()),
        Value::Timestamp(ms) => json!({ TIMESTAMP_TAG: ms }),
        Value::Object(record) => {
            let members: Map<String, Json> = record
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect();
            let tag_shaped = record.len() == 1 && record.keys().all(|k| k.starts_with('$'));
            if tag_shaped {
                json!({ RECORD_TAG: members })
            } else {
                Json::Object(members)
            }
        }
        Value::Array(list) => Json::Array(list.iter().map(value_to_json).collect()),
        Value::Map(entries) => {
            let pairs: Vec<Json> = entries
                .iter()
                .map(|(k, v)| json!([encode_key(k), value_to_json(v)]))
                .collect();
            json!({ MAP_TAG: pairs })
        }
        Value::Set(members) => {
            let keys: Vec<Json> = members.iter().map(encode_key).collect();
            json!({ SET_TAG: keys })
        }
    }
}

/// Parses a tree value.
pub fn value_from_json(v: &Json) -> Result<Value, PatchError> {
    match v {
        Json::Object(obj) if obj.len() == 1 => {
            let (tag, inner) = obj.iter().next().ok_or_else(|| codec_err("empty object"))?;
            match tag.as_str() {
                TIMESTAMP_TAG => inner
                    .as_i64()
                    .map(Value::Timestamp)
                    .ok_or_else(|| codec_err("timestamp must be an integer")),
                MAP_TAG => Ok(Value::Map(std::sync::Arc::new(decode_pairs(inner)?))),
                SET_TAG => {
                    let keys = expect_array(inner, SET_TAG)?
                        .iter()
                        .map(decode_key)
                        .collect::<Result<_, _>>()?;
                    Ok(Value::Set(std::sync::Arc::new(keys)))
                }
                RECORD_TAG => decode_record(
                    inner
                        .as_object()
                        .ok_or_else(|| codec_err("$obj must wrap an object"))?,
                ),
                _ => decode_record(obj),
            }
        }
        Json::Object(obj) => decode_record(obj),
        Json::Array(items) => Ok(Value::array(
            items.iter().map(value_from_json).collect::<Result<Vec<_>, _>>()?,
        )),
        Json::Number(n) => Ok(match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().ok_or_else(|| codec_err("bad number"))?),
        }),
        Json::String(s) => Ok(Value::Str(s.clone())),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Null => Ok(Value::Null),
    }
}

fn decode_record(obj: &Map<String, Json>) -> Result<Value, PatchError> {
    let entries = obj
        .iter()
        .map(|(k, v)| Ok((k.clone(), value_from_json(v)?)))
        .collect::<Result<Vec<_>, PatchError>>()?;
    Ok(Value::object(entries))
}

fn decode_pairs(v: &Json) -> Result<indexmap::IndexMap<MapKey, Value>, PatchError> {
    expect_array(v, "pairs")?
        .iter()
        .map(|pair| match pair.as_array().map(Vec::as_slice) {
            Some([k, v]) => Ok((decode_key(k)?, value_from_json(v)?)),
            _ => Err(codec_err("pair must be [key, value]")),
        })
        .collect()
}

fn expect_array<'a>(v: &'a Json, what: &str) -> Result<&'a Vec<Json>, PatchError> {
    v.as_array()
        .ok_or_else(|| codec_err(format!("{what} must be an array")))
}

fn expect_object<'a>(v: &'a Json, what: &str) -> Result<&'a Map<String, Json>, PatchError> {
    v.as_object()
        .ok_or_else(|| codec_err(format!("{what} must be an object")))
}

// ── Array operations ──────────────────────────────────────────────────────

fn encode_op(op: &ArrayOperation) -> Json {
    let mut m = Map::new();
    m.insert("op".into(), json!(op.name()));
    match op {
        ArrayOperation::Set { index, value } => {
            m.insert("index".into(), json!(index));
            m.insert("value".into(), value_to_json(value));
        }
        ArrayOperation::Delete { index } => {
            m.insert("index".into(), json!(index));
        }
        ArrayOperation::Splice {
            start,
            delete_count,
            items,
        } => {
            m.insert("start".into(), json!(start));
            m.insert("deleteCount".into(), json!(delete_count));
            if !items.is_empty() {
                m.insert("items".into(), Json::Array(items.iter().map(value_to_json).collect()));
            }
        }
        ArrayOperation::Shift => {}
        ArrayOperation::Unshift { items } => {
            m.insert("items".into(), Json::Array(items.iter().map(value_to_json).collect()));
        }
        ArrayOperation::Reverse { len } => {
            m.insert("length".into(), json!(len));
        }
    }
    Json::Object(m)
}

fn decode_usize(obj: &Map<String, Json>, field: &str) -> Result<usize, PatchError> {
    let v = obj
        .get(field)
        .ok_or_else(|| codec_err(format!("missing {field}")))?;
    v.as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| PatchError::InvalidKey(v.to_string()))
}

fn decode_items(obj: &Map<String, Json>) -> Result<Vec<Value>, PatchError> {
    match obj.get("items") {
        None => Ok(Vec::new()),
        Some(items) => expect_array(items, "items")?
            .iter()
            .map(value_from_json)
            .collect(),
    }
}

fn decode_op(v: &Json) -> Result<ArrayOperation, PatchError> {
    let obj = expect_object(v, "op")?;
    let name = obj
        .get("op")
        .and_then(Json::as_str)
        .ok_or_else(|| codec_err("op name must be a string"))?;
    match name {
        "set" => Ok(ArrayOperation::Set {
            index: decode_usize(obj, "index")?,
            value: value_from_json(obj.get("value").unwrap_or(&Json::Null))?,
        }),
        "delete" => Ok(ArrayOperation::Delete {
            index: decode_usize(obj, "index")?,
        }),
        "splice" => Ok(ArrayOperation::Splice {
            start: decode_usize(obj, "start")?,
            delete_count: decode_usize(obj, "deleteCount")?,
            items: decode_items(obj)?,
        }),
        "shift" => Ok(ArrayOperation::Shift),
        "unshift" => Ok(ArrayOperation::Unshift {
            items: decode_items(obj)?,
        }),
        // The length is mandatory; there is no sensible default.
        "reverse" => Ok(ArrayOperation::Reverse {
            len: decode_usize(obj, "length")?,
        }),
        other => Err(codec_err(format!("unknown array op: {other}"))),
    }
}

// ── Patches ───────────────────────────────────────────────────────────────

fn encode_deletion(delete: &Deletion<MapKey>) -> Option<Json> {
    match delete {
        Deletion::All => Some(json!("all")),
        Deletion::Keys(keys) if keys.is_empty() => None,
        Deletion::Keys(keys) => Some(Json::Array(keys.iter().map(encode_key).collect())),
    }
}

fn decode_deletion(v: Option<&Json>) -> Result<Deletion<MapKey>, PatchError> {
    match v {
        None => Ok(Deletion::default()),
        Some(Json::String(s)) if s == "all" => Ok(Deletion::All),
        Some(v) => Ok(Deletion::Keys(
            expect_array(v, "delete")?
                .iter()
                .map(decode_key)
                .collect::<Result<_, _>>()?,
        )),
    }
}

fn encode_children<'a, K, I>(children: I) -> Option<Json>
where
    K: ToString + 'a,
    I: IntoIterator<Item = (&'a K, &'a Patch)>,
{
    let m: Map<String, Json> = children
        .into_iter()
        .map(|(k, p)| (k.to_string(), to_json(p)))
        .collect();
    (!m.is_empty()).then_some(Json::Object(m))
}

fn decode_children<K, F>(v: Option<&Json>, decode_key: F) -> Result<Vec<(K, Patch)>, PatchError>
where
    F: Fn(&str) -> Result<K, PatchError>,
{
    match v {
        None => Ok(Vec::new()),
        Some(v) => expect_object(v, "children")?
            .iter()
            .map(|(k, p)| Ok((decode_key(k)?, from_json(p)?)))
            .collect(),
    }
}

/// Serializes a patch.
pub fn to_json(patch: &Patch) -> Json {
    let mut m = Map::new();
    m.insert("kind".into(), json!(patch.kind().as_str()));
    match patch {
        Patch::Object(p) => {
            if !p.set.is_empty() {
                let pairs = p
                    .set
                    .iter()
                    .map(|(k, v)| json!([k, value_to_json(v)]))
                    .collect();
                m.insert("set".into(), Json::Array(pairs));
            }
            if !p.delete.is_empty() {
                m.insert("delete".into(), json!(p.delete.iter().collect::<Vec<_>>()));
            }
            if let Some(children) = encode_children(&p.children) {
                m.insert("children".into(), children);
            }
        }
        Patch::Array(p) => {
            if !p.ops.is_empty() {
                m.insert("ops".into(), Json::Array(p.ops.iter().map(encode_op).collect()));
            }
            if let Some(children) = encode_children(&p.children) {
                m.insert("children".into(), children);
            }
        }
        Patch::Map(p) => {
            if !p.set.is_empty() {
                let pairs = p
                    .set
                    .iter()
                    .map(|(k, v)| json!([encode_key(k), value_to_json(v)]))
                    .collect();
                m.insert("set".into(), Json::Array(pairs));
            }
            if let Some(delete) = encode_deletion(&p.delete) {
                m.insert("delete".into(), delete);
            }
            if let Some(children) = encode_children(&p.children) {
                m.insert("children".into(), children);
            }
            if let Some(children) = encode_children(&p.children_by_numeric_key) {
                m.insert("childrenByNumericKey".into(), children);
            }
        }
        Patch::Set(p) => {
            if !p.add.is_empty() {
                m.insert("add".into(), Json::Array(p.add.iter().map(encode_key).collect()));
            }
            if let Some(delete) = encode_deletion(&p.delete) {
                m.insert("delete".into(), delete);
            }
        }
    }
    Json::Object(m)
}

/// Parses a patch.
pub fn from_json(v: &Json) -> Result<Patch, PatchError> {
    let obj = expect_object(v, "patch")?;
    let kind = obj
        .get("kind")
        .and_then(Json::as_str)
        .ok_or_else(|| codec_err("patch kind must be a string"))?;
    match kind {
        "object" => {
            let mut p = ObjectPatch::default();
            if let Some(set) = obj.get("set") {
                for (k, v) in decode_pairs(set)? {
                    match k {
                        MapKey::Str(k) => {
                            p.set.insert(k, v);
                        }
                        MapKey::Num(n) => return Err(PatchError::InvalidKey(n.to_string())),
                    }
                }
            }
            if let Some(delete) = obj.get("delete") {
                for k in expect_array(delete, "delete")? {
                    let k = k
                        .as_str()
                        .ok_or_else(|| PatchError::InvalidKey(k.to_string()))?;
                    p.delete.insert(k.to_string());
                }
            }
            p.children = decode_children(obj.get("children"), |k| Ok(k.to_string()))?
                .into_iter()
                .collect();
            Ok(Patch::Object(p))
        }
        "array" => {
            let mut p = ArrayPatch::default();
            if let Some(ops) = obj.get("ops") {
                p.ops = expect_array(ops, "ops")?
                    .iter()
                    .map(decode_op)
                    .collect::<Result<_, _>>()?;
            }
            p.children = decode_children(obj.get("children"), decode_index)?
                .into_iter()
                .collect();
            Ok(Patch::Array(p))
        }
        "map" => {
            let mut p = MapPatch::default();
            if let Some(set) = obj.get("set") {
                p.set = decode_pairs(set)?;
            }
            p.delete = decode_deletion(obj.get("delete"))?;
            p.children = decode_children(obj.get("children"), |k| Ok(k.to_string()))?
                .into_iter()
                .collect();
            p.children_by_numeric_key =
                decode_children(obj.get("childrenByNumericKey"), decode_numeric_key)?
                    .into_iter()
                    .collect();
            Ok(Patch::Map(p))
        }
        "set" => {
            let mut p = SetPatch::default();
            if let Some(add) = obj.get("add") {
                p.add = expect_array(add, "add")?
                    .iter()
                    .map(decode_key)
                    .collect::<Result<_, _>>()?;
            }
            p.delete = decode_deletion(obj.get("delete"))?;
            Ok(Patch::Set(p))
        }
        other => Err(codec_err(format!("unknown patch kind: {other}"))),
    }
}

/// Serializes a patch to JSON text.
pub fn serialize(patch: &Patch) -> String {
    to_json(patch).to_string()
}

/// Parses a patch from JSON text.
pub fn parse(text: &str) -> Result<Patch, PatchError> {
    let v: Json = serde_json::from_str(text).map_err(|e| codec_err(e.to_string()))?;
    from_json(&v)
}
