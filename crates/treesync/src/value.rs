//! Tree values replicated by patches.
//!
//! Containers are reference counted so that `apply` can share every
//! untouched subtree with its input; writes go through `Arc::make_mut`.

use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

// ── Keys ──────────────────────────────────────────────────────────────────

/// Key of a map entry or a set member.
///
/// `Str("1")` and `Num(1)` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapKey {
    Str(String),
    Num(i64),
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Str(s) => write!(f, "{s:?}"),
            MapKey::Num(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for MapKey {
    fn from(s: &str) -> Self {
        MapKey::Str(s.to_string())
    }
}

impl From<String> for MapKey {
    fn from(s: String) -> Self {
        MapKey::Str(s)
    }
}

impl From<i64> for MapKey {
    fn from(n: i64) -> Self {
        MapKey::Num(n)
    }
}

impl From<i32> for MapKey {
    fn from(n: i32) -> Self {
        MapKey::Num(n.into())
    }
}

// ── Containers ────────────────────────────────────────────────────────────

pub type Record = IndexMap<String, Value>;
pub type List = Vec<Value>;
pub type Entries = IndexMap<MapKey, Value>;
pub type Members = IndexSet<MapKey>;

/// Runtime kind of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Object,
    Array,
    Map,
    Set,
    Scalar,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Object => "object",
            Kind::Array => "array",
            Kind::Map => "map",
            Kind::Set => "set",
            Kind::Scalar => "scalar",
        }
    }

    pub fn is_container(&self) -> bool {
        !matches!(self, Kind::Scalar)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Value ─────────────────────────────────────────────────────────────────

/// A node of a replicated tree.
///
/// `Timestamp` is atomic: it is never wrapped by the recorder and only
/// travels inside its parent's `set`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    Object(Arc<Record>),
    Array(Arc<List>),
    Map(Arc<Entries>),
    Set(Arc<Members>),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Object(_) => Kind::Object,
            Value::Array(_) => Kind::Array,
            Value::Map(_) => Kind::Map,
            Value::Set(_) => Kind::Set,
            _ => Kind::Scalar,
        }
    }

    pub fn is_container(&self) -> bool {
        self.kind().is_container()
    }

    /// Returns a new empty container of `kind`, or `None` for scalars.
    pub fn empty(kind: Kind) -> Option<Value> {
        match kind {
            Kind::Object => Some(Value::Object(Arc::default())),
            Kind::Array => Some(Value::Array(Arc::default())),
            Kind::Map => Some(Value::Map(Arc::default())),
            Kind::Set => Some(Value::Set(Arc::default())),
            Kind::Scalar => None,
        }
    }

    pub fn object<K, I>(entries: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn array<I: IntoIterator<Item = Value>>(items: I) -> Value {
        Value::Array(Arc::new(items.into_iter().collect()))
    }

    pub fn map<K, I>(entries: I) -> Value
    where
        K: Into<MapKey>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Map(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn set<K, I>(members: I) -> Value
    where
        K: Into<MapKey>,
        I: IntoIterator<Item = K>,
    {
        Value::Set(Arc::new(members.into_iter().map(Into::into).collect()))
    }

    pub fn as_object(&self) -> Option<&Record> {
        match self {
            Value::Object(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&List> {
        match self {
            Value::Array(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Entries> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&Members> {
        match self {
            Value::Set(members) => Some(members),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns true if both values are the same shared container.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
            (Value::Set(a), Value::Set(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<MapKey> for Value {
    fn from(key: MapKey) -> Self {
        match key {
            MapKey::Str(s) => Value::Str(s),
            MapKey::Num(n) => Value::Int(n),
        }
    }
}

/// Plain JSON maps to records and lists only; maps, sets and timestamps
/// have no untagged JSON form (see `patch::codec::json` for the tagged one).
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => Value::array(items.into_iter().map(Value::from)),
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}
