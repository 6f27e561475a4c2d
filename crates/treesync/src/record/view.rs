//! Recording views over the containers of a [`Recorder`].
//!
//! A view borrows the recorder mutably, so it cannot outlive a write that
//! retires the node it points at. Reads go straight to the live tree;
//! writes go through the recorder.

use crate::mutate::ContainerKey;
use crate::patch::{ArrayOperation, PatchError};
use crate::value::{Entries, Kind, List, MapKey, Members, Record, Value};

use super::{NodeId, Recorder};

fn field_key(key: &str) -> ContainerKey {
    ContainerKey::Field(key.to_string())
}

fn index_key(index: usize) -> ContainerKey {
    ContainerKey::Index(index)
}

fn entry_key(key: impl Into<MapKey>) -> ContainerKey {
    ContainerKey::Entry(key.into())
}

/// Child accessors shared by the views whose entries are addressable.
macro_rules! child_accessors {
    ($view:ident, $key:ty, $to_key:path) => {
        impl<'r> $view<'r> {
            /// Opens the container under `key`. `None` for an absent key or
            /// a scalar.
            pub fn child(&mut self, key: $key) -> Result<Option<View<'_>>, PatchError> {
                match self.rec.open(self.node, $to_key(key), None)? {
                    Some((id, kind)) => Ok(View::of(self.rec, id, kind)),
                    None => Ok(None),
                }
            }

            pub fn get_object(&mut self, key: $key) -> Result<Option<ObjectView<'_>>, PatchError> {
                match self.rec.open(self.node, $to_key(key), Some(Kind::Object))? {
                    Some((id, _)) => Ok(Some(ObjectView::new(self.rec, id))),
                    None => Ok(None),
                }
            }

            pub fn get_array(&mut self, key: $key) -> Result<Option<ArrayView<'_>>, PatchError> {
                match self.rec.open(self.node, $to_key(key), Some(Kind::Array))? {
                    Some((id, _)) => Ok(Some(ArrayView::new(self.rec, id))),
                    None => Ok(None),
                }
            }

            pub fn get_map(&mut self, key: $key) -> Result<Option<MapView<'_>>, PatchError> {
                match self.rec.open(self.node, $to_key(key), Some(Kind::Map))? {
                    Some((id, _)) => Ok(Some(MapView::new(self.rec, id))),
                    None => Ok(None),
                }
            }

            pub fn get_set(&mut self, key: $key) -> Result<Option<SetView<'_>>, PatchError> {
                match self.rec.open(self.node, $to_key(key), Some(Kind::Set))? {
                    Some((id, _)) => Ok(Some(SetView::new(self.rec, id))),
                    None => Ok(None),
                }
            }
        }
    };
}

// ── View ──────────────────────────────────────────────────────────────────

/// A view over a container of any kind.
#[derive(Debug)]
pub enum View<'r> {
    Object(ObjectView<'r>),
    Array(ArrayView<'r>),
    Map(MapView<'r>),
    Set(SetView<'r>),
}

impl<'r> View<'r> {
    fn of(rec: &'r mut Recorder, node: NodeId, kind: Kind) -> Option<View<'r>> {
        match kind {
            Kind::Object => Some(View::Object(ObjectView::new(rec, node))),
            Kind::Array => Some(View::Array(ArrayView::new(rec, node))),
            Kind::Map => Some(View::Map(MapView::new(rec, node))),
            Kind::Set => Some(View::Set(SetView::new(rec, node))),
            Kind::Scalar => None,
        }
    }

    pub fn node_id(&self) -> NodeId {
        match self {
            View::Object(v) => v.node,
            View::Array(v) => v.node,
            View::Map(v) => v.node,
            View::Set(v) => v.node,
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            View::Object(_) => Kind::Object,
            View::Array(_) => Kind::Array,
            View::Map(_) => Kind::Map,
            View::Set(_) => Kind::Set,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        let (rec, node) = match self {
            View::Object(v) => (&*v.rec, v.node),
            View::Array(v) => (&*v.rec, v.node),
            View::Map(v) => (&*v.rec, v.node),
            View::Set(v) => (&*v.rec, v.node),
        };
        rec.node_value(node).ok()
    }

    pub fn into_object(self) -> Option<ObjectView<'r>> {
        match self {
            View::Object(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<ArrayView<'r>> {
        match self {
            View::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_map(self) -> Option<MapView<'r>> {
        match self {
            View::Map(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_set(self) -> Option<SetView<'r>> {
        match self {
            View::Set(v) => Some(v),
            _ => None,
        }
    }
}

// ── Object ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ObjectView<'r> {
    rec: &'r mut Recorder,
    node: NodeId,
}

impl<'r> ObjectView<'r> {
    pub(crate) fn new(rec: &'r mut Recorder, node: NodeId) -> Self {
        ObjectView { rec, node }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    fn record(&self) -> Option<&Record> {
        self.rec.node_value(self.node).ok()?.as_object()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.record()?.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.record().is_some_and(|r| r.contains_key(key))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> + '_ {
        self.record().into_iter().flat_map(|r| r.keys())
    }

    pub fn len(&self) -> usize {
        self.record().map_or(0, Record::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Assigns `key` and returns the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Result<Option<Value>, PatchError> {
        self.rec
            .write_entry(self.node, ContainerKey::Field(key.into()), value)
    }

    /// Deletes `key`. Nothing is recorded when the key is absent.
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, PatchError> {
        self.rec.remove_entry(self.node, field_key(key))
    }
}

child_accessors!(ObjectView, &str, field_key);

// ── Array ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ArrayView<'r> {
    rec: &'r mut Recorder,
    node: NodeId,
}

impl<'r> ArrayView<'r> {
    pub(crate) fn new(rec: &'r mut Recorder, node: NodeId) -> Self {
        ArrayView { rec, node }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    fn list(&self) -> Option<&List> {
        self.rec.node_value(self.node).ok()?.as_array()
    }

    pub fn as_slice(&self) -> &[Value] {
        self.list().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.list()?.get(index)
    }

    pub fn len(&self) -> usize {
        self.list().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn edit(&mut self, op: ArrayOperation) -> Result<Vec<Value>, PatchError> {
        self.rec.edit_list(self.node, op)
    }

    /// Assigns slot `index`, padding with `Null` past the end.
    pub fn set(&mut self, index: usize, value: Value) -> Result<Option<Value>, PatchError> {
        Ok(self
            .edit(ArrayOperation::Set { index, value })?
            .into_iter()
            .next())
    }

    /// Empties slot `index`, leaving `Null` in place.
    pub fn delete(&mut self, index: usize) -> Result<Option<Value>, PatchError> {
        Ok(self.edit(ArrayOperation::Delete { index })?.into_iter().next())
    }

    pub fn push(&mut self, value: Value) -> Result<(), PatchError> {
        let start = self.len();
        self.splice(start, 0, vec![value])?;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Option<Value>, PatchError> {
        match self.len() {
            0 => Ok(None),
            len => Ok(self.splice(len - 1, 1, Vec::new())?.pop()),
        }
    }

    /// Inserts at `index`, shifting later elements up.
    pub fn insert(&mut self, index: usize, value: Value) -> Result<(), PatchError> {
        if index > self.len() {
            return Err(PatchError::InvalidKey(index.to_string()));
        }
        self.splice(index, 0, vec![value])?;
        Ok(())
    }

    /// Removes the element at `index`, shifting later elements down.
    pub fn remove(&mut self, index: usize) -> Result<Option<Value>, PatchError> {
        if index >= self.len() {
            return Ok(None);
        }
        Ok(self.splice(index, 1, Vec::new())?.pop())
    }

    /// Removes up to `delete_count` elements from `start`, inserts `items`
    /// there and returns the removed elements.
    pub fn splice(
        &mut self,
        start: usize,
        delete_count: usize,
        items: Vec<Value>,
    ) -> Result<Vec<Value>, PatchError> {
        self.edit(ArrayOperation::Splice {
            start,
            delete_count,
            items,
        })
    }

    pub fn shift(&mut self) -> Result<Option<Value>, PatchError> {
        Ok(self.edit(ArrayOperation::Shift)?.into_iter().next())
    }

    pub fn unshift(&mut self, items: Vec<Value>) -> Result<(), PatchError> {
        self.edit(ArrayOperation::Unshift { items })?;
        Ok(())
    }

    pub fn reverse(&mut self) -> Result<(), PatchError> {
        let len = self.len();
        self.edit(ArrayOperation::Reverse { len })?;
        Ok(())
    }
}

child_accessors!(ArrayView, usize, index_key);

// ── Map ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct MapView<'r> {
    rec: &'r mut Recorder,
    node: NodeId,
}

impl<'r> MapView<'r> {
    pub(crate) fn new(rec: &'r mut Recorder, node: NodeId) -> Self {
        MapView { rec, node }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    fn entries(&self) -> Option<&Entries> {
        self.rec.node_value(self.node).ok()?.as_map()
    }

    pub fn get(&self, key: impl Into<MapKey>) -> Option<&Value> {
        self.entries()?.get(&key.into())
    }

    pub fn contains_key(&self, key: impl Into<MapKey>) -> bool {
        let key = key.into();
        self.entries().is_some_and(|e| e.contains_key(&key))
    }

    pub fn keys(&self) -> impl Iterator<Item = &MapKey> + '_ {
        self.entries().into_iter().flat_map(|e| e.keys())
    }

    pub fn len(&self) -> usize {
        self.entries().map_or(0, Entries::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&mut self, key: impl Into<MapKey>, value: Value) -> Result<Option<Value>, PatchError> {
        self.rec.write_entry(self.node, entry_key(key), value)
    }

    pub fn remove(&mut self, key: impl Into<MapKey>) -> Result<Option<Value>, PatchError> {
        self.rec.remove_entry(self.node, entry_key(key))
    }

    /// Removes every entry. Returns false when the map was already empty.
    pub fn clear(&mut self) -> Result<bool, PatchError> {
        self.rec.clear_entries(self.node)
    }
}

child_accessors!(MapView, impl Into<MapKey>, entry_key);

// ── Set ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct SetView<'r> {
    rec: &'r mut Recorder,
    node: NodeId,
}

impl<'r> SetView<'r> {
    pub(crate) fn new(rec: &'r mut Recorder, node: NodeId) -> Self {
        SetView { rec, node }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    fn members_set(&self) -> Option<&Members> {
        self.rec.node_value(self.node).ok()?.as_set()
    }

    pub fn contains(&self, key: impl Into<MapKey>) -> bool {
        let key = key.into();
        self.members_set().is_some_and(|m| m.contains(&key))
    }

    pub fn members(&self) -> impl Iterator<Item = &MapKey> + '_ {
        self.members_set().into_iter().flat_map(|m| m.iter())
    }

    pub fn len(&self) -> usize {
        self.members_set().map_or(0, Members::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds `key`. Returns false, recording nothing, if it was present.
    pub fn add(&mut self, key: impl Into<MapKey>) -> Result<bool, PatchError> {
        let key = key.into();
        if self.contains(key.clone()) {
            return Ok(false);
        }
        self.rec
            .write_entry(self.node, ContainerKey::Entry(key), Value::Null)?;
        Ok(true)
    }

    /// Removes `key`. Returns false, recording nothing, if it was absent.
    pub fn remove(&mut self, key: impl Into<MapKey>) -> Result<bool, PatchError> {
        Ok(self.rec.remove_entry(self.node, entry_key(key))?.is_some())
    }

    pub fn clear(&mut self) -> Result<bool, PatchError> {
        self.rec.clear_entries(self.node)
    }
}
