//! Recording engine.
//!
//! A [`Recorder`] owns a tree and hands out views over its containers.
//! Every write made through a view lands in the live tree and, at the same
//! time, in one patch fragment per subscriber. [`Recorder::finish_for`]
//! collects the fragments of a subscriber into one [`Patch`], narrowed by
//! that subscriber's [`Filter`], and starts a fresh, empty one.
//!
//! ```
//! use treesync::record::Recorder;
//! use treesync::{apply, Value};
//!
//! let base = Value::from(serde_json::json!({"todo": ["a"], "done": 0}));
//! let mut rec = Recorder::new(base.clone()).unwrap();
//! {
//!     let mut root = rec.object().unwrap();
//!     root.insert("done", Value::Int(1)).unwrap();
//!     let mut todo = root.get_array("todo").unwrap().unwrap();
//!     todo.push(Value::from("b")).unwrap();
//! }
//! let patch = rec.finish().unwrap().unwrap();
//! assert_eq!(&apply(&base, &patch).unwrap(), rec.value());
//! assert_eq!(rec.finish().unwrap(), None);
//! ```

mod tracker;
mod view;

pub use tracker::NodeId;
pub use view::{ArrayView, MapView, ObjectView, SetView, View};

use crate::mutate::{
    apply_array_op, container_clear, container_get, container_get_mut, container_remove,
    container_set, ContainerKey,
};
use crate::patch::{apply, filter, ArrayOperation, Deletion, Filter, Patch, PatchError};
use crate::value::{Kind, MapKey, Value};

use tracker::Arena;

/// Subscriber id used by [`Recorder::new`] and [`Recorder::finish`].
pub const DEFAULT_SUBSCRIBER: &str = "";

#[derive(Debug)]
struct Subscriber {
    id: String,
    filter: Option<Filter>,
    /// Finished, and nothing was written since.
    settled: bool,
}

/// A recording session over one tree.
#[derive(Debug)]
pub struct Recorder {
    root: Value,
    arena: Arena,
    subscribers: Vec<Subscriber>,
}

impl Recorder {
    /// Starts a session with a single unfiltered subscriber.
    pub fn new(tree: Value) -> Result<Recorder, PatchError> {
        Recorder::build(
            tree,
            vec![Subscriber {
                id: DEFAULT_SUBSCRIBER.to_string(),
                filter: None,
                settled: false,
            }],
        )
    }

    /// Starts a session with one subscriber per `(id, filter)` pair.
    ///
    /// Only the listed ids can be finished. A filter that can hide keys is
    /// rejected for a list root.
    pub fn with_filters<S, I>(tree: Value, filters: I) -> Result<Recorder, PatchError>
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, Filter)>,
    {
        let subscribers: Vec<Subscriber> = filters
            .into_iter()
            .map(|(id, filter)| Subscriber {
                id: id.into(),
                filter: Some(filter),
                settled: false,
            })
            .collect();
        if tree.kind() == Kind::Array
            && subscribers
                .iter()
                .any(|s| s.filter.as_ref().is_some_and(|f| !f.admits_all()))
        {
            return Err(PatchError::UnsupportedFilterShape);
        }
        Recorder::build(tree, subscribers)
    }

    fn build(tree: Value, subscribers: Vec<Subscriber>) -> Result<Recorder, PatchError> {
        if !tree.is_container() {
            return Err(PatchError::mismatch(Kind::Object, tree.kind()));
        }
        let arena = Arena::with_root(tree.kind(), subscribers.len())?;
        log::debug!(
            "recording {} root for {} subscriber(s)",
            tree.kind(),
            subscribers.len()
        );
        Ok(Recorder {
            root: tree,
            arena,
            subscribers,
        })
    }

    /// The live tree, with every write made so far.
    pub fn value(&self) -> &Value {
        &self.root
    }

    /// Ends the session and returns the live tree.
    pub fn into_value(self) -> Value {
        self.root
    }

    /// Number of containers currently tracked, the root included.
    pub fn tracked(&self) -> usize {
        self.arena.len()
    }

    // ── Root views ────────────────────────────────────────────────────────

    pub fn view(&mut self) -> View<'_> {
        match self.root.kind() {
            Kind::Array => View::Array(ArrayView::new(self, NodeId::ROOT)),
            Kind::Map => View::Map(MapView::new(self, NodeId::ROOT)),
            Kind::Set => View::Set(SetView::new(self, NodeId::ROOT)),
            _ => View::Object(ObjectView::new(self, NodeId::ROOT)),
        }
    }

    pub fn object(&mut self) -> Result<ObjectView<'_>, PatchError> {
        self.expect_root(Kind::Object)?;
        Ok(ObjectView::new(self, NodeId::ROOT))
    }

    pub fn array(&mut self) -> Result<ArrayView<'_>, PatchError> {
        self.expect_root(Kind::Array)?;
        Ok(ArrayView::new(self, NodeId::ROOT))
    }

    pub fn map(&mut self) -> Result<MapView<'_>, PatchError> {
        self.expect_root(Kind::Map)?;
        Ok(MapView::new(self, NodeId::ROOT))
    }

    pub fn set(&mut self) -> Result<SetView<'_>, PatchError> {
        self.expect_root(Kind::Set)?;
        Ok(SetView::new(self, NodeId::ROOT))
    }

    fn expect_root(&self, kind: Kind) -> Result<(), PatchError> {
        match self.root.kind() {
            found if found == kind => Ok(()),
            found => Err(PatchError::mismatch(kind, found)),
        }
    }

    // ── Finishing ─────────────────────────────────────────────────────────

    /// Finishes the default subscriber.
    pub fn finish(&mut self) -> Result<Option<Patch>, PatchError> {
        self.finish_for(DEFAULT_SUBSCRIBER)
    }

    /// Returns the patch recorded for subscriber `id` since its last finish,
    /// or `None` if nothing visible to it changed, and starts a new one.
    pub fn finish_for(&mut self, id: &str) -> Result<Option<Patch>, PatchError> {
        let sub = self
            .subscribers
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| PatchError::UnknownSubscriber(id.to_string()))?;
        let patch = self.materialize(NodeId::ROOT, sub)?;
        let subscriber = &mut self.subscribers[sub];
        subscriber.settled = true;
        let patch = match &subscriber.filter {
            Some(f) => filter(&patch, f)?,
            None => patch,
        };
        if patch.is_empty() {
            log::trace!("nothing to finish for {id:?}");
            return Ok(None);
        }
        log::debug!("finished {} patch for {id:?}", patch.kind());
        Ok(Some(patch))
    }

    /// Like [`Recorder::finish`], but a second finish with no write in
    /// between is an error instead of `None`.
    pub fn finish_strict(&mut self) -> Result<Option<Patch>, PatchError> {
        let settled = self
            .subscribers
            .iter()
            .find(|s| s.id == DEFAULT_SUBSCRIBER)
            .is_some_and(|s| s.settled);
        if settled {
            return Err(PatchError::DoubleFinish);
        }
        self.finish()
    }

    /// Takes the fragment of `node` for `sub` together with those of its
    /// linked children, and re-arms the links for the next round.
    fn materialize(&mut self, node: NodeId, sub: usize) -> Result<Patch, PatchError> {
        let tracker = self.arena.get_mut(node)?;
        let parent = tracker.parent;
        let fragment = tracker
            .fragments
            .get_mut(sub)
            .ok_or(PatchError::TargetMissing)?;
        let empty = fragment.patch.empty_like();
        let mut patch = std::mem::replace(&mut fragment.patch, empty);
        let linked = std::mem::take(&mut fragment.linked);
        fragment.link = parent;

        for child in linked {
            let position = self.arena.get(child)?.position.clone();
            let child_patch = self.materialize(child, sub)?;
            if child_patch.is_empty() {
                continue;
            }
            match position {
                Some(position) => attach(&mut patch, position, child_patch)?,
                None => return Err(PatchError::TargetMissing),
            }
        }
        Ok(patch)
    }

    // ── Navigation ────────────────────────────────────────────────────────

    pub(crate) fn node_value(&self, node: NodeId) -> Result<&Value, PatchError> {
        let mut value = &self.root;
        for key in self.arena.path_of(node)? {
            value = container_get(value, &key)?.ok_or(PatchError::TargetMissing)?;
        }
        Ok(value)
    }

    fn node_value_mut(&mut self, node: NodeId) -> Result<&mut Value, PatchError> {
        let path = self.arena.path_of(node)?;
        let mut value = &mut self.root;
        for key in &path {
            value = container_get_mut(value, key)?.ok_or(PatchError::TargetMissing)?;
        }
        Ok(value)
    }

    /// Opens the container stored under `key` of `parent`.
    ///
    /// `None` when the key is absent or holds a scalar; a container of
    /// another kind than `expected` is a mismatch.
    pub(crate) fn open(
        &mut self,
        parent: NodeId,
        key: ContainerKey,
        expected: Option<Kind>,
    ) -> Result<Option<(NodeId, Kind)>, PatchError> {
        let found = match container_get(self.node_value(parent)?, &key)? {
            Some(value) => value.kind(),
            None => return Ok(None),
        };
        match expected {
            Some(kind) if kind != found => return Err(PatchError::mismatch(kind, found)),
            _ => {}
        }
        if !found.is_container() {
            return Ok(None);
        }
        let id = self.arena.open(parent, key, found)?;
        Ok(Some((id, self.arena.get(id)?.kind)))
    }

    // ── Recording ─────────────────────────────────────────────────────────

    /// Runs `edit` on every fragment of `node`, then links the node.
    fn record<F>(&mut self, node: NodeId, mut edit: F) -> Result<(), PatchError>
    where
        F: FnMut(&mut Patch) -> Result<(), PatchError>,
    {
        for fragment in &mut self.arena.get_mut(node)?.fragments {
            edit(&mut fragment.patch)?;
        }
        for sub in 0..self.subscribers.len() {
            self.arena.mark_changed(node, sub)?;
            self.subscribers[sub].settled = false;
        }
        Ok(())
    }

    pub(crate) fn write_entry(
        &mut self,
        node: NodeId,
        key: ContainerKey,
        value: Value,
    ) -> Result<Option<Value>, PatchError> {
        let previous = container_set(self.node_value_mut(node)?, key.clone(), value.clone())?;
        self.arena.retire(node, &key)?;
        self.record(node, |patch| {
            match (patch, &key) {
                (Patch::Object(p), ContainerKey::Field(k)) => {
                    p.delete.shift_remove(k);
                    p.set.insert(k.clone(), value.clone());
                }
                (Patch::Map(p), ContainerKey::Entry(k)) => {
                    p.delete.remove(k);
                    p.set.insert(k.clone(), value.clone());
                }
                (Patch::Set(p), ContainerKey::Entry(k)) => {
                    p.delete.remove(k);
                    p.add.insert(k.clone());
                }
                (patch, key) => return Err(misplaced(patch, key)),
            }
            Ok(())
        })?;
        Ok(previous)
    }

    pub(crate) fn remove_entry(
        &mut self,
        node: NodeId,
        key: ContainerKey,
    ) -> Result<Option<Value>, PatchError> {
        let Some(previous) = container_remove(self.node_value_mut(node)?, &key)? else {
            return Ok(None);
        };
        self.arena.retire(node, &key)?;
        self.record(node, |patch| {
            match (patch, &key) {
                (Patch::Object(p), ContainerKey::Field(k)) => {
                    p.set.shift_remove(k);
                    p.delete.insert(k.clone());
                }
                (Patch::Map(p), ContainerKey::Entry(k)) => {
                    p.set.shift_remove(k);
                    p.delete.insert(k.clone());
                }
                (Patch::Set(p), ContainerKey::Entry(k)) => {
                    p.add.shift_remove(k);
                    p.delete.insert(k.clone());
                }
                (patch, key) => return Err(misplaced(patch, key)),
            }
            Ok(())
        })?;
        Ok(Some(previous))
    }

    /// Empties a map or set node. Returns false when it was already empty.
    pub(crate) fn clear_entries(&mut self, node: NodeId) -> Result<bool, PatchError> {
        let target = self.node_value_mut(node)?;
        let len = match &*target {
            Value::Map(entries) => entries.len(),
            Value::Set(members) => members.len(),
            other => return Err(PatchError::mismatch(Kind::Map, other.kind())),
        };
        if len == 0 {
            return Ok(false);
        }
        container_clear(target)?;
        self.arena.retire_all(node)?;
        self.record(node, |patch| {
            match patch {
                Patch::Map(p) => {
                    p.set.clear();
                    p.delete = Deletion::All;
                }
                Patch::Set(p) => {
                    p.add.clear();
                    p.delete = Deletion::All;
                }
                other => return Err(PatchError::mismatch(Kind::Map, other.kind())),
            }
            Ok(())
        })?;
        Ok(true)
    }

    /// Runs one positional edit on a list node and returns the values it
    /// displaced. Edits that change nothing are not recorded.
    pub(crate) fn edit_list(
        &mut self,
        node: NodeId,
        op: ArrayOperation,
    ) -> Result<Vec<Value>, PatchError> {
        let target = self.node_value_mut(node)?;
        let found = target.kind();
        let Value::Array(list) = target else {
            return Err(PatchError::mismatch(Kind::Array, found));
        };
        let Some(op) = normalize(op, list.len()) else {
            return Ok(Vec::new());
        };
        let displaced = apply_array_op(std::sync::Arc::make_mut(list), &op)?;
        self.arena.remap_children(node, &op)?;
        self.record(node, |patch| match patch {
            Patch::Array(p) => {
                p.ops.push(op.clone());
                Ok(())
            }
            other => Err(PatchError::mismatch(Kind::Array, other.kind())),
        })?;
        Ok(displaced)
    }
}

/// Clamps `op` to a list of `len` elements; `None` when it changes nothing.
fn normalize(op: ArrayOperation, len: usize) -> Option<ArrayOperation> {
    match op {
        ArrayOperation::Delete { index } if index >= len => None,
        ArrayOperation::Splice {
            start,
            delete_count,
            items,
        } => {
            let start = start.min(len);
            let delete_count = delete_count.min(len - start);
            if delete_count == 0 && items.is_empty() {
                return None;
            }
            Some(ArrayOperation::Splice {
                start,
                delete_count,
                items,
            })
        }
        ArrayOperation::Shift if len == 0 => None,
        ArrayOperation::Unshift { items } if items.is_empty() => None,
        ArrayOperation::Reverse { .. } if len < 2 => None,
        ArrayOperation::Reverse { .. } => Some(ArrayOperation::Reverse { len }),
        op => Some(op),
    }
}

fn misplaced(patch: &Patch, key: &ContainerKey) -> PatchError {
    PatchError::InvalidKey(format!("{key:?} on {}", patch.kind()))
}

/// Attaches a child patch at `position`, folding it into a value the parent
/// patch already assigns there.
fn attach(parent: &mut Patch, position: ContainerKey, child: Patch) -> Result<(), PatchError> {
    match (parent, position) {
        (Patch::Object(p), ContainerKey::Field(k)) => match p.set.get_mut(&k) {
            Some(assigned) => *assigned = apply(assigned, &child)?,
            None => {
                p.children.insert(k, child);
            }
        },
        (Patch::Array(p), ContainerKey::Index(i)) => {
            p.children.insert(i, child);
        }
        (Patch::Map(p), ContainerKey::Entry(k)) => match p.set.get_mut(&k) {
            Some(assigned) => *assigned = apply(assigned, &child)?,
            None => match k {
                MapKey::Str(s) => {
                    p.children.insert(s, child);
                }
                MapKey::Num(n) => {
                    p.children_by_numeric_key.insert(n, child);
                }
            },
        },
        (parent, position) => return Err(misplaced(parent, &position)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{MapPatch, ObjectPatch, Rule, SetPatch};
    use serde_json::json;

    fn tree(v: serde_json::Value) -> Value {
        Value::from(v)
    }

    /// Finishes and checks that the patch replays the live tree.
    fn finish_checked(rec: &mut Recorder, base: &Value) -> Option<Patch> {
        let patch = rec.finish().unwrap();
        if let Some(patch) = &patch {
            assert_eq!(&apply(base, patch).unwrap(), rec.value());
        }
        patch
    }

    #[test]
    fn non_container_root_is_rejected() {
        assert_eq!(
            Recorder::new(Value::Int(1)).unwrap_err(),
            PatchError::mismatch(Kind::Object, Kind::Scalar)
        );
    }

    #[test]
    fn read_only_traversal_yields_nothing() {
        let base = tree(json!({"a": {"b": {"c": [1, 2]}}, "d": 1}));
        let mut rec = Recorder::new(base).unwrap();
        {
            let mut root = rec.object().unwrap();
            assert_eq!(root.get("d"), Some(&Value::Int(1)));
            let mut a = root.get_object("a").unwrap().unwrap();
            let mut b = a.get_object("b").unwrap().unwrap();
            let c = b.get_array("c").unwrap().unwrap();
            assert_eq!(c.len(), 2);
        }
        assert_eq!(rec.tracked(), 4);
        assert_eq!(rec.finish().unwrap(), None);
    }

    #[test]
    fn repeated_reads_return_the_same_node() {
        let mut rec = Recorder::new(tree(json!({"a": {"x": 1}}))).unwrap();
        let mut root = rec.object().unwrap();
        let first = root.get_object("a").unwrap().unwrap().node_id();
        let second = root.get_object("a").unwrap().unwrap().node_id();
        assert_eq!(first, second);
        assert_eq!(rec.tracked(), 2);
    }

    #[test]
    fn nested_write_links_only_the_changed_branch() {
        let base = tree(json!({"a": {"b": {"n": 1}}, "quiet": {"m": 1}}));
        let mut rec = Recorder::new(base.clone()).unwrap();
        {
            let mut root = rec.object().unwrap();
            root.get_object("quiet").unwrap().unwrap();
            let mut a = root.get_object("a").unwrap().unwrap();
            let mut b = a.get_object("b").unwrap().unwrap();
            b.insert("n", Value::Int(2)).unwrap();
        }
        let patch = finish_checked(&mut rec, &base).unwrap();

        let mut b = ObjectPatch::default();
        b.set.insert("n".into(), Value::Int(2));
        let mut a = ObjectPatch::default();
        a.children.insert("b".into(), Patch::Object(b));
        let mut expected = ObjectPatch::default();
        expected.children.insert("a".into(), Patch::Object(a));
        assert_eq!(patch, Patch::Object(expected));
    }

    #[test]
    fn finish_resets_and_is_idempotent() {
        let base = tree(json!({"a": {"n": 1}}));
        let mut rec = Recorder::new(base).unwrap();
        rec.object()
            .unwrap()
            .get_object("a")
            .unwrap()
            .unwrap()
            .insert("n", Value::Int(2))
            .unwrap();
        assert!(rec.finish().unwrap().is_some());
        assert_eq!(rec.finish().unwrap(), None);
        assert_eq!(rec.finish().unwrap(), None);

        // Links are re-armed: a later write under the same node shows up.
        let after_first = rec.value().clone();
        rec.object()
            .unwrap()
            .get_object("a")
            .unwrap()
            .unwrap()
            .insert("n", Value::Int(3))
            .unwrap();
        let patch = rec.finish().unwrap().unwrap();
        assert_eq!(&apply(&after_first, &patch).unwrap(), rec.value());
    }

    #[test]
    fn strict_finish_rejects_a_second_call() {
        let mut rec = Recorder::new(tree(json!({}))).unwrap();
        assert_eq!(rec.finish_strict().unwrap(), None);
        assert_eq!(rec.finish_strict(), Err(PatchError::DoubleFinish));
        rec.object().unwrap().insert("k", Value::Null).unwrap();
        assert!(rec.finish_strict().unwrap().is_some());
        assert_eq!(rec.finish_strict(), Err(PatchError::DoubleFinish));
    }

    #[test]
    fn overwriting_retires_the_old_subtree() {
        let base = tree(json!({"a": {"b": {"c": 1}}}));
        let mut rec = Recorder::new(base.clone()).unwrap();
        {
            let mut root = rec.object().unwrap();
            let mut a = root.get_object("a").unwrap().unwrap();
            a.get_object("b").unwrap().unwrap().insert("c", Value::Int(2)).unwrap();
        }
        assert_eq!(rec.tracked(), 3);
        rec.object().unwrap().insert("a", tree(json!({"fresh": true}))).unwrap();
        assert_eq!(rec.tracked(), 1);

        let patch = finish_checked(&mut rec, &base).unwrap();
        let mut expected = ObjectPatch::default();
        expected.set.insert("a".into(), tree(json!({"fresh": true})));
        assert_eq!(patch, Patch::Object(expected));
    }

    #[test]
    fn edits_under_a_fresh_assignment_fold_into_the_set() {
        let base = tree(json!({}));
        let mut rec = Recorder::new(base.clone()).unwrap();
        {
            let mut root = rec.object().unwrap();
            root.insert("list", tree(json!([1]))).unwrap();
            root.get_array("list").unwrap().unwrap().push(Value::Int(2)).unwrap();
        }
        let patch = finish_checked(&mut rec, &base).unwrap();
        let mut expected = ObjectPatch::default();
        expected.set.insert("list".into(), tree(json!([1, 2])));
        assert_eq!(patch, Patch::Object(expected));
    }

    #[test]
    fn remove_of_absent_key_records_nothing() {
        let mut rec = Recorder::new(tree(json!({"a": 1}))).unwrap();
        assert_eq!(rec.object().unwrap().remove("zzz").unwrap(), None);
        assert_eq!(rec.finish().unwrap(), None);
        assert_eq!(rec.object().unwrap().remove("a").unwrap(), Some(Value::Int(1)));
        let Some(Patch::Object(p)) = rec.finish().unwrap() else {
            panic!("expected an object patch");
        };
        assert!(p.delete.contains("a"));
    }

    #[test]
    fn set_then_delete_keeps_only_the_delete() {
        let mut rec = Recorder::new(tree(json!({"a": 1}))).unwrap();
        {
            let mut root = rec.object().unwrap();
            root.insert("a", Value::Int(2)).unwrap();
            root.remove("a").unwrap();
            root.insert("b", Value::Int(3)).unwrap();
        }
        let mut expected = ObjectPatch::default();
        expected.delete.insert("a".into());
        expected.set.insert("b".into(), Value::Int(3));
        assert_eq!(rec.finish().unwrap(), Some(Patch::Object(expected)));
    }

    #[test]
    fn list_children_follow_reorders() {
        let base = tree(json!([{"id": 0}, {"id": 1}, {"id": 2}]));
        let mut rec = Recorder::new(base.clone()).unwrap();
        {
            let mut list = rec.array().unwrap();
            list.get_object(0).unwrap().unwrap().insert("hit", Value::Bool(true)).unwrap();
            list.get_object(2).unwrap().unwrap().insert("hit", Value::Bool(true)).unwrap();
            list.reverse().unwrap();
            list.splice(0, 1, vec![Value::Int(9)]).unwrap();
        }
        let patch = finish_checked(&mut rec, &base).unwrap();
        let Patch::Array(p) = &patch else {
            panic!("expected an array patch");
        };
        assert_eq!(
            p.ops,
            vec![
                ArrayOperation::Reverse { len: 3 },
                ArrayOperation::Splice {
                    start: 0,
                    delete_count: 1,
                    items: vec![Value::Int(9)]
                },
            ]
        );
        // Element 0 ended at position 2; element 2 was spliced out.
        assert_eq!(p.children.keys().copied().collect::<Vec<_>>(), vec![2]);
        assert_eq!(
            rec.value(),
            &tree(json!([9, {"id": 1}, {"id": 0, "hit": true}]))
        );
    }

    #[test]
    fn list_edits_that_change_nothing_are_skipped() {
        let mut rec = Recorder::new(tree(json!([]))).unwrap();
        {
            let mut list = rec.array().unwrap();
            assert_eq!(list.pop().unwrap(), None);
            assert_eq!(list.shift().unwrap(), None);
            list.reverse().unwrap();
            list.unshift(Vec::new()).unwrap();
            assert_eq!(list.delete(3).unwrap(), None);
            assert!(list.splice(5, 2, Vec::new()).unwrap().is_empty());
        }
        assert_eq!(rec.finish().unwrap(), None);
    }

    #[test]
    fn list_set_and_delete_keep_positions() {
        let base = tree(json!(["a", "b"]));
        let mut rec = Recorder::new(base.clone()).unwrap();
        {
            let mut list = rec.array().unwrap();
            assert_eq!(list.delete(0).unwrap(), Some(Value::from("a")));
            list.set(3, Value::from("d")).unwrap();
        }
        finish_checked(&mut rec, &base).unwrap();
        assert_eq!(rec.value(), &tree(json!([null, "b", null, "d"])));
    }

    #[test]
    fn map_numeric_and_string_keys_stay_apart() {
        let base = Value::map([
            (MapKey::from("1"), tree(json!({"s": 0}))),
            (MapKey::from(1), tree(json!({"n": 0}))),
        ]);
        let mut rec = Recorder::new(base.clone()).unwrap();
        {
            let mut map = rec.map().unwrap();
            map.get_object("1").unwrap().unwrap().insert("s", Value::Int(1)).unwrap();
            map.get_object(1).unwrap().unwrap().insert("n", Value::Int(1)).unwrap();
        }
        let patch = finish_checked(&mut rec, &base).unwrap();
        let Patch::Map(p) = patch else {
            panic!("expected a map patch");
        };
        assert!(p.children.contains_key("1"));
        assert!(p.children_by_numeric_key.contains_key(&1));
    }

    #[test]
    fn map_clear_then_set() {
        let base = Value::map([("a", tree(json!({}))), ("b", Value::Int(1))]);
        let mut rec = Recorder::new(base.clone()).unwrap();
        {
            let mut map = rec.map().unwrap();
            map.get_object("a").unwrap().unwrap();
            assert!(map.clear().unwrap());
            map.insert("c", Value::Int(2)).unwrap();
        }
        assert_eq!(rec.tracked(), 1);
        let patch = finish_checked(&mut rec, &base).unwrap();
        let expected = MapPatch {
            delete: Deletion::All,
            set: [(MapKey::from("c"), Value::Int(2))].into_iter().collect(),
            ..MapPatch::default()
        };
        assert_eq!(patch, Patch::Map(expected));

        let mut rec = Recorder::new(Value::map(Vec::<(MapKey, Value)>::new())).unwrap();
        assert!(!rec.map().unwrap().clear().unwrap());
        assert_eq!(rec.finish().unwrap(), None);
    }

    #[test]
    fn set_add_and_remove_only_record_changes() {
        let base = Value::set(["a"]);
        let mut rec = Recorder::new(base.clone()).unwrap();
        {
            let mut set = rec.set().unwrap();
            assert!(!set.add("a").unwrap());
            assert!(!set.remove("zz").unwrap());
        }
        assert_eq!(rec.finish().unwrap(), None);
        {
            let mut set = rec.set().unwrap();
            assert!(set.add(7).unwrap());
            assert!(set.remove("a").unwrap());
        }
        let patch = finish_checked(&mut rec, &base).unwrap();
        let mut expected = SetPatch::default();
        expected.add.insert(MapKey::from(7));
        expected.delete.insert(MapKey::from("a"));
        assert_eq!(patch, Patch::Set(expected));
    }

    #[test]
    fn subscribers_see_their_own_slice() {
        let base = tree(json!({"public": {"n": 0}, "secret": 0}));
        let mut rec = Recorder::with_filters(
            base.clone(),
            [
                ("all", Filter::any()),
                ("guest", Filter::keys(["public"])),
                (
                    "no-secrets",
                    Filter::new([("secret", Rule::Exclude)], Rule::Include),
                ),
            ],
        )
        .unwrap();
        {
            let mut root = rec.object().unwrap();
            root.insert("secret", Value::Int(1)).unwrap();
            root.get_object("public").unwrap().unwrap().insert("n", Value::Int(1)).unwrap();
        }
        let all = rec.finish_for("all").unwrap().unwrap();
        assert_eq!(&apply(&base, &all).unwrap(), rec.value());

        let Some(Patch::Object(guest)) = rec.finish_for("guest").unwrap() else {
            panic!("expected an object patch");
        };
        assert!(guest.set.is_empty());
        assert!(guest.children.contains_key("public"));

        // A second round only carries what changed since each finish.
        rec.object().unwrap().insert("secret", Value::Int(2)).unwrap();
        assert_eq!(rec.finish_for("guest").unwrap(), None);
        let Some(Patch::Object(ns)) = rec.finish_for("no-secrets").unwrap() else {
            panic!("expected an object patch");
        };
        assert!(!ns.set.contains_key("secret"));
        assert!(ns.children.contains_key("public"));

        assert_eq!(
            rec.finish(),
            Err(PatchError::UnknownSubscriber(String::new()))
        );
    }

    #[test]
    fn restrictive_filter_on_list_root_is_rejected() {
        let err = Recorder::with_filters(tree(json!([])), [("x", Filter::keys(["0"]))]).unwrap_err();
        assert_eq!(err, PatchError::UnsupportedFilterShape);
        assert!(Recorder::with_filters(tree(json!([])), [("x", Filter::any())]).is_ok());
    }

    #[test]
    fn timestamps_are_recorded_as_plain_sets() {
        let base = tree(json!({}));
        let mut rec = Recorder::new(base.clone()).unwrap();
        {
            let mut root = rec.object().unwrap();
            root.insert("at", Value::Timestamp(5)).unwrap();
            assert!(root.child("at").unwrap().is_none());
        }
        let patch = finish_checked(&mut rec, &base).unwrap();
        assert!(matches!(patch, Patch::Object(p) if p.children.is_empty()));
    }

    #[test]
    fn wrong_kind_accessor_is_a_mismatch() {
        let mut rec = Recorder::new(tree(json!({"a": [1]}))).unwrap();
        let mut root = rec.object().unwrap();
        assert_eq!(
            root.get_object("a").err(),
            Some(PatchError::mismatch(Kind::Object, Kind::Array))
        );
        assert!(root.get_object("missing").unwrap().is_none());
        drop(root);
        assert!(matches!(rec.array(), Err(PatchError::TargetKindMismatch { .. })));
    }

    #[test]
    fn key_of_the_wrong_shape_is_rejected_and_not_recorded() {
        let base = tree(json!({"a": 1}));
        let mut rec = Recorder::new(base.clone()).unwrap();
        assert!(matches!(
            rec.write_entry(NodeId::ROOT, ContainerKey::Index(0), Value::Null),
            Err(PatchError::InvalidKey(_))
        ));
        assert!(matches!(
            rec.remove_entry(NodeId::ROOT, ContainerKey::Entry(MapKey::from("a"))),
            Err(PatchError::InvalidKey(_))
        ));
        assert_eq!(rec.value(), &base);
        assert_eq!(rec.finish().unwrap(), None);

        let mut object = Patch::Object(ObjectPatch::default());
        assert_eq!(
            attach(&mut object, ContainerKey::Index(0), Patch::Object(ObjectPatch::default())),
            Err(misplaced(&Patch::Object(ObjectPatch::default()), &ContainerKey::Index(0)))
        );
        assert!(matches!(
            misplaced(&Patch::Set(SetPatch::default()), &ContainerKey::Field("x".into())),
            PatchError::InvalidKey(msg) if msg.contains("set")
        ));
    }

    #[test]
    fn normalize_clamps_and_drops_no_ops() {
        assert_eq!(
            normalize(
                ArrayOperation::Splice {
                    start: 9,
                    delete_count: 9,
                    items: vec![Value::Null]
                },
                2
            ),
            Some(ArrayOperation::Splice {
                start: 2,
                delete_count: 0,
                items: vec![Value::Null]
            })
        );
        assert_eq!(normalize(ArrayOperation::Reverse { len: 0 }, 4), Some(ArrayOperation::Reverse { len: 4 }));
        assert_eq!(normalize(ArrayOperation::Shift, 0), None);
    }
}
