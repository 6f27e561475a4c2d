//! Tracking side table of a recording session.
//!
//! Every container the caller has opened gets one [`Tracker`] in an arena,
//! addressed by [`NodeId`]. A tracker holds its position under its parent,
//! the ids of the children opened beneath it, and one [`Fragment`] per
//! subscriber with the edits recorded on this node since that subscriber
//! last finished.

use indexmap::{IndexMap, IndexSet};

use crate::mutate::ContainerKey;
use crate::patch::{remap_entries, ArrayOperation, Patch, PatchError, Remapped};
use crate::value::Kind;

/// Handle of a tracked container. Ids of retired nodes may be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

/// Per-subscriber recording state of one node.
#[derive(Debug)]
pub(crate) struct Fragment {
    /// Edits made on this node itself; children are attached on finish.
    pub patch: Patch,
    /// Children that changed since the last finish.
    pub linked: IndexSet<NodeId>,
    /// Parent to link into on the first change. `None` once linked, and
    /// always `None` for the root.
    pub link: Option<NodeId>,
}

impl Fragment {
    fn new(patch: Patch, parent: Option<NodeId>) -> Fragment {
        Fragment {
            patch,
            linked: IndexSet::new(),
            link: parent,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Tracker {
    pub parent: Option<NodeId>,
    /// Key of this node inside its parent; `None` for the root.
    pub position: Option<ContainerKey>,
    pub kind: Kind,
    pub children: IndexMap<ContainerKey, NodeId>,
    pub fragments: Vec<Fragment>,
}

#[derive(Debug, Default)]
pub(crate) struct Arena {
    slots: Vec<Option<Tracker>>,
    free: Vec<usize>,
}

impl Arena {
    /// Creates an arena holding the root tracker.
    pub fn with_root(kind: Kind, subscribers: usize) -> Result<Arena, PatchError> {
        let mut arena = Arena::default();
        let root = arena.alloc(None, None, kind, subscribers)?;
        debug_assert_eq!(root, NodeId::ROOT);
        Ok(arena)
    }

    fn alloc(
        &mut self,
        parent: Option<NodeId>,
        position: Option<ContainerKey>,
        kind: Kind,
        subscribers: usize,
    ) -> Result<NodeId, PatchError> {
        let empty = Patch::empty(kind).ok_or(PatchError::mismatch(Kind::Object, kind))?;
        let tracker = Tracker {
            parent,
            position,
            kind,
            children: IndexMap::new(),
            fragments: (0..subscribers)
                .map(|_| Fragment::new(empty.clone(), parent))
                .collect(),
        };
        let id = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(tracker);
                NodeId(slot)
            }
            None => {
                self.slots.push(Some(tracker));
                NodeId(self.slots.len() - 1)
            }
        };
        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> Result<&Tracker, PatchError> {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(PatchError::TargetMissing)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut Tracker, PatchError> {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(PatchError::TargetMissing)
    }

    pub fn fragment_mut(&mut self, id: NodeId, sub: usize) -> Result<&mut Fragment, PatchError> {
        self.get_mut(id)?
            .fragments
            .get_mut(sub)
            .ok_or(PatchError::TargetMissing)
    }

    /// Number of live trackers.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Path of keys from the root down to `id`.
    pub fn path_of(&self, id: NodeId) -> Result<Vec<ContainerKey>, PatchError> {
        let mut path = Vec::new();
        let mut node = self.get(id)?;
        while let (Some(parent), Some(position)) = (node.parent, &node.position) {
            path.push(position.clone());
            node = self.get(parent)?;
        }
        path.reverse();
        Ok(path)
    }

    /// Returns the tracker cached for `key` under `parent`, creating it on
    /// first access.
    pub fn open(
        &mut self,
        parent: NodeId,
        key: ContainerKey,
        kind: Kind,
    ) -> Result<NodeId, PatchError> {
        let tracker = self.get(parent)?;
        if let Some(&id) = tracker.children.get(&key) {
            return Ok(id);
        }
        let subscribers = tracker.fragments.len();
        let id = self.alloc(Some(parent), Some(key.clone()), kind, subscribers)?;
        log::trace!("tracking {kind} at {key:?} as {id:?}");
        self.get_mut(parent)?.children.insert(key, id);
        Ok(id)
    }

    /// Links `id` into its ancestors for subscriber `sub`, stopping at the
    /// first ancestor that is already linked.
    pub fn mark_changed(&mut self, id: NodeId, sub: usize) -> Result<(), PatchError> {
        let mut node = id;
        while let Some(parent) = self.fragment_mut(node, sub)?.link.take() {
            self.fragment_mut(parent, sub)?.linked.insert(node);
            node = parent;
        }
        Ok(())
    }

    /// Stops tracking the child at `key` under `parent`, with its subtree.
    pub fn retire(&mut self, parent: NodeId, key: &ContainerKey) -> Result<(), PatchError> {
        let Some(id) = self.get_mut(parent)?.children.shift_remove(key) else {
            return Ok(());
        };
        self.detach(parent, id)
    }

    /// Stops tracking every child of `parent`.
    pub fn retire_all(&mut self, parent: NodeId) -> Result<(), PatchError> {
        let children = std::mem::take(&mut self.get_mut(parent)?.children);
        for id in children.into_values() {
            self.detach(parent, id)?;
        }
        Ok(())
    }

    fn detach(&mut self, parent: NodeId, id: NodeId) -> Result<(), PatchError> {
        for fragment in &mut self.get_mut(parent)?.fragments {
            fragment.linked.shift_remove(&id);
        }
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if let Some(tracker) = self.slots.get_mut(node.0).and_then(Option::take) {
                stack.extend(tracker.children.into_values());
                self.free.push(node.0);
            }
        }
        log::trace!("retired {id:?}");
        Ok(())
    }

    /// Re-keys the children of list node `id` through `op`, retiring the
    /// ones whose slot the operation removed.
    pub fn remap_children(&mut self, id: NodeId, op: &ArrayOperation) -> Result<(), PatchError> {
        let children = std::mem::take(&mut self.get_mut(id)?.children);
        let mut positional = std::collections::BTreeMap::new();
        for (key, child) in children {
            match key {
                ContainerKey::Index(i) => {
                    positional.insert(i, child);
                }
                other => return Err(PatchError::InvalidKey(format!("{other:?} on array"))),
            }
        }
        let Remapped { kept, dropped } = remap_entries(positional, op);
        for (_, child) in dropped {
            self.detach(id, child)?;
        }
        let mut children = IndexMap::with_capacity(kept.len());
        for (index, child) in kept {
            self.get_mut(child)?.position = Some(ContainerKey::Index(index));
            children.insert(ContainerKey::Index(index), child);
        }
        self.get_mut(id)?.children = children;
        Ok(())
    }
}
