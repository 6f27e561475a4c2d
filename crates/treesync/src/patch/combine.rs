//! Folding patches into one.
//!
//! `combine(P1..Pn)` yields a patch whose single application equals
//! applying `P1` through `Pn` in order. Patches are folded pairwise with
//! [`append`]:
//!
//! - newer writes win over older ones for the same key;
//! - a delete purges older sets and child patches of that key, a set purges
//!   older deletes and child patches;
//! - a full clear discards everything before it;
//! - list operations are concatenated, after re-keying older positional
//!   child patches through each newer operation.

use std::hash::Hash;

use indexmap::IndexMap;

use crate::value::{MapKey, Value};

use super::apply::apply;
use super::remap::{remap_entries, Remapped};
use super::types::{ArrayPatch, Deletion, MapPatch, ObjectPatch, Patch, PatchError, SetPatch};

/// Folds `patches` (oldest first) into one patch. Inputs are not modified.
///
/// Returns `Ok(None)` for an empty sequence.
pub fn combine<'a, I>(patches: I) -> Result<Option<Patch>, PatchError>
where
    I: IntoIterator<Item = &'a Patch>,
{
    let mut patches = patches.into_iter();
    let Some(first) = patches.next() else {
        return Ok(None);
    };
    let mut combined = first.clone();
    let mut folded = 1usize;
    for patch in patches {
        append(&mut combined, patch)?;
        folded += 1;
    }
    log::debug!("combined {folded} {} patches", combined.kind());
    Ok(Some(combined))
}

/// Folds `addition` into `target`, as if `addition` was recorded after it.
pub fn append(target: &mut Patch, addition: &Patch) -> Result<(), PatchError> {
    match (target, addition) {
        (Patch::Object(t), Patch::Object(a)) => append_object(t, a),
        (Patch::Array(t), Patch::Array(a)) => append_array(t, a),
        (Patch::Map(t), Patch::Map(a)) => append_map(t, a),
        (Patch::Set(t), Patch::Set(a)) => {
            append_set(t, a);
            Ok(())
        }
        (t, a) => Err(PatchError::mismatch(t.kind(), a.kind())),
    }
}

/// Folds a newer child patch for `key` into the target.
///
/// An existing child patch absorbs it; a value the target assigns wholesale
/// is patched directly; otherwise it becomes a new child patch.
fn fold_child<K: Hash + Eq>(
    assigned: Option<&mut Value>,
    children: &mut IndexMap<K, Patch>,
    key: K,
    child: &Patch,
) -> Result<(), PatchError> {
    if let Some(existing) = children.get_mut(&key) {
        return append(existing, child);
    }
    if let Some(value) = assigned {
        *value = apply(value, child)?;
        return Ok(());
    }
    children.insert(key, child.clone());
    Ok(())
}

// ── Per-kind folds ────────────────────────────────────────────────────────

fn append_object(t: &mut ObjectPatch, a: &ObjectPatch) -> Result<(), PatchError> {
    for key in &a.delete {
        t.set.shift_remove(key);
        t.children.shift_remove(key);
        t.delete.insert(key.clone());
    }
    for (key, value) in &a.set {
        t.delete.shift_remove(key);
        // The older in-place edits were made to a value this set replaces.
        t.children.shift_remove(key);
        t.set.insert(key.clone(), value.clone());
    }
    for (key, child) in &a.children {
        fold_child(t.set.get_mut(key), &mut t.children, key.clone(), child)?;
    }
    Ok(())
}

fn append_array(t: &mut ArrayPatch, a: &ArrayPatch) -> Result<(), PatchError> {
    for op in &a.ops {
        let Remapped { kept, dropped } = remap_entries(std::mem::take(&mut t.children), op);
        if !dropped.is_empty() {
            log::trace!("{} discarded {} older child patches", op.name(), dropped.len());
        }
        t.children = kept;
        t.ops.push(op.clone());
    }
    for (index, child) in &a.children {
        match t.children.get_mut(index) {
            Some(existing) => append(existing, child)?,
            None => {
                t.children.insert(*index, child.clone());
            }
        }
    }
    Ok(())
}

fn forget_map_child(t: &mut MapPatch, key: &MapKey) {
    match key {
        MapKey::Str(s) => {
            t.children.shift_remove(s);
        }
        MapKey::Num(n) => {
            t.children_by_numeric_key.shift_remove(n);
        }
    }
}

fn append_map(t: &mut MapPatch, a: &MapPatch) -> Result<(), PatchError> {
    match &a.delete {
        Deletion::All => {
            t.delete = Deletion::All;
            t.set.clear();
            t.children.clear();
            t.children_by_numeric_key.clear();
        }
        Deletion::Keys(keys) => {
            for key in keys {
                t.set.shift_remove(key);
                forget_map_child(t, key);
                t.delete.insert(key.clone());
            }
        }
    }
    for (key, value) in &a.set {
        t.delete.remove(key);
        forget_map_child(t, key);
        t.set.insert(key.clone(), value.clone());
    }
    for (key, child) in &a.children {
        let assigned = t.set.get_mut(&MapKey::Str(key.clone()));
        fold_child(assigned, &mut t.children, key.clone(), child)?;
    }
    for (key, child) in &a.children_by_numeric_key {
        let assigned = t.set.get_mut(&MapKey::Num(*key));
        fold_child(assigned, &mut t.children_by_numeric_key, *key, child)?;
    }
    Ok(())
}

fn append_set(t: &mut SetPatch, a: &SetPatch) {
    match &a.delete {
        Deletion::All => {
            t.delete = Deletion::All;
            t.add.clear();
        }
        Deletion::Keys(keys) => {
            for key in keys {
                t.add.shift_remove(key);
                t.delete.insert(key.clone());
            }
        }
    }
    for key in &a.add {
        t.delete.remove(key);
        t.add.insert(key.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::apply::apply_all;
    use crate::patch::types::ArrayOperation;
    use serde_json::json;

    fn set_a(value: i64) -> ObjectPatch {
        let mut p = ObjectPatch::default();
        p.set.insert("a".into(), Value::Int(value));
        p
    }

    fn marker(key: &str, value: i64) -> Patch {
        let mut p = ObjectPatch::default();
        p.set.insert(key.into(), Value::Int(value));
        Patch::Object(p)
    }

    fn assert_equivalent(base: &Value, patches: &[Patch]) {
        let sequential = apply_all(base, patches).unwrap();
        let combined = combine(patches).unwrap().unwrap();
        assert_eq!(apply(base, &combined).unwrap(), sequential);
    }

    #[test]
    fn empty_sequence_combines_to_none() {
        assert_eq!(combine(&Vec::<Patch>::new()).unwrap(), None);
    }

    #[test]
    fn single_patch_is_copied() {
        let p = Patch::Object(set_a(1));
        assert_eq!(combine([&p]).unwrap(), Some(p));
    }

    #[test]
    fn newer_set_wins() {
        let patches = [Patch::Object(set_a(1)), Patch::Object(set_a(2))];
        let combined = combine(&patches).unwrap().unwrap();
        assert_eq!(combined, Patch::Object(set_a(2)));
    }

    #[test]
    fn set_then_delete_keeps_only_delete() {
        let mut del = ObjectPatch::default();
        del.delete.insert("a".into());
        let patches = [Patch::Object(set_a(1)), Patch::Object(del.clone())];
        assert_eq!(combine(&patches).unwrap().unwrap(), Patch::Object(del));
    }

    #[test]
    fn map_delete_then_set_ends_under_set() {
        let mut del = MapPatch::default();
        del.delete.insert(MapKey::from("k"));
        let mut set = MapPatch::default();
        set.set.insert(MapKey::from("k"), Value::Int(5));
        let patches = [Patch::Map(del), Patch::Map(set.clone())];
        let combined = combine(&patches).unwrap().unwrap();
        assert_eq!(combined, Patch::Map(set));

        let base = Value::map([("k", Value::Int(1)), ("other", Value::Int(2))]);
        assert_equivalent(&base, &patches);
    }

    #[test]
    fn reverse_remaps_older_children() {
        let first = ArrayPatch {
            ops: vec![ArrayOperation::Splice {
                start: 0,
                delete_count: 1,
                items: vec![],
            }],
            children: [(0, marker("a", 1)), (1, marker("b", 2))].into_iter().collect(),
        };
        let second = ArrayPatch {
            ops: vec![ArrayOperation::Reverse { len: 2 }],
            ..ArrayPatch::default()
        };
        let Patch::Array(combined) =
            combine(&[Patch::Array(first.clone()), Patch::Array(second.clone())])
                .unwrap()
                .unwrap()
        else {
            panic!("expected an array patch");
        };
        assert_eq!(combined.children[&0], marker("b", 2));
        assert_eq!(combined.children[&1], marker("a", 1));
        let mut ops = first.ops.clone();
        ops.extend(second.ops.clone());
        assert_eq!(combined.ops, ops);

        let base = Value::from(json!([{}, {}, {}]));
        assert_equivalent(&base, &[Patch::Array(first), Patch::Array(second)]);
    }

    #[test]
    fn reverse_longer_than_the_list_fails_both_ways() {
        let base = Value::from(json!([{"id": 0}, {"id": 1}]));
        let first = ArrayPatch {
            children: [(0, marker("hit", 1))].into_iter().collect(),
            ..ArrayPatch::default()
        };
        let second = ArrayPatch {
            ops: vec![ArrayOperation::Reverse { len: 5 }],
            ..ArrayPatch::default()
        };
        let patches = [Patch::Array(first), Patch::Array(second)];
        assert!(matches!(
            apply_all(&base, &patches),
            Err(PatchError::InvalidKey(_))
        ));
        let combined = combine(&patches).unwrap().unwrap();
        assert!(matches!(
            apply(&base, &combined),
            Err(PatchError::InvalidKey(_))
        ));
    }

    #[test]
    fn overwritten_slot_drops_older_child() {
        let first = ArrayPatch {
            children: [(1, marker("x", 1))].into_iter().collect(),
            ..ArrayPatch::default()
        };
        let second = ArrayPatch {
            ops: vec![ArrayOperation::Set {
                index: 1,
                value: Value::from(json!({"fresh": true})),
            }],
            ..ArrayPatch::default()
        };
        let patches = [Patch::Array(first), Patch::Array(second)];
        let Some(Patch::Array(combined)) = combine(&patches).unwrap() else {
            panic!("expected an array patch");
        };
        assert!(combined.children.is_empty());
        assert_equivalent(&Value::from(json!([{}, {}])), &patches);
    }

    #[test]
    fn reassigned_key_drops_older_child() {
        let mut first = ObjectPatch::default();
        first.children.insert("c".into(), marker("x", 1));
        let mut second = ObjectPatch::default();
        second.set.insert("c".into(), Value::from(json!({"y": 2})));
        let patches = [Patch::Object(first), Patch::Object(second.clone())];
        assert_eq!(combine(&patches).unwrap().unwrap(), Patch::Object(second));
        assert_equivalent(&Value::from(json!({"c": {}})), &patches);
    }

    #[test]
    fn child_of_assigned_key_is_baked_into_value() {
        let mut first = ObjectPatch::default();
        first.set.insert("c".into(), Value::from(json!({"x": 1})));
        let mut second = ObjectPatch::default();
        second.children.insert("c".into(), marker("y", 2));
        let patches = [Patch::Object(first), Patch::Object(second)];
        let combined = combine(&patches).unwrap().unwrap();
        let Patch::Object(combined) = combined else {
            panic!("expected an object patch");
        };
        assert!(combined.children.is_empty());
        assert_eq!(combined.set["c"], Value::from(json!({"x": 1, "y": 2})));
        assert_equivalent(&Value::from(json!({})), &patches);
    }

    #[test]
    fn nested_children_fold_recursively() {
        let mut first = ObjectPatch::default();
        first.children.insert("c".into(), marker("x", 1));
        let mut second = ObjectPatch::default();
        second.children.insert("c".into(), marker("y", 2));
        let patches = [Patch::Object(first), Patch::Object(second)];
        assert_equivalent(&Value::from(json!({"c": {"z": 0}})), &patches);
    }

    #[test]
    fn clear_supersedes_older_entries() {
        let mut first = MapPatch::default();
        first.set.insert(MapKey::from("a"), Value::Int(1));
        first
            .children_by_numeric_key
            .insert(3, marker("x", 1));
        let second = MapPatch {
            delete: Deletion::All,
            ..MapPatch::default()
        };
        let mut third = MapPatch::default();
        third.delete.insert(MapKey::from("zzz"));
        third.set.insert(MapKey::from("b"), Value::Int(2));
        let patches = [Patch::Map(first), Patch::Map(second), Patch::Map(third)];
        let Some(Patch::Map(combined)) = combine(&patches).unwrap() else {
            panic!("expected a map patch");
        };
        assert!(combined.delete.is_all());
        assert!(combined.children_by_numeric_key.is_empty());
        assert_eq!(combined.set.len(), 1);
        assert_equivalent(&Value::map([(3, Value::from(json!({})))]), &patches);
    }

    #[test]
    fn set_patches_fold_add_and_delete() {
        let mut first = SetPatch::default();
        first.add.insert(MapKey::from("a"));
        first.delete.insert(MapKey::from("b"));
        let mut second = SetPatch::default();
        second.delete.insert(MapKey::from("a"));
        second.add.insert(MapKey::from("b"));
        let patches = [Patch::Set(first), Patch::Set(second)];
        let Some(Patch::Set(combined)) = combine(&patches).unwrap() else {
            panic!("expected a set patch");
        };
        assert!(combined.add.contains(&MapKey::from("b")));
        assert!(combined.delete.contains(&MapKey::from("a")));
        assert!(!combined.delete.contains(&MapKey::from("b")));
        assert_equivalent(&Value::set(["a", "b", "c"]), &patches);
    }

    #[test]
    fn inputs_are_not_modified() {
        let first = Patch::Object(set_a(1));
        let second = Patch::Object(set_a(2));
        let before = (first.clone(), second.clone());
        combine([&first, &second]).unwrap();
        assert_eq!((first, second), before);
    }

    #[test]
    fn mixed_variants_are_rejected() {
        let patches = [Patch::Object(set_a(1)), Patch::Set(SetPatch::default())];
        assert!(matches!(
            combine(&patches),
            Err(PatchError::TargetKindMismatch { .. })
        ));
    }
}
