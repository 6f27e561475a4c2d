//! Tree patches: the change format exchanged between replicas.
//!
//! A [`Patch`] is produced by the recorder, applied with [`apply`], merged
//! with [`combine`] and narrowed per subscriber with [`filter`].

pub mod apply;
pub mod codec;
pub mod combine;
pub mod filter;
pub mod remap;
pub mod types;

pub use apply::{apply, apply_all, apply_to};
pub use codec::json::{from_json, parse, serialize, to_json, value_from_json, value_to_json};
pub use combine::{append, combine};
pub use filter::{filter, Filter, KeyPredicate, Rule};
pub use remap::{remap_entries, IndexRemap, Remapped};
pub use types::{
    ArrayOperation, ArrayPatch, Deletion, MapPatch, ObjectPatch, Patch, PatchError, SetPatch,
};
