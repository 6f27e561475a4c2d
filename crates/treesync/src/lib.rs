//! treesync - structured patches for replicating a tree of state.
//!
//! A [`Recorder`] turns writes made through its views into tree-shaped
//! [`Patch`]es, one per subscriber. Patches are applied on replicas with
//! [`apply`], folded together with [`combine`] and narrowed with
//! [`filter`]. The [`legacy`] module replays the older flat path format.
//!
//! Module layout:
//!
//! - [`value`]: the replicated tree
//! - [`mutate`]: container edits shared by the applier and the recorder
//! - [`patch`]: patch types, apply, combine, filter, index remapping, codec
//! - [`record`]: the recording engine
//! - [`legacy`]: flat path patches

pub mod legacy;
pub mod mutate;
pub mod patch;
pub mod record;
pub mod value;

pub use patch::{
    apply, apply_all, apply_to, combine, filter, ArrayOperation, ArrayPatch, Deletion, Filter,
    MapPatch, ObjectPatch, Patch, PatchError, Rule, SetPatch,
};
pub use record::{Recorder, View};
pub use value::{Kind, MapKey, Value};
