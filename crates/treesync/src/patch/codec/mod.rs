//! Patch serialization.

pub mod json;
