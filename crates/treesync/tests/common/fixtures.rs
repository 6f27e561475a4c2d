use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value as Json;
use treesync::patch::{from_json, value_from_json};
use treesync::{Patch, Value};

/// One combine scenario: `patches` are applied to `base` in order.
#[derive(Debug, Clone, Deserialize)]
pub struct CombineCase {
    pub name: String,
    pub base: Json,
    pub patches: Vec<Json>,
    pub expected: Json,
    /// The folded patch, when the scenario pins its exact shape.
    #[serde(default)]
    pub combined: Option<Json>,
}

impl CombineCase {
    pub fn base_value(&self) -> Value {
        decode_value(&self.name, &self.base)
    }

    pub fn expected_value(&self) -> Value {
        decode_value(&self.name, &self.expected)
    }

    pub fn patch_list(&self) -> Vec<Patch> {
        self.patches.iter().map(|p| decode_patch(&self.name, p)).collect()
    }
}

pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

pub fn read_json(path: &Path) -> Json {
    let data = fs::read_to_string(path).unwrap_or_else(|e| panic!("failed to read {:?}: {e}", path));
    serde_json::from_str(&data).unwrap_or_else(|e| panic!("failed to parse {:?}: {e}", path))
}

pub fn load_combine_cases() -> Vec<CombineCase> {
    let path = fixtures_dir().join("combine_cases.json");
    serde_json::from_value(read_json(&path)).unwrap_or_else(|e| panic!("bad cases in {:?}: {e}", path))
}

pub fn decode_value(case: &str, v: &Json) -> Value {
    value_from_json(v).unwrap_or_else(|e| panic!("{case}: bad value {v}: {e}"))
}

pub fn decode_patch(case: &str, v: &Json) -> Patch {
    from_json(v).unwrap_or_else(|e| panic!("{case}: bad patch {v}: {e}"))
}
