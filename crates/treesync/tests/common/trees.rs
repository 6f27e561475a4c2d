use serde_json::json;
use treesync::{MapKey, Value};

/// A tree with every container kind, nested.
pub fn sample_tree() -> Value {
    Value::object([
        ("n", Value::Int(0)),
        ("obj", Value::from(json!({"x": 1, "inner": {"y": 2}}))),
        ("list", Value::from(json!([{"v": 0}, {"v": 1}, {"v": 2}]))),
        (
            "map",
            Value::map([
                (MapKey::from("a"), Value::from(json!({"k": 0}))),
                (MapKey::from(1), Value::from(json!({"k": 1}))),
            ]),
        ),
        ("tags", Value::set([MapKey::from("t"), MapKey::from(2)])),
    ])
}

pub fn field<'a>(tree: &'a Value, key: &str) -> Option<&'a Value> {
    tree.as_object()?.get(key)
}
