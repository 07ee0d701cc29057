// src/engine/key.rs

//! Call keys: the identity of a task invocation.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::watch::hash::hash_str;

const DISPLAY_ARGS_LIMIT: usize = 100;

/// A task name plus its ordered argument list.
///
/// Arguments are plain JSON values, so two calls whose arguments serialize to
/// the same structure share one graph node no matter which Rust types they
/// were produced from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallKey {
    pub task: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl CallKey {
    pub fn new(task: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            task: task.into(),
            args,
        }
    }

    /// Key for a task that takes no arguments.
    pub fn task(task: impl Into<String>) -> Self {
        Self::new(task, Vec::new())
    }

    /// Stable structural signature of this call.
    ///
    /// Object keys are sorted at every depth before hashing; argument order
    /// is preserved.
    pub fn signature(&self) -> String {
        let canonical = Value::Array(
            std::iter::once(Value::String(self.task.clone()))
                .chain(self.args.iter().map(canonicalize))
                .collect(),
        );
        hash_str(&canonical.to_string())
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

impl fmt::Display for CallKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = self
            .args
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        if args.chars().count() > DISPLAY_ARGS_LIMIT {
            let head: String = args.chars().take(DISPLAY_ARGS_LIMIT).collect();
            write!(f, "{}({}...)", self.task, head)
        } else {
            write!(f, "{}({})", self.task, args)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;

    #[test]
    fn object_key_order_does_not_change_signature() {
        let mut first = Map::new();
        first.insert("width".into(), json!(990));
        first.insert("height".into(), json!(504));
        let mut second = Map::new();
        second.insert("height".into(), json!(504));
        second.insert("width".into(), json!(990));

        let a = CallKey::new("screenshot", vec![Value::Object(first)]);
        let b = CallKey::new("screenshot", vec![Value::Object(second)]);
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn argument_order_changes_signature() {
        let a = CallKey::new("resize", vec![json!(2), json!("png")]);
        let b = CallKey::new("resize", vec![json!("png"), json!(2)]);
        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn task_name_is_part_of_signature() {
        let a = CallKey::new("compile", vec![json!("Main.elm")]);
        let b = CallKey::new("file", vec![json!("Main.elm")]);
        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn differently_typed_arguments_with_identical_serialization_collide() {
        #[derive(Serialize)]
        struct Size {
            width: u32,
            height: u32,
        }

        let from_struct = serde_json::to_value(Size {
            width: 3,
            height: 2,
        })
        .unwrap();
        let from_map = json!({ "height": 2, "width": 3 });

        let a = CallKey::new("resize", vec![from_struct]);
        let b = CallKey::new("resize", vec![from_map]);
        assert_eq!(a.signature(), b.signature());

        // Tuples and vectors both serialize to arrays.
        let tuple = serde_json::to_value((1, 2)).unwrap();
        let vec = serde_json::to_value(vec![1, 2]).unwrap();
        assert_eq!(
            CallKey::new("t", vec![tuple]).signature(),
            CallKey::new("t", vec![vec]).signature()
        );
    }

    #[test]
    fn display_truncates_long_arguments() {
        let key = CallKey::new("page", vec![json!("x".repeat(300))]);
        let shown = key.to_string();
        assert!(shown.starts_with("page(\"xxx"));
        assert!(shown.ends_with("...)"));

        assert_eq!(
            CallKey::new("resize", vec![json!(2), json!("png")]).to_string(),
            "resize(2, \"png\")"
        );
    }
}
