//! Dotted-path access into nested JSON objects.
//!
//! Task metadata uses keys such as `dispatch.split` or `wrapper.name`, stored
//! as nested objects so the JSON envelope stays readable.

use serde_json::{Map, Value};

/// Look up `a.b.c` in a nested object.
pub fn get_dotted<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = root.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Set `a.b.c`, creating (or replacing non-object) intermediate levels.
pub fn set_dotted(root: &mut Map<String, Value>, path: &str, value: Value) {
    let parts: Vec<&str> = path.split('.').collect();
    let (last, parents) = match parts.split_last() {
        Some(split) => split,
        None => return,
    };

    let mut current = root;
    for part in parents {
        let entry = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry.as_object_mut() {
            Some(obj) => obj,
            None => return,
        };
    }
    current.insert(last.to_string(), value);
}

/// Flattened list of every leaf key in dotted form.
pub fn dotted_keys(root: &Map<String, Value>) -> Vec<String> {
    fn walk(prefix: &str, map: &Map<String, Value>, out: &mut Vec<String>) {
        for (key, value) in map {
            let full = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            match value {
                Value::Object(inner) if !inner.is_empty() => walk(&full, inner, out),
                _ => out.push(full),
            }
        }
    }

    let mut out = Vec::new();
    walk("", root, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_then_get() {
        let mut root = Map::new();
        set_dotted(&mut root, "dispatch.split", json!(10));
        set_dotted(&mut root, "dispatch.await", json!(true));
        set_dotted(&mut root, "wrapper.name", json!("subprocess"));

        assert_eq!(get_dotted(&root, "dispatch.split"), Some(&json!(10)));
        assert_eq!(get_dotted(&root, "wrapper.name"), Some(&json!("subprocess")));
        assert_eq!(
            Value::Object(root.clone()),
            json!({"dispatch": {"split": 10, "await": true}, "wrapper": {"name": "subprocess"}})
        );
        assert_eq!(
            dotted_keys(&root),
            vec!["dispatch.split", "dispatch.await", "wrapper.name"]
        );
    }

    #[test]
    fn set_replaces_scalar_parent() {
        let mut root = Map::new();
        set_dotted(&mut root, "dispatch", json!("local"));
        set_dotted(&mut root, "dispatch.split", json!(2));
        assert_eq!(get_dotted(&root, "dispatch.split"), Some(&json!(2)));
    }

    #[test]
    fn missing_paths() {
        let root = json!({"a": {"b": 1}}).as_object().cloned().unwrap();
        assert!(get_dotted(&root, "a.c").is_none());
        assert!(get_dotted(&root, "a.b.c").is_none());
        assert!(get_dotted(&root, "x").is_none());
    }
}
