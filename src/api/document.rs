//! Purpose: Bind a JSON value to the file it came from or will be saved to.
//! Exports: `Document`.
//! Role: Convenience layer over `core::json` for load/edit/save flows.
//! Invariants: Dotted paths address object keys and array indexes only.
//! Invariants: `set` creates intermediate objects; it never clobbers scalars silently.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::core::error::{Error, ErrorKind};
use crate::core::json::{self, DumpOptions};

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    path: PathBuf,
    value: Value,
}

impl Document {
    /// Starts an empty document bound to `path`; nothing is written until `save`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            value: Value::Object(Map::new()),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let value = json::load(&path)?;
        Ok(Self { path, value })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    /// Looks up a dotted path like `user.name` or `items.0.id`.
    pub fn get(&self, pointer: &str) -> Option<&Value> {
        let mut current = &self.value;
        for segment in segments(pointer)? {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => {
                    let index: usize = segment.parse().ok()?;
                    items.get(index)?
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Sets the value at a dotted path, creating intermediate objects as needed.
    pub fn set(&mut self, pointer: &str, value: Value) -> Result<(), Error> {
        let segments = segments(pointer).ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message("empty key path")
                .with_path(&self.path)
        })?;
        let (last, parents) = segments.split_last().ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message("empty key path")
                .with_path(&self.path)
        })?;

        let mut current = &mut self.value;
        for segment in parents {
            current = match current {
                Value::Object(map) => map
                    .entry((*segment).to_string())
                    .or_insert_with(|| Value::Object(Map::new())),
                Value::Array(items) => {
                    let index: usize = segment.parse().map_err(|_| {
                        Error::new(ErrorKind::Usage)
                            .with_message(format!("`{segment}` is not an array index"))
                            .with_path(&self.path)
                    })?;
                    items.get_mut(index).ok_or_else(|| {
                        Error::new(ErrorKind::Usage)
                            .with_message(format!("array index {index} is out of bounds"))
                            .with_path(&self.path)
                    })?
                }
                _ => {
                    return Err(Error::new(ErrorKind::Usage)
                        .with_message(format!("cannot descend into scalar at `{segment}`"))
                        .with_path(&self.path));
                }
            };
        }

        match current {
            Value::Object(map) => {
                map.insert((*last).to_string(), value);
            }
            Value::Array(items) => {
                let index: usize = last.parse().map_err(|_| {
                    Error::new(ErrorKind::Usage)
                        .with_message(format!("`{last}` is not an array index"))
                        .with_path(&self.path)
                })?;
                if index >= items.len() {
                    return Err(Error::new(ErrorKind::Usage)
                        .with_message(format!("array index {index} is out of bounds"))
                        .with_path(&self.path));
                }
                items[index] = value;
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(format!("cannot descend into scalar at `{last}`"))
                    .with_path(&self.path));
            }
        }
        Ok(())
    }

    pub fn save(&self, options: &DumpOptions) -> Result<(), Error> {
        json::dump(&self.value, &self.path, options)
    }
}

fn segments(pointer: &str) -> Option<Vec<&str>> {
    if pointer.is_empty() {
        return None;
    }
    let parts: Vec<&str> = pointer.split('.').collect();
    if parts.iter().any(|part| part.is_empty()) {
        return None;
    }
    Some(parts)
}

#[cfg(test)]
mod tests {
    use super::Document;
    use crate::core::error::ErrorKind;
    use crate::core::json::DumpOptions;
    use serde_json::json;

    fn sample() -> Document {
        let mut doc = Document::new("/tmp/unused.json");
        *doc.value_mut() = json!({
            "name": "Alice",
            "age": 25,
            "address": {"city": "Delhi"},
            "tags": [{"id": 7}, {"id": 9}]
        });
        doc
    }

    #[test]
    fn get_resolves_nested_keys_and_indexes() {
        let doc = sample();
        assert_eq!(doc.get("name"), Some(&json!("Alice")));
        assert_eq!(doc.get("address.city"), Some(&json!("Delhi")));
        assert_eq!(doc.get("tags.1.id"), Some(&json!(9)));
        assert_eq!(doc.get("address.street"), None);
        assert_eq!(doc.get("tags.5.id"), None);
        assert_eq!(doc.get(""), None);
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut doc = sample();
        doc.set("address.geo.lat", json!(28.6)).expect("set");
        assert_eq!(doc.get("address.geo.lat"), Some(&json!(28.6)));
    }

    #[test]
    fn set_replaces_array_elements_in_bounds() {
        let mut doc = sample();
        doc.set("tags.0.id", json!(11)).expect("set");
        assert_eq!(doc.get("tags.0.id"), Some(&json!(11)));

        let err = doc.set("tags.9", json!(0)).expect_err("out of bounds");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn set_refuses_to_descend_into_scalars() {
        let mut doc = sample();
        let err = doc.set("name.first", json!("A")).expect_err("scalar parent");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("doc.json");

        let mut doc = Document::new(&path);
        doc.set("user.name", json!("Bob")).expect("set");
        doc.set("user.age", json!(30)).expect("set");
        doc.save(&DumpOptions::pretty()).expect("save");

        let loaded = Document::load(&path).expect("load");
        assert_eq!(loaded.get("user.name"), Some(&json!("Bob")));
        assert_eq!(loaded.get("user.age"), Some(&json!(30)));
    }
}
