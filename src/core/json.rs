//! Purpose: JSON encode/decode boundary shared by the API and CLI.
//! Exports: `DumpOptions`, `to_string`, `dump`, `from_str`, `load`, `sorted`.
//! Role: Single seam for serialization so callsites avoid ad hoc encode logic.
//! Invariants: Compact output equals `serde_json::to_string`.
//! Invariants: `dump` then `load` yields an equal value.
//! Invariants: Insertion order survives a round trip unless sorting is requested.

use std::path::Path;

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::{Map, Value};

use crate::core::error::{Error, ErrorKind};
use crate::core::handle::{Handle, Mode};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DumpOptions {
    pub pretty: bool,
    pub indent: usize,
    pub sort_keys: bool,
}

impl DumpOptions {
    pub fn compact() -> Self {
        Self {
            pretty: false,
            indent: 2,
            sort_keys: false,
        }
    }

    pub fn pretty() -> Self {
        Self {
            pretty: true,
            indent: 2,
            sort_keys: false,
        }
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_sort_keys(mut self, sort_keys: bool) -> Self {
        self.sort_keys = sort_keys;
        self
    }
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self::compact()
    }
}

/// Recursively orders object keys lexicographically; arrays keep their order.
pub fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = Map::new();
            for (key, val) in entries {
                out.insert(key.clone(), sorted(val));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

pub fn to_string(value: &Value, options: &DumpOptions) -> Result<String, Error> {
    let value = if options.sort_keys {
        sorted(value)
    } else {
        value.clone()
    };
    if !options.pretty {
        return serde_json::to_string(&value)
            .map_err(|err| Error::new(ErrorKind::Internal).with_source(err));
    }
    let indent = vec![b' '; options.indent];
    let mut out = Vec::new();
    {
        let formatter = PrettyFormatter::with_indent(&indent);
        let mut serializer = Serializer::with_formatter(&mut out, formatter);
        value
            .serialize(&mut serializer)
            .map_err(|err| Error::new(ErrorKind::Internal).with_source(err))?;
    }
    String::from_utf8(out).map_err(|err| Error::new(ErrorKind::Internal).with_source(err))
}

/// Serializes to a file (create/truncate), newline-terminated and flushed.
pub fn dump(value: &Value, path: impl AsRef<Path>, options: &DumpOptions) -> Result<(), Error> {
    let path = path.as_ref();
    let text = to_string(value, options)?;
    let mut handle = Handle::open(path, Mode::Write)?;
    handle.write_str(&text)?;
    handle.write_str("\n")?;
    handle.flush()?;
    tracing::debug!(path = %path.display(), bytes = text.len() + 1, "dumped JSON");
    Ok(())
}

pub fn from_str(input: &str) -> Result<Value, Error> {
    serde_json::from_str(input).map_err(|err| {
        Error::new(ErrorKind::Parse)
            .with_message(format!(
                "invalid JSON at line {}, column {}",
                err.line(),
                err.column()
            ))
            .with_source(err)
    })
}

pub fn load(path: impl AsRef<Path>) -> Result<Value, Error> {
    let path = path.as_ref();
    let mut handle = Handle::open(path, Mode::Read)?;
    let text = handle.read_to_string()?;
    from_str(&text).map_err(|err| err.with_path(path))
}
