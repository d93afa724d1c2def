//! Typed field access over raw catalog documents
//!
//! Every accessor reports failures against the dotted path of the field so a
//! caller can tell exactly which part of a document was rejected.

use serde_json::{Map, Value};

use crate::error::{RecordError, Result};

/// Name of a JSON value's type, for error messages
pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A JSON object together with its path inside the document
pub(crate) struct Fields<'a> {
    path: String,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    /// Wrap a value that must be an object
    pub fn of(value: &'a Value, path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        match value {
            Value::Object(map) => Ok(Self { path, map }),
            other => Err(RecordError::mismatch(
                display_path(&path),
                "object",
                kind_of(other),
            )),
        }
    }

    /// Path of a child field
    pub fn child(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    /// Look up a field, treating `null` as absent
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        match self.map.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    /// Look up a field that must be present and non-null
    pub fn required(&self, key: &str) -> Result<&'a Value> {
        match self.map.get(key) {
            None => Err(RecordError::missing(self.child(key))),
            Some(Value::Null) => Err(RecordError::mismatch(self.child(key), "a value", "null")),
            Some(value) => Ok(value),
        }
    }

    pub fn required_str(&self, key: &str) -> Result<String> {
        let value = self.required(key)?;
        self.as_string(key, value)
    }

    pub fn optional_str(&self, key: &str) -> Result<Option<String>> {
        self.get(key)
            .map(|value| self.as_string(key, value))
            .transpose()
    }

    pub fn required_bool(&self, key: &str) -> Result<bool> {
        let value = self.required(key)?;
        value
            .as_bool()
            .ok_or_else(|| RecordError::mismatch(self.child(key), "boolean", kind_of(value)))
    }

    pub fn required_u64(&self, key: &str) -> Result<u64> {
        let value = self.required(key)?;
        value.as_u64().ok_or_else(|| {
            RecordError::mismatch(self.child(key), "non-negative integer", kind_of(value))
        })
    }

    /// Optional array of strings; absent or null yields an empty list
    pub fn string_list(&self, key: &str) -> Result<Vec<String>> {
        let Some(value) = self.get(key) else {
            return Ok(Vec::new());
        };
        let items = value
            .as_array()
            .ok_or_else(|| RecordError::mismatch(self.child(key), "array", kind_of(value)))?;

        items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    RecordError::mismatch(
                        format!("{}[{}]", self.child(key), idx),
                        "string",
                        kind_of(item),
                    )
                })
            })
            .collect()
    }

    /// Optional object of string values, in document order
    pub fn string_pairs(&self, key: &str) -> Result<Vec<(String, String)>> {
        let Some(value) = self.get(key) else {
            return Ok(Vec::new());
        };
        let nested = Fields::of(value, self.child(key))?;

        nested
            .map
            .iter()
            .map(|(name, entry)| {
                entry
                    .as_str()
                    .map(|url| (name.clone(), url.to_string()))
                    .ok_or_else(|| {
                        RecordError::mismatch(nested.child(name), "string", kind_of(entry))
                    })
            })
            .collect()
    }

    /// Iterate over the entries of this object in document order
    pub fn entries(&self) -> impl Iterator<Item = (&'a String, &'a Value)> {
        self.map.iter()
    }

    fn as_string(&self, key: &str, value: &Value) -> Result<String> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RecordError::mismatch(self.child(key), "string", kind_of(value)))
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "<document>".to_string()
    } else {
        path.to_string()
    }
}
