//! The opaque, heterogeneous value mapping produced by a parse.
//!
//! Keys are populated lazily, in parse order, as options are recognized.
//! `serde_json::Value` supplies the untyped scalar/array representation;
//! `IndexMap` keeps the insertion order the requirement engine and
//! default-assignment phase rely on.

use indexmap::IndexMap;
use serde_json::Value as Json;

/// A single option's resolved value, or the "recognized but not yet valued"
/// marker used while a parameter window is still open.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The option was recognized on the command line but has not (yet, or
    /// ever) received a value — spec.md's `undefined` marker.
    Undefined,
    /// Spec.md's `null` sentinel: the option is explicitly absent.
    Null,
    Bool(bool),
    Str(String),
    Array(Vec<Json>),
    Json(Json),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null_sentinel(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            Value::Json(Json::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Json(Json::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Json]> {
        match self {
            Value::Array(v) => Some(v.as_slice()),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::Array(v.into_iter().map(Json::String).collect())
    }
}

impl From<Json> for Value {
    fn from(j: Json) -> Self {
        Value::Json(j)
    }
}

/// The parse result's value mapping: `key -> value`, ordered by the order
/// keys first received a value (spec.md §3, "Value mapping").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueMap {
    inner: IndexMap<String, Value>,
}

impl ValueMap {
    pub fn new() -> Self {
        ValueMap { inner: IndexMap::new() }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.inner.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.inner.insert(key.into(), value);
    }

    /// Mark a key as recognized-but-unvalued, the way the parser does the
    /// instant it resolves an event to a known option before its window
    /// closes.
    pub fn mark_undefined_if_absent(&mut self, key: &str) {
        if !self.inner.contains_key(key) {
            self.inner.insert(key.to_string(), Value::Undefined);
        }
    }

    /// Append to an existing array value (array options with `append`),
    /// creating the array if this is the first occurrence.
    pub fn append_array(&mut self, key: &str, items: Vec<Json>) {
        match self.inner.get_mut(key) {
            Some(Value::Array(existing)) => existing.extend(items),
            _ => {
                self.inner.insert(key.to_string(), Value::Array(items));
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.inner.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.inner.keys()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Convert a whole mapping to a JSON object — used to fold a nested
/// command's value mapping into its parent as a single value (spec.md
/// §4.4, `command` dispatch: "parse the remainder recursively").
/// `Undefined` entries become `null` rather than being omitted, so a
/// caller can always tell an unspecified key from one never declared.
pub fn to_json(values: &ValueMap) -> Json {
    let mut map = serde_json::Map::new();
    for (key, value) in values.iter() {
        let json = match value {
            Value::Undefined | Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Str(s) => Json::String(s.clone()),
            Value::Array(a) => Json::Array(a.clone()),
            Value::Json(j) => j.clone(),
        };
        map.insert(key.clone(), json);
    }
    Json::Object(map)
}

/// A typed, read-only view over a [`ValueMap`] for callers that know the
/// shape they expect at a given key — the schema boundary Design Notes §9
/// calls for ("expose it through a type-safe view").
pub struct ValueMapView<'a>(&'a ValueMap);

impl<'a> ValueMapView<'a> {
    pub fn new(map: &'a ValueMap) -> Self {
        ValueMapView(map)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn get_array(&self, key: &str) -> Option<&[Json]> {
        self.0.get(key).and_then(Value::as_array)
    }

    pub fn is_specified(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(v) if !v.is_undefined())
    }
}
