//! Frozen, schema-conformant attribute records.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

/// Working record threaded through whole-record validators.
///
/// Holds only attributes that resolved to a value; unset optionals are absent
/// rather than `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    /// Present and not `null`.
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.shift_remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values.into_iter().collect()
    }
}

/// Source of named field values for block synthesis and computed properties.
///
/// Implemented by the top-level record and by the plain JSON objects found
/// inside nested and repeated attributes.
pub trait FieldSource {
    fn field(&self, name: &str) -> Option<&Value>;

    fn derived(&self, _name: &str) -> Option<&Value> {
        None
    }
}

impl FieldSource for Map<String, Value> {
    fn field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// Immutable materialization of one resource's inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidatedAttributes {
    values: IndexMap<String, Value>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    derived: IndexMap<String, Value>,
}

impl ValidatedAttributes {
    pub(crate) fn freeze(record: Record) -> Self {
        Self { values: record.values, derived: IndexMap::new() }
    }

    pub(crate) fn with_derived(mut self, name: impl Into<String>, value: Value) -> Self {
        self.derived.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn array(&self, name: &str) -> &[Value] {
        self.get(name).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn object(&self, name: &str) -> Option<&Map<String, Value>> {
        self.get(name).and_then(Value::as_object)
    }

    pub fn derived_value(&self, name: &str) -> Option<&Value> {
        self.derived.get(name)
    }

    pub fn values(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn derived_values(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.derived.iter()
    }
}

impl FieldSource for ValidatedAttributes {
    fn field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }

    fn derived(&self, name: &str) -> Option<&Value> {
        self.derived_value(name)
    }
}
