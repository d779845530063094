//! Hierarchical key-value records.
//!
//! The save pipeline hands each entity a `Record` to fill and gets the same
//! record back at load time. Keys iterate in sorted order (BTreeMap) so
//! serialized output is deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("key {key:?} is missing or not a {expected}")]
    WrongKind { key: String, expected: &'static str },
}

/// One value in a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Record(Record),
    List(Vec<Value>),
}

/// A string-keyed tree of values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    entries: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    // --- typed setters ---

    pub fn set_bool(&mut self, key: impl Into<String>, v: bool) {
        self.set(key, Value::Bool(v));
    }

    pub fn set_i64(&mut self, key: impl Into<String>, v: i64) {
        self.set(key, Value::I64(v));
    }

    pub fn set_f64(&mut self, key: impl Into<String>, v: f64) {
        self.set(key, Value::F64(v));
    }

    pub fn set_str(&mut self, key: impl Into<String>, v: impl Into<String>) {
        self.set(key, Value::Str(v.into()));
    }

    pub fn set_bytes(&mut self, key: impl Into<String>, v: Vec<u8>) {
        self.set(key, Value::Bytes(v));
    }

    pub fn set_record(&mut self, key: impl Into<String>, v: Record) {
        self.set(key, Value::Record(v));
    }

    pub fn set_list(&mut self, key: impl Into<String>, v: Vec<Value>) {
        self.set(key, Value::List(v));
    }

    // --- typed getters ---

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key) {
            Some(Value::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key) {
            Some(Value::I64(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get(key) {
            Some(Value::F64(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(Value::Str(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn get_bytes(&self, key: &str) -> Option<&[u8]> {
        match self.get(key) {
            Some(Value::Bytes(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn get_record(&self, key: &str) -> Option<&Record> {
        match self.get(key) {
            Some(Value::Record(v)) => Some(v),
            _ => None,
        }
    }

    pub fn get_list(&self, key: &str) -> Option<&[Value]> {
        match self.get(key) {
            Some(Value::List(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    // --- demanding getters for envelope parsing ---

    pub fn require_str(&self, key: &str) -> Result<&str, RecordError> {
        self.get_str(key).ok_or_else(|| RecordError::WrongKind {
            key: key.to_string(),
            expected: "string",
        })
    }

    pub fn require_i64(&self, key: &str) -> Result<i64, RecordError> {
        self.get_i64(key).ok_or_else(|| RecordError::WrongKind {
            key: key.to_string(),
            expected: "integer",
        })
    }
}
