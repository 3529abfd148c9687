//! Row-oriented result types

use serde::{Deserialize, Serialize};

use super::value::{DataType, Value};

/// One column of a result: a logical path and its declared type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered list of fields describing the rows of a stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    fields: Vec<Field>,
}

impl Header {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of the field with the given name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// One time-keyed row, field-aligned with its stream's header
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub timestamp: i64,
    pub values: Vec<Option<Value>>,
}

impl Row {
    pub fn new(timestamp: i64, values: Vec<Option<Value>>) -> Self {
        Self { timestamp, values }
    }

    /// Value at column `index`, `None` when absent or out of range
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(|v| v.as_ref())
    }
}

/// A single `(key, value)` pair of one series
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: i64,
    pub value: Value,
}

impl Record {
    pub fn new(key: i64, value: Value) -> Self {
        Self { key, value }
    }
}

/// A series known to a backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timeseries {
    pub path: String,
    pub data_type: DataType,
}

impl Timeseries {
    pub fn new(path: impl Into<String>, data_type: DataType) -> Self {
        Self {
            path: path.into(),
            data_type,
        }
    }
}
