use serde::{Serialize, Deserialize};
use std::collections::HashMap;
use chrono::Utc;

/// Lower time sentinel: an unbounded `time_from`
pub const TIME_MIN: i64 = i64::MIN;
/// Upper time sentinel: an unbounded `time_to`
pub const TIME_MAX: i64 = i64::MAX;

/// Reserved index field holding the record id
pub const ID_FIELD: &str = "_id";
/// Reserved index field holding the record timestamp
pub const TIMESTAMP_FIELD: &str = "_timestamp";
/// Catch-all text field, default target of bare query terms
pub const ALL_FIELD: &str = "_all";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordValue {
    Null,
    String(String),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Binary(Vec<u8>),
    Facet(Vec<String>),
}

impl RecordValue {
    pub fn facet<S: AsRef<str>>(path: &[S]) -> Self {
        RecordValue::Facet(path.iter().map(|s| s.as_ref().to_string()).collect())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RecordValue::Integer(v) => Some(*v as f64),
            RecordValue::Long(v) => Some(*v as f64),
            RecordValue::Float(v) => Some(*v as f64),
            RecordValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    /// Canonical text form, used for primary-key id derivation
    pub fn canonical_string(&self) -> String {
        match self {
            RecordValue::Null => String::new(),
            RecordValue::String(s) => s.clone(),
            RecordValue::Integer(v) => v.to_string(),
            RecordValue::Long(v) => v.to_string(),
            RecordValue::Float(v) => v.to_string(),
            RecordValue::Double(v) => v.to_string(),
            RecordValue::Boolean(v) => v.to_string(),
            RecordValue::Binary(bytes) => bytes.iter().map(|b| format!("{:02x}", b)).collect(),
            RecordValue::Facet(path) => path.join(","),
        }
    }
}

impl From<&str> for RecordValue {
    fn from(value: &str) -> Self {
        RecordValue::String(value.to_string())
    }
}

impl From<String> for RecordValue {
    fn from(value: String) -> Self {
        RecordValue::String(value)
    }
}

impl From<i32> for RecordValue {
    fn from(value: i32) -> Self {
        RecordValue::Integer(value)
    }
}

impl From<i64> for RecordValue {
    fn from(value: i64) -> Self {
        RecordValue::Long(value)
    }
}

impl From<f64> for RecordValue {
    fn from(value: f64) -> Self {
        RecordValue::Double(value)
    }
}

impl From<bool> for RecordValue {
    fn from(value: bool) -> Self {
        RecordValue::Boolean(value)
    }
}

/// A timestamped bag of named values belonging to one table.
///
/// An empty `id` asks the router to resolve one, either from the table's
/// primary-key columns or by generating a random id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub table: String,
    pub timestamp: i64,
    pub values: HashMap<String, RecordValue>,
}

impl Record {
    pub fn new(table: &str, values: HashMap<String, RecordValue>) -> Self {
        Record {
            id: String::new(),
            table: table.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            values,
        }
    }

    pub fn with_id(id: &str, table: &str, values: HashMap<String, RecordValue>) -> Self {
        Record {
            id: id.to_string(),
            ..Record::new(table, values)
        }
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn add_value(&mut self, name: &str, value: RecordValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get_value(&self, name: &str) -> Option<&RecordValue> {
        self.values.get(name)
    }

    /// Copy of this record restricted to the given columns
    pub fn project(&self, columns: Option<&[String]>) -> Record {
        match columns {
            None => self.clone(),
            Some(cols) => Record {
                id: self.id.clone(),
                table: self.table.clone(),
                timestamp: self.timestamp,
                values: self.values.iter()
                    .filter(|(name, _)| cols.iter().any(|c| c == *name))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect(),
            },
        }
    }
}

/// Canonical (lowercase) form used for every internal table key
pub fn normalize_table_name(table: &str) -> String {
    table.trim().to_lowercase()
}
