//! Relation types
//!
//! Values, rows, schemas and row handles.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::HeapError;
use crate::storage::{BlockId, RecordId};

/// Name of a table or column
pub type Identifier = String;

/// A row: column name → value
pub type ValueDict = BTreeMap<Identifier, Value>;

/// Declared type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Int,
    Text,
    Boolean,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "INT"),
            DataType::Text => write!(f, "TEXT"),
            DataType::Boolean => write!(f, "BOOLEAN"),
        }
    }
}

impl FromStr for DataType {
    type Err = HeapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INT" | "INTEGER" => Ok(DataType::Int),
            "TEXT" => Ok(DataType::Text),
            "BOOLEAN" | "BOOL" => Ok(DataType::Boolean),
            other => Err(HeapError::Config(format!("unknown data type: {}", other))),
        }
    }
}

/// A single field value
///
/// Only INT and TEXT values can be stored; `DataType::Boolean` may be declared
/// in a schema but is rejected when a row is marshaled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i32),
    Text(String),
}

impl Value {
    /// The data type this value carries
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int(_) => DataType::Int,
            Value::Text(_) => DataType::Text,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: Identifier,
    pub data_type: DataType,
}

/// Ordered column list of a relation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column (builder style)
    pub fn column(mut self, name: impl Into<Identifier>, data_type: DataType) -> Self {
        self.columns.push(Column {
            name: name.into(),
            data_type,
        });
        self
    }

    /// Columns in declaration order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in declaration order
    pub fn column_names(&self) -> Vec<Identifier> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Look up a column by name
    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Parses `name:type,name:type,...`
impl FromStr for Schema {
    type Err = HeapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut schema = Schema::new();
        for part in s.split(',').map(str::trim).filter(|part| !part.is_empty()) {
            let (name, data_type) = part.split_once(':').ok_or_else(|| {
                HeapError::Config(format!("column must be name:type, got {}", part))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(HeapError::Config(format!("empty column name in {}", part)));
            }
            if schema.get(name).is_some() {
                return Err(HeapError::Config(format!("duplicate column: {}", name)));
            }
            schema = schema.column(name, data_type.trim().parse()?);
        }
        if schema.is_empty() {
            return Err(HeapError::Config("schema has no columns".to_string()));
        }
        Ok(schema)
    }
}

/// Location of a stored row: (block id, record id)
///
/// Handles order by block id, then record id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle {
    pub block_id: BlockId,
    pub record_id: RecordId,
}

impl Handle {
    pub fn new(block_id: BlockId, record_id: RecordId) -> Self {
        Self {
            block_id,
            record_id,
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.block_id, self.record_id)
    }
}
