//! Schema definitions for StudioDB
//!
//! This module defines table definitions and column metadata.

use super::types::DataType;
use serde::{Deserialize, Serialize};

/// Column definition in a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Declared data type
    #[serde(rename = "type")]
    pub data_type: DataType,
}

impl Column {
    /// Create a new column
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Table definition - full table metadata
///
/// The first column is the table's storage key. This is positional; there is
/// no explicit primary key flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    /// Table name
    pub name: String,
    /// Ordered columns
    pub columns: Vec<Column>,
}

impl TableDef {
    /// Create a new table definition
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// The key column, if the table has any columns
    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.first()
    }

    /// Get column names in declaration order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// The full set of tables, sorted by name
pub type Schema = Vec<TableDef>;
