//! Uniform tabular result of a statement

use serde::Serialize;

use crate::storage::Value;

/// Column name of status-message results
pub const STATUS_COLUMN: &str = "status";

/// Result of executing one statement
///
/// Rows are aligned positionally with `columns`. DDL and DML statements
/// produce a single `status` column holding a human-readable message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    /// Column names
    pub columns: Vec<String>,
    /// Result rows
    pub rows: Vec<Vec<Value>>,
    /// Whether the statement changed the schema
    pub schema_changed: bool,
}

impl ExecutionResult {
    /// Create a result with rows
    pub fn rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            schema_changed: false,
        }
    }

    /// Create a single-row status result
    pub fn status(message: impl Into<String>) -> Self {
        Self {
            columns: vec![STATUS_COLUMN.to_string()],
            rows: vec![vec![Value::Text(message.into())]],
            schema_changed: false,
        }
    }

    /// Mark the result as having changed the schema
    pub fn with_schema_changed(mut self) -> Self {
        self.schema_changed = true;
        self
    }

    /// The status message, if this is a status result
    pub fn message(&self) -> Option<&str> {
        if self.columns.len() != 1 || self.columns[0] != STATUS_COLUMN {
            return None;
        }
        match self.rows.as_slice() {
            [row] => row.first().and_then(Value::as_str),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_result() {
        let result = ExecutionResult::status("Table \"t\" created successfully.").with_schema_changed();
        assert_eq!(result.columns, vec!["status"]);
        assert_eq!(result.message(), Some("Table \"t\" created successfully."));
        assert!(result.schema_changed);
    }

    #[test]
    fn test_rows_result_has_no_message() {
        let result = ExecutionResult::rows(vec!["id".into()], vec![vec![Value::Integer(1)]]);
        assert_eq!(result.message(), None);
        assert!(!result.schema_changed);
    }

    #[test]
    fn test_serializes_to_json() {
        let result = ExecutionResult::rows(
            vec!["id".into(), "name".into()],
            vec![vec![Value::Integer(1), Value::Null]],
        );
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"{"columns":["id","name"],"rows":[[1,null]],"schema_changed":false}"#
        );
    }
}
