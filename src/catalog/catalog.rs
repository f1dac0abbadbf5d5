//! System Catalog for StudioDB
//!
//! The catalog is the durable container of table definitions, keyed by table
//! name. It is persisted one entry per table and only changes inside a
//! structural upgrade, together with the storage containers it describes.

use super::schema::{Schema, TableDef};
use std::collections::BTreeMap;

/// System Catalog - table name to table definition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    tables: BTreeMap<String, TableDef>,
}

impl Catalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a table by name
    pub fn get(&self, name: &str) -> Option<&TableDef> {
        self.tables.get(name)
    }

    /// Check if a table exists
    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// All table definitions, ordered by name
    pub fn list(&self) -> Schema {
        self.tables.values().cloned().collect()
    }

    /// Insert or overwrite a table definition
    pub fn put(&mut self, table: TableDef) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Remove a table definition, returning it if it was present
    pub fn delete(&mut self, name: &str) -> Option<TableDef> {
        self.tables.remove(name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType};

    fn users() -> TableDef {
        TableDef::new(
            "users",
            vec![
                Column::new("id", DataType::Integer),
                Column::new("name", DataType::Varchar(Some(100))),
            ],
        )
    }

    #[test]
    fn test_put_and_get_table() {
        let mut catalog = Catalog::new();
        catalog.put(users());

        let retrieved = catalog.get("users").unwrap();
        assert_eq!(retrieved.name, "users");
        assert_eq!(retrieved.columns.len(), 2);
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let mut catalog = Catalog::new();
        catalog.put(users());
        catalog.put(TableDef::new("users", vec![Column::new("id", DataType::Text)]));

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("users").unwrap().columns.len(), 1);
    }

    #[test]
    fn test_delete_table() {
        let mut catalog = Catalog::new();
        catalog.put(users());
        assert!(catalog.contains("users"));

        assert!(catalog.delete("users").is_some());
        assert!(!catalog.contains("users"));
        assert!(catalog.delete("users").is_none());
    }

    #[test]
    fn test_list_is_sorted() {
        let mut catalog = Catalog::new();
        catalog.put(TableDef::new("zeta", vec![]));
        catalog.put(TableDef::new("alpha", vec![]));

        let names: Vec<_> = catalog.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
