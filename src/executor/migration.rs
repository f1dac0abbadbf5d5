//! Schema migrations
//!
//! Every structural change is a [`Migration`] value. The manager applies one
//! or more of them inside a single upgrade of the store, so the containers and
//! the catalog always change together: either the whole unit commits at the
//! next version or nothing does.

use std::fmt;

use tracing::info;

use crate::catalog::TableDef;
use crate::error::{Error, Result};
use crate::storage::{ConnectionManager, KvStore, Record, Upgrade};

/// A structural change to the store
#[derive(Debug, Clone, PartialEq)]
pub enum Migration {
    /// Create an empty auto-increment table keyed by its first column
    CreateTable(TableDef),
    /// Drop a table; dropping a missing table changes nothing
    DropTable(String),
    /// Move a table and its records to a new name
    RenameTable { from: String, to: String },
    /// Create a table and load its rows in the same unit
    MaterializeRows { table: TableDef, rows: Vec<Record> },
}

impl Migration {
    /// Apply this migration to an open upgrade
    pub fn apply_to(&self, up: &mut Upgrade<'_>) -> Result<()> {
        match self {
            Migration::CreateTable(table) => {
                let key_path = check_new_table(up, table)?;
                up.create_container(&table.name, &key_path, true)?;
                up.catalog_mut().put(table.clone());
            }
            Migration::DropTable(name) => {
                up.delete_container(name);
                up.catalog_mut().delete(name);
            }
            Migration::RenameTable { from, to } => {
                let def = up
                    .catalog()
                    .get(from)
                    .cloned()
                    .ok_or_else(|| Error::TableNotFound(from.clone()))?;
                if from == to {
                    return Ok(());
                }
                if up.catalog().contains(to) || up.has_container(to) {
                    return Err(Error::TableAlreadyExists(to.clone()));
                }

                let source = up.container(from)?;
                let key_path = source.key_path().to_string();
                let auto_increment = source.auto_increment();
                let records: Vec<Record> = source.scan().cloned().collect();

                let target = up.create_container(to, &key_path, auto_increment)?;
                for record in records {
                    target.put(record)?;
                }
                up.delete_container(from);

                let catalog = up.catalog_mut();
                catalog.delete(from);
                catalog.put(TableDef::new(to.clone(), def.columns));
            }
            Migration::MaterializeRows { table, rows } => {
                let key_path = check_new_table(up, table)?;
                let container = up.create_container(&table.name, &key_path, false)?;
                for row in rows {
                    container.add(row.clone())?;
                }
                up.catalog_mut().put(table.clone());
            }
        }
        Ok(())
    }
}

/// Validate a table about to be created and return its key path
fn check_new_table(up: &Upgrade<'_>, table: &TableDef) -> Result<String> {
    let key = table
        .primary_key()
        .ok_or_else(|| Error::EmptyColumnList(table.name.clone()))?;
    if up.catalog().contains(&table.name) || up.has_container(&table.name) {
        return Err(Error::TableAlreadyExists(table.name.clone()));
    }
    Ok(key.name.clone())
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Migration::CreateTable(t) => write!(f, "create table \"{}\"", t.name),
            Migration::DropTable(name) => write!(f, "drop table \"{}\"", name),
            Migration::RenameTable { from, to } => {
                write!(f, "rename table \"{}\" to \"{}\"", from, to)
            }
            Migration::MaterializeRows { table, rows } => {
                write!(f, "materialize table \"{}\" ({} rows)", table.name, rows.len())
            }
        }
    }
}

/// Applies migrations through the connection manager
pub struct MigrationManager<'a, S: KvStore> {
    connections: &'a ConnectionManager<S>,
}

impl<'a, S: KvStore> MigrationManager<'a, S> {
    pub fn new(connections: &'a ConnectionManager<S>) -> Self {
        Self { connections }
    }

    /// Apply one migration as its own upgrade, returning the new version
    pub async fn apply(&self, migration: Migration) -> Result<u64> {
        self.apply_all(vec![migration]).await
    }

    /// Apply several migrations as one upgrade, returning the new version
    pub async fn apply_all(&self, migrations: Vec<Migration>) -> Result<u64> {
        let version = self
            .connections
            .upgrade(|up| {
                for migration in &migrations {
                    migration.apply_to(up)?;
                }
                Ok(up.version())
            })
            .await?;
        for migration in &migrations {
            info!(version, "applied migration: {}", migration);
        }
        Ok(version)
    }

    pub async fn create_table(&self, table: TableDef) -> Result<u64> {
        self.apply(Migration::CreateTable(table)).await
    }

    pub async fn drop_table(&self, name: &str) -> Result<u64> {
        self.apply(Migration::DropTable(name.to_string())).await
    }

    pub async fn rename_table(&self, from: &str, to: &str) -> Result<u64> {
        self.apply(Migration::RenameTable {
            from: from.to_string(),
            to: to.to_string(),
        })
        .await
    }

    pub async fn materialize_rows(&self, table: TableDef, rows: Vec<Record>) -> Result<u64> {
        self.apply(Migration::MaterializeRows { table, rows }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType};
    use crate::storage::{MemoryStore, Value};

    fn people() -> TableDef {
        TableDef::new(
            "people",
            vec![
                Column::new("id", DataType::Integer),
                Column::new("name", DataType::Text),
            ],
        )
    }

    fn person(id: i64, name: &str) -> Record {
        let mut r = Record::new();
        r.insert("id".into(), Value::Integer(id));
        r.insert("name".into(), Value::from(name));
        r
    }

    #[tokio::test]
    async fn test_create_table_updates_catalog_and_container() {
        let conn = ConnectionManager::new(MemoryStore::new());
        let migrations = MigrationManager::new(&conn);

        assert_eq!(migrations.create_table(people()).await.unwrap(), 2);

        conn.read(|image| {
            assert_eq!(image.catalog.get("people"), Some(&people()));
            let container = &image.containers["people"];
            assert_eq!(container.key_path(), "id");
            assert!(container.auto_increment());
            Ok(())
        })
        .await
        .unwrap();

        let err = migrations.create_table(people()).await.unwrap_err();
        assert!(matches!(err, Error::TableAlreadyExists(name) if name == "people"));
        assert_eq!(conn.version().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_create_table_without_columns() {
        let conn = ConnectionManager::new(MemoryStore::new());
        let err = MigrationManager::new(&conn)
            .create_table(TableDef::new("empty", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyColumnList(_)));
    }

    #[tokio::test]
    async fn test_rename_moves_records() {
        let conn = ConnectionManager::new(MemoryStore::new());
        let migrations = MigrationManager::new(&conn);
        migrations
            .materialize_rows(people(), vec![person(2, "b"), person(1, "a")])
            .await
            .unwrap();

        migrations.rename_table("people", "humans").await.unwrap();

        conn.read(|image| {
            assert!(!image.catalog.contains("people"));
            assert!(!image.has_container("people"));
            let def = image.catalog.get("humans").unwrap();
            assert_eq!(def.column_names(), vec!["id", "name"]);
            let container = &image.containers["humans"];
            assert!(!container.auto_increment());
            let names: Vec<_> = container.scan().map(|r| r["name"].clone()).collect();
            assert_eq!(names, vec![Value::from("a"), Value::from("b")]);
            Ok(())
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_rename_errors() {
        let conn = ConnectionManager::new(MemoryStore::new());
        let migrations = MigrationManager::new(&conn);
        migrations.create_table(people()).await.unwrap();
        migrations
            .create_table(TableDef::new("other", vec![Column::new("k", DataType::Text)]))
            .await
            .unwrap();

        let err = migrations.rename_table("missing", "x").await.unwrap_err();
        assert!(matches!(err, Error::TableNotFound(_)));
        let err = migrations.rename_table("people", "other").await.unwrap_err();
        assert!(matches!(err, Error::TableAlreadyExists(_)));

        // Renaming onto itself changes nothing but still succeeds
        migrations.rename_table("people", "people").await.unwrap();
        assert!(conn.read(|i| Ok(i.catalog.contains("people"))).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_materialize_leaves_no_table() {
        let conn = ConnectionManager::new(MemoryStore::new());
        let migrations = MigrationManager::new(&conn);

        let err = migrations
            .materialize_rows(people(), vec![person(1, "a"), person(1, "dup")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { .. }));

        conn.read(|image| {
            assert!(!image.catalog.contains("people"));
            assert!(!image.has_container("people"));
            assert_eq!(image.version, 1);
            Ok(())
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_apply_all_is_one_unit() {
        let conn = ConnectionManager::new(MemoryStore::new());
        let migrations = MigrationManager::new(&conn);

        let version = migrations
            .apply_all(vec![
                Migration::CreateTable(people()),
                Migration::RenameTable {
                    from: "people".into(),
                    to: "humans".into(),
                },
                Migration::DropTable("never_existed".into()),
            ])
            .await
            .unwrap();
        assert_eq!(version, 2);
        assert_eq!(
            conn.read(|i| Ok(i.container_names())).await.unwrap(),
            vec!["humans"]
        );

        let err = migrations
            .apply_all(vec![
                Migration::DropTable("humans".into()),
                Migration::CreateTable(TableDef::new("bad", vec![])),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyColumnList(_)));
        assert!(conn.read(|i| Ok(i.has_container("humans"))).await.unwrap());
    }

    #[test]
    fn test_display() {
        let m = Migration::RenameTable {
            from: "a".into(),
            to: "b".into(),
        };
        assert_eq!(m.to_string(), "rename table \"a\" to \"b\"");
    }
}
