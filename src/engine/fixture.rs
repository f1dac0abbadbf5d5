//! Demo tables seeded into a freshly created store

use tracing::info;

use crate::catalog::{Column, DataType, Schema, TableDef};
use crate::error::Result;
use crate::executor::Migration;
use crate::storage::{Record, Upgrade, Value};

/// Table definitions of the demo schema
pub fn demo_schema() -> Schema {
    vec![
        TableDef::new(
            "employees",
            vec![
                Column::new("employee_id", DataType::Integer),
                Column::new("first_name", DataType::Text),
                Column::new("last_name", DataType::Text),
                Column::new("email", DataType::Text),
                Column::new("hire_date", DataType::Date),
                Column::new("department_id", DataType::Integer),
                Column::new("salary", DataType::Real),
            ],
        ),
        TableDef::new(
            "departments",
            vec![
                Column::new("department_id", DataType::Integer),
                Column::new("department_name", DataType::Text),
            ],
        ),
        TableDef::new(
            "projects",
            vec![
                Column::new("project_id", DataType::Integer),
                Column::new("project_name", DataType::Text),
                Column::new("start_date", DataType::Date),
                Column::new("end_date", DataType::Date),
            ],
        ),
        TableDef::new(
            "project_assignments",
            vec![
                Column::new("assignment_id", DataType::Integer),
                Column::new("project_id", DataType::Integer),
                Column::new("employee_id", DataType::Integer),
            ],
        ),
    ]
}

fn employee(id: i64, first: &str, last: &str, hired: &str, dept: i64, salary: i64) -> Record {
    let email = format!("{}.{}@example.com", first, last).to_lowercase();
    [
        ("employee_id", Value::Integer(id)),
        ("first_name", Value::from(first)),
        ("last_name", Value::from(last)),
        ("email", Value::from(email)),
        ("hire_date", Value::from(hired)),
        ("department_id", Value::Integer(dept)),
        ("salary", Value::Integer(salary)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn department(id: i64, name: &str) -> Record {
    [
        ("department_id", Value::Integer(id)),
        ("department_name", Value::from(name)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Demo rows per table
pub fn demo_rows() -> Vec<(&'static str, Vec<Record>)> {
    vec![
        (
            "employees",
            vec![
                employee(101, "John", "Doe", "2022-01-15", 2, 75000),
                employee(102, "Jane", "Smith", "2021-03-20", 1, 82000),
                employee(103, "Peter", "Jones", "2022-05-10", 2, 68000),
            ],
        ),
        (
            "departments",
            vec![department(1, "Engineering"), department(2, "Marketing")],
        ),
    ]
}

/// Create the demo tables and load their rows inside an open upgrade
///
/// Run as the initializer of a new store, so version 1 already holds the
/// demo data and a failure leaves no store behind.
pub fn seed(up: &mut Upgrade<'_>) -> Result<()> {
    let tables = demo_schema();
    let count = tables.len();
    for table in tables {
        Migration::CreateTable(table).apply_to(up)?;
    }

    let mut rows = 0usize;
    for (table, records) in demo_rows() {
        let container = up.container_mut(table)?;
        for record in records {
            container.put(record)?;
            rows += 1;
        }
    }

    info!(tables = count, rows, "demo schema seeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ConnectionManager, KvStore, MemoryStore, OpenOutcome};

    #[test]
    fn test_demo_emails() {
        let rows = demo_rows();
        assert_eq!(rows[0].1[1]["email"], Value::from("jane.smith@example.com"));
    }

    #[tokio::test]
    async fn test_seed() {
        let conn = ConnectionManager::new(MemoryStore::new());
        assert_eq!(conn.open_with(seed).await.unwrap(), OpenOutcome::Created);

        conn.read(|image| {
            assert_eq!(image.version, 1);
            assert_eq!(image.catalog.len(), 4);
            assert_eq!(image.containers["employees"].len(), 3);
            assert_eq!(image.containers["departments"].len(), 2);
            assert!(image.containers["projects"].is_empty());
            Ok(())
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_failed_seed_leaves_no_store() {
        let store = MemoryStore::new();
        let conn = ConnectionManager::new(store.clone());
        let err = conn
            .open_with(|up| {
                seed(up)?;
                Err(crate::error::Error::StorageError("interrupted".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::Error::StorageError(_)));
        assert!(store.load().await.unwrap().is_none());

        // The next open seeds from scratch
        let conn = ConnectionManager::new(store.clone());
        assert_eq!(conn.open_with(seed).await.unwrap(), OpenOutcome::Created);
        let image = store.load().await.unwrap().unwrap();
        assert_eq!(image.containers["employees"].len(), 3);
    }
}
