//! Data statements: SELECT, INSERT and DELETE
//!
//! These run as transactions on the live connection and never change the
//! structure of the store.

use tracing::debug;

use super::result::ExecutionResult;
use crate::config::WhereSemantics;
use crate::error::{Error, Result};
use crate::sql::ast::{DeleteStatement, InsertStatement, Projection, SelectStatement, WhereClause};
use crate::storage::{ConnectionManager, Container, Key, KvStore, Record, Value};

/// Executes data statements through the connection manager
pub struct QueryExecutor<'a, S: KvStore> {
    connections: &'a ConnectionManager<S>,
    where_semantics: WhereSemantics,
}

impl<'a, S: KvStore> QueryExecutor<'a, S> {
    pub fn new(connections: &'a ConnectionManager<S>, where_semantics: WhereSemantics) -> Self {
        Self {
            connections,
            where_semantics,
        }
    }

    /// Run a SELECT
    ///
    /// `*` expands to the catalog's column order. Named columns are used as
    /// given; a record without the field yields NULL.
    pub async fn select(&self, stmt: &SelectStatement) -> Result<ExecutionResult> {
        self.connections
            .read(|image| {
                let container = image
                    .containers
                    .get(&stmt.table_name)
                    .ok_or_else(|| Error::TableNotFound(stmt.table_name.clone()))?;

                let columns = match &stmt.projection {
                    Projection::Wildcard => image
                        .catalog
                        .get(&stmt.table_name)
                        .map(|t| t.column_names())
                        .unwrap_or_default(),
                    Projection::Columns(columns) => columns.clone(),
                };

                let records: Vec<&Record> = match &stmt.where_clause {
                    Some(clause) => self
                        .matching_keys(container, clause)
                        .iter()
                        .filter_map(|key| container.get(key))
                        .collect(),
                    None => container.scan().collect(),
                };

                let rows = records
                    .into_iter()
                    .map(|record| project(record, &columns))
                    .collect::<Vec<_>>();
                debug!(table = %stmt.table_name, rows = rows.len(), "select");
                Ok(ExecutionResult::rows(columns, rows))
            })
            .await
    }

    /// Run an INSERT, returning a status result
    ///
    /// Without a column list the values follow the catalog's column order.
    /// All rows are added in one transaction; any failing row rejects them
    /// all.
    pub async fn insert(&self, stmt: &InsertStatement) -> Result<ExecutionResult> {
        let table = &stmt.table_name;
        let inserted = self
            .connections
            .write(|tx| {
                if !tx.has_container(table) {
                    return Err(Error::TableNotFound(table.clone()));
                }
                let columns = match &stmt.columns {
                    Some(columns) => columns.clone(),
                    None => tx
                        .catalog()
                        .get(table)
                        .map(|t| t.column_names())
                        .unwrap_or_default(),
                };

                let container = tx.container_mut(table)?;
                for values in &stmt.rows {
                    if values.len() != columns.len() {
                        return Err(Error::ColumnCountMismatch {
                            expected: columns.len(),
                            found: values.len(),
                        });
                    }
                    let record: Record = columns
                        .iter()
                        .cloned()
                        .zip(values.iter().cloned())
                        .collect();
                    let key = container.add(record)?;
                    debug!(table = %table, key = %key, "record added");
                }
                Ok(stmt.rows.len())
            })
            .await?;

        Ok(ExecutionResult::status(format!(
            "{} row(s) inserted into \"{}\".",
            inserted, table
        )))
    }

    /// Run a DELETE, returning a status result with the number of records
    /// removed
    pub async fn delete(&self, stmt: &DeleteStatement) -> Result<ExecutionResult> {
        let table = &stmt.table_name;
        let clause = stmt
            .where_clause
            .as_ref()
            .ok_or_else(|| Error::DeleteWithoutWhere(table.clone()))?;

        let deleted = self
            .connections
            .write(|tx| {
                if !tx.has_container(table) {
                    return Err(Error::TableNotFound(table.clone()));
                }
                let container = tx.container_mut(table)?;
                let keys = self.matching_keys(container, clause);
                Ok(keys.iter().filter(|key| container.delete(key)).count())
            })
            .await?;

        Ok(ExecutionResult::status(format!(
            "{} row(s) deleted from \"{}\".",
            deleted, table
        )))
    }

    /// Keys of the records a WHERE clause selects
    fn matching_keys(&self, container: &Container, clause: &WhereClause) -> Vec<Key> {
        let lookup = || -> Vec<Key> {
            Key::from_value(&clause.value)
                .filter(|key| container.get(key).is_some())
                .into_iter()
                .collect()
        };

        match self.where_semantics {
            WhereSemantics::KeyLookup => lookup(),
            WhereSemantics::ColumnFilter if clause.column == container.key_path() => lookup(),
            WhereSemantics::ColumnFilter => container
                .scan()
                .filter(|record| {
                    record
                        .get(&clause.column)
                        .is_some_and(|value| value.sql_eq(&clause.value))
                })
                .filter_map(|record| record.get(container.key_path()).and_then(Key::from_value))
                .collect(),
        }
    }
}

fn project(record: &Record, columns: &[String]) -> Vec<Value> {
    columns
        .iter()
        .map(|column| record.get(column).cloned().unwrap_or(Value::Null))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType, TableDef};
    use crate::executor::MigrationManager;
    use crate::sql::ast::Statement;
    use crate::sql::parse;
    use crate::storage::MemoryStore;

    async fn setup() -> ConnectionManager<MemoryStore> {
        let conn = ConnectionManager::new(MemoryStore::new());
        MigrationManager::new(&conn)
            .create_table(TableDef::new(
                "users",
                vec![
                    Column::new("id", DataType::Integer),
                    Column::new("name", DataType::Text),
                    Column::new("city", DataType::Text),
                ],
            ))
            .await
            .unwrap();
        conn
    }

    async fn run(
        conn: &ConnectionManager<MemoryStore>,
        semantics: WhereSemantics,
        sql: &str,
    ) -> Result<ExecutionResult> {
        let exec = QueryExecutor::new(conn, semantics);
        match parse(sql)? {
            Statement::Select(s) => exec.select(&s).await,
            Statement::Insert(s) => exec.insert(&s).await,
            Statement::Delete(s) => exec.delete(&s).await,
            other => panic!("not a data statement: {}", other),
        }
    }

    async fn seed(conn: &ConnectionManager<MemoryStore>) {
        run(
            conn,
            WhereSemantics::KeyLookup,
            "INSERT INTO users (id, name, city) VALUES (1, 'Ann', 'Oslo'), (2, 'Bob', 'Rome'), (3, 'Cid', 'Oslo')",
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_insert_and_select_all() {
        let conn = setup().await;
        let result = run(
            &conn,
            WhereSemantics::KeyLookup,
            "INSERT INTO users (id, name, city) VALUES (2, 'Bob', 'Rome'), (1, 'Ann', NULL)",
        )
        .await
        .unwrap();
        assert_eq!(result.message(), Some("2 row(s) inserted into \"users\"."));

        let result = run(&conn, WhereSemantics::KeyLookup, "SELECT * FROM users")
            .await
            .unwrap();
        assert_eq!(result.columns, vec!["id", "name", "city"]);
        assert_eq!(
            result.rows,
            vec![
                vec![Value::Integer(1), Value::from("Ann"), Value::Null],
                vec![Value::Integer(2), Value::from("Bob"), Value::from("Rome")],
            ]
        );
    }

    #[tokio::test]
    async fn test_insert_assigns_keys() {
        let conn = setup().await;
        run(
            &conn,
            WhereSemantics::KeyLookup,
            "INSERT INTO users (name) VALUES ('Ann'), ('Bob')",
        )
        .await
        .unwrap();
        run(
            &conn,
            WhereSemantics::KeyLookup,
            "INSERT INTO users VALUES (NULL, 'Cid', 'Oslo')",
        )
        .await
        .unwrap();

        let result = run(&conn, WhereSemantics::KeyLookup, "SELECT id, name FROM users")
            .await
            .unwrap();
        assert_eq!(
            result.rows,
            vec![
                vec![Value::Integer(1), Value::from("Ann")],
                vec![Value::Integer(2), Value::from("Bob")],
                vec![Value::Integer(3), Value::from("Cid")],
            ]
        );
    }

    #[tokio::test]
    async fn test_insert_errors_reject_whole_statement() {
        let conn = setup().await;
        seed(&conn).await;

        let err = run(
            &conn,
            WhereSemantics::KeyLookup,
            "INSERT INTO users (id, name) VALUES (9, 'x'), (1, 'dup')",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { .. }));

        let err = run(
            &conn,
            WhereSemantics::KeyLookup,
            "INSERT INTO users (id, name) VALUES (10)",
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            Error::ColumnCountMismatch {
                expected: 2,
                found: 1
            }
        ));

        let err = run(&conn, WhereSemantics::KeyLookup, "INSERT INTO nope VALUES (1)")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TableNotFound(_)));

        let result = run(&conn, WhereSemantics::KeyLookup, "SELECT id FROM users")
            .await
            .unwrap();
        assert_eq!(result.rows.len(), 3);
    }

    #[tokio::test]
    async fn test_select_missing_fields_are_null() {
        let conn = setup().await;
        seed(&conn).await;
        let result = run(
            &conn,
            WhereSemantics::KeyLookup,
            "SELECT name, age FROM users WHERE id = 2",
        )
        .await
        .unwrap();
        assert_eq!(result.columns, vec!["name", "age"]);
        assert_eq!(result.rows, vec![vec![Value::from("Bob"), Value::Null]]);
    }

    #[tokio::test]
    async fn test_key_lookup_ignores_column_name() {
        let conn = setup().await;
        seed(&conn).await;

        let result = run(
            &conn,
            WhereSemantics::KeyLookup,
            "SELECT name FROM users WHERE city = 2",
        )
        .await
        .unwrap();
        assert_eq!(result.rows, vec![vec![Value::from("Bob")]]);

        let result = run(
            &conn,
            WhereSemantics::KeyLookup,
            "SELECT name FROM users WHERE city = 'Oslo'",
        )
        .await
        .unwrap();
        assert!(result.rows.is_empty());
    }

    #[tokio::test]
    async fn test_column_filter() {
        let conn = setup().await;
        seed(&conn).await;

        let result = run(
            &conn,
            WhereSemantics::ColumnFilter,
            "SELECT name FROM users WHERE city = 'Oslo'",
        )
        .await
        .unwrap();
        assert_eq!(
            result.rows,
            vec![vec![Value::from("Ann")], vec![Value::from("Cid")]]
        );

        let result = run(
            &conn,
            WhereSemantics::ColumnFilter,
            "SELECT name FROM users WHERE id = 3.0",
        )
        .await
        .unwrap();
        assert_eq!(result.rows, vec![vec![Value::from("Cid")]]);

        let result = run(
            &conn,
            WhereSemantics::ColumnFilter,
            "DELETE FROM users WHERE city = 'Oslo'",
        )
        .await
        .unwrap();
        assert_eq!(result.message(), Some("2 row(s) deleted from \"users\"."));
    }

    #[tokio::test]
    async fn test_delete() {
        let conn = setup().await;
        seed(&conn).await;

        let err = run(&conn, WhereSemantics::KeyLookup, "DELETE FROM users")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeleteWithoutWhere(t) if t == "users"));

        let result = run(&conn, WhereSemantics::KeyLookup, "DELETE FROM users WHERE id = 1")
            .await
            .unwrap();
        assert_eq!(result.message(), Some("1 row(s) deleted from \"users\"."));

        // Exactly the named record is gone
        let result = run(&conn, WhereSemantics::KeyLookup, "SELECT id, name FROM users")
            .await
            .unwrap();
        assert_eq!(
            result.rows,
            vec![
                vec![Value::Integer(2), Value::from("Bob")],
                vec![Value::Integer(3), Value::from("Cid")],
            ]
        );

        let result = run(&conn, WhereSemantics::KeyLookup, "DELETE FROM users WHERE id = 1")
            .await
            .unwrap();
        assert_eq!(result.message(), Some("0 row(s) deleted from \"users\"."));

        let err = run(&conn, WhereSemantics::KeyLookup, "DELETE FROM nope WHERE id = 1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TableNotFound(_)));
    }

    #[tokio::test]
    async fn test_select_missing_table() {
        let conn = setup().await;
        let err = run(&conn, WhereSemantics::KeyLookup, "SELECT * FROM nope")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TableNotFound(t) if t == "nope"));
    }
}
