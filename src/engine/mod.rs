//! Engine entry points
//!
//! The [`Engine`] owns the connection manager and routes each statement:
//! CREATE and DROP go through the migration manager as upgrades, SELECT,
//! INSERT and DELETE through the query executor as transactions. Every entry
//! point opens the store on first use.

pub mod fixture;

use tracing::{debug, info};

use crate::catalog::{Schema, TableDef};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::executor::{ExecutionResult, MigrationManager, QueryExecutor};
use crate::sql::ast::{InsertStatement, Statement};
use crate::sql::parse;
use crate::storage::{
    ConnectionManager, KvStore, MemoryStore, OpenOutcome, PartitionStore, Value,
};

/// The query engine
pub struct Engine<S: KvStore> {
    connections: ConnectionManager<S>,
    config: EngineConfig,
}

impl Engine<PartitionStore> {
    /// Create an engine over the store directory named in the config
    pub fn open(config: EngineConfig) -> Result<Self> {
        let store = PartitionStore::open(config.path.clone())?;
        Ok(Self::with_store(store, config))
    }
}

impl Engine<MemoryStore> {
    /// Create an engine over a fresh in-memory store
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::with_store(MemoryStore::new(), config)
    }
}

impl<S: KvStore> Engine<S> {
    pub fn with_store(store: S, config: EngineConfig) -> Self {
        Self {
            connections: ConnectionManager::new(store),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn connections(&self) -> &ConnectionManager<S> {
        &self.connections
    }

    /// Open the store, creating it if needed
    ///
    /// Returns `true` when this call created the store. A new store is seeded
    /// with the demo tables unless seeding is disabled; seeding is part of
    /// creating the store, so a failed seed leaves no store behind.
    pub async fn initialize(&self) -> Result<bool> {
        let outcome = if self.config.seed_demo {
            self.connections.open_with(fixture::seed).await?
        } else {
            self.connections.open().await?
        };
        Ok(outcome == OpenOutcome::Created)
    }

    /// All table definitions, sorted by name
    pub async fn get_schema(&self) -> Result<Schema> {
        self.initialize().await?;
        self.connections.read(|image| Ok(image.catalog.list())).await
    }

    /// Current store version
    pub async fn version(&self) -> Result<u64> {
        self.initialize().await?;
        self.connections.version().await
    }

    /// Parse and execute one statement
    pub async fn execute_statement(&self, sql: &str) -> Result<ExecutionResult> {
        self.initialize().await?;
        let stmt = parse(sql)?;
        debug!(statement = %stmt, "executing");
        self.execute(stmt).await
    }

    /// Execute a parsed statement
    pub async fn execute(&self, stmt: Statement) -> Result<ExecutionResult> {
        let ddl = stmt.is_ddl();
        let result = self.dispatch(stmt).await?;
        Ok(if ddl {
            result.with_schema_changed()
        } else {
            result
        })
    }

    async fn dispatch(&self, stmt: Statement) -> Result<ExecutionResult> {
        let migrations = MigrationManager::new(&self.connections);
        let queries = QueryExecutor::new(&self.connections, self.config.where_semantics);

        match stmt {
            Statement::CreateTable(s) => {
                let name = s.table_name.clone();
                migrations
                    .create_table(TableDef::new(s.table_name, s.columns))
                    .await?;
                Ok(ExecutionResult::status(format!(
                    "Table \"{}\" created successfully.",
                    name
                )))
            }
            Statement::CreateTableAsSelect(s) => {
                let (table, rows) = s.materialize()?;
                let count = rows.len();
                migrations.materialize_rows(table, rows).await?;
                Ok(ExecutionResult::status(format!(
                    "Table \"{}\" created with {} rows.",
                    s.table_name, count
                )))
            }
            Statement::DropTable(s) => {
                migrations.drop_table(&s.table_name).await?;
                Ok(ExecutionResult::status(format!(
                    "Table \"{}\" dropped successfully.",
                    s.table_name
                )))
            }
            Statement::Select(s) => queries.select(&s).await,
            Statement::Insert(s) => queries.insert(&s).await,
            Statement::Delete(s) => queries.delete(&s).await,
        }
    }

    /// Rename a table, keeping its columns and records
    pub async fn rename_table(&self, old_name: &str, new_name: &str) -> Result<()> {
        self.initialize().await?;
        MigrationManager::new(&self.connections)
            .rename_table(old_name, new_name)
            .await?;
        info!(from = old_name, to = new_name, "table renamed");
        Ok(())
    }

    /// INSERT statements that reproduce a table's records, in key order
    pub async fn dump_table(&self, name: &str) -> Result<Vec<String>> {
        self.initialize().await?;
        self.connections
            .read(|image| {
                let container = image
                    .containers
                    .get(name)
                    .ok_or_else(|| Error::TableNotFound(name.to_string()))?;
                let columns = image.catalog.get(name).map(|t| t.column_names());

                let statements = container
                    .scan()
                    .map(|record| {
                        let columns = columns
                            .clone()
                            .unwrap_or_else(|| record.keys().cloned().collect());
                        let values = columns
                            .iter()
                            .map(|c| record.get(c).cloned().unwrap_or(Value::Null))
                            .collect();
                        Statement::Insert(InsertStatement {
                            table_name: name.to_string(),
                            columns: Some(columns),
                            rows: vec![values],
                        })
                        .to_string()
                    })
                    .collect();
                Ok(statements)
            })
            .await
    }
}
