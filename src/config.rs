//! Engine configuration

use std::path::PathBuf;

/// Default store directory used by the CLI
pub const DEFAULT_DB_PATH: &str = "studiodb.db";

/// How `WHERE column = literal` selects records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhereSemantics {
    /// The literal is looked up as the primary key, whatever column is named
    #[default]
    KeyLookup,
    /// Key lookup when the named column is the key column, otherwise a scan
    /// keeping records whose column equals the literal
    ColumnFilter,
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Store directory for engines on a partition store
    pub path: PathBuf,
    /// Seed the demo tables when the store is first created
    pub seed_demo: bool,
    /// WHERE clause semantics for SELECT and DELETE
    pub where_semantics: WhereSemantics,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
            seed_demo: true,
            where_semantics: WhereSemantics::default(),
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the store directory
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Enable or disable demo seeding
    pub fn seed_demo(mut self, seed: bool) -> Self {
        self.seed_demo = seed;
        self
    }

    /// Set the WHERE clause semantics
    pub fn where_semantics(mut self, semantics: WhereSemantics) -> Self {
        self.where_semantics = semantics;
        self
    }
}
