//! Statement execution module
//!
//! This module contains the migration manager for structural changes and the
//! query executor for data statements.

pub mod migration;
pub mod query;
pub mod result;

pub use migration::{Migration, MigrationManager};
pub use query::QueryExecutor;
pub use result::ExecutionResult;
