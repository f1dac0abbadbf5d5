//! StudioDB - an embedded SQL engine over a versioned key-value store
//!
//! This library provides the components of the engine:
//! - SQL parsing (lexer, parser, AST) and literal coercion
//! - Storage (store images, record containers, the fjall-backed and
//!   in-memory stores, connection management)
//! - Statement execution (schema migrations, queries)
//! - Schema catalog
//! - The engine facade used by the CLI

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod sql;
pub mod storage;

pub use config::{EngineConfig, WhereSemantics};
pub use engine::Engine;
pub use error::{Error, ErrorKind, Result};
pub use executor::ExecutionResult;
