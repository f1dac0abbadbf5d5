//! Storage module
//!
//! This module contains the storage components:
//! - Values, keys and records
//! - Record containers
//! - The store interface, its change sets, and the fjall and in-memory adapters
//! - The connection manager

pub mod connection;
pub mod container;
pub mod engine;
pub mod memory;
pub mod partition;
pub mod value;

pub use connection::{ConnectionManager, OpenOutcome, Transaction, Upgrade};
pub use container::{Container, ContainerChanges};
pub use engine::{ChangeSet, KvStore, StoreImage};
pub use memory::MemoryStore;
pub use partition::PartitionStore;
pub use value::{Key, Record, Value};
