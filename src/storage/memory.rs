use std::sync::Arc;
use tokio::sync::Mutex;

use super::engine::{ChangeSet, KvStore, StoreImage};
use crate::error::Result;

/// In-memory store
///
/// Clones share the same image, so a test can drop an engine and open a new
/// one over the "persisted" data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    image: Arc<Mutex<Option<StoreImage>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn location(&self) -> String {
        "memory".to_string()
    }

    async fn load(&self) -> Result<Option<StoreImage>> {
        Ok(self.image.lock().await.clone())
    }

    async fn commit(&self, changes: &ChangeSet<'_>) -> Result<()> {
        let mut image = self.image.lock().await;
        image.get_or_insert_with(StoreImage::new).apply(changes)
    }
}
