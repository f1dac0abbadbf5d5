//! Abstract store interface
//!
//! A store persists one [`StoreImage`]: the version number, the catalog and
//! every record container. The live connection keeps the image in memory and
//! hands the store a [`ChangeSet`] at commit time, naming only what the
//! transaction or upgrade changed.

use std::collections::BTreeMap;
use std::future::Future;

use super::container::{Container, ContainerChanges};
use crate::catalog::Catalog;
use crate::error::{Error, Result};

/// Everything a store persists
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreImage {
    /// Schema version, bumped by every structural upgrade
    pub version: u64,
    /// Table definitions keyed by table name
    pub catalog: Catalog,
    /// One container per table
    pub containers: BTreeMap<String, Container>,
}

impl StoreImage {
    /// An empty image at version 0, before the first upgrade
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all containers, sorted
    pub fn container_names(&self) -> Vec<String> {
        self.containers.keys().cloned().collect()
    }

    pub fn has_container(&self, name: &str) -> bool {
        self.containers.contains_key(name)
    }

    /// Apply a change set, leaving the image untouched if it does not fit
    pub fn apply(&mut self, changes: &ChangeSet<'_>) -> Result<()> {
        for update in &changes.updated {
            if !self.has_container(update.name) {
                return Err(Error::ContainerNotFound(update.name.to_string()));
            }
        }

        self.version = changes.version;
        if let Some(catalog) = changes.catalog {
            self.catalog = catalog.clone();
        }
        for name in &changes.dropped {
            self.containers.remove(name);
        }
        for container in &changes.created {
            self.containers
                .insert(container.name().to_string(), (*container).clone());
        }
        for update in &changes.updated {
            if let Some(container) = self.containers.get_mut(update.name) {
                container.apply(update);
            }
        }
        Ok(())
    }
}

/// What one commit changes
///
/// Stores apply `dropped` before `created`, so an upgrade may drop a
/// container and create a new one under the same name.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet<'a> {
    /// Version of the store after the commit
    pub version: u64,
    /// The whole catalog, when it may have changed
    pub catalog: Option<&'a Catalog>,
    /// Containers deleted
    pub dropped: Vec<String>,
    /// Containers written in full
    pub created: Vec<&'a Container>,
    /// Record changes in containers that already existed
    pub updated: Vec<ContainerChanges<'a>>,
}

impl<'a> ChangeSet<'a> {
    /// Everything in an image, as written when a store is created
    pub fn full(image: &'a StoreImage) -> Self {
        Self {
            version: image.version,
            catalog: Some(&image.catalog),
            dropped: Vec::new(),
            created: image.containers.values().collect(),
            updated: Vec::new(),
        }
    }
}

/// Key-value store adapter
///
/// Implementations must make `commit` atomic: after it returns, `load`
/// yields the previous image with the change set applied, and a failed
/// commit leaves the previous image in place.
pub trait KvStore: Send + Sync {
    /// Human readable location of the store, for logging
    fn location(&self) -> String;

    /// Load the persisted image, or `None` if the store was never created
    fn load(&self) -> impl Future<Output = Result<Option<StoreImage>>> + Send;

    /// Durably apply a change set to the persisted image
    fn commit(&self, changes: &ChangeSet<'_>) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType, TableDef};
    use crate::storage::{Key, MemoryStore, PartitionStore, Record, Value};

    fn named(name: &str) -> Record {
        let mut r = Record::new();
        r.insert("name".into(), Value::from(name));
        r
    }

    fn sample_image() -> StoreImage {
        let mut image = StoreImage::new();
        image.version = 3;
        image.catalog.put(TableDef::new(
            "t",
            vec![
                Column::new("id", DataType::Integer),
                Column::new("name", DataType::Text),
            ],
        ));
        let mut c = Container::new("t", "id", true);
        c.add(named("x")).unwrap();
        c.add(named("y")).unwrap();
        image.containers.insert("t".into(), c);
        image
    }

    /// Behavior every adapter shares
    async fn check_store(store: impl KvStore) -> Result<()> {
        assert!(store.load().await?.is_none());

        let image = sample_image();
        store.commit(&ChangeSet::full(&image)).await?;
        assert_eq!(store.load().await?, Some(image.clone()));

        // A transaction changing single records
        let mut next = image;
        let t = next.containers.get_mut("t").unwrap();
        t.begin();
        t.add(named("z"))?;
        t.delete(&Key::Integer(1));
        let changes = ChangeSet {
            version: 3,
            updated: vec![t.changes().unwrap()],
            ..ChangeSet::default()
        };
        store.commit(&changes).await?;
        t.commit();
        assert_eq!(store.load().await?, Some(next.clone()));

        // An upgrade replacing the container with an empty one of the same name
        let mut last = next;
        last.version = 4;
        last.containers
            .insert("t".into(), Container::new("t", "name", false));
        let changes = ChangeSet {
            version: 4,
            catalog: Some(&last.catalog),
            dropped: vec!["t".into()],
            created: last.containers.values().collect(),
            updated: Vec::new(),
        };
        store.commit(&changes).await?;
        assert_eq!(store.load().await?, Some(last.clone()));

        // Dropping everything
        last.version = 5;
        last.containers.clear();
        last.catalog = Catalog::new();
        let changes = ChangeSet {
            version: 5,
            catalog: Some(&last.catalog),
            dropped: vec!["t".into()],
            ..ChangeSet::default()
        };
        store.commit(&changes).await?;
        assert_eq!(store.load().await?, Some(last));
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_store() -> Result<()> {
        check_store(MemoryStore::new()).await
    }

    #[tokio::test]
    async fn test_partition_store() -> Result<()> {
        let dir = tempfile::tempdir()?;
        check_store(PartitionStore::open(dir.path().join("db"))?).await
    }

    #[test]
    fn test_apply_rejects_unknown_container() {
        let mut image = sample_image();
        let mut other = Container::new("other", "id", true);
        other.begin();
        other.add(named("a")).unwrap();

        let changes = ChangeSet {
            version: 9,
            updated: vec![other.changes().unwrap()],
            ..ChangeSet::default()
        };
        let err = image.apply(&changes).unwrap_err();
        assert!(matches!(err, Error::ContainerNotFound(_)));
        assert_eq!(image, sample_image());
    }
}
