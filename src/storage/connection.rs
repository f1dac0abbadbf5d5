//! Connection management
//!
//! The engine holds at most one live connection to its store. Data changes
//! run as transactions against the open connection; structural changes
//! (creating, deleting or copying containers) are illegal on a live
//! connection and run as upgrades instead: the connection is closed, the store
//! reopened at the next version, the change applied and committed, and the
//! connection reopened. The write lock is held for that whole window, so any
//! other operation waits for the reopen. Creating a store is the upgrade from
//! version 0 to 1.
//!
//! Transactions and upgrades change the live image in place. Containers they
//! touch keep an undo journal: on success the journaled keys go to the store
//! as a [`ChangeSet`], on failure the journals are replayed backwards and the
//! live image is exactly what it was.

use std::collections::{BTreeMap, BTreeSet};

use tokio::sync::{RwLock, RwLockWriteGuard};
use tracing::{debug, info};

use super::container::{Container, ContainerChanges};
use super::engine::{ChangeSet, KvStore, StoreImage};
use crate::catalog::Catalog;
use crate::error::{Error, Result};

/// Outcome of opening the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The store did not exist and was created at version 1
    Created,
    /// An existing store was opened
    Opened,
    /// The connection was already open
    AlreadyOpen,
}

/// Owner of the single live connection
#[derive(Debug)]
pub struct ConnectionManager<S: KvStore> {
    store: S,
    /// The live connection's image; `None` while closed
    live: RwLock<Option<StoreImage>>,
}

fn no_init(_: &mut Upgrade<'_>) -> Result<()> {
    Ok(())
}

impl<S: KvStore> ConnectionManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            live: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn is_open(&self) -> bool {
        self.live.read().await.is_some()
    }

    /// Open the connection, creating an empty store if it does not exist
    pub async fn open(&self) -> Result<OpenOutcome> {
        self.open_with(no_init).await
    }

    /// Open the connection; a store created by this call is populated by
    /// `init` in the same unit as its creation
    ///
    /// If `init` fails nothing is written and the store still does not exist.
    pub async fn open_with<F>(&self, init: F) -> Result<OpenOutcome>
    where
        F: FnOnce(&mut Upgrade<'_>) -> Result<()>,
    {
        let mut live = self.live.write().await;
        self.open_locked(&mut live, init).await
    }

    /// Current schema version of the open store
    pub async fn version(&self) -> Result<u64> {
        self.read(|image| Ok(image.version)).await
    }

    /// Run a read-only closure against the live image
    pub async fn read<T>(&self, f: impl FnOnce(&StoreImage) -> Result<T>) -> Result<T> {
        {
            let live = self.live.read().await;
            if let Some(image) = live.as_ref() {
                return f(image);
            }
        }
        let mut live = self.live.write().await;
        self.open_locked(&mut live, no_init).await?;
        let image = live.as_ref().ok_or_else(closed)?;
        f(image)
    }

    /// Run a read-write transaction against the live connection
    ///
    /// The closure can change records of existing containers but cannot
    /// create or delete containers. Only the records it changed are
    /// committed; a transaction that changed nothing commits nothing.
    pub async fn write<T>(&self, f: impl FnOnce(&mut Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut live = self.live.write().await;
        self.open_locked(&mut live, no_init).await?;
        let image = live.as_mut().ok_or_else(closed)?;

        let mut tx = Transaction { image };
        let out = match f(&mut tx) {
            Ok(out) => out,
            Err(e) => {
                tx.rollback();
                return Err(e);
            }
        };

        let committed = {
            let changes = tx.change_set();
            if changes.updated.is_empty() {
                None
            } else {
                Some(self.store.commit(&changes).await)
            }
        };
        match committed {
            Some(Err(e)) => {
                tx.rollback();
                return Err(e);
            }
            Some(Ok(())) => debug!("transaction committed"),
            None => {}
        }
        tx.finish();
        Ok(out)
    }

    /// Run a structural upgrade
    ///
    /// Closes the live connection, reopens the store at `version + 1`, applies
    /// the closure and commits. On failure the upgrade is aborted: nothing is
    /// committed and the connection reopens at the old version.
    pub async fn upgrade<T>(&self, f: impl FnOnce(&mut Upgrade<'_>) -> Result<T>) -> Result<T> {
        let mut live = self.live.write().await;
        self.open_locked(&mut live, no_init).await?;

        // Structural changes cannot run against a live connection
        let mut image = live.take().ok_or_else(closed)?;
        debug!(store = %self.store.location(), "connection closed for upgrade");

        let version = image.version + 1;
        let result = self.run_upgrade(&mut image, version, f).await;
        *live = Some(image);

        match &result {
            Ok(_) => info!(version, "upgrade committed, connection reopened"),
            Err(e) => info!(version, error = %e, "upgrade aborted"),
        }
        result
    }

    async fn run_upgrade<T>(
        &self,
        image: &mut StoreImage,
        version: u64,
        f: impl FnOnce(&mut Upgrade<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut up = Upgrade::open(image, version);
        let out = match f(&mut up) {
            Ok(out) => out,
            Err(e) => {
                up.rollback();
                return Err(e);
            }
        };
        let committed = self.store.commit(&up.change_set()).await;
        match committed {
            Ok(()) => {
                up.finish();
                Ok(out)
            }
            Err(e) => {
                up.rollback();
                Err(e)
            }
        }
    }

    async fn open_locked<F>(
        &self,
        live: &mut RwLockWriteGuard<'_, Option<StoreImage>>,
        init: F,
    ) -> Result<OpenOutcome>
    where
        F: FnOnce(&mut Upgrade<'_>) -> Result<()>,
    {
        if live.is_some() {
            return Ok(OpenOutcome::AlreadyOpen);
        }
        let (image, outcome) = match self.store.load().await? {
            Some(image) => (image, OpenOutcome::Opened),
            None => {
                let mut image = StoreImage::new();
                self.run_upgrade(&mut image, 1, init).await?;
                (image, OpenOutcome::Created)
            }
        };
        info!(
            store = %self.store.location(),
            version = image.version,
            created = outcome == OpenOutcome::Created,
            "connection opened"
        );
        **live = Some(image);
        Ok(outcome)
    }
}

fn closed() -> Error {
    Error::StorageError("connection is closed".to_string())
}

/// A read-write transaction over existing containers
#[derive(Debug)]
pub struct Transaction<'a> {
    image: &'a mut StoreImage,
}

impl Transaction<'_> {
    pub fn catalog(&self) -> &Catalog {
        &self.image.catalog
    }

    pub fn has_container(&self, name: &str) -> bool {
        self.image.has_container(name)
    }

    pub fn container(&self, name: &str) -> Result<&Container> {
        self.image
            .containers
            .get(name)
            .ok_or_else(|| Error::ContainerNotFound(name.to_string()))
    }

    pub fn container_mut(&mut self, name: &str) -> Result<&mut Container> {
        let container = self
            .image
            .containers
            .get_mut(name)
            .ok_or_else(|| Error::ContainerNotFound(name.to_string()))?;
        container.begin();
        Ok(container)
    }

    fn change_set(&self) -> ChangeSet<'_> {
        ChangeSet {
            version: self.image.version,
            updated: journaled_changes(&*self.image),
            ..ChangeSet::default()
        }
    }

    fn finish(self) {
        self.image.containers.values_mut().for_each(Container::commit);
    }

    fn rollback(self) {
        self.image
            .containers
            .values_mut()
            .for_each(Container::rollback);
    }
}

fn journaled_changes(image: &StoreImage) -> Vec<ContainerChanges<'_>> {
    image
        .containers
        .values()
        .filter_map(Container::changes)
        .filter(|changes| !changes.is_empty())
        .collect()
}

/// A structural upgrade unit
///
/// Besides record access it can create and delete containers and change the
/// catalog.
#[derive(Debug)]
pub struct Upgrade<'a> {
    image: &'a mut StoreImage,
    prior_version: u64,
    prior_catalog: Catalog,
    /// Containers created by this upgrade
    created: BTreeSet<String>,
    /// Containers that existed before this upgrade and were deleted by it
    dropped: BTreeMap<String, Container>,
}

impl<'a> Upgrade<'a> {
    fn open(image: &'a mut StoreImage, version: u64) -> Self {
        let prior_version = image.version;
        let prior_catalog = image.catalog.clone();
        image.version = version;
        Self {
            image,
            prior_version,
            prior_catalog,
            created: BTreeSet::new(),
            dropped: BTreeMap::new(),
        }
    }
}

impl Upgrade<'_> {
    /// The version this upgrade moves the store to
    pub fn version(&self) -> u64 {
        self.image.version
    }

    pub fn catalog(&self) -> &Catalog {
        &self.image.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.image.catalog
    }

    pub fn has_container(&self, name: &str) -> bool {
        self.image.has_container(name)
    }

    pub fn container(&self, name: &str) -> Result<&Container> {
        self.image
            .containers
            .get(name)
            .ok_or_else(|| Error::ContainerNotFound(name.to_string()))
    }

    pub fn container_mut(&mut self, name: &str) -> Result<&mut Container> {
        let container = self
            .image
            .containers
            .get_mut(name)
            .ok_or_else(|| Error::ContainerNotFound(name.to_string()))?;
        // New containers are written in full, no journal needed
        if !self.created.contains(name) {
            container.begin();
        }
        Ok(container)
    }

    /// Create a container, failing if the name is taken
    pub fn create_container(
        &mut self,
        name: &str,
        key_path: &str,
        auto_increment: bool,
    ) -> Result<&mut Container> {
        if self.has_container(name) {
            return Err(Error::StorageError(format!(
                "container \"{}\" already exists",
                name
            )));
        }
        self.created.insert(name.to_string());
        Ok(self
            .image
            .containers
            .entry(name.to_string())
            .or_insert_with(|| Container::new(name, key_path, auto_increment)))
    }

    /// Delete a container, returning whether it existed
    pub fn delete_container(&mut self, name: &str) -> bool {
        let Some(container) = self.image.containers.remove(name) else {
            return false;
        };
        if !self.created.remove(name) {
            self.dropped.insert(name.to_string(), container);
        }
        true
    }

    fn change_set(&self) -> ChangeSet<'_> {
        ChangeSet {
            version: self.image.version,
            catalog: Some(&self.image.catalog),
            dropped: self.dropped.keys().cloned().collect(),
            created: self
                .created
                .iter()
                .filter_map(|name| self.image.containers.get(name))
                .collect(),
            updated: journaled_changes(&*self.image),
        }
    }

    fn finish(self) {
        self.image.containers.values_mut().for_each(Container::commit);
    }

    fn rollback(self) {
        for name in &self.created {
            self.image.containers.remove(name);
        }
        for (name, mut container) in self.dropped {
            container.rollback();
            self.image.containers.insert(name, container);
        }
        self.image
            .containers
            .values_mut()
            .for_each(Container::rollback);
        self.image.catalog = self.prior_catalog;
        self.image.version = self.prior_version;
    }
}
