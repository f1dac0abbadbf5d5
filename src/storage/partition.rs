//! Partitioned store on fjall
//!
//! Keyspace layout:
//! - `_meta`: the store version, the partition counter and one entry per
//!   container (`container:<name>`) naming its partition, key path and key
//!   generator position
//! - `_catalog`: table definitions keyed by table name
//! - one partition per container, records keyed by their JSON-encoded key
//!
//! A commit writes only what its change set names, in one atomic batch.
//! Partitions of dropped containers are deleted once the batch is durable.
//! Partition names are never reused, so a partition left behind by a crash
//! between the two steps is unreachable.

use std::fmt;
use std::path::{Path, PathBuf};

use fjall::{Batch, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::container::{Container, ContainerChanges};
use super::engine::{ChangeSet, KvStore, StoreImage};
use super::value::{Key, Record};
use crate::catalog::{Catalog, TableDef};
use crate::error::{Error, Result};

const META_PARTITION: &str = "_meta";
const CATALOG_PARTITION: &str = "_catalog";

const VERSION_KEY: &str = "version";
const NEXT_PARTITION_KEY: &str = "next_partition";
const CONTAINER_PREFIX: &str = "container:";

/// Where and how a container is stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ContainerMeta {
    partition: String,
    key_path: String,
    auto_increment: bool,
    next_key: i64,
}

/// Store on a fjall keyspace directory
pub struct PartitionStore {
    path: PathBuf,
    keyspace: Keyspace,
    meta: PartitionHandle,
    catalog: PartitionHandle,
}

impl fmt::Debug for PartitionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionStore")
            .field("path", &self.path)
            .finish()
    }
}

impl PartitionStore {
    /// Open the keyspace at `path`, creating the directory if needed
    ///
    /// Opening does not create the store; the first commit does.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        std::fs::create_dir_all(&path)?;

        let keyspace = fjall::Config::new(&path).open()?;
        let meta = keyspace.open_partition(META_PARTITION, PartitionCreateOptions::default())?;
        let catalog =
            keyspace.open_partition(CATALOG_PARTITION, PartitionCreateOptions::default())?;

        Ok(Self {
            path,
            keyspace,
            meta,
            catalog,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn partition(&self, name: &str) -> Result<PartitionHandle> {
        Ok(self
            .keyspace
            .open_partition(name, PartitionCreateOptions::default())?)
    }

    fn container_meta(&self, name: &str) -> Result<Option<ContainerMeta>> {
        match self.meta.get(container_key(name))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn read_u64(&self, key: &str) -> Result<Option<u64>> {
        let Some(bytes) = self.meta.get(key)? else {
            return Ok(None);
        };
        let bytes = <[u8; 8]>::try_from(&*bytes)
            .map_err(|_| Error::StorageError(format!("corrupt \"{}\" entry", key)))?;
        Ok(Some(u64::from_be_bytes(bytes)))
    }

    fn load_container(&self, name: String, meta: ContainerMeta) -> Result<Container> {
        let partition = self.partition(&meta.partition)?;
        let mut records = Vec::new();
        for entry in partition.iter() {
            let (_, value) = entry?;
            records.push(serde_json::from_slice::<Record>(&value)?);
        }
        Container::from_records(
            name,
            meta.key_path,
            meta.auto_increment,
            meta.next_key,
            records,
        )
    }

    /// Stage a whole new container under a fresh partition
    fn stage_created(
        &self,
        batch: &mut Batch,
        container: &Container,
        partition_id: u64,
    ) -> Result<()> {
        let meta = ContainerMeta {
            partition: format!("c{}", partition_id),
            key_path: container.key_path().to_string(),
            auto_increment: container.auto_increment(),
            next_key: container.next_key(),
        };
        let partition = self.partition(&meta.partition)?;
        for (key, record) in container.entries() {
            batch.insert(&partition, encode_key(key)?, serde_json::to_vec(record)?);
        }
        batch.insert(
            &self.meta,
            container_key(container.name()),
            serde_json::to_vec(&meta)?,
        );
        Ok(())
    }

    /// Stage the changed records of an existing container
    fn stage_updated(&self, batch: &mut Batch, changes: &ContainerChanges<'_>) -> Result<()> {
        let mut meta = self
            .container_meta(changes.name)?
            .ok_or_else(|| Error::ContainerNotFound(changes.name.to_string()))?;
        let partition = self.partition(&meta.partition)?;

        for (key, record) in &changes.put {
            batch.insert(&partition, encode_key(key)?, serde_json::to_vec(*record)?);
        }
        for key in &changes.deleted {
            batch.remove(&partition, encode_key(key)?);
        }
        if meta.next_key != changes.next_key {
            meta.next_key = changes.next_key;
            batch.insert(
                &self.meta,
                container_key(changes.name),
                serde_json::to_vec(&meta)?,
            );
        }
        Ok(())
    }

    /// Stage the catalog: entries no longer present are removed
    fn stage_catalog(&self, batch: &mut Batch, catalog: &Catalog) -> Result<()> {
        for entry in self.catalog.iter() {
            let (key, _) = entry?;
            let name = String::from_utf8_lossy(&key);
            if !catalog.contains(&name) {
                batch.remove(&self.catalog, key.to_vec());
            }
        }
        for table in catalog.list() {
            batch.insert(
                &self.catalog,
                table.name.as_bytes(),
                serde_json::to_vec(&table)?,
            );
        }
        Ok(())
    }
}

fn container_key(name: &str) -> String {
    format!("{}{}", CONTAINER_PREFIX, name)
}

fn encode_key(key: &Key) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&key.to_value())?)
}

impl KvStore for PartitionStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Option<StoreImage>> {
        let Some(version) = self.read_u64(VERSION_KEY)? else {
            return Ok(None);
        };

        let mut catalog = Catalog::new();
        for entry in self.catalog.iter() {
            let (_, value) = entry?;
            catalog.put(serde_json::from_slice::<TableDef>(&value)?);
        }

        let mut image = StoreImage {
            version,
            catalog,
            ..StoreImage::new()
        };
        for entry in self.meta.prefix(CONTAINER_PREFIX) {
            let (key, value) = entry?;
            let name = std::str::from_utf8(&key[CONTAINER_PREFIX.len()..])
                .map_err(|e| Error::StorageError(format!("invalid container name: {}", e)))?
                .to_string();
            let meta: ContainerMeta = serde_json::from_slice(&value)?;
            let container = self.load_container(name.clone(), meta)?;
            image.containers.insert(name, container);
        }

        debug!(path = %self.path.display(), version, "loaded store image");
        Ok(Some(image))
    }

    async fn commit(&self, changes: &ChangeSet<'_>) -> Result<()> {
        let mut batch = self.keyspace.batch();
        let mut doomed = Vec::new();

        for name in &changes.dropped {
            let Some(meta) = self.container_meta(name)? else {
                continue;
            };
            if !changes.created.iter().any(|c| c.name() == name) {
                batch.remove(&self.meta, container_key(name));
            }
            doomed.push(self.partition(&meta.partition)?);
        }

        if !changes.created.is_empty() {
            let mut next_partition = self.read_u64(NEXT_PARTITION_KEY)?.unwrap_or(1);
            for container in &changes.created {
                self.stage_created(&mut batch, container, next_partition)?;
                next_partition += 1;
            }
            batch.insert(
                &self.meta,
                NEXT_PARTITION_KEY,
                next_partition.to_be_bytes().to_vec(),
            );
        }

        for update in changes.updated.iter().filter(|u| !u.is_empty()) {
            self.stage_updated(&mut batch, update)?;
        }
        if let Some(catalog) = changes.catalog {
            self.stage_catalog(&mut batch, catalog)?;
        }
        batch.insert(&self.meta, VERSION_KEY, changes.version.to_be_bytes().to_vec());

        batch.commit()?;
        self.keyspace.persist(PersistMode::SyncAll)?;

        for partition in doomed {
            self.keyspace.delete_partition(partition)?;
        }
        debug!(
            path = %self.path.display(),
            version = changes.version,
            created = changes.created.len(),
            dropped = changes.dropped.len(),
            updated = changes.updated.len(),
            "committed change set"
        );
        Ok(())
    }
}
