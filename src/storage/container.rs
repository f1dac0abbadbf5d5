//! Record containers
//!
//! A container holds the records of one table, keyed by the value of the
//! table's key column (its key path). Containers created for ordinary tables
//! carry a key generator that assigns sequential integer keys to records
//! arriving without one.
//!
//! While a transaction is open on a container every change is journaled with
//! the record it replaced. The journal yields the changed keys at commit and
//! restores the container when the transaction is rolled back.

use std::collections::{BTreeMap, BTreeSet};

use super::value::{Key, Record, Value};
use crate::error::{Error, Result};

/// A keyed record container
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    name: String,
    key_path: String,
    auto_increment: bool,
    /// Next key handed out by the key generator
    next_key: i64,
    records: BTreeMap<Key, Record>,
    journal: Option<Journal>,
}

/// Undo log of the open transaction
#[derive(Debug, Clone, PartialEq)]
struct Journal {
    next_key: i64,
    /// Changed keys with the record each held before, oldest first
    prior: Vec<(Key, Option<Record>)>,
}

/// Records changed in a container since its journal was started
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerChanges<'a> {
    pub name: &'a str,
    pub next_key: i64,
    /// Keys that now hold a record, with that record
    pub put: Vec<(&'a Key, &'a Record)>,
    /// Keys that no longer hold a record
    pub deleted: Vec<&'a Key>,
}

impl ContainerChanges<'_> {
    pub fn is_empty(&self) -> bool {
        self.put.is_empty() && self.deleted.is_empty()
    }
}

impl Container {
    /// Create an empty container
    pub fn new(name: impl Into<String>, key_path: impl Into<String>, auto_increment: bool) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            auto_increment,
            next_key: 1,
            records: BTreeMap::new(),
            journal: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_path(&self) -> &str {
        &self.key_path
    }

    pub fn auto_increment(&self) -> bool {
        self.auto_increment
    }

    /// Next key the generator hands out
    pub fn next_key(&self) -> i64 {
        self.next_key
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add a new record, failing if its key is already taken
    pub fn add(&mut self, record: Record) -> Result<Key> {
        let (key, record) = self.keyed(record)?;
        if self.records.contains_key(&key) {
            return Err(Error::DuplicateKey {
                table: self.name.clone(),
                key: key.to_string(),
            });
        }
        self.store(key.clone(), record);
        Ok(key)
    }

    /// Insert or overwrite a record
    pub fn put(&mut self, record: Record) -> Result<Key> {
        let (key, record) = self.keyed(record)?;
        self.store(key.clone(), record);
        Ok(key)
    }

    /// Look up a record by key
    pub fn get(&self, key: &Key) -> Option<&Record> {
        self.records.get(key)
    }

    /// Delete a record by key, returning whether it existed
    pub fn delete(&mut self, key: &Key) -> bool {
        let Some(removed) = self.records.remove(key) else {
            return false;
        };
        if let Some(journal) = self.journal.as_mut() {
            journal.prior.push((key.clone(), Some(removed)));
        }
        true
    }

    /// All records in key order
    pub fn scan(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// All keys and records in key order
    pub fn entries(&self) -> impl Iterator<Item = (&Key, &Record)> {
        self.records.iter()
    }

    /// Rebuild a persisted container, recomputing each key from its record
    pub(crate) fn from_records(
        name: impl Into<String>,
        key_path: impl Into<String>,
        auto_increment: bool,
        next_key: i64,
        records: impl IntoIterator<Item = Record>,
    ) -> Result<Self> {
        let mut container = Container::new(name, key_path, auto_increment);
        container.next_key = next_key;
        for record in records {
            let (key, record) = container.keyed(record)?;
            container.records.insert(key, record);
        }
        Ok(container)
    }

    /// Start journaling changes, unless a journal is already open
    pub(crate) fn begin(&mut self) {
        if self.journal.is_none() {
            self.journal = Some(Journal {
                next_key: self.next_key,
                prior: Vec::new(),
            });
        }
    }

    /// Changes recorded by the open journal, `None` if there is none
    pub fn changes(&self) -> Option<ContainerChanges<'_>> {
        let journal = self.journal.as_ref()?;
        let touched: BTreeSet<&Key> = journal.prior.iter().map(|(key, _)| key).collect();

        let mut put = Vec::new();
        let mut deleted = Vec::new();
        for key in touched {
            match self.records.get_key_value(key) {
                Some(entry) => put.push(entry),
                None => deleted.push(key),
            }
        }
        Some(ContainerChanges {
            name: &self.name,
            next_key: self.next_key,
            put,
            deleted,
        })
    }

    /// Close the journal, keeping every change
    pub(crate) fn commit(&mut self) {
        self.journal = None;
    }

    /// Close the journal, undoing every change since it was started
    pub(crate) fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for (key, prior) in journal.prior.into_iter().rev() {
            match prior {
                Some(record) => self.records.insert(key, record),
                None => self.records.remove(&key),
            };
        }
        self.next_key = journal.next_key;
    }

    /// Write changes loaded from elsewhere, bypassing key checks
    pub(crate) fn apply(&mut self, changes: &ContainerChanges<'_>) {
        for (key, record) in &changes.put {
            self.records.insert((*key).clone(), (*record).clone());
        }
        for key in &changes.deleted {
            self.records.remove(*key);
        }
        self.next_key = changes.next_key;
    }

    fn store(&mut self, key: Key, record: Record) {
        self.bump_generator(&key);
        let prior = self.records.insert(key.clone(), record);
        if let Some(journal) = self.journal.as_mut() {
            journal.prior.push((key, prior));
        }
    }

    /// Resolve the key of a record, assigning one from the generator when
    /// allowed. The assigned key is written into the record.
    fn keyed(&mut self, mut record: Record) -> Result<(Key, Record)> {
        let current = record.get(&self.key_path).cloned().unwrap_or(Value::Null);
        if current.is_null() {
            if !self.auto_increment {
                return Err(Error::MissingKey {
                    table: self.name.clone(),
                    key_path: self.key_path.clone(),
                });
            }
            let key = Key::Integer(self.next_key);
            record.shift_insert(0, self.key_path.clone(), key.to_value());
            return Ok((key, record));
        }

        let key = Key::from_value(&current).ok_or_else(|| Error::InvalidKey {
            table: self.name.clone(),
            value: current.to_string(),
        })?;
        Ok((key, record))
    }

    fn bump_generator(&mut self, key: &Key) {
        if !self.auto_increment {
            return;
        }
        match key {
            Key::Integer(i) => self.next_key = self.next_key.max(i.saturating_add(1)),
            Key::Real(n) => {
                let floor = n.floor();
                if floor >= self.next_key as f64 && floor < i64::MAX as f64 {
                    self.next_key = floor as i64 + 1;
                }
            }
            Key::Text(_) => {}
        }
    }
}
