//! Common utilities for savemode integration tests.
#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use savemode::prelude::*;

// --- Stores ---

/// Wraps a `MemoryStorage` and counts `apply_mutations` calls.
#[derive(Debug, Default)]
pub struct CountingStorage {
    inner: MemoryStorage,
    attempts: AtomicUsize,
}

impl CountingStorage {
    pub fn new(inner: MemoryStorage) -> Self {
        Self {
            inner,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryStorage {
        &self.inner
    }
}

impl Storage for CountingStorage {
    fn apply_mutations(&self, mutations: &[PendingMutation]) -> StoreResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.inner.apply_mutations(mutations)
    }

    fn read(&self, key: &RecordKey) -> StoreResult<Option<EntityRecord>> {
        self.inner.read(key)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

/// Fails the next attempts with scripted errors, then behaves like `MemoryStorage`.
#[derive(Debug, Default)]
pub struct ScriptedStorage {
    inner: MemoryStorage,
    failures: Mutex<VecDeque<StoreError>>,
}

impl ScriptedStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, error: StoreError) {
        self.failures.lock().push_back(error);
    }

    pub fn inner(&self) -> &MemoryStorage {
        &self.inner
    }
}

impl Storage for ScriptedStorage {
    fn apply_mutations(&self, mutations: &[PendingMutation]) -> StoreResult<()> {
        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }
        self.inner.apply_mutations(mutations)
    }

    fn read(&self, key: &RecordKey) -> StoreResult<Option<EntityRecord>> {
        self.inner.read(key)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

// --- Helper Functions ---

/// A random identity key, standing in for a fresh GUID.
pub fn new_key() -> RecordKey {
    format!("{:032x}", rand::random::<u128>())
}

/// A record whose payload holds a single `name` column.
pub fn named(key: &str, name: &str) -> EntityRecord {
    EntityRecord::new(key.to_string(), name_payload(name))
}

pub fn name_payload(name: &str) -> arrow::record_batch::RecordBatch {
    payload_from_pairs(&[("name", name)]).unwrap()
}

/// The stored `name` of `key`, if the record exists.
pub fn stored_name(storage: &dyn Storage, key: &str) -> Option<String> {
    storage
        .read(&key.to_string())
        .unwrap()
        .and_then(|record| string_value(record.payload(), "name"))
}

/// A database over a fresh `MemoryStorage`, returning the concrete store too.
pub fn setup_database(config: CoordinatorConfig) -> (Arc<MemoryStorage>, Arc<Database>) {
    let storage = Arc::new(MemoryStorage::new());
    let database = Arc::new(Database::new(storage.clone(), config));
    (storage, database)
}

/// Saves a new record in its own session.
pub fn seed(database: &Database, key: &str, name: &str) {
    let mut session = database.open_session();
    session.add(named(key, name)).unwrap();
    session.save_changes_with(ResolutionMode::NONE).unwrap();
}

/// Deletes `key` from another thread through an independent session, the
/// way a concurrent writer would.
pub fn delete_elsewhere(database: &Arc<Database>, key: &str) {
    let database = Arc::clone(database);
    let key = key.to_string();
    thread::spawn(move || {
        let mut session = database.open_session();
        let record = database.find(&key).unwrap().expect("record to delete");
        session.attach(record);
        session.remove(&key).unwrap();
        session.save_changes().unwrap();
    })
    .join()
    .expect("deleting thread panicked");
}
