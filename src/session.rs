use ahash::AHashMap as HashMap;
use arrow::record_batch::RecordBatch;
use log::debug;

use crate::change_set::{ChangeSet, PendingMutation};
use crate::conflict::resolution::ResolutionMode;
use crate::coordinator::CommitCoordinator;
use crate::data_store::record::{EntityRecord, RecordKey};
use crate::errors::{Result, SaveError};

/// A unit of work.
///
/// A session tracks the snapshots of the entities it has saved or attached,
/// stages changes against them, and saves all staged changes at once through
/// the database's [`CommitCoordinator`]. Sessions are not shared between
/// threads; open one per writer.
pub struct Session {
    /// Unique identifier for the session.
    id: u64,
    coordinator: CommitCoordinator,
    /// Changes staged since the last successful save.
    change_set: ChangeSet,
    /// Last known persisted state per key.
    tracked: HashMap<RecordKey, EntityRecord>,
}

impl Session {
    pub(crate) fn new(id: u64, coordinator: CommitCoordinator) -> Self {
        Self {
            id,
            coordinator,
            change_set: ChangeSet::new(),
            tracked: HashMap::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Starts tracking a record already persisted, e.g. one read with
    /// [`Database::find`](crate::Database::find).
    pub fn attach(&mut self, record: EntityRecord) {
        self.tracked.insert(record.key().clone(), record);
    }

    /// The tracked snapshot for `key`, if any.
    pub fn tracked(&self, key: &str) -> Option<&EntityRecord> {
        self.tracked.get(key)
    }

    /// Changes staged since the last save.
    pub fn pending(&self) -> &ChangeSet {
        &self.change_set
    }

    /// Stages an insert.
    pub fn add(&mut self, record: EntityRecord) -> Result<()> {
        self.change_set.insert(record)
    }

    /// Stages a new state for an entity.
    ///
    /// An entity added in this session and not saved yet stays an insert. A
    /// second update of the same key replaces the first one in place.
    /// Otherwise the entity must be tracked, since the update carries its
    /// snapshot; an entity staged for deletion is no longer tracked. On error
    /// the staged changes are left as they were.
    pub fn update(&mut self, record: EntityRecord) -> Result<()> {
        if let Some(index) = self.pending_write(record.key()) {
            let replacement = match &self.change_set.as_slice()[index] {
                PendingMutation::Update { original, .. } => PendingMutation::Update {
                    record,
                    original: original.clone(),
                },
                _ => PendingMutation::Insert(record),
            };
            return self.change_set.replace(index, replacement).map(|_| ());
        }
        if self.pending_delete(record.key()) {
            return Err(SaveError::NotTracked(record.key().clone()));
        }
        let original = self
            .tracked
            .get(record.key())
            .cloned()
            .ok_or_else(|| SaveError::NotTracked(record.key().clone()))?;
        self.change_set.update(record, original)
    }

    /// Replaces the payload of an entity and bumps its `updated` timestamp.
    pub fn modify(&mut self, key: &str, payload: RecordBatch) -> Result<()> {
        let current = self
            .change_set
            .iter()
            .find_map(|m| match m {
                PendingMutation::Insert(record) | PendingMutation::Update { record, .. }
                    if record.key() == key =>
                {
                    Some(record)
                }
                _ => None,
            })
            .or_else(|| self.tracked.get(key))
            .ok_or_else(|| SaveError::NotTracked(key.to_string()))?;
        let revised = current.revise(payload);
        self.update(revised)
    }

    /// Stages a delete. Removing an entity added in this session and never
    /// saved just forgets the pending insert; a pending update becomes the
    /// delete. Removing a key already staged for deletion does nothing.
    pub fn remove(&mut self, key: &str) -> Result<()> {
        if let Some(index) = self.pending_write(key) {
            if let PendingMutation::Insert(_) = &self.change_set.as_slice()[index] {
                let pending = self.change_set.as_slice()[index].clone();
                self.change_set.discard(&pending);
                return Ok(());
            }
            return self
                .change_set
                .replace(index, PendingMutation::Delete(key.to_string()))
                .map(|_| ());
        }
        if self.pending_delete(key) {
            return Ok(());
        }
        self.change_set.delete(key)
    }

    /// Saves staged changes with the database's default resolution mode.
    pub fn save_changes(&mut self) -> Result<()> {
        let mode = self.coordinator.config().default_mode;
        self.save_changes_with(mode)
    }

    /// Saves staged changes, ignoring the conflicts `mode` tolerates.
    ///
    /// On success, applied inserts and updates become the tracked snapshots,
    /// and keys whose change was deleted or dropped as a conflict are no
    /// longer tracked. On failure nothing is tracked differently and the
    /// changes that were not dropped stay staged.
    pub fn save_changes_with(&mut self, mode: ResolutionMode) -> Result<()> {
        let staged_keys: Vec<RecordKey> = self.change_set.keys().cloned().collect();
        let staged = staged_keys.len();
        let applied = self
            .coordinator
            .commit_and_collect(&mut self.change_set, mode)?;

        for key in &staged_keys {
            self.tracked.remove(key);
        }
        let applied_count = applied.len();
        for mutation in applied {
            match mutation {
                PendingMutation::Insert(record) | PendingMutation::Update { record, .. } => {
                    self.tracked.insert(record.key().clone(), record);
                }
                PendingMutation::Delete(key) => {
                    self.tracked.remove(&key);
                }
            }
        }
        debug!(
            "Session {} saved {} of {} staged changes.",
            self.id, applied_count, staged
        );
        Ok(())
    }

    /// Drops every staged change without saving, returning them.
    pub fn discard_changes(&mut self) -> Vec<PendingMutation> {
        debug!("Session {} discarded {} staged changes", self.id, self.change_set.len());
        self.change_set.drain()
    }

    /// Position of the staged insert or update for `key`, if any.
    fn pending_write(&self, key: &str) -> Option<usize> {
        self.change_set.iter().position(|m| {
            matches!(m, PendingMutation::Insert(_) | PendingMutation::Update { .. })
                && m.key() == key
        })
    }

    fn pending_delete(&self, key: &str) -> bool {
        self.change_set
            .iter()
            .any(|m| matches!(m, PendingMutation::Delete(k) if k == key))
    }
}
