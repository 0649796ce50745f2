use crate::arrow_utils::validate_payload;
use crate::data_store::record::{EntityRecord, RecordKey};
use crate::errors::{Result, SaveError};

/// A single staged change awaiting commit.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingMutation {
    /// Insert a new record. Fails in the store if the key already exists.
    Insert(EntityRecord),
    /// Replace a record, carrying the snapshot the change was based on.
    Update {
        record: EntityRecord,
        original: EntityRecord,
    },
    /// Delete the record with the given key.
    Delete(RecordKey),
}

impl PendingMutation {
    /// The identity key this mutation targets.
    pub fn key(&self) -> &RecordKey {
        match self {
            PendingMutation::Insert(record) => record.key(),
            PendingMutation::Update { record, .. } => record.key(),
            PendingMutation::Delete(key) => key,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PendingMutation::Insert(_) => "insert",
            PendingMutation::Update { .. } => "update",
            PendingMutation::Delete(_) => "delete",
        }
    }

    fn validate(&self) -> Result<()> {
        if self.key().is_empty() {
            return Err(SaveError::InvalidMutation(format!(
                "{} with an empty identity key",
                self.kind()
            )));
        }
        match self {
            PendingMutation::Insert(record) => validate_payload(record.payload()),
            PendingMutation::Update { record, original } => {
                if original.key() != record.key() {
                    return Err(SaveError::InvalidMutation(format!(
                        "update of {} is based on a snapshot of {}",
                        record.key(),
                        original.key()
                    )));
                }
                validate_payload(record.payload())
            }
            PendingMutation::Delete(_) => Ok(()),
        }
    }
}

/// Ordered pending mutations accumulated since the last commit.
///
/// Owned by one in-flight commit; it does no store access.
#[derive(Debug, Default, Clone)]
pub struct ChangeSet {
    mutations: Vec<PendingMutation>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a mutation after a structural well-formedness check.
    pub fn stage(&mut self, mutation: PendingMutation) -> Result<()> {
        mutation.validate()?;
        self.mutations.push(mutation);
        Ok(())
    }

    pub fn insert(&mut self, record: EntityRecord) -> Result<()> {
        self.stage(PendingMutation::Insert(record))
    }

    pub fn update(&mut self, record: EntityRecord, original: EntityRecord) -> Result<()> {
        self.stage(PendingMutation::Update { record, original })
    }

    pub fn delete(&mut self, key: impl Into<RecordKey>) -> Result<()> {
        self.stage(PendingMutation::Delete(key.into()))
    }

    /// Takes every staged mutation in order, leaving the set empty.
    pub fn drain(&mut self) -> Vec<PendingMutation> {
        std::mem::take(&mut self.mutations)
    }

    /// Removes the first staged mutation equal to `mutation` without applying it.
    ///
    /// Returns `false` when no such mutation was staged.
    pub fn discard(&mut self, mutation: &PendingMutation) -> bool {
        match self.mutations.iter().position(|m| m == mutation) {
            Some(index) => {
                self.mutations.remove(index);
                true
            }
            None => false,
        }
    }

    /// Swaps the mutation at `index` for `mutation`, keeping its place in the
    /// order, and returns the old one. Nothing changes if `mutation` is
    /// malformed or `index` is out of range.
    pub fn replace(&mut self, index: usize, mutation: PendingMutation) -> Result<PendingMutation> {
        mutation.validate()?;
        let slot = self.mutations.get_mut(index).ok_or_else(|| {
            SaveError::InvalidMutation(format!("no staged mutation at position {}", index))
        })?;
        Ok(std::mem::replace(slot, mutation))
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingMutation> {
        self.mutations.iter()
    }

    pub fn as_slice(&self) -> &[PendingMutation] {
        &self.mutations
    }

    pub fn keys(&self) -> impl Iterator<Item = &RecordKey> {
        self.mutations.iter().map(PendingMutation::key)
    }
}
