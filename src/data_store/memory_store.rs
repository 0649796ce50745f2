use ahash::AHashMap as HashMap;
use log::trace;
use parking_lot::RwLock;

use crate::arrow_utils::string_value;
use crate::change_set::PendingMutation;
use crate::data_store::record::{EntityRecord, RecordKey};
use crate::errors::{StoreError, StoreResult};
use crate::storage::{Storage, PRIMARY_KEY_CONSTRAINT};

/// An in-memory [`Storage`] with all-or-nothing batch semantics.
///
/// Writers are serialized by the table's write lock. A batch is validated
/// against a private overlay first and published only if every mutation
/// passes, so a failed batch leaves the table untouched.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    rows: RwLock<HashMap<RecordKey, EntityRecord>>,
    /// Payload columns that must also be unique across records.
    unique_columns: Vec<String>,
}

impl MemoryStorage {
    /// Creates a new, empty `MemoryStorage`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a secondary unique constraint on a Utf8 payload column.
    ///
    /// Violations are reported with the column name as the constraint, so
    /// they are never classified as identity conflicts.
    pub fn with_unique_column(mut self, column: impl Into<String>) -> Self {
        self.unique_columns.push(column.into());
        self
    }

    /// Retrieves a committed record.
    pub fn get(&self, key: &str) -> Option<EntityRecord> {
        self.rows.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.rows.read().contains_key(key)
    }

    fn check_unique_columns(
        &self,
        rows: &HashMap<RecordKey, EntityRecord>,
        overlay: &HashMap<RecordKey, Option<EntityRecord>>,
        record: &EntityRecord,
        position: usize,
    ) -> StoreResult<()> {
        for column in &self.unique_columns {
            let Some(value) = string_value(record.payload(), column) else {
                continue;
            };
            let clashes = |other: &EntityRecord| {
                other.key() != record.key()
                    && string_value(other.payload(), column).as_deref() == Some(value.as_str())
            };
            let staged = overlay.values().flatten().any(clashes);
            let committed = rows
                .values()
                .filter(|other| !overlay.contains_key(other.key()))
                .any(clashes);
            if staged || committed {
                return Err(StoreError::UniqueViolation {
                    constraint: column.clone(),
                    key: record.key().clone(),
                    position,
                });
            }
        }
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn apply_mutations(&self, mutations: &[PendingMutation]) -> StoreResult<()> {
        let mut rows = self.rows.write();
        // key -> Some(new row) | None (deleted within this batch)
        let mut overlay: HashMap<RecordKey, Option<EntityRecord>> = HashMap::new();

        for (position, mutation) in mutations.iter().enumerate() {
            let key = mutation.key();
            let exists = match overlay.get(key) {
                Some(staged) => staged.is_some(),
                None => rows.contains_key(key),
            };
            match mutation {
                PendingMutation::Insert(record) => {
                    if exists {
                        return Err(StoreError::UniqueViolation {
                            constraint: PRIMARY_KEY_CONSTRAINT.to_string(),
                            key: key.clone(),
                            position,
                        });
                    }
                    self.check_unique_columns(&rows, &overlay, record, position)?;
                    overlay.insert(key.clone(), Some(record.clone()));
                }
                PendingMutation::Update { record, .. } => {
                    if !exists {
                        return Err(StoreError::RowsAffected {
                            key: key.clone(),
                            position,
                            affected: 0,
                        });
                    }
                    self.check_unique_columns(&rows, &overlay, record, position)?;
                    overlay.insert(key.clone(), Some(record.clone()));
                }
                PendingMutation::Delete(_) => {
                    if !exists {
                        return Err(StoreError::RowsAffected {
                            key: key.clone(),
                            position,
                            affected: 0,
                        });
                    }
                    overlay.insert(key.clone(), None);
                }
            }
        }

        trace!("Publishing {} staged rows.", overlay.len());
        for (key, row) in overlay {
            match row {
                Some(record) => {
                    rows.insert(key, record);
                }
                None => {
                    rows.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn read(&self, key: &RecordKey) -> StoreResult<Option<EntityRecord>> {
        Ok(self.get(key))
    }

    fn len(&self) -> usize {
        self.rows.read().len()
    }
}
