use crate::change_set::PendingMutation;
use crate::data_store::record::{EntityRecord, RecordKey};
use crate::errors::StoreResult;

/// Name reported in [`StoreError::UniqueViolation`](crate::errors::StoreError::UniqueViolation)
/// when the identity key itself is duplicated.
pub const PRIMARY_KEY_CONSTRAINT: &str = "PRIMARY";

/// Trait for the backing store a save is applied to.
///
/// The store owns atomicity and isolation; the commit coordinator adds no
/// locking of its own. Implementations must be `Send` and `Sync` because many
/// sessions commit against the same store concurrently.
pub trait Storage: Send + Sync {
    /// Atomically applies the given mutations, in order.
    ///
    /// Either every mutation is applied or none is. The first violation found
    /// aborts the batch and is reported with the position of the offending
    /// mutation:
    ///
    /// * an insert whose key exists yields `StoreError::UniqueViolation` with
    ///   the [`PRIMARY_KEY_CONSTRAINT`] name;
    /// * an update or delete whose target is absent yields
    ///   `StoreError::RowsAffected` with `affected == 0`.
    ///
    /// Any other failure (timeouts, outages, other constraints) must use a
    /// different variant or constraint name so it is not mistaken for a
    /// resolvable conflict.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use savemode::prelude::*;
    /// use parking_lot::Mutex;
    /// use ahash::AHashMap as HashMap;
    ///
    /// #[derive(Default)]
    /// struct NaiveStorage {
    ///     rows: Mutex<HashMap<RecordKey, EntityRecord>>,
    /// }
    ///
    /// impl Storage for NaiveStorage {
    ///     fn apply_mutations(&self, mutations: &[PendingMutation]) -> StoreResult<()> {
    ///         let mut rows = self.rows.lock();
    ///         // Not atomic: fine for a sketch, not for real use.
    ///         for mutation in mutations {
    ///             match mutation {
    ///                 PendingMutation::Insert(record)
    ///                 | PendingMutation::Update { record, .. } => {
    ///                     rows.insert(record.key().clone(), record.clone());
    ///                 }
    ///                 PendingMutation::Delete(key) => {
    ///                     rows.remove(key);
    ///                 }
    ///             }
    ///         }
    ///         Ok(())
    ///     }
    ///
    ///     fn read(&self, key: &RecordKey) -> StoreResult<Option<EntityRecord>> {
    ///         Ok(self.rows.lock().get(key).cloned())
    ///     }
    ///
    ///     fn len(&self) -> usize {
    ///         self.rows.lock().len()
    ///     }
    /// }
    /// ```
    fn apply_mutations(&self, mutations: &[PendingMutation]) -> StoreResult<()>;

    /// Reads the committed record for `key`, if any.
    fn read(&self, key: &RecordKey) -> StoreResult<Option<EntityRecord>>;

    /// Number of committed records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
