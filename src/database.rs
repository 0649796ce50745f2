use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::CoordinatorConfig;
use crate::conflict::detection::ConflictClassifier;
use crate::coordinator::CommitCoordinator;
use crate::data_store::record::{EntityRecord, RecordKey};
use crate::errors::Result;
use crate::session::Session;
use crate::storage::Storage;

/// Savemode Prelude
pub mod prelude {
    pub use crate::arrow_utils::*;
    pub use crate::change_set::*;
    pub use crate::config::*;
    pub use crate::conflict::detection::*;
    pub use crate::conflict::resolution::*;
    pub use crate::coordinator::*;
    pub use crate::data_store::memory_store::*;
    pub use crate::data_store::record::*;
    pub use crate::errors::*;
    pub use crate::session::*;
    pub use crate::storage::*;
    pub use crate::*;
}

/// The main entry point: a store plus the coordinator every session commits through.
///
/// `Database` is shared between threads behind an `Arc`; each thread opens
/// its own [`Session`].
pub struct Database {
    coordinator: CommitCoordinator,
    /// A globally increasing counter for session ids.
    session_counter: AtomicU64,
}

impl Database {
    /// Creates a database over `storage` using the default conflict classifier.
    pub fn new(storage: Arc<dyn Storage>, config: CoordinatorConfig) -> Self {
        Self::from_coordinator(CommitCoordinator::new(storage, config))
    }

    /// Creates a database whose failures are classified by `classifier`.
    pub fn with_classifier(
        storage: Arc<dyn Storage>,
        classifier: Arc<dyn ConflictClassifier>,
        config: CoordinatorConfig,
    ) -> Self {
        Self::from_coordinator(CommitCoordinator::with_classifier(
            storage, classifier, config,
        ))
    }

    fn from_coordinator(coordinator: CommitCoordinator) -> Self {
        Self {
            coordinator,
            session_counter: AtomicU64::new(0),
        }
    }

    /// Opens a new unit of work with an empty change set.
    pub fn open_session(&self) -> Session {
        let session_id = self.session_counter.fetch_add(1, Ordering::SeqCst);
        Session::new(session_id, self.coordinator.clone())
    }

    /// Reads the committed record for `key`.
    pub fn find(&self, key: &str) -> Result<Option<EntityRecord>> {
        Ok(self.coordinator.storage().read(&RecordKey::from(key))?)
    }

    pub fn coordinator(&self) -> &CommitCoordinator {
        &self.coordinator
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        self.coordinator.storage()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        self.coordinator.config()
    }
}
