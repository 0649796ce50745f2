pub mod errors;
pub mod data_store;
pub mod change_set;
pub mod conflict;
pub mod storage;
pub mod coordinator;
pub mod config;
pub mod session;
pub mod database;
pub mod arrow_utils;

// Re-export key types and structs for easier access
pub use errors::{Error, Result, SaveError, StoreError, StoreResult};
pub use data_store::memory_store::MemoryStorage;
pub use data_store::record::{EntityRecord, RecordKey};
pub use change_set::{ChangeSet, PendingMutation};
pub use conflict::detection::{Conflict, ConflictClassifier, ConflictSignature, StoreSignals};
pub use conflict::resolution::ResolutionMode;
pub use storage::{Storage, PRIMARY_KEY_CONSTRAINT};
pub use coordinator::CommitCoordinator;
pub use config::CoordinatorConfig;
pub use session::Session;
pub use database::{prelude, Database};
