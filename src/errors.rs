use std::time::Duration;

use thiserror::Error;

use crate::conflict::detection::ConflictSignature;
use crate::data_store::record::RecordKey;

/// Failures reported by a [`Storage`](crate::storage::Storage) implementation.
///
/// The first two variants are the distinguishable signals the coordinator
/// classifies; everything else is opaque to it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint `{constraint}` violated by key {key} (batch position {position})")]
    UniqueViolation {
        constraint: String,
        key: RecordKey,
        position: usize,
    },

    #[error("expected one row affected for key {key} (batch position {position}), got {affected}")]
    RowsAffected {
        key: RecordKey,
        position: usize,
        affected: u64,
    },

    #[error("statement timed out after {0:?}")]
    Timeout(Duration),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store error: {0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("Fatal store error: {0}")]
    FatalStore(#[from] StoreError),

    #[error("Unresolved {signature} conflict on key {key}")]
    UnresolvedConflict {
        signature: ConflictSignature,
        key: RecordKey,
    },

    #[error("Invalid mutation: {0}")]
    InvalidMutation(String),

    #[error("Entity {0} is not tracked by this session")]
    NotTracked(RecordKey),

    #[error("Arrow manipulation error: {0}")]
    ArrowError(String),
}

impl SaveError {
    /// Returns the conflict signature if this is an unresolved conflict.
    pub fn signature(&self) -> Option<ConflictSignature> {
        match self {
            SaveError::UnresolvedConflict { signature, .. } => Some(*signature),
            _ => None,
        }
    }
}

impl From<arrow::error::ArrowError> for SaveError {
    fn from(e: arrow::error::ArrowError) -> Self {
        SaveError::ArrowError(e.to_string())
    }
}

pub type Error = SaveError;

pub type Result<T> = std::result::Result<T, SaveError>;

pub type StoreResult<T> = std::result::Result<T, StoreError>;
