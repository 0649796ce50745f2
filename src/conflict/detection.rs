use serde::{Deserialize, Serialize};
use std::fmt;

use crate::change_set::PendingMutation;
use crate::data_store::record::RecordKey;
use crate::errors::StoreError;
use crate::storage::PRIMARY_KEY_CONSTRAINT;

/// The recognized classes of resolvable write conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictSignature {
    /// An insert whose identity key already exists in the store.
    DuplicateKey,
    /// An update or delete whose target row is gone, typically because
    /// another writer deleted it first.
    MissingTarget,
}

impl fmt::Display for ConflictSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictSignature::DuplicateKey => f.write_str("DuplicateKey"),
            ConflictSignature::MissingTarget => f.write_str("MissingTarget"),
        }
    }
}

/// A classified store failure: what went wrong, and which mutation of the
/// attempted batch caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub signature: ConflictSignature,
    pub key: RecordKey,
    /// Index of the offending mutation in the attempted batch.
    pub position: usize,
}

/// Maps store-specific failure signals to conflict signatures.
///
/// Implementations must return `None` for anything they do not recognize so
/// that the coordinator surfaces it unchanged.
pub trait ConflictClassifier: Send + Sync {
    fn classify(&self, error: &StoreError, batch: &[PendingMutation]) -> Option<Conflict>;
}

/// The default classifier, driven by the two distinguishable signals of
/// [`StoreError`]: primary-key uniqueness violations and zero affected rows.
///
/// A signal only counts when it points at a mutation of the matching kind
/// with the same key; anything else is treated as unrecognized.
#[derive(Debug, Default, Clone, Copy)]
pub struct StoreSignals;

impl ConflictClassifier for StoreSignals {
    fn classify(&self, error: &StoreError, batch: &[PendingMutation]) -> Option<Conflict> {
        match error {
            StoreError::UniqueViolation {
                constraint,
                key,
                position,
            } if constraint == PRIMARY_KEY_CONSTRAINT => match batch.get(*position)? {
                PendingMutation::Insert(record) if record.key() == key => Some(Conflict {
                    signature: ConflictSignature::DuplicateKey,
                    key: key.clone(),
                    position: *position,
                }),
                _ => None,
            },
            StoreError::RowsAffected {
                key,
                position,
                affected: 0,
            } => match batch.get(*position)? {
                m @ (PendingMutation::Update { .. } | PendingMutation::Delete(_))
                    if m.key() == key =>
                {
                    Some(Conflict {
                        signature: ConflictSignature::MissingTarget,
                        key: key.clone(),
                        position: *position,
                    })
                }
                _ => None,
            },
            _ => None,
        }
    }
}
