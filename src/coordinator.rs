use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::change_set::{ChangeSet, PendingMutation};
use crate::config::CoordinatorConfig;
use crate::conflict::detection::{Conflict, ConflictClassifier, StoreSignals};
use crate::conflict::resolution::ResolutionMode;
use crate::errors::{Result, SaveError, StoreError};
use crate::storage::Storage;

/// States of a single commit.
///
/// `Attempting` tries the whole remaining batch; a tolerated conflict moves
/// to `Resolved`, which drops one mutation and goes back to `Attempting`.
#[derive(Debug)]
enum CommitState {
    Attempting {
        attempt: usize,
    },
    Resolved {
        attempt: usize,
        conflict: Conflict,
        offending: PendingMutation,
    },
    Succeeded,
    Failed(SaveError),
}

/// Applies change sets to a [`Storage`] under a [`ResolutionMode`].
///
/// Cheap to clone; clones share the store, the classifier and the commit
/// counter. The coordinator takes no locks of its own: concurrent commits
/// are isolated by the store.
#[derive(Clone)]
pub struct CommitCoordinator {
    storage: Arc<dyn Storage>,
    classifier: Arc<dyn ConflictClassifier>,
    config: CoordinatorConfig,
    /// Monotonic commit ids, used for tracing only.
    commit_counter: Arc<AtomicU64>,
}

impl CommitCoordinator {
    /// Creates a coordinator that classifies failures with [`StoreSignals`].
    pub fn new(storage: Arc<dyn Storage>, config: CoordinatorConfig) -> Self {
        Self::with_classifier(storage, Arc::new(StoreSignals), config)
    }

    pub fn with_classifier(
        storage: Arc<dyn Storage>,
        classifier: Arc<dyn ConflictClassifier>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            storage,
            classifier,
            config,
            commit_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Commits every staged mutation, resolving the conflicts `mode` tolerates.
    ///
    /// On success the change set is left empty. A tolerated conflict discards
    /// the offending mutation (it is never applied) and the remaining batch
    /// is attempted again, so a set of N mutations needs at most N + 1 store
    /// attempts. An unrecognized failure is returned as
    /// [`SaveError::FatalStore`] and a recognized but untolerated one as
    /// [`SaveError::UnresolvedConflict`]; in both cases the store keeps its
    /// state from before the failed attempt and the change set keeps the
    /// mutations that were not discarded.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use savemode::prelude::*;
    ///
    /// let storage = Arc::new(MemoryStorage::new());
    /// let coordinator = CommitCoordinator::new(storage, CoordinatorConfig::default());
    ///
    /// let payload = payload_from_pairs(&[("name", "v1")]).unwrap();
    /// let mut changes = ChangeSet::new();
    /// changes.insert(EntityRecord::new("id-1".to_string(), payload.clone())).unwrap();
    /// coordinator.commit(&mut changes, ResolutionMode::NONE).unwrap();
    ///
    /// // Same key again: ignored instead of failing the save.
    /// changes.insert(EntityRecord::new("id-1".to_string(), payload)).unwrap();
    /// coordinator.commit(&mut changes, ResolutionMode::DUPLICATE_KEY).unwrap();
    /// ```
    pub fn commit(&self, change_set: &mut ChangeSet, mode: ResolutionMode) -> Result<()> {
        self.commit_and_collect(change_set, mode).map(|_| ())
    }

    /// Same as [`commit`](Self::commit), returning the mutations that were
    /// actually applied, in staging order.
    pub fn commit_and_collect(
        &self,
        change_set: &mut ChangeSet,
        mode: ResolutionMode,
    ) -> Result<Vec<PendingMutation>> {
        let commit_id = self.commit_counter.fetch_add(1, Ordering::SeqCst);
        if change_set.is_empty() {
            debug!("Commit {} has nothing to apply.", commit_id);
            return Ok(Vec::new());
        }
        let max_attempts = change_set.len() + 1;

        let mut state = CommitState::Attempting { attempt: 1 };
        loop {
            state = match state {
                CommitState::Attempting { attempt } => {
                    if let Some(error) = attempt_bound_exceeded(commit_id, attempt, max_attempts) {
                        CommitState::Failed(error)
                    } else if change_set.is_empty() {
                        // Every mutation was a tolerated conflict.
                        CommitState::Succeeded
                    } else {
                        debug!(
                            "Commit {} attempt {} applying {} mutations (mode {}).",
                            commit_id,
                            attempt,
                            change_set.len(),
                            mode
                        );
                        match self.storage.apply_mutations(change_set.as_slice()) {
                            Ok(()) => CommitState::Succeeded,
                            Err(error) => self.on_failure(
                                commit_id,
                                attempt,
                                error,
                                change_set.as_slice(),
                                mode,
                            ),
                        }
                    }
                }
                CommitState::Resolved {
                    attempt,
                    conflict,
                    offending,
                } => {
                    if !change_set.discard(&offending) {
                        // on_failure checked the position, so this is a bug.
                        CommitState::Failed(SaveError::InvalidMutation(format!(
                            "conflicting {} on {} vanished from the change set",
                            offending.kind(),
                            conflict.key
                        )))
                    } else {
                        if self.config.trace_resolved {
                            info!(
                                "Commit {} ignored {} conflict: dropped {} on key {}.",
                                commit_id,
                                conflict.signature,
                                offending.kind(),
                                conflict.key
                            );
                        } else {
                            debug!(
                                "Commit {} ignored {} conflict: dropped {} on key {}.",
                                commit_id,
                                conflict.signature,
                                offending.kind(),
                                conflict.key
                            );
                        }
                        CommitState::Attempting {
                            attempt: attempt + 1,
                        }
                    }
                }
                CommitState::Succeeded => {
                    debug!("Commit {} succeeded.", commit_id);
                    return Ok(change_set.drain());
                }
                CommitState::Failed(error) => return Err(error),
            };
        }
    }

    fn on_failure(
        &self,
        commit_id: u64,
        attempt: usize,
        error: StoreError,
        batch: &[PendingMutation],
        mode: ResolutionMode,
    ) -> CommitState {
        let classified = self.classifier.classify(&error, batch).and_then(|conflict| {
            // A classifier pointing outside the batch or at another key is
            // not trusted.
            let offending = batch
                .get(conflict.position)
                .filter(|m| *m.key() == conflict.key)?
                .clone();
            Some((conflict, offending))
        });

        match classified {
            None => {
                warn!(
                    "Commit {} attempt {} failed with an unrecognized store error: {}",
                    commit_id, attempt, error
                );
                CommitState::Failed(SaveError::FatalStore(error))
            }
            Some((conflict, _)) if !mode.tolerates(conflict.signature) => {
                warn!(
                    "Commit {} hit {} conflict on key {} not tolerated by mode {}.",
                    commit_id, conflict.signature, conflict.key, mode
                );
                CommitState::Failed(SaveError::UnresolvedConflict {
                    signature: conflict.signature,
                    key: conflict.key,
                })
            }
            Some((conflict, offending)) => CommitState::Resolved {
                attempt,
                conflict,
                offending,
            },
        }
    }
}

/// Each attempt either ends the commit or drops one mutation, so a commit of
/// N mutations needs at most N + 1 attempts. Anything past that means a store
/// or classifier broke the contract.
fn attempt_bound_exceeded(commit_id: u64, attempt: usize, max_attempts: usize) -> Option<SaveError> {
    if attempt <= max_attempts {
        return None;
    }
    warn!(
        "Commit {} gave up after {} attempts without converging.",
        commit_id, max_attempts
    );
    Some(SaveError::FatalStore(StoreError::Other(format!(
        "commit {} exceeded {} attempts",
        commit_id, max_attempts
    ))))
}
