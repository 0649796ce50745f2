use serde::{Deserialize, Serialize};

use crate::conflict::resolution::ResolutionMode;

/// Settings shared by every session opened from a [`Database`](crate::Database).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Mode used by `Session::save_changes` when the caller does not pick one.
    pub default_mode: ResolutionMode,
    /// Also report resolved conflicts at `info` level instead of only `debug`.
    pub trace_resolved: bool,
}

impl CoordinatorConfig {
    pub fn with_default_mode(mut self, mode: ResolutionMode) -> Self {
        self.default_mode = mode;
        self
    }

    pub fn with_trace_resolved(mut self, trace_resolved: bool) -> Self {
        self.trace_resolved = trace_resolved;
        self
    }
}
