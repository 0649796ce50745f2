use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::conflict::detection::ConflictSignature;

/// Defines which conflicts a save tolerates.
///
/// A small bitset over [`ConflictSignature`]. A tolerated conflict drops the
/// offending mutation and the save carries on; anything else fails the save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolutionMode(u8);

impl ResolutionMode {
    /// Tolerate nothing. Every conflict fails the save.
    pub const NONE: ResolutionMode = ResolutionMode(0);
    /// Ignore inserts whose key already exists; the stored record wins.
    pub const DUPLICATE_KEY: ResolutionMode = ResolutionMode(1 << 0);
    /// Ignore updates and deletes whose target row was already deleted.
    pub const MISSING_TARGET: ResolutionMode = ResolutionMode(1 << 1);
    /// Tolerate every recognized conflict.
    pub const ALL: ResolutionMode = ResolutionMode(Self::DUPLICATE_KEY.0 | Self::MISSING_TARGET.0);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: ResolutionMode) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn tolerates(self, signature: ConflictSignature) -> bool {
        self.contains(signature.into())
    }
}

impl From<ConflictSignature> for ResolutionMode {
    fn from(signature: ConflictSignature) -> Self {
        match signature {
            ConflictSignature::DuplicateKey => ResolutionMode::DUPLICATE_KEY,
            ConflictSignature::MissingTarget => ResolutionMode::MISSING_TARGET,
        }
    }
}

impl BitOr for ResolutionMode {
    type Output = ResolutionMode;

    fn bitor(self, rhs: Self) -> Self::Output {
        ResolutionMode(self.0 | rhs.0)
    }
}

impl BitOrAssign for ResolutionMode {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ResolutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ResolutionMode::NONE => f.write_str("None"),
            ResolutionMode::ALL => f.write_str("All"),
            ResolutionMode::DUPLICATE_KEY => f.write_str("DuplicateKey"),
            ResolutionMode::MISSING_TARGET => f.write_str("MissingTarget"),
            other => write!(f, "ResolutionMode({:#04b})", other.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_the_union_of_both_flags() {
        assert_eq!(
            ResolutionMode::DUPLICATE_KEY | ResolutionMode::MISSING_TARGET,
            ResolutionMode::ALL
        );
        assert!(ResolutionMode::ALL.tolerates(ConflictSignature::DuplicateKey));
        assert!(ResolutionMode::ALL.tolerates(ConflictSignature::MissingTarget));
    }

    #[test]
    fn single_flags_tolerate_only_their_signature() {
        let dup = ResolutionMode::DUPLICATE_KEY;
        assert!(dup.tolerates(ConflictSignature::DuplicateKey));
        assert!(!dup.tolerates(ConflictSignature::MissingTarget));

        let mut mode = ResolutionMode::default();
        assert!(mode.is_empty());
        assert!(!mode.tolerates(ConflictSignature::DuplicateKey));
        mode |= ResolutionMode::MISSING_TARGET;
        assert!(mode.tolerates(ConflictSignature::MissingTarget));
        assert!(!mode.tolerates(ConflictSignature::DuplicateKey));
    }
}
