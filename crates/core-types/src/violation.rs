use core::fmt;

use crate::{Digest, ModId};

/// Why a module failed the allowlist check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    /// The allowlist has no entry for the module.
    Missing,

    /// The allowlist expects a different digest.
    Mismatch {
        /// The digest recorded in the allowlist
        expected: Digest,
    },

    /// The module could not be hashed, so it cannot be checked.
    Unverifiable,
}

/// A module that failed the allowlist check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// The offending module
    pub id: ModId,

    /// What went wrong
    pub kind: ViolationKind,
}

impl Violation {
    /// Create a new violation.
    pub fn new(id: impl Into<ModId>, kind: ViolationKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::Missing => write!(f, "{} (not in allowlist)", self.id),
            ViolationKind::Mismatch { expected } => {
                write!(f, "{} (expected {expected})", self.id)
            }
            ViolationKind::Unverifiable => write!(f, "{} (unverifiable)", self.id),
        }
    }
}
