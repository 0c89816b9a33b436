//! Outcome of a guarded set operation

use crate::error::CacheError;

/// What a guarded operation produced
///
/// Operations never return `Err`. Instead the three cases that the legacy
/// "undefined" result used to collapse are kept apart: a value, no handle
/// installed, or a contained failure.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum OpOutcome<T> {
    /// The store answered and the reply decoded
    Success(T),
    /// No connection handle is installed
    Unavailable,
    /// The command or its reply failed; the cause was logged
    Failed(CacheError),
}

impl<T> OpOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, OpOutcome::Success(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, OpOutcome::Unavailable)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, OpOutcome::Failed(_))
    }

    /// Collapse to `Option`, losing the reason for a missing value
    pub fn ok(self) -> Option<T> {
        match self {
            OpOutcome::Success(value) => Some(value),
            OpOutcome::Unavailable | OpOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&CacheError> {
        match self {
            OpOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> OpOutcome<U> {
        match self {
            OpOutcome::Success(value) => OpOutcome::Success(f(value)),
            OpOutcome::Unavailable => OpOutcome::Unavailable,
            OpOutcome::Failed(err) => OpOutcome::Failed(err),
        }
    }

    /// Success value or the given default
    pub fn unwrap_or(self, default: T) -> T {
        self.ok().unwrap_or(default)
    }
}

impl<T: Default> OpOutcome<T> {
    pub fn unwrap_or_default(self) -> T {
        self.ok().unwrap_or_default()
    }
}
