//! Error types for the skillbase-store crate.
//!
//! All storage operations return [`StoreError`] via [`StoreResult`].
//! Variants fall into four kinds: invalid input, legitimate absence,
//! store failure and fatal. See [`StoreError::is_store_failure`] and
//! [`StoreError::is_fatal`].

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the skill store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite rejected or failed a statement.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored row could not be decoded into a domain value.
    #[error("invalid row: {0}")]
    InvalidRow(String),

    /// A schema migration failed.
    #[error("migration v{version} failed: {message}")]
    Migration { version: u32, message: String },

    /// The requested record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An invalid argument was provided to a store operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A blocking task was cancelled or panicked, or the connection mutex
    /// was poisoned.
    #[error("background task failed: {0}")]
    TaskJoin(String),

    /// A condition that could compromise id uniqueness.
    #[error("fatal: {0}")]
    Fatal(String),

    /// The id generator collided on every attempt.
    #[error("id generation gave up after {attempts} colliding candidates")]
    IdExhausted { attempts: u32 },
}

impl StoreError {
    /// Whether the underlying store failed (as opposed to bad input,
    /// absence, or a fatal condition).
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(_) | Self::InvalidRow(_) | Self::Migration { .. } | Self::TaskJoin(_)
        )
    }

    /// Whether the error must never be degraded into an empty result.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_) | Self::IdExhausted { .. })
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_disjoint() {
        let failure = StoreError::Sqlite(rusqlite::Error::InvalidQuery);
        assert!(failure.is_store_failure());
        assert!(!failure.is_fatal());

        let fatal = StoreError::IdExhausted { attempts: 3 };
        assert!(fatal.is_fatal());
        assert!(!fatal.is_store_failure());

        let invalid = StoreError::InvalidArgument("id must not be empty".into());
        assert!(!invalid.is_fatal());
        assert!(!invalid.is_store_failure());
    }

    #[test]
    fn display_includes_context() {
        let err = StoreError::NotFound {
            entity: "skill",
            id: "0123456789".into(),
        };
        assert_eq!(err.to_string(), "skill not found: 0123456789");

        let err = StoreError::IdExhausted { attempts: 32 };
        assert!(err.to_string().contains("32"));
    }
}
