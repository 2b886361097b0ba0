//! Error taxonomy shared by stores, work units and the dispatcher.

use thiserror::Error;

/// Failure talking to the backing store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or a reset could not complete.
    /// Fatal for a benchmarking session.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A statement was rejected by a constraint (unique, not-null, ...).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A returned row did not have the expected shape.
    #[error("unexpected row shape: {0}")]
    RowShape(String),

    /// Any other backend error.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether this error means the store itself is gone.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }

    /// Escalate to `Unavailable`, keeping the original message as context.
    pub fn into_unavailable(self, context: &str) -> StoreError {
        match self {
            StoreError::Unavailable(msg) => StoreError::Unavailable(format!("{context}: {msg}")),
            other => StoreError::Unavailable(format!("{context}: {other}")),
        }
    }
}

/// Failure of a single work unit invocation.
///
/// Recorded per invocation; never aborts the batch it belongs to.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OpError {
    /// The looked-up row does not exist.
    #[error("row {0} not found")]
    NotFound(i64),

    /// The store rejected the operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The operation panicked; the payload message is kept.
    #[error("invocation panicked: {0}")]
    Panicked(String),
}
