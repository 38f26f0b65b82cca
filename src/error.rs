//! Error types for the memory engine.

use thiserror::Error;

use crate::memory::types::Sector;

/// Engine-wide error type. Every public operation returns one of these
/// kinds.
#[derive(Debug, Error)]
pub enum MnemoError {
    /// Malformed caller input — empty content, unknown sector name, zero
    /// limit.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A specific sector embedding could not be produced.
    ///
    /// Non-primary sector failures are logged and swallowed by the
    /// engine; this surfaces only when the primary sector (or a query)
    /// fails.
    #[error("embedding failed for sector {sector} via {provider}: {reason}")]
    EmbedFailed {
        sector: Sector,
        provider: String,
        reason: String,
    },

    /// The persistence layer rejected a write. The calling operation is
    /// aborted and no partial state is committed.
    #[error("store operation failed: {0}")]
    StoreFailed(String),

    /// A referenced id does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A caller-supplied id collides with an existing row.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A bounded external call exceeded its budget.
    #[error("{op} timed out after {seconds}s")]
    Timeout { op: &'static str, seconds: u64 },

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for MnemoError {
    fn from(e: rusqlite::Error) -> Self {
        MnemoError::StoreFailed(e.to_string())
    }
}

impl From<serde_json::Error> for MnemoError {
    fn from(e: serde_json::Error) -> Self {
        MnemoError::StoreFailed(format!("serialization: {e}"))
    }
}

/// Convenience result alias for engine operations.
pub type Result<T> = std::result::Result<T, MnemoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_errors_fold_into_store_failed() {
        let err = MnemoError::from(rusqlite::Error::InvalidQuery);
        assert!(matches!(err, MnemoError::StoreFailed(_)));
    }

    #[test]
    fn display_names_the_failing_sector() {
        let err = MnemoError::EmbedFailed {
            sector: Sector::Emotional,
            provider: "openai".into(),
            reason: "connection refused".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("emotional"));
        assert!(msg.contains("openai"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn not_found_reports_kind_and_id() {
        let err = MnemoError::NotFound {
            kind: "memory",
            id: "abc".into(),
        };
        assert_eq!(err.to_string(), "memory not found: abc");
    }

    #[test]
    fn timeout_reports_op_and_bound() {
        let err = MnemoError::Timeout {
            op: "embed",
            seconds: 30,
        };
        assert_eq!(err.to_string(), "embed timed out after 30s");
    }
}
