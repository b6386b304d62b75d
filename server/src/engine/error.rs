use thiserror::Error;

use crate::storage::StorageError;

/// Every way an engine operation can fail.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input rejected before touching the database.
    #[error("{0}")]
    Validation(String),

    /// The write would break a uniqueness rule (duplicate name, already a member).
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    /// A later step of a multi-step write failed. Earlier steps were undone.
    #[error("{0}")]
    PartialFailure(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl EngineError {
    /// Message safe to show to an end user. Infrastructure details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::Database(_) | EngineError::Storage(_) => {
                "Something went wrong. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_infrastructure_errors() {
        let err = EngineError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.user_message(), "Something went wrong. Please try again.");
        assert!(err.to_string().starts_with("database error"));
    }

    #[test]
    fn test_user_message_keeps_domain_errors() {
        let err = EngineError::Conflict("Sorry, c/test1 already exists.".into());
        assert_eq!(err.user_message(), "Sorry, c/test1 already exists.");
    }
}
