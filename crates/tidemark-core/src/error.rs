use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the query layer.
///
/// Stores return `anyhow::Result`; anything they raise is wrapped as
/// [`QueryError::Store`] so callers can tell "no data" (an empty `Ok`) from
/// "query failed".
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("validation error on {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("store query timed out after {0:?}")]
    Timeout(Duration),

    #[error("query superseded by a newer request")]
    Superseded,
}

/// Coarse classification used by presentation layers to pick a UI state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Store,
}

impl QueryError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::Validation { .. } => ErrorKind::Validation,
            QueryError::NotFound { .. } => ErrorKind::NotFound,
            QueryError::Store(_) | QueryError::Timeout(_) | QueryError::Superseded => {
                ErrorKind::Store
            }
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_supersession_classify_as_store_failures() {
        assert_eq!(
            QueryError::Timeout(Duration::from_millis(5)).kind(),
            ErrorKind::Store
        );
        assert_eq!(QueryError::Superseded.kind(), ErrorKind::Store);
        assert_eq!(
            QueryError::from(anyhow::anyhow!("disk full")).kind(),
            ErrorKind::Store
        );
    }

    #[test]
    fn validation_message_names_the_field() {
        let err = QueryError::validation("bucket", "month is not permitted for a 5-day window");
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "validation error on bucket: month is not permitted for a 5-day window"
        );
    }
}
