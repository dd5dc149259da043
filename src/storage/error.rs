use reqwest::StatusCode;
use thiserror::Error;

const TABLE_ALREADY_EXISTS: &str = "TableAlreadyExists";

/// Errors returned by the table storage layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid connection string: {0}")]
    Connection(String),

    #[error("invalid entity: {0}")]
    Entity(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed service response: {0}")]
    Decode(String),

    /// Non-success status for a single request
    #[error("service returned {status} ({code}): {message}")]
    Service {
        status: StatusCode,
        code: String,
        message: String,
    },

    /// One operation of a `$batch` changeset failed and the whole
    /// transaction was rolled back
    #[error("transaction failed with {status} ({code}): {message}")]
    Transaction {
        status: StatusCode,
        code: String,
        message: String,
    },
}

impl StoreError {
    pub fn is_transaction(&self) -> bool {
        matches!(self, StoreError::Transaction { .. })
    }

    /// Decided by the OData error code; a bare 409 without one (the code
    /// then falls back to the status reason) still counts as already there
    pub fn is_already_exists(&self) -> bool {
        match self {
            StoreError::Service { status, code, .. } => {
                code == TABLE_ALREADY_EXISTS
                    || (*status == StatusCode::CONFLICT
                        && status.canonical_reason() == Some(code.as_str()))
            }
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_already_exists() {
        let err = StoreError::Service {
            status: StatusCode::CONFLICT,
            code: "TableAlreadyExists".to_string(),
            message: "The table specified already exists.".to_string(),
        };
        assert!(err.is_already_exists());
        assert!(!err.is_transaction());
    }

    #[test]
    fn test_other_conflicts_are_not_already_exists() {
        let being_deleted = StoreError::Service {
            status: StatusCode::CONFLICT,
            code: "TableBeingDeleted".to_string(),
            message: "The specified table is being deleted.".to_string(),
        };
        assert!(!being_deleted.is_already_exists());

        let bare = StoreError::Service {
            status: StatusCode::CONFLICT,
            code: "Conflict".to_string(),
            message: String::new(),
        };
        assert!(bare.is_already_exists());
    }

    #[test]
    fn test_forbidden_is_not_already_exists() {
        let err = StoreError::Service {
            status: StatusCode::FORBIDDEN,
            code: "AuthenticationFailed".to_string(),
            message: "Server failed to authenticate the request.".to_string(),
        };
        assert!(!err.is_already_exists());
    }
}
