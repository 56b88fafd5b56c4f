use crate::database::DatabaseError;
use rust_decimal::Decimal;
use sqlx::Error as SqlxError;
use thiserror::Error;
use uuid::Uuid;

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed amount, bad enum value, missing required field
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Wallet balance does not cover the requested amount
    #[error("Insufficient balance: {required} required")]
    InsufficientBalance { required: Decimal },

    /// A result already exists for this (event, player) pair
    #[error("Duplicate submission: {0}")]
    DuplicateSubmission(String),

    /// The external payment reference was already recorded
    #[error("Duplicate external transaction: {0}")]
    DuplicateExternalTransaction(String),

    /// Acting on an entity that is no longer in the expected state
    #[error("Already processed: {0}")]
    InvalidStateTransition(String),

    /// Not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Prize pool exceeded: requested {requested} of {prize_pool}")]
    PrizePoolExceeded { prize_pool: Decimal, requested: Decimal },

    #[error("Prizes already distributed for event {0}")]
    AlreadyDistributed(Uuid),

    /// Storage write or read failed after validation passed; nothing was committed
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Message(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Check if error is a database connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            AppError::Database(DatabaseError::PoolCreation(_))
                | AppError::Database(DatabaseError::ConnectionTimeout)
        )
    }

    /// Check if error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Whether a caller may safely retry the same call.
    ///
    /// State conflicts are final: the entity was already processed and a retry
    /// would be rejected again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::PersistenceFailure(_)) || self.is_connection_error()
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::InvalidInput(_) => 400,
            AppError::InsufficientBalance { .. } => 400,
            AppError::PrizePoolExceeded { .. } => 400,
            AppError::NotFound(_) => 404,
            AppError::DuplicateSubmission(_)
            | AppError::DuplicateExternalTransaction(_)
            | AppError::InvalidStateTransition(_)
            | AppError::AlreadyDistributed(_) => 409,
            AppError::PersistenceFailure(_) | AppError::Database(_) => 503,
            _ => 500,
        }
    }
}

/// Repository-specific error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database query error
    #[error("Query error: {0}")]
    Query(SqlxError),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Duplicate record
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Insufficient balance: {required} required")]
    InsufficientBalance { required: Decimal },

    /// Compare-and-swap on a status column found a different status
    #[error("Status conflict: {0}")]
    StatusConflict(String),

    #[error("Already distributed: {0}")]
    AlreadyDistributed(Uuid),

    /// A stored value could not be mapped back onto a model
    #[error("Decode error: {0}")]
    Decode(String),

    /// The storage call did not finish within the configured timeout
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A value fell outside what a money column accepts
    #[error("Value out of range: {0}")]
    OutOfRange(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => AppError::NotFound(msg),
            RepositoryError::Query(e) => AppError::PersistenceFailure(e.to_string()),
            RepositoryError::Duplicate(msg) => AppError::DuplicateSubmission(msg),
            RepositoryError::InsufficientBalance { required } => {
                AppError::InsufficientBalance { required }
            }
            RepositoryError::StatusConflict(msg) => AppError::InvalidStateTransition(msg),
            RepositoryError::AlreadyDistributed(event_id) => AppError::AlreadyDistributed(event_id),
            RepositoryError::Decode(msg) => AppError::PersistenceFailure(msg),
            RepositoryError::Timeout(msg) => AppError::PersistenceFailure(msg),
            RepositoryError::OutOfRange(msg) => AppError::InvalidInput(msg),
        }
    }
}

impl From<SqlxError> for RepositoryError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::RowNotFound => RepositoryError::NotFound("Record not found".to_string()),
            SqlxError::Database(db_err) => {
                // Check for common PostgreSQL error codes
                let code = db_err.code().map(|c| c.to_string());
                if code.as_deref() == Some("23505") {
                    // Unique violation
                    RepositoryError::Duplicate(db_err.message().to_string())
                } else if matches!(code.as_deref(), Some("23514") | Some("22003")) {
                    // Check constraint violation or numeric overflow
                    RepositoryError::OutOfRange(db_err.message().to_string())
                } else {
                    RepositoryError::Query(err)
                }
            }
            _ => RepositoryError::Query(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_errors_map_to_app_errors() {
        let err: AppError = RepositoryError::StatusConflict("withdrawal is approved".into()).into();
        assert!(matches!(err, AppError::InvalidStateTransition(_)));
        assert_eq!(err.status_code(), 409);
        assert!(err.to_string().starts_with("Already processed"));

        let err: AppError = RepositoryError::InsufficientBalance {
            required: Decimal::new(60, 0),
        }
        .into();
        assert!(matches!(err, AppError::InsufficientBalance { .. }));
        assert!(!err.is_retryable());

        let err: AppError = RepositoryError::Query(SqlxError::PoolClosed).into();
        assert!(matches!(err, AppError::PersistenceFailure(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_out_of_range_is_invalid_input() {
        let err: AppError = RepositoryError::OutOfRange("balance would exceed limit".into()).into();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(err.status_code(), 400);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: RepositoryError = SqlxError::RowNotFound.into();
        let app: AppError = err.into();
        assert!(app.is_not_found());
    }
}
