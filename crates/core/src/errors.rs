//! Core error types for the Givetrack progress engine.
//!
//! This module defines store-agnostic error types. Adapter-specific errors
//! (Firestore, HTTP, local storage) are converted to these types by the
//! adapter layer before they reach the core.

use rust_decimal::Decimal;
use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the progress engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),

    /// Internal signal: a finished recomputation belongs to an epoch that is
    /// no longer current and its result must be dropped.
    #[error("Stale epoch for campaign {campaign_id}: computed under token {computed}, current is {current}")]
    StaleEpoch {
        campaign_id: String,
        computed: u64,
        current: u64,
    },

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// Returns true if retrying the failed operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Store(e) if e.is_transient())
    }

    /// Returns true if the error denotes an absent record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Store(StoreError::NotFound(_)))
    }
}

/// Errors reported by document store adapters.
///
/// Adapters map their driver errors into this enum so the core can decide
/// between retrying, falling back and surfacing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached or refused the request temporarily.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The operation did not complete within its deadline.
    #[error("Store operation timed out: {0}")]
    Timeout(String),

    /// The requested record does not exist.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// The backend rejected the operation (permissions, constraint).
    #[error("Store rejected operation: {0}")]
    Rejected(String),

    /// A persisted record could not be decoded.
    #[error("Failed to decode record: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Returns true if this error is transient and should be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

/// Validation errors for user input and configuration.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Required field '{0}' is missing")]
    MissingField(String),

    #[error("Amount must be greater than zero, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("Failed to parse decimal number: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// === From implementations for common error types ===

impl From<rust_decimal::Error> for Error {
    fn from(err: rust_decimal::Error) -> Self {
        Error::Validation(ValidationError::DecimalParse(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Validation(ValidationError::Json(err))
    }
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::from(StoreError::Timeout("read".into())).is_transient());
        assert!(Error::from(StoreError::Unavailable("offline".into())).is_transient());
        assert!(!Error::from(StoreError::NotFound("goal".into())).is_transient());
        assert!(!Error::from(StoreError::Rejected("denied".into())).is_transient());
        assert!(!Error::from(ValidationError::MissingField("title".into())).is_transient());
    }

    #[test]
    fn test_not_found_detection() {
        assert!(Error::from(StoreError::NotFound("goal".into())).is_not_found());
        assert!(!Error::Unexpected("boom".into()).is_not_found());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::from(ValidationError::NonPositiveAmount(Decimal::ZERO));
        assert_eq!(
            err.to_string(),
            "Input validation failed: Amount must be greater than zero, got 0"
        );

        let err = Error::StaleEpoch {
            campaign_id: "c1".into(),
            computed: 1,
            current: 2,
        };
        assert!(err.to_string().contains("c1"));
    }
}
