// rdssnapshare/src/errors.rs
use aws_sdk_rds::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use thiserror::Error;

/// Provider codes that mean "the thing you asked about is not there".
const NOT_FOUND_CODES: &[&str] = &[
    "DBSnapshotNotFound",
    "DBSnapshotNotFoundFault",
    "DBClusterSnapshotNotFoundFault",
    "DBInstanceNotFound",
    "DBInstanceNotFoundFault",
    "DBClusterNotFoundFault",
];

const TRANSIENT_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
    "InternalFailure",
    "ServiceUnavailable",
];

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("transient provider failure during {operation}: {message}")]
    Transient {
        operation: &'static str,
        message: String,
    },

    #[error("provider call {operation} failed: {message}")]
    Fatal {
        operation: &'static str,
        message: String,
    },

    #[error("snapshot {identifier} was not available after {attempts} polls")]
    WaitExhausted { identifier: String, attempts: u32 },

    #[error("snapshot {identifier} is in unexpected state: {state}")]
    UnexpectedState { identifier: String, state: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl SnapshotError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SnapshotError::NotFound { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SnapshotError::Transient { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorClass {
    NotFound,
    Transient,
    Fatal,
}

/// Maps a provider error code onto the three outcome classes.
pub(crate) fn classify_code(code: Option<&str>) -> ErrorClass {
    match code {
        Some(code) if NOT_FOUND_CODES.contains(&code) => ErrorClass::NotFound,
        Some(code) if TRANSIENT_CODES.contains(&code) => ErrorClass::Transient,
        _ => ErrorClass::Fatal,
    }
}

/// Converts an SDK error from `operation` on `resource` into a typed outcome.
pub(crate) fn from_sdk<E, R>(
    operation: &'static str,
    resource: &str,
    err: SdkError<E, R>,
) -> SnapshotError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let class = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => ErrorClass::Transient,
        _ => classify_code(err.code()),
    };
    let message = DisplayErrorContext(&err).to_string();
    match class {
        ErrorClass::NotFound => SnapshotError::NotFound {
            resource: resource.to_string(),
        },
        ErrorClass::Transient => SnapshotError::Transient { operation, message },
        ErrorClass::Fatal => SnapshotError::Fatal { operation, message },
    }
}

pub type Result<T> = std::result::Result<T, SnapshotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found_codes() {
        assert_eq!(classify_code(Some("DBSnapshotNotFound")), ErrorClass::NotFound);
        assert_eq!(
            classify_code(Some("DBClusterSnapshotNotFoundFault")),
            ErrorClass::NotFound
        );
        assert_eq!(classify_code(Some("DBInstanceNotFound")), ErrorClass::NotFound);
    }

    #[test]
    fn test_classify_throttling_is_transient() {
        assert_eq!(classify_code(Some("Throttling")), ErrorClass::Transient);
        assert_eq!(classify_code(Some("RequestLimitExceeded")), ErrorClass::Transient);
    }

    #[test]
    fn test_classify_unknown_and_missing_codes_are_fatal() {
        assert_eq!(classify_code(Some("InvalidDBSnapshotState")), ErrorClass::Fatal);
        assert_eq!(classify_code(Some("AccessDenied")), ErrorClass::Fatal);
        assert_eq!(classify_code(None), ErrorClass::Fatal);
    }

    #[test]
    fn test_error_predicates() {
        let missing = SnapshotError::NotFound {
            resource: "db-1-latest".to_string(),
        };
        assert!(missing.is_not_found());
        assert!(!missing.is_transient());
        assert_eq!(missing.to_string(), "db-1-latest not found");

        let throttled = SnapshotError::Transient {
            operation: "CopyDBSnapshot",
            message: "Rate exceeded".to_string(),
        };
        assert!(throttled.is_transient());
    }
}
