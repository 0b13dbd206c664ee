//! Error types for sandlot-core.

use crate::payload::PayloadError;
use sandlot_vm::VmError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for sandlot-core operations.
pub type Result<T> = std::result::Result<T, ControllerError>;

/// Classification of a failed lifecycle call, as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The caller sent a malformed or incomplete request
    InvalidArgument,
    /// The sandbox is unknown to the backend
    NotFound,
    /// The sandbox identifier is already in use
    AlreadyExists,
    /// The sandbox is in the wrong state for the operation
    FailedPrecondition,
    /// The service is going away or cannot be reached
    Unavailable,
    /// The caller's deadline or a backend budget ran out
    DeadlineExceeded,
    /// The operation is not supported; retrying will not help
    NotImplemented,
    /// Anything else
    Internal,
}

impl ErrorCode {
    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::FailedPrecondition => "failed_precondition",
            Self::Unavailable => "unavailable",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::NotImplemented => "not_implemented",
            Self::Internal => "internal",
        }
    }

    /// Whether a caller may reasonably retry the same call later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable | Self::DeadlineExceeded)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&VmError> for ErrorCode {
    fn from(err: &VmError) -> Self {
        if err.is_not_found() {
            Self::NotFound
        } else if err.is_already_exists() {
            Self::AlreadyExists
        } else if err.is_invalid_argument() {
            Self::InvalidArgument
        } else if err.is_failed_precondition() {
            Self::FailedPrecondition
        } else if err.is_timeout() {
            Self::DeadlineExceeded
        } else {
            Self::Internal
        }
    }
}

/// Errors returned by lifecycle operations.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Malformed or missing input
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation not supported by this controller
    #[error("{0}: not implemented")]
    NotImplemented(&'static str),

    /// Backend error with the failing step attached
    #[error("{context}: {source}")]
    Backend {
        /// What the adapter was doing
        context: &'static str,
        /// Backend error, kind preserved
        #[source]
        source: VmError,
    },

    /// Backend error passed through untouched
    #[error(transparent)]
    Vm(#[from] VmError),

    /// A result could not be encoded for the caller
    #[error("{context}: {source}")]
    Payload {
        /// What the adapter was doing
        context: &'static str,
        /// Encoding error
        #[source]
        source: PayloadError,
    },
}

impl ControllerError {
    /// Classify the error. Backend errors keep the backend's classification.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::NotImplemented(_) => ErrorCode::NotImplemented,
            Self::Backend { source, .. } | Self::Vm(source) => ErrorCode::from(source),
            Self::Payload { .. } => ErrorCode::Internal,
        }
    }

    /// The backend error underneath, if any.
    pub fn vm_error(&self) -> Option<&VmError> {
        match self {
            Self::Backend { source, .. } | Self::Vm(source) => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_backend_error_keeps_kind() {
        let err = ControllerError::Backend {
            context: "failed to start firecracker",
            source: VmError::AlreadyExists("sb-1".into()),
        };
        assert_eq!(err.code(), ErrorCode::AlreadyExists);
        assert_eq!(
            err.to_string(),
            "failed to start firecracker: VM already exists: sb-1"
        );
        assert!(err.vm_error().is_some_and(|e| e.is_already_exists()));
    }

    #[test]
    fn test_passthrough_display_is_backend_message() {
        let err = ControllerError::from(VmError::NotFound("sb-1".into()));
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.to_string(), "VM not found: sb-1");
    }

    #[test]
    fn test_unclassified_backend_error_is_internal() {
        let err = ControllerError::from(VmError::Create("firecracker exited".into()));
        assert_eq!(err.code(), ErrorCode::Internal);
    }

    #[test]
    fn test_codes() {
        assert_eq!(
            ControllerError::InvalidArgument("x".into()).code(),
            ErrorCode::InvalidArgument
        );
        assert_eq!(
            ControllerError::NotImplemented("update").code(),
            ErrorCode::NotImplemented
        );
        assert!(!ErrorCode::NotImplemented.is_retryable());
        assert!(ErrorCode::Unavailable.is_retryable());
        assert_eq!(ErrorCode::DeadlineExceeded.to_string(), "deadline_exceeded");
    }
}
