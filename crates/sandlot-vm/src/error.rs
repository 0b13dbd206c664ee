//! Error types for sandlot-vm.

use thiserror::Error;

/// Result type alias for sandlot-vm operations.
pub type Result<T> = std::result::Result<T, VmError>;

/// Errors that can occur during VM operations.
#[derive(Debug, Error)]
pub enum VmError {
    /// No VM is registered under the given ID
    #[error("VM not found: {0}")]
    NotFound(String),

    /// A VM is already registered under the given ID
    #[error("VM already exists: {0}")]
    AlreadyExists(String),

    /// The request itself is malformed
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Failed to create the VM
    #[error("failed to create VM: {0}")]
    Create(String),

    /// Failed to start the VM
    #[error("failed to start VM: {0}")]
    Start(String),

    /// Failed to stop the VM
    #[error("failed to stop VM: {0}")]
    Stop(String),

    /// VM is not in expected state
    #[error("invalid VM state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Invalid machine configuration supplied by the caller
    #[error("configuration error: {0}")]
    Config(String),

    /// Firecracker API call failed, including building or encoding the request
    #[error("firecracker API error: {0}")]
    Api(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout waiting for operation
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl VmError {
    /// True if the error reports an unknown VM ID.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// True if the error reports an ID collision.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    /// True if the caller supplied a request the backend rejects outright.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidRequest(_) | Self::Config(_))
    }

    /// True if the VM exists but cannot accept the operation in its current state.
    pub fn is_failed_precondition(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }

    /// True if the operation ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(VmError::NotFound("vm-1".into()).is_not_found());
        assert!(VmError::AlreadyExists("vm-1".into()).is_already_exists());
        assert!(VmError::Config("bad vcpu".into()).is_invalid_argument());
        assert!(VmError::InvalidRequest("empty id".into()).is_invalid_argument());
        assert!(VmError::Timeout(std::time::Duration::from_secs(1)).is_timeout());
        assert!(VmError::InvalidState {
            expected: "running".into(),
            actual: "stopped".into(),
        }
        .is_failed_precondition());

        let err = VmError::Create("boom".into());
        assert!(!err.is_not_found());
        assert!(!err.is_invalid_argument());
        assert!(!VmError::Api("failed to build /machine-config request".into()).is_invalid_argument());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            VmError::NotFound("vm-1".into()).to_string(),
            "VM not found: vm-1"
        );
    }
}
