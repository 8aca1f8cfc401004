//! Error types for backend operations.
//!
//! Every failure here is reported synchronously, before any lane is launched.
//! There is no error channel out of a running lane: out-of-bounds access is
//! prevented structurally by the bounds checker, and a panicking stage is
//! fatal to the whole invocation with no partial-result guarantee.

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors that can occur while configuring or preparing a launch
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Group/loop-block shapes or the domain produce an unlaunchable grid
    #[error("invalid launch configuration: {0}")]
    InvalidLaunchConfig(String),

    /// Host slice length does not match the field's domain
    #[error("field size mismatch: domain has {expected} cells, host slice has {actual}")]
    FieldSizeMismatch { expected: u64, actual: u64 },

    /// Temporary reservation could not be satisfied
    #[error("temporary allocation failed: requested {requested} bytes ({reason})")]
    AllocationFailed { requested: usize, reason: String },
}

impl BackendError {
    /// Create an invalid launch configuration error
    pub fn invalid_launch_config(msg: impl Into<String>) -> Self {
        Self::InvalidLaunchConfig(msg.into())
    }

    /// Create an allocation failure error
    pub fn allocation_failed(requested: usize, reason: impl Into<String>) -> Self {
        Self::AllocationFailed {
            requested,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        let err = BackendError::invalid_launch_config("group size is zero on axis 1");
        assert_eq!(
            err.to_string(),
            "invalid launch configuration: group size is zero on axis 1"
        );

        let err = BackendError::FieldSizeMismatch {
            expected: 100,
            actual: 99,
        };
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("99"));

        let err = BackendError::allocation_failed(1 << 40, "byte size overflow");
        assert!(err.to_string().contains("byte size overflow"));
    }
}
