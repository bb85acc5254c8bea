//! The outbound call behind the admission gate.
//!
//! The service only needs "payload in, outcome out"; transports implement
//! [`Submitter`] and tests substitute their own.

use async_trait::async_trait;

/// Serialized document plus its detached signature. Passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub payload: String,
    pub signature: String,
}

impl SubmissionRequest {
    pub fn new(payload: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            signature: signature.into(),
        }
    }
}

/// Successful response from the registration service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionFailure {
    #[error("registration service returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(String),
}

impl SubmissionFailure {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(_) => None,
        }
    }
}

#[async_trait]
pub trait Submitter: Send + Sync {
    /// Perform one submission. Called only after a permit was granted.
    async fn submit(
        &self,
        request: &SubmissionRequest,
    ) -> Result<SubmissionReceipt, SubmissionFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_display() {
        let err = SubmissionFailure::Status {
            status: 403,
            message: "Forbidden".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "registration service returned 403: Forbidden"
        );
        assert_eq!(err.status(), Some(403));

        let err = SubmissionFailure::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "request failed: connection refused");
        assert_eq!(err.status(), None);
    }
}
