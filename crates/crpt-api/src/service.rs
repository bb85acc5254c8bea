//! SubmissionService: the rate-limited entry point.
//!
//! Every submission first takes a permit from the [`PermitPool`], then runs
//! the [`Submitter`]. The outcome of the call never feeds back into the pool:
//! a spent permit stays spent until the next window opens, whether the call
//! succeeded, was rejected, or never reached the server.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{ClientConfig, ConfigError, GateConfig};
use crate::document::Document;
use crate::permit::{Admission, GateError, PermitPool, PoolSnapshot};
use crate::submitter::{SubmissionFailure, SubmissionReceipt, SubmissionRequest, Submitter};
use crate::transport::HttpSubmitter;

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Submission not admitted: {0}")]
    Cancelled(#[source] GateError),
    #[error("Submission failed: {0}")]
    Failed(#[from] SubmissionFailure),
    #[error("Failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SubmitError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// Rate-limited document submission.
///
/// Shareable across tasks behind an `Arc`; all callers draw from one pool.
pub struct SubmissionService {
    pool: PermitPool,
    submitter: Arc<dyn Submitter>,
}

impl SubmissionService {
    /// HTTP-backed service. Fails with [`ConfigError::NoRuntime`] outside a
    /// tokio runtime.
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let submitter = HttpSubmitter::new(config)?;
        tracing::info!(
            endpoint = submitter.endpoint(),
            limit = config.gate.limit,
            period_ms = config.gate.period.as_millis() as u64,
            "Submission service ready"
        );
        Self::with_submitter(&config.gate, Arc::new(submitter))
    }

    pub fn with_submitter(
        gate: &GateConfig,
        submitter: Arc<dyn Submitter>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            pool: PermitPool::new(gate)?,
            submitter,
        })
    }

    /// Wait for admission, then submit.
    pub async fn submit(
        &self,
        request: &SubmissionRequest,
    ) -> Result<SubmissionReceipt, SubmitError> {
        let admission = self.pool.acquire().await.map_err(SubmitError::Cancelled)?;
        self.perform(admission, request).await
    }

    /// [`submit`](Self::submit), giving up on admission when `token` fires.
    ///
    /// Cancellation only applies while waiting for a permit; once admitted the
    /// call runs to completion.
    pub async fn submit_with_cancel(
        &self,
        request: &SubmissionRequest,
        token: &CancellationToken,
    ) -> Result<SubmissionReceipt, SubmitError> {
        let admission = self
            .pool
            .acquire_with_cancel(token)
            .await
            .map_err(SubmitError::Cancelled)?;
        self.perform(admission, request).await
    }

    /// Serialize `document` and submit it with `signature`.
    ///
    /// Encoding happens before admission, so a bad document never spends a
    /// permit.
    pub async fn create_document(
        &self,
        document: &Document,
        signature: &str,
    ) -> Result<SubmissionReceipt, SubmitError> {
        let request = SubmissionRequest::new(document.to_payload()?, signature);
        self.submit(&request).await
    }

    async fn perform(
        &self,
        admission: Admission,
        request: &SubmissionRequest,
    ) -> Result<SubmissionReceipt, SubmitError> {
        tracing::debug!(window = admission.window(), "Submission admitted");

        match self.submitter.submit(request).await {
            Ok(receipt) => Ok(receipt),
            Err(failure) => {
                tracing::debug!(
                    window = admission.window(),
                    error = %failure,
                    "Submission failed, permit stays spent"
                );
                Err(failure.into())
            }
        }
    }

    /// Stop the window timer and fail every caller still waiting.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        self.pool.snapshot()
    }

    pub fn pool(&self) -> &PermitPool {
        &self.pool
    }
}
