//! HTTP transport for the registration endpoint.
//!
//! One `POST` per submission: JSON body, detached signature in the
//! `Signature` header. No retries; the caller decides what a failure means.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};

use crate::config::{ClientConfig, ConfigError};
use crate::submitter::{SubmissionFailure, SubmissionReceipt, SubmissionRequest, Submitter};
use crate::version::user_agent;

const SIGNATURE_HEADER: &str = "Signature";

pub struct HttpSubmitter {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpSubmitter {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&user_agent()) {
            headers.insert(USER_AGENT, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit(
        &self,
        request: &SubmissionRequest,
    ) -> Result<SubmissionReceipt, SubmissionFailure> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, &request.signature)
            .body(request.payload.clone())
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, endpoint = %self.endpoint, "Document submission request failed");
                SubmissionFailure::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(error = %e, status = %status, "Failed to read response body");
                String::new()
            }
        };

        if status.is_success() {
            tracing::info!(status = %status.as_u16(), "Document created");
            return Ok(SubmissionReceipt {
                status: status.as_u16(),
                body,
            });
        }

        let message = if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("unknown status").to_string()
        } else {
            body
        };
        tracing::warn!(status = %status.as_u16(), message = %message, "Document submission rejected");

        Err(SubmissionFailure::Status {
            status: status.as_u16(),
            message,
        })
    }
}
