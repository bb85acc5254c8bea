//! crpt-api: rate-limited client for the CRPT document registration API.
//!
//! Submissions pass through a fixed-window admission gate shared by every
//! caller: at most `limit` calls start per `period`, waiting callers are
//! served in arrival order, and capacity comes back only when the next window
//! opens.

mod version;

pub mod config;
pub mod document;
pub mod permit;
pub mod service;
pub mod submitter;
pub mod transport;

pub use config::{ClientConfig, ConfigError, DEFAULT_ENDPOINT, GateConfig};
pub use document::{Description, Document, Product};
pub use permit::{Admission, GateError, PermitPool, PoolSnapshot};
pub use service::{SubmissionService, SubmitError};
pub use submitter::{SubmissionFailure, SubmissionReceipt, SubmissionRequest, Submitter};
pub use tokio_util::sync::CancellationToken;
pub use transport::HttpSubmitter;
pub use version::{CRPT_API_VERSION, user_agent};
