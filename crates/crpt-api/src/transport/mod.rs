//! Transports implementing [`Submitter`](crate::submitter::Submitter).

pub mod http;

pub use http::HttpSubmitter;
