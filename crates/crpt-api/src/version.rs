//! Version information for crpt-api.

/// Crate version from Cargo.toml
pub const CRPT_API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// `User-Agent` sent with every submission.
pub fn user_agent() -> String {
    format!("crpt-api/{}", CRPT_API_VERSION)
}
