//! Error types for the CourseLLM domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Only configuration, validation, and model invocation failures are
//! errors; malformed model *output* is never an error (see the
//! normalizer in `coursellm-ist`).

use thiserror::Error;

/// The top-level error type for all CourseLLM operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model invocation errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Request errors ---
    /// The request violates the schema (HTTP 422).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The request is well-formed but carries an unacceptable value (HTTP 400).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The extractor has not been initialized yet.
    #[error("{0} not initialized. Please restart the service.")]
    NotInitialized(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the model call itself.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The provider answered 200 but the envelope carried no usable reply.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}
