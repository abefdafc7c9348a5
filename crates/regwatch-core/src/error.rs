//! Error types for regwatch-core

use thiserror::Error;

/// Result type alias using regwatch-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can abort a check invocation.
///
/// Mirror-side failures are deliberately absent: a failing or empty mirror
/// is logged as a warning and the check falls through to the origin, so it
/// never surfaces as the overall failure.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or unrecognized request payload; no network access was
    /// attempted.
    #[error("invalid payload: {message}")]
    InvalidPayload { message: String },

    /// Repository string failed validation
    #[error("failed to resolve repository: {reference}")]
    InvalidSource { reference: String },

    /// ECR credential exchange failed despite being configured. There is no
    /// anonymous fallback: the presence of the credential triple means the
    /// caller requires that registry.
    #[error("cannot authenticate with ECR: {message}")]
    AuthenticationFailed { message: String },

    /// Origin resolution failed with a non-not-found error
    #[error("checking origin {registry} failed: {message}")]
    OriginResolutionFailed { registry: String, message: String },

    /// Unable to serialize the response
    #[error("could not marshal JSON: {message}")]
    EncodingFailed { message: String },
}

impl Error {
    /// Create an invalid payload error
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    /// Create an invalid source error
    pub fn invalid_source(reference: impl Into<String>) -> Self {
        Self::InvalidSource {
            reference: reference.into(),
        }
    }

    /// Create an authentication failed error
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            message: message.into(),
        }
    }

    /// Create an origin resolution error naming the registry host
    pub fn origin_resolution_failed(
        registry: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::OriginResolutionFailed {
            registry: registry.into(),
            message: message.into(),
        }
    }

    /// Create an encoding failed error
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }
}
