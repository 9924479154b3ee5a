//! Error taxonomy for token verification
//!
//! Callers only ever see [`AuthError`]. The variants are deliberately coarse:
//! every way a token can be wrong collapses into [`AuthError::InvalidToken`],
//! and the specific reason ([`RejectReason`]) is only written to the logs.
//!
//! | Variant | When | HTTP mapping |
//! |---------|------|--------------|
//! | `Configuration` | startup, required settings missing or invalid | 500 |
//! | `KeySetUnavailable` | JWKS fetch failed and nothing is cached | 503 |
//! | `InvalidToken` | any verification failure | 401 |
//! | `MissingToken` | no credential presented at all | 401 |

use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

/// Result alias used throughout the crate
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors surfaced to callers of the verifier
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Required identity-provider settings are missing or malformed.
    ///
    /// Only produced while building configuration; a process that hits this
    /// should refuse to start.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The key set could not be fetched and no previous key set is cached
    #[error("Unable to fetch signing keys and no cached key set is available: {0}")]
    KeySetUnavailable(String),

    /// The token failed verification. Carries no reason on purpose.
    #[error("Invalid or expired authentication token")]
    InvalidToken,

    /// No token was presented
    #[error("Authentication token required")]
    MissingToken,
}

impl AuthError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Whether retrying the same request later can succeed without a new token
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::KeySetUnavailable(_))
    }

    /// HTTP status the dispatch layer should answer with
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::KeySetUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidToken | Self::MissingToken => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Why a JWKS fetch attempt failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The endpoint did not answer within the fetch timeout
    #[error("JWKS fetch timed out after {0:?}")]
    Timeout(Duration),

    /// Connection, TLS or other transport failure
    #[error("JWKS fetch failed: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status
    #[error("JWKS endpoint returned status {0}")]
    Status(u16),

    /// The body was not a valid JWK set
    #[error("Invalid JWKS format: {0}")]
    Decode(String),

    /// Plain HTTP to a non-local host
    #[error("JWKS endpoint must use HTTPS (HTTP only allowed for localhost): {0}")]
    InsecureUri(String),
}

/// Internal reason a token was rejected.
///
/// Logged by the verifier, never returned to callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub(crate) enum RejectReason {
    #[error("empty token")]
    EmptyToken,
    #[error("malformed token header: {0}")]
    MalformedHeader(String),
    #[error("token header has no kid")]
    MissingKeyId,
    #[error("signing key not found")]
    SigningKeyNotFound,
    #[error("signing key could not be converted: {0}")]
    InvalidKeyMaterial(String),
    #[error("algorithm not allowed")]
    AlgorithmNotAllowed,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("audience mismatch")]
    AudienceMismatch,
    #[error("issuer mismatch")]
    IssuerMismatch,
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("missing required claim: {0}")]
    MissingClaim(String),
    #[error("malformed token: {0}")]
    Malformed(String),
}

impl RejectReason {
    /// Internal faults (bad key material) are logged at error level,
    /// everything else is a routine rejection.
    pub(crate) fn is_internal(&self) -> bool {
        matches!(self, Self::InvalidKeyMaterial(_))
    }
}

impl From<&jsonwebtoken::errors::Error> for RejectReason {
    fn from(err: &jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::InvalidAudience => Self::AudienceMismatch,
            ErrorKind::InvalidIssuer => Self::IssuerMismatch,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidAlgorithm => Self::AlgorithmNotAllowed,
            ErrorKind::MissingRequiredClaim(claim) => Self::MissingClaim(claim.clone()),
            _ => Self::Malformed(err.to_string()),
        }
    }
}
