//! JWT infrastructure: key set caching and bearer token verification
//!
//! ```text
//! ┌──────────────────────────────┐
//! │        TokenVerifier         │  header → kid → key → signature/claims
//! └──────────────┬───────────────┘
//!                │ get_key_set()
//! ┌──────────────▼───────────────┐
//! │          JwksClient          │  24h TTL, single-flight refresh,
//! │  (Key Set Cache, leaf)       │  stale-on-error fallback
//! └──────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `jwks` - JWKS fetching and caching
//! - `verifier` - token verification against the cached key set

pub mod jwks;
pub mod verifier;

// Re-export commonly used types
pub use jwks::{Clock, HttpJwksFetcher, JwksClient, JwksFetcher, SystemClock};
pub use verifier::TokenVerifier;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The `aud` claim, which RFC 7519 allows to be a string or an array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// Single audience
    Single(String),
    /// Multiple audiences
    Multiple(Vec<String>),
}

impl Audience {
    /// Whether `audience` is one of the token's audiences
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::Single(aud) => aud == audience,
            Self::Multiple(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

/// Claims of a verified token
///
/// Only ever produced by [`TokenVerifier::verify`]; there is no way to get
/// one out of this crate for a token that failed verification. Claims not
/// modelled here are kept in `extra`, so serializing a `Claims` gives back
/// the original payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub) - the authenticated principal
    pub sub: String,

    /// Issuer (iss)
    pub iss: String,

    /// Audience (aud)
    pub aud: Audience,

    /// Expiration Time (exp) - Unix timestamp
    pub exp: u64,

    /// Issued At (iat) - Unix timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,

    /// Not Before (nbf) - Unix timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,

    /// Auth0 RBAC permissions, present when the API enables them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,

    /// Everything else in the payload
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Claims {
    /// Check whether the token grants a permission
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .as_ref()
            .is_some_and(|perms| perms.iter().any(|p| p == permission))
    }

    /// Permissions granted by the token (empty if the claim is absent)
    pub fn permissions(&self) -> &[String] {
        self.permissions.as_deref().unwrap_or(&[])
    }
}
