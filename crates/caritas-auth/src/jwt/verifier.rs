//! Bearer token verification against the cached key set
//!
//! Per call: `Start → HeaderParsed → KeyResolved → SignatureChecked →
//! ClaimsChecked → Valid | Invalid`. The verifier keeps no state between
//! calls; the key set lives in [`JwksClient`].
//!
//! Every rejection reaches the caller as the same
//! [`AuthError::InvalidToken`]. The reason is logged (warn, or error for
//! internal faults such as unusable key material) and goes no further.

use std::sync::Arc;

use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};
use tracing::{debug, error, info, warn};

use super::{Claims, JwksClient};
use crate::config::VerifierConfig;
use crate::error::{AuthError, AuthResult, RejectReason};

/// Literal prefix stripped from presented tokens (case-sensitive)
const BEARER_PREFIX: &str = "Bearer ";

/// Outcome of a failed check, before collapsing for the caller
#[derive(Debug)]
pub(crate) enum Rejection {
    /// No key set could be obtained at all
    Unavailable(AuthError),
    /// The token itself is bad
    Invalid(RejectReason),
}

impl From<RejectReason> for Rejection {
    fn from(reason: RejectReason) -> Self {
        Self::Invalid(reason)
    }
}

/// JWKS-backed bearer token verifier
///
/// # Example
///
/// ```rust,no_run
/// # use caritas_auth::{TokenVerifier, VerifierConfig};
/// # tokio_test::block_on(async {
/// let config = VerifierConfig::new("example.auth", "my-api")?;
/// let verifier = TokenVerifier::new(config);
///
/// match verifier.verify("Bearer eyJ0eXAi...").await {
///     Ok(claims) => println!("Valid token for: {}", claims.sub),
///     Err(e) => println!("Rejected: {e}"),
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    config: VerifierConfig,
    issuer: String,
    jwks_client: Arc<JwksClient>,
}

impl TokenVerifier {
    /// Create a verifier with its own key set cache for the configured domain
    pub fn new(config: VerifierConfig) -> Self {
        let jwks_client = JwksClient::new(config.jwks_uri())
            .with_ttl(config.jwks_ttl)
            .with_fetch_timeout(config.fetch_timeout);
        Self::with_jwks_client(config, Arc::new(jwks_client))
    }

    /// Create a verifier around an existing key set cache
    ///
    /// Use this to share one cache between verifiers or to inject a cache
    /// with a custom fetcher or clock. The cache's own TTL and timeout apply.
    pub fn with_jwks_client(config: VerifierConfig, jwks_client: Arc<JwksClient>) -> Self {
        let issuer = config.issuer();
        Self {
            config,
            issuer,
            jwks_client,
        }
    }

    /// Verify a bearer token and return its claims
    ///
    /// A leading `"Bearer "` is stripped first.
    ///
    /// # Errors
    ///
    /// - [`AuthError::KeySetUnavailable`] if no key set could be obtained
    ///   (retryable, the token may be fine)
    /// - [`AuthError::InvalidToken`] for every other failure
    pub async fn verify(&self, token: &str) -> AuthResult<Claims> {
        match self.check(token).await {
            Ok(claims) => {
                info!(subject = %claims.sub, "Token validated successfully");
                Ok(claims)
            }
            Err(Rejection::Unavailable(e)) => {
                error!(error = %e, "Cannot verify token without a key set");
                Err(e)
            }
            Err(Rejection::Invalid(reason)) => {
                if reason.is_internal() {
                    error!(reason = %reason, "Unexpected error during token validation");
                } else {
                    warn!(reason = %reason, "Token validation failed");
                }
                Err(AuthError::InvalidToken)
            }
        }
    }

    /// Verify a token, treating any failure as "unauthenticated"
    pub async fn verify_optional(&self, token: &str) -> Option<Claims> {
        self.verify(token).await.ok()
    }

    pub(crate) async fn check(&self, token: &str) -> Result<Claims, Rejection> {
        if token.is_empty() {
            return Err(RejectReason::EmptyToken.into());
        }
        let token = token.strip_prefix(BEARER_PREFIX).unwrap_or(token);

        // Untrusted until the signature checks out
        let header =
            decode_header(token).map_err(|e| RejectReason::MalformedHeader(e.to_string()))?;

        if !self.config.algorithms.contains(&header.alg) {
            debug!(
                algorithm = ?header.alg,
                allowed = ?self.config.algorithms,
                "JWT algorithm not allowed"
            );
            return Err(RejectReason::AlgorithmNotAllowed.into());
        }

        let kid = header.kid.ok_or(RejectReason::MissingKeyId)?;

        let jwks = self
            .jwks_client
            .get_key_set()
            .await
            .map_err(Rejection::Unavailable)?;

        let jwk = jwks.find(&kid).ok_or_else(|| {
            debug!(kid = %kid, "Key ID not found in JWKS");
            RejectReason::SigningKeyNotFound
        })?;

        let decoding_key = DecodingKey::from_jwk(jwk)
            .map_err(|e| RejectReason::InvalidKeyMaterial(format!("kid '{kid}': {e}")))?;

        let token_data = decode::<Claims>(token, &decoding_key, &self.validation())
            .map_err(|e| RejectReason::from(&e))?;

        Ok(token_data.claims)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.algorithms = self.config.algorithms.clone();
        validation.set_audience(&[&self.config.audience]);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = self.config.leeway.as_secs();
        validation
    }

    /// The configuration this verifier was built with
    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Expected `iss` claim
    pub fn expected_issuer(&self) -> &str {
        &self.issuer
    }

    /// Expected `aud` claim
    pub fn expected_audience(&self) -> &str {
        &self.config.audience
    }

    /// The key set cache backing this verifier
    pub fn jwks_client(&self) -> &Arc<JwksClient> {
        &self.jwks_client
    }
}
