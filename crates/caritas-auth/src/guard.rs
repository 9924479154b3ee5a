//! Explicit authentication step for tool dispatch
//!
//! The dispatch layer calls [`AuthGuard::authenticate`] with whatever
//! credential arrived with the call, then hands the resulting [`Claims`] to
//! the tool handler as an ordinary argument.
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use caritas_auth::{AuthGuard, Claims, TokenVerifier, VerifierConfig};
//! async fn chat(user: &Claims, message: &str) -> String {
//!     format!("{} says {message}", user.sub)
//! }
//!
//! # tokio_test::block_on(async {
//! let verifier = TokenVerifier::new(VerifierConfig::from_env()?);
//! let guard = AuthGuard::new(Arc::new(verifier));
//!
//! let claims = guard.authenticate(Some("Bearer eyJ0eXAi...")).await?;
//! let reply = chat(&claims, "hello").await;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

use std::sync::Arc;

use crate::error::{AuthError, AuthResult};
use crate::jwt::{Claims, TokenVerifier};

/// Gatekeeper placed in front of protected tool handlers
#[derive(Debug, Clone)]
pub struct AuthGuard {
    verifier: Arc<TokenVerifier>,
}

impl AuthGuard {
    /// Create a guard around a shared verifier
    pub fn new(verifier: Arc<TokenVerifier>) -> Self {
        Self { verifier }
    }

    /// Authenticate a call
    ///
    /// A blank credential counts as no credential. Anything else is handed to
    /// [`TokenVerifier::verify`] exactly as received.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingToken`] if no credential (or a blank one) was sent
    /// - [`AuthError::InvalidToken`] / [`AuthError::KeySetUnavailable`] from
    ///   [`TokenVerifier::verify`]
    pub async fn authenticate(&self, token: Option<&str>) -> AuthResult<Claims> {
        match token {
            Some(token) if !token.trim().is_empty() => self.verifier.verify(token).await,
            _ => Err(AuthError::MissingToken),
        }
    }

    /// The verifier behind this guard
    pub fn verifier(&self) -> &Arc<TokenVerifier> {
        &self.verifier
    }
}
