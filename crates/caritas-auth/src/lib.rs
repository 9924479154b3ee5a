//! # Caritas Auth - bearer token verification for the Caritas MCP server
//!
//! Verifies identity-provider (Auth0-style) access tokens against the
//! provider's published JSON Web Key Set before a tool call is dispatched.
//!
//! ## Architecture
//!
//! - [`jwt::JwksClient`] - Key Set Cache: 24h TTL, single-flight refresh,
//!   stale key set served when the provider is unreachable
//! - [`jwt::TokenVerifier`] - resolves the token's `kid`, checks signature,
//!   audience, issuer, algorithm and expiry, returns [`Claims`]
//! - [`config`] - [`VerifierConfig`], loaded once at startup (`from_env`)
//! - [`error`] - [`AuthError`]; token failures are deliberately uniform
//! - [`guard`] - [`AuthGuard`], the explicit authentication step in front of
//!   tool handlers
//! - [`tower`] - [`AuthLayer`](tower::AuthLayer) middleware for HTTP stacks
//!   (feature `middleware`, on by default)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use caritas_auth::{AuthGuard, TokenVerifier, VerifierConfig};
//!
//! # tokio_test::block_on(async {
//! // Fails fast if AUTH0_DOMAIN / AUTH0_API_IDENTIFIER are missing
//! let config = VerifierConfig::from_env()?;
//! let guard = AuthGuard::new(Arc::new(TokenVerifier::new(config)));
//!
//! let claims = guard.authenticate(Some("Bearer eyJ0eXAi...")).await?;
//! println!("authenticated {}", claims.sub);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod config;
pub mod error;
pub mod guard;
pub mod jwt;

#[cfg(feature = "middleware")]
pub mod tower;

#[doc(inline)]
pub use config::VerifierConfig;

#[doc(inline)]
pub use error::{AuthError, AuthResult, FetchError};

#[doc(inline)]
pub use guard::AuthGuard;

#[doc(inline)]
pub use jwt::{Audience, Claims, JwksClient, TokenVerifier};
