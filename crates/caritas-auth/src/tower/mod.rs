//! # Tower Middleware Integration
//!
//! - [`AuthLayer`] - wraps a service with bearer token verification
//! - [`AuthService`] - verifies the `Authorization` header and forwards
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//! use caritas_auth::tower::AuthLayer;
//!
//! let service = ServiceBuilder::new()
//!     .layer(AuthLayer::new(verifier).bypass_path("health"))
//!     .service(tool_dispatch);
//! ```
//!
//! ## Request Extensions
//!
//! On success the verified [`Claims`](crate::Claims) are inserted into the
//! request's extensions:
//!
//! ```rust,ignore
//! let claims = req.extensions().get::<Claims>().expect("behind AuthLayer");
//! ```
//!
//! ## Rejections
//!
//! The inner service is not called on failure. The response carries an empty
//! body, `WWW-Authenticate: Bearer`, and status 401 for missing/invalid
//! tokens or 503 when no key set is available.

mod layer;
mod service;

pub use layer::AuthLayer;
pub use service::{AuthService, AuthServiceFuture};

/// Configuration for the auth layer
#[derive(Debug, Clone)]
pub struct AuthLayerConfig {
    /// Request paths (without leading `/`) that skip authentication
    pub bypass_paths: Vec<String>,
    /// Header name to extract the token from (default: "Authorization")
    pub auth_header: String,
}

impl Default for AuthLayerConfig {
    fn default() -> Self {
        Self {
            bypass_paths: vec!["health".to_string()],
            auth_header: "Authorization".to_string(),
        }
    }
}

impl AuthLayerConfig {
    /// Create a new config with custom bypass paths
    #[must_use]
    pub fn with_bypass_paths(paths: Vec<String>) -> Self {
        Self {
            bypass_paths: paths,
            ..Default::default()
        }
    }

    /// Add a path to the bypass list
    #[must_use]
    pub fn bypass_path(mut self, path: impl Into<String>) -> Self {
        self.bypass_paths.push(path.into());
        self
    }

    /// Set the authorization header name
    #[must_use]
    pub fn auth_header(mut self, header: impl Into<String>) -> Self {
        self.auth_header = header.into();
        self
    }

    /// Check if a request path should bypass authentication
    #[must_use]
    pub fn should_bypass(&self, path: &str) -> bool {
        let path = path.trim_start_matches('/');
        self.bypass_paths.iter().any(|p| p == path)
    }
}
