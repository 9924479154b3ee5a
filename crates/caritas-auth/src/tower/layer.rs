//! Tower Layer implementation for authentication

use std::sync::Arc;
use tower::Layer;

use crate::jwt::TokenVerifier;

use super::AuthLayerConfig;
use super::service::AuthService;

/// Tower Layer that adds bearer token verification to services
#[derive(Debug, Clone)]
pub struct AuthLayer {
    verifier: Arc<TokenVerifier>,
    config: AuthLayerConfig,
}

impl AuthLayer {
    /// Create a new auth layer with default configuration
    pub fn new(verifier: Arc<TokenVerifier>) -> Self {
        Self {
            verifier,
            config: AuthLayerConfig::default(),
        }
    }

    /// Create a new auth layer with custom configuration
    pub fn with_config(verifier: Arc<TokenVerifier>, config: AuthLayerConfig) -> Self {
        Self { verifier, config }
    }

    /// Add a path to bypass authentication
    #[must_use]
    pub fn bypass_path(mut self, path: impl Into<String>) -> Self {
        self.config.bypass_paths.push(path.into());
        self
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService::new(inner, Arc::clone(&self.verifier), self.config.clone())
    }
}
