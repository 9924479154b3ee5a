//! Tower Service implementation for authentication
//!
//! Works with `http::Request<B>` based stacks (Axum, Tower-HTTP, hyper):
//!
//! - extracts the token from the configured header (`Authorization` by default)
//! - verifies it with the shared [`TokenVerifier`]
//! - inserts the resulting [`Claims`] into the request extensions
//! - answers 401/503 itself when verification fails

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use http::header::{HeaderValue, RETRY_AFTER, WWW_AUTHENTICATE};
use tower_service::Service;
use tracing::debug;

use crate::error::AuthError;
use crate::jwt::{Claims, TokenVerifier};

use super::AuthLayerConfig;

/// Tower Service that performs bearer token verification
#[derive(Debug, Clone)]
pub struct AuthService<S> {
    inner: S,
    verifier: Arc<TokenVerifier>,
    config: AuthLayerConfig,
}

impl<S> AuthService<S> {
    /// Create a new auth service
    pub fn new(inner: S, verifier: Arc<TokenVerifier>, config: AuthLayerConfig) -> Self {
        Self {
            inner,
            verifier,
            config,
        }
    }

    /// Get a reference to the inner service
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Extract the raw credential, `Bearer ` prefix included
    fn extract_token<B>(&self, req: &http::Request<B>) -> Option<String> {
        req.headers()
            .get(&self.config.auth_header)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }
}

/// Future type for auth service responses
pub type AuthServiceFuture<T, E> = BoxFuture<'static, Result<T, E>>;

/// Build the response for a failed authentication
fn rejection<ResBody: Default>(error: &AuthError) -> http::Response<ResBody> {
    let mut response = http::Response::new(ResBody::default());
    *response.status_mut() = error.status_code();

    let challenge = match error {
        AuthError::InvalidToken => r#"Bearer error="invalid_token""#,
        _ => "Bearer",
    };
    let headers = response.headers_mut();
    headers.insert(WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
    if error.is_retryable() {
        headers.insert(RETRY_AFTER, HeaderValue::from_static("5"));
    }
    response
}

impl<S, B, ResBody> Service<http::Request<B>> for AuthService<S>
where
    S: Service<http::Request<B>, Response = http::Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send + 'static,
    B: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = http::Response<ResBody>;
    type Error = S::Error;
    type Future = AuthServiceFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: http::Request<B>) -> Self::Future {
        // Take the service that was driven to readiness, leave a clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        if self.config.should_bypass(req.uri().path()) {
            return Box::pin(async move { inner.call(req).await });
        }

        let token = self.extract_token(&req);
        let verifier = Arc::clone(&self.verifier);

        Box::pin(async move {
            let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
                debug!("No authentication token provided");
                return Ok(rejection(&AuthError::MissingToken));
            };

            match verifier.verify(&token).await {
                Ok(claims) => {
                    req.extensions_mut().insert::<Claims>(claims);
                    inner.call(req).await
                }
                Err(e) => Ok(rejection(&e)),
            }
        })
    }
}
