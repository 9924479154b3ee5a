//! End-to-end token verification tests
//!
//! Tokens are minted with fixed RSA test keys and verified against a mock
//! identity provider publishing the matching JWKS.

mod common;

use common::*;
use serde_json::json;

use caritas_auth::{AuthError, AuthGuard, Claims};

/// Scenario: domain `example.auth`, audience `my-api`, key `abc`
#[tokio::test]
async fn test_scenario_valid_then_wrong_audience() {
    let idp = MockIdentityProvider::start().await;
    idp.mock_jwks(default_jwks()).await;
    let verifier = idp.verifier();

    let good = sign(&test_claims("auth0|alice", "my-api", 3600));
    let claims = verifier.verify(&good).await.expect("valid token");
    assert_eq!(claims.sub, "auth0|alice");

    let wrong_aud = sign(&test_claims("auth0|alice", "other-api", 3600));
    assert_eq!(
        verifier.verify(&wrong_aud).await.unwrap_err(),
        AuthError::InvalidToken
    );
}

/// Round trip: verified claims equal the signed payload
#[tokio::test]
async fn test_claims_equal_original_payload() {
    let idp = MockIdentityProvider::start().await;
    idp.mock_jwks(default_jwks()).await;

    let mut payload = test_claims("auth0|alice", AUDIENCE, 3600);
    payload["permissions"] = json!(["use:chat", "use:translate"]);
    payload["scope"] = json!("openid profile");
    payload["https://caritas.example/roles"] = json!(["clinician"]);

    let claims: Claims = idp.verifier().verify(&sign(&payload)).await.unwrap();

    assert_eq!(serde_json::to_value(&claims).unwrap(), payload);
    assert!(claims.has_permission("use:translate"));
}

/// Audience given as an array containing ours is accepted
#[tokio::test]
async fn test_array_audience() {
    let idp = MockIdentityProvider::start().await;
    idp.mock_jwks(default_jwks()).await;

    let mut payload = test_claims("auth0|alice", AUDIENCE, 3600);
    payload["aud"] = json!(["my-api", "https://example.auth/userinfo"]);

    let claims = idp.verifier().verify(&sign(&payload)).await.unwrap();
    assert!(claims.aud.contains("my-api"));
}

/// A single altered signature byte is rejected
#[tokio::test]
async fn test_tampered_signature_rejected() {
    let idp = MockIdentityProvider::start().await;
    idp.mock_jwks(default_jwks()).await;
    let verifier = idp.verifier();

    let token = sign(&test_claims("auth0|alice", AUDIENCE, 3600));
    assert!(verifier.verify(&token).await.is_ok());

    let tampered = tamper_signature(&token);
    assert_ne!(token, tampered);
    assert_eq!(
        verifier.verify(&tampered).await.unwrap_err(),
        AuthError::InvalidToken
    );
}

/// Signed by a different key that claims to be "abc"
#[tokio::test]
async fn test_wrong_key_for_kid_rejected() {
    let idp = MockIdentityProvider::start().await;
    idp.mock_jwks(default_jwks()).await;

    let forged = sign_with(
        OTHER_KEY_PEM,
        "abc",
        &test_claims("auth0|mallory", AUDIENCE, 3600),
    );
    assert_eq!(
        idp.verifier().verify(&forged).await.unwrap_err(),
        AuthError::InvalidToken
    );
}

/// Correctly signed but expired
#[tokio::test]
async fn test_expired_token_rejected() {
    let idp = MockIdentityProvider::start().await;
    idp.mock_jwks(default_jwks()).await;

    let expired = sign(&test_claims("auth0|alice", AUDIENCE, -3600));
    assert_eq!(
        idp.verifier().verify(&expired).await.unwrap_err(),
        AuthError::InvalidToken
    );
}

/// Issuer must be exactly `https://{domain}/`
#[tokio::test]
async fn test_issuer_without_trailing_slash_rejected() {
    let idp = MockIdentityProvider::start().await;
    idp.mock_jwks(default_jwks()).await;

    let mut payload = test_claims("auth0|alice", AUDIENCE, 3600);
    payload["iss"] = json!("https://example.auth");

    assert_eq!(
        idp.verifier().verify(&sign(&payload)).await.unwrap_err(),
        AuthError::InvalidToken
    );
}

/// `"Bearer <token>"` and `"<token>"` verify identically
#[tokio::test]
async fn test_bearer_prefix_normalization() {
    let idp = MockIdentityProvider::start().await;
    idp.mock_jwks(default_jwks()).await;
    let verifier = idp.verifier();

    let token = sign(&test_claims("auth0|alice", AUDIENCE, 3600));
    let bare = verifier.verify(&token).await.unwrap();
    let prefixed = verifier.verify(&format!("Bearer {token}")).await.unwrap();
    assert_eq!(bare, prefixed);

    // Only the exact, case-sensitive prefix is stripped
    assert_eq!(
        verifier
            .verify(&format!("bearer {token}"))
            .await
            .unwrap_err(),
        AuthError::InvalidToken
    );
}

/// Empty token fails without touching the provider
#[tokio::test]
async fn test_empty_token_no_fetch() {
    let idp = MockIdentityProvider::start().await;
    idp.mock_jwks(default_jwks()).await;

    assert_eq!(
        idp.verifier().verify("").await.unwrap_err(),
        AuthError::InvalidToken
    );
    assert_eq!(idp.jwks_requests().await, 0);
}

/// Stale keys keep verification working through an outage
#[tokio::test]
async fn test_verification_survives_provider_outage() {
    use std::time::Duration;

    let idp = MockIdentityProvider::start().await;
    idp.mock_jwks_times(default_jwks(), 1).await;
    idp.mock_jwks_error(503).await;

    let clock = ManualClock::new();
    let verifier = idp.verifier_with_client(idp.jwks_client().with_clock(clock.clone()));
    let token = sign(&test_claims("auth0|alice", AUDIENCE, 3600));

    verifier.verify(&token).await.unwrap();
    clock.advance(Duration::from_secs(30 * 60 * 60));

    let claims = verifier.verify(&token).await.expect("stale keys still verify");
    assert_eq!(claims.sub, "auth0|alice");
}

/// Cold cache plus unreachable provider is "unavailable", not "invalid"
#[tokio::test]
async fn test_unavailable_is_distinct_from_invalid() {
    let idp = MockIdentityProvider::start().await;
    idp.mock_jwks_error(502).await;
    let verifier = idp.verifier();

    let token = sign(&test_claims("auth0|alice", AUDIENCE, 3600));
    let err = verifier.verify(&token).await.unwrap_err();

    assert!(matches!(err, AuthError::KeySetUnavailable(_)));
    assert!(verifier.verify_optional(&token).await.is_none());
}

/// The guard distinguishes "no credential" from "bad credential"
#[tokio::test]
async fn test_guard_flow() {
    let idp = MockIdentityProvider::start().await;
    idp.mock_jwks(default_jwks()).await;
    let guard = AuthGuard::new(std::sync::Arc::new(idp.verifier()));

    assert_eq!(
        guard.authenticate(None).await.unwrap_err(),
        AuthError::MissingToken
    );

    let token = sign(&test_claims("auth0|alice", AUDIENCE, 3600));
    let claims = guard
        .authenticate(Some(&format!("Bearer {token}")))
        .await
        .unwrap();
    assert_eq!(claims.sub, "auth0|alice");
}

/// Guard and verifier see the credential byte for byte
#[tokio::test]
async fn test_guard_does_not_normalize_whitespace() {
    let idp = MockIdentityProvider::start().await;
    idp.mock_jwks(default_jwks()).await;
    let verifier = std::sync::Arc::new(idp.verifier());
    let guard = AuthGuard::new(std::sync::Arc::clone(&verifier));

    let token = sign(&test_claims("auth0|alice", AUDIENCE, 3600));
    let padded = format!(" Bearer {token}");

    assert_eq!(
        guard.authenticate(Some(&padded)).await.unwrap_err(),
        AuthError::InvalidToken
    );
    assert_eq!(
        verifier.verify(&padded).await.unwrap_err(),
        AuthError::InvalidToken
    );

    // Blank means "no credential" to the guard only
    assert_eq!(
        guard.authenticate(Some("  ")).await.unwrap_err(),
        AuthError::MissingToken
    );
}
