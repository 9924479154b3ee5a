//! Common test utilities for integration tests
//!
//! A mock identity provider serving a JWKS document, fixed RSA test keys and
//! helpers for minting tokens against them.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use caritas_auth::jwt::Clock;
use caritas_auth::{JwksClient, TokenVerifier, VerifierConfig};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const DOMAIN: &str = "example.auth";
pub const AUDIENCE: &str = "my-api";
pub const ISSUER: &str = "https://example.auth/";
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Key published under kid "abc"
pub const SIGNING_KEY_PEM: &str = include_str!("../fixtures/signing_key.pem");
pub const SIGNING_KEY_MODULUS: &str = "tM_IO4gMdLiuxkKOefzxiaLzSyZE0AWZVPJ2CD6Kg8_EOTpAsEsElm9Uj2Iha83NNsnq957BTtVhMayox1rKs1UjbHAmK3BMPtmzbxr8uk0ZmQLvFdXXQMA02A5od2R6pG5RZgVymBJPAPz0CrEgPZGCMHC3dugt_XzL4OQsiBZ9xn0cxl8w-bFE783nKAdyqk5YyPP3gfeRSU_mqdnermNNwV2K4cuhd0S-I7igFyU3nWoL3WWyGddXbdFb7aLJsne5017MXGkqr-iehGMQlJU07-0h2V62HD0c2A7OE7ZDghPQWCl5sn0hphTAhrSfFlSJcMyaunbIjtVdSAZglQ";

/// A second key, published under kid "rotated" in some tests
pub const OTHER_KEY_PEM: &str = include_str!("../fixtures/other_key.pem");
pub const OTHER_KEY_MODULUS: &str = "rSmw5lITTu3nQZ4pekD_9Pq-eu3Srvev_3iRY7JT0Z5M1UL_J0uGUNm22KEiB01GzzGXLF0eSSTRV25z6J12aowBS56yUUqNcOPR5jVJcI1ZOV1UKuOoTaav2XoYzuSQpTnkLs-ysoyDynwYx28ziVJFQOvMzU-ypcmfKrZWm6Mxu6BlwyeWTp1iGmYpbdJp-uBjRwsJ7vXL85IrSCbj_MA-QPD_g0UrAs6qbFfCuhQVuHe-6sgzf5f0RDfzHjOvdN-WHVua2DfSDw9idyOpWozkfmT_HaoUMwuWLCfL1VqZtNDW_0-u3TkQrfoT-Z6nQssuz0LhylZwLBOi7nRx-w";

/// RSA public JWK in the shape Auth0 publishes
pub fn rsa_jwk(kid: &str, modulus: &str) -> Value {
    json!({
        "kty": "RSA",
        "kid": kid,
        "use": "sig",
        "alg": "RS256",
        "n": modulus,
        "e": "AQAB"
    })
}

/// The default published key set: just "abc"
pub fn default_jwks() -> Value {
    json!({ "keys": [rsa_jwk("abc", SIGNING_KEY_MODULUS)] })
}

/// Mock identity provider
pub struct MockIdentityProvider {
    pub server: MockServer,
    pub jwks_uri: String,
}

impl MockIdentityProvider {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let jwks_uri = format!("{}{}", server.uri(), JWKS_PATH);
        Self { server, jwks_uri }
    }

    /// Serve `jwks` on every request
    pub async fn mock_jwks(&self, jwks: Value) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
            .mount(&self.server)
            .await;
    }

    /// Serve `jwks` for the next `times` requests only
    pub async fn mock_jwks_times(&self, jwks: Value, times: u64) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
            .up_to_n_times(times)
            .mount(&self.server)
            .await;
    }

    /// Answer every request with `status`
    pub async fn mock_jwks_error(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Answer every request only after `delay`
    pub async fn mock_jwks_slow(&self, jwks: Value, delay: Duration) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jwks)
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Number of JWKS requests received so far
    pub async fn jwks_requests(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|reqs| reqs.iter().filter(|r| r.url.path() == JWKS_PATH).count())
            .unwrap_or(0)
    }

    /// Key set cache pointed at this provider
    pub fn jwks_client(&self) -> JwksClient {
        JwksClient::new(self.jwks_uri.clone())
    }

    /// Verifier for `example.auth` / `my-api` whose cache talks to this provider
    pub fn verifier(&self) -> TokenVerifier {
        self.verifier_with_client(self.jwks_client())
    }

    pub fn verifier_with_client(&self, client: JwksClient) -> TokenVerifier {
        let config = VerifierConfig::new(DOMAIN, AUDIENCE).expect("valid test config");
        TokenVerifier::with_jwks_client(config, Arc::new(client))
    }
}

/// Manually advanced clock for TTL tests
#[derive(Debug)]
pub struct ManualClock(Mutex<SystemTime>);

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(SystemTime::now())))
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.0.lock().unwrap()
    }
}

/// Get current Unix timestamp
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}

/// Standard claims for the test tenant
pub fn test_claims(sub: &str, aud: &str, exp_offset_secs: i64) -> Value {
    let now = current_timestamp();
    json!({
        "sub": sub,
        "iss": ISSUER,
        "aud": aud,
        "iat": now,
        "exp": (now as i64 + exp_offset_secs) as u64,
    })
}

/// Sign `claims` with an RSA PEM key under `kid`
pub fn sign_with(pem: &str, kid: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.typ = Some("JWT".to_string());
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("Invalid RSA key");
    encode(&header, claims, &key).expect("Failed to encode test JWT")
}

/// Sign `claims` with the "abc" key
pub fn sign(claims: &Value) -> String {
    sign_with(SIGNING_KEY_PEM, "abc", claims)
}

/// Flip one bit in one byte of the token's signature
pub fn tamper_signature(token: &str) -> String {
    let (signing_input, signature) = token.rsplit_once('.').expect("three-part JWT");
    let mut bytes = URL_SAFE_NO_PAD
        .decode(signature)
        .expect("base64url signature");
    bytes[10] ^= 0x01;
    format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(bytes))
}
