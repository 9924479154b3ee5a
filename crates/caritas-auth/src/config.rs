//! Verification configuration
//!
//! Loaded once at process start and never mutated afterwards. Missing
//! required settings are a startup failure, not a per-request error.

use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Default JWKS cache TTL (24 hours)
pub const DEFAULT_JWKS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default timeout for a single JWKS fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity-provider domain (e.g. `tenant.us.auth0.com`)
pub const ENV_DOMAIN: &str = "AUTH0_DOMAIN";
/// Expected `aud` claim
pub const ENV_AUDIENCE: &str = "AUTH0_API_IDENTIFIER";
/// Comma-separated algorithm allowlist
pub const ENV_ALGORITHMS: &str = "AUTH0_ALGORITHMS";
/// JWKS cache TTL in seconds
pub const ENV_JWKS_TTL_SECS: &str = "AUTH0_JWKS_TTL_SECS";
/// JWKS fetch timeout in seconds
pub const ENV_JWKS_TIMEOUT_SECS: &str = "AUTH0_JWKS_TIMEOUT_SECS";
/// Clock-skew leeway in seconds
pub const ENV_LEEWAY_SECS: &str = "AUTH0_LEEWAY_SECS";

/// Configuration for [`TokenVerifier`](crate::TokenVerifier)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Identity-provider domain, without scheme
    pub domain: String,
    /// Expected audience identifier
    pub audience: String,
    /// Accepted signature algorithms
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<Algorithm>,
    /// Clock-skew leeway applied to `exp`/`nbf`
    #[serde(default, with = "duration_secs")]
    pub leeway: Duration,
    /// How long a fetched key set is considered fresh
    #[serde(default = "default_jwks_ttl", with = "duration_secs")]
    pub jwks_ttl: Duration,
    /// Upper bound for one JWKS fetch
    #[serde(default = "default_fetch_timeout", with = "duration_secs")]
    pub fetch_timeout: Duration,
}

fn default_algorithms() -> Vec<Algorithm> {
    vec![Algorithm::RS256]
}

fn default_jwks_ttl() -> Duration {
    DEFAULT_JWKS_TTL
}

fn default_fetch_timeout() -> Duration {
    DEFAULT_FETCH_TIMEOUT
}

impl VerifierConfig {
    /// Create a config with default algorithms (RS256), leeway and cache timings
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if `domain` or `audience` is empty.
    pub fn new(domain: impl Into<String>, audience: impl Into<String>) -> AuthResult<Self> {
        let config = Self {
            domain: normalize_domain(&domain.into()),
            audience: audience.into().trim().to_string(),
            algorithms: default_algorithms(),
            leeway: Duration::ZERO,
            jwks_ttl: DEFAULT_JWKS_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Required environment variables:
    /// - `AUTH0_DOMAIN`: identity-provider domain
    /// - `AUTH0_API_IDENTIFIER`: expected audience
    ///
    /// Optional environment variables:
    /// - `AUTH0_ALGORITHMS`: comma-separated allowlist (default: `RS256`)
    /// - `AUTH0_JWKS_TTL_SECS`: key set cache TTL (default: 86400)
    /// - `AUTH0_JWKS_TIMEOUT_SECS`: fetch timeout (default: 10)
    /// - `AUTH0_LEEWAY_SECS`: clock-skew leeway (default: 0)
    ///
    /// # Example
    /// ```rust,no_run
    /// use caritas_auth::VerifierConfig;
    ///
    /// let config = VerifierConfig::from_env().expect("identity provider not configured");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if a required variable is unset or
    /// empty, or an optional one cannot be parsed.
    pub fn from_env() -> AuthResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Same as [`VerifierConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> AuthResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let domain = lookup(ENV_DOMAIN)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                AuthError::configuration(format!("{ENV_DOMAIN} environment variable is required"))
            })?;
        let audience = lookup(ENV_AUDIENCE)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                AuthError::configuration(format!(
                    "{ENV_AUDIENCE} environment variable is required"
                ))
            })?;

        let mut config = Self::new(domain, audience)?;

        if let Some(raw) = lookup(ENV_ALGORITHMS) {
            config.algorithms = parse_algorithms(&raw)?;
        }
        if let Some(ttl) = parse_secs(&lookup, ENV_JWKS_TTL_SECS)? {
            config.jwks_ttl = ttl;
        }
        if let Some(timeout) = parse_secs(&lookup, ENV_JWKS_TIMEOUT_SECS)? {
            config.fetch_timeout = timeout;
        }
        if let Some(leeway) = parse_secs(&lookup, ENV_LEEWAY_SECS)? {
            config.leeway = leeway;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the algorithm allowlist
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] for an empty list or a symmetric
    /// (HS*) algorithm.
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> AuthResult<Self> {
        self.algorithms = algorithms;
        self.validate()?;
        Ok(self)
    }

    /// Set clock-skew leeway
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Set the key set cache TTL
    #[must_use]
    pub fn with_jwks_ttl(mut self, ttl: Duration) -> Self {
        self.jwks_ttl = ttl;
        self
    }

    /// Set the JWKS fetch timeout
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Expected `iss` claim, always `https://{domain}/`
    pub fn issuer(&self) -> String {
        format!("https://{}/", self.domain)
    }

    /// The provider's well-known key-set endpoint
    pub fn jwks_uri(&self) -> String {
        format!("https://{}/.well-known/jwks.json", self.domain)
    }

    /// Check invariants the rest of the crate relies on
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] for an empty domain or audience,
    /// an empty algorithm list, or a symmetric (HS*) algorithm.
    pub fn validate(&self) -> AuthResult<()> {
        if self.domain.is_empty() {
            return Err(AuthError::configuration("identity provider domain is empty"));
        }
        if self.audience.is_empty() {
            return Err(AuthError::configuration("expected audience is empty"));
        }
        if self.algorithms.is_empty() {
            return Err(AuthError::configuration(
                "at least one signature algorithm must be allowed",
            ));
        }
        if let Some(alg) = self.algorithms.iter().find(|alg| !is_asymmetric(**alg)) {
            return Err(AuthError::configuration(format!(
                "algorithm {alg:?} not allowed; only asymmetric algorithms (RS*, PS*, ES*, EdDSA) can be verified against a JWKS"
            )));
        }
        Ok(())
    }
}

/// Strip scheme and trailing slashes so `https://x/` and `x` configure the same issuer
fn normalize_domain(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    without_scheme.trim_end_matches('/').to_string()
}

fn is_asymmetric(alg: Algorithm) -> bool {
    !matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

fn parse_algorithms(raw: &str) -> AuthResult<Vec<Algorithm>> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            Algorithm::from_str(name).map_err(|_| {
                AuthError::configuration(format!("unknown signature algorithm '{name}'"))
            })
        })
        .collect()
}

fn parse_secs<F>(lookup: &F, key: &str) -> AuthResult<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| {
                AuthError::configuration(format!("{key} must be a whole number of seconds"))
            }),
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
