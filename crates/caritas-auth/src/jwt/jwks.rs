//! JWKS (JSON Web Key Set) fetching and caching
//!
//! The identity provider rotates its signing keys rarely, so the key set is
//! cached for a long time (24 hours by default) and served stale when a
//! refresh fails:
//!
//! - **TTL-based caching**: a fresh entry is returned without any network call
//! - **Single-flight refresh**: concurrent callers that find the entry expired
//!   share one fetch instead of each issuing their own
//! - **Stale-on-error**: a failed refresh returns the previous key set, however
//!   old. Only a cold cache with a failed fetch is an error
//! - **Cancellation-safe**: the fetch runs in its own task, so a caller that is
//!   dropped mid-refresh still leaves a populated cache behind
//!
//! The key set in a cache entry is never mutated; a successful refresh swaps
//! in a whole new entry.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::{DEFAULT_FETCH_TIMEOUT, DEFAULT_JWKS_TTL};
use crate::error::{AuthError, AuthResult, FetchError};

/// Source of "now" for cache age calculations
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current wall-clock time
    fn now(&self) -> SystemTime;
}

/// [`Clock`] backed by [`SystemTime::now`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Network seam for retrieving a key set
#[async_trait]
pub trait JwksFetcher: Send + Sync + fmt::Debug {
    /// Fetch the key set at `jwks_uri`, giving up after `timeout`
    async fn fetch(&self, jwks_uri: &str, timeout: Duration) -> Result<JwkSet, FetchError>;
}

/// [`JwksFetcher`] using `reqwest`
#[derive(Debug, Clone, Default)]
pub struct HttpJwksFetcher {
    http_client: reqwest::Client,
}

impl HttpJwksFetcher {
    /// Create a fetcher with a default HTTP client
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fetcher sharing an existing HTTP client
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl JwksFetcher for HttpJwksFetcher {
    async fn fetch(&self, jwks_uri: &str, timeout: Duration) -> Result<JwkSet, FetchError> {
        if !is_secure_uri(jwks_uri) {
            return Err(FetchError::InsecureUri(jwks_uri.to_string()));
        }

        let response = self
            .http_client
            .get(jwks_uri)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        response.json::<JwkSet>().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(timeout)
            } else {
                FetchError::Decode(e.to_string())
            }
        })
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::Transport(err.to_string())
    }
}

/// `https`, or plain `http` to the loopback host only
fn is_secure_uri(uri: &str) -> bool {
    let Ok(url) = reqwest::Url::parse(uri) else {
        return false;
    };
    match url.scheme() {
        "https" => true,
        "http" => matches!(url.host_str(), Some("localhost" | "127.0.0.1")),
        _ => false,
    }
}

/// JWKS cache entry
#[derive(Debug, Clone)]
struct CachedJwks {
    /// The JWK set, shared with every reader
    jwks: Arc<JwkSet>,
    /// When this was fetched
    cached_at: SystemTime,
}

impl CachedJwks {
    fn is_fresh(&self, now: SystemTime, ttl: Duration) -> bool {
        match now.duration_since(self.cached_at) {
            Ok(age) => age < ttl,
            Err(_) => false, // Clock went backwards, invalidate
        }
    }
}

/// What a concurrent caller's fetch left behind
#[derive(Debug)]
enum SharedOutcome {
    /// A new key set was stored
    Refreshed(Arc<JwkSet>),
    /// The fetch failed; the previous key set is still cached
    Stale(Arc<JwkSet>),
    /// The fetch failed and nothing is cached
    Unavailable,
}

/// Key Set Cache for one identity provider
///
/// Cheap to clone; clones share the same cache.
///
/// # Example
///
/// ```rust,no_run
/// # use caritas_auth::jwt::JwksClient;
/// # tokio_test::block_on(async {
/// let client = JwksClient::for_domain("example.auth");
///
/// // Fetched once, then served from cache for 24 hours
/// let jwks = client.get_key_set().await?;
///
/// if let Some(key) = jwks.find("key-id-123") {
///     // Use key for validation
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Clone)]
pub struct JwksClient {
    /// JWKS endpoint URL
    jwks_uri: String,
    /// Current entry, replaced as a whole on refresh
    cache: Arc<RwLock<Option<CachedJwks>>>,
    /// Held for the duration of a refresh
    refresh_gate: Arc<Mutex<()>>,
    /// Number of completed fetch attempts
    attempts: Arc<AtomicU64>,
    fetcher: Arc<dyn JwksFetcher>,
    clock: Arc<dyn Clock>,
    /// Cache TTL (default: 24 hours)
    cache_ttl: Duration,
    /// Per-fetch timeout (default: 10 seconds)
    fetch_timeout: Duration,
}

impl fmt::Debug for JwksClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwksClient")
            .field("jwks_uri", &self.jwks_uri)
            .field("fetcher", &self.fetcher)
            .field("clock", &self.clock)
            .field("cache_ttl", &self.cache_ttl)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}

impl JwksClient {
    /// Create a client for an explicit JWKS endpoint with default settings
    ///
    /// - Cache TTL: 24 hours
    /// - Fetch timeout: 10 seconds
    pub fn new(jwks_uri: impl Into<String>) -> Self {
        Self {
            jwks_uri: jwks_uri.into(),
            cache: Arc::new(RwLock::new(None)),
            refresh_gate: Arc::new(Mutex::new(())),
            attempts: Arc::new(AtomicU64::new(0)),
            fetcher: Arc::new(HttpJwksFetcher::new()),
            clock: Arc::new(SystemClock),
            cache_ttl: DEFAULT_JWKS_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Create a client for `https://{domain}/.well-known/jwks.json`
    pub fn for_domain(domain: &str) -> Self {
        Self::new(format!("https://{domain}/.well-known/jwks.json"))
    }

    /// Set the cache TTL
    #[must_use]
    pub fn with_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Set the per-fetch timeout
    #[must_use]
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Replace the network fetcher
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn JwksFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Replace the clock used for cache age
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get the current key set
    ///
    /// Returns the cached set if it is younger than the TTL. Otherwise fetches
    /// a new one; if that fails, the previous set is returned regardless of
    /// its age.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeySetUnavailable`] only when the fetch failed and
    /// no key set has ever been fetched successfully.
    pub async fn get_key_set(&self) -> AuthResult<Arc<JwkSet>> {
        if let Some(jwks) = self.fresh_entry().await {
            debug!(jwks_uri = %self.jwks_uri, "Using cached JWKS");
            return Ok(jwks);
        }

        // Detached so the fetch completes even if this caller is dropped
        let this = self.clone();
        match tokio::spawn(async move { this.refresh().await }).await {
            Ok(result) => result,
            Err(join_error) => {
                error!(jwks_uri = %self.jwks_uri, error = %join_error, "JWKS refresh task failed");
                match self.any_entry().await {
                    Some(jwks) => Ok(jwks),
                    None => Err(AuthError::KeySetUnavailable(format!(
                        "JWKS refresh task failed: {join_error}"
                    ))),
                }
            }
        }
    }

    /// Refresh path, serialized by `refresh_gate`
    async fn refresh(&self) -> AuthResult<Arc<JwkSet>> {
        let attempts_seen = self.attempts.load(Ordering::Acquire);
        let entry_seen = self.any_entry().await;
        let _gate = self.refresh_gate.lock().await;

        // Someone else refreshed while we waited
        if let Some(jwks) = self.fresh_entry().await {
            debug!(jwks_uri = %self.jwks_uri, "JWKS refreshed by concurrent caller");
            return Ok(jwks);
        }

        // Someone else fetched while we waited; share their outcome
        if self.attempts.load(Ordering::Acquire) != attempts_seen {
            return match self.shared_outcome(entry_seen.as_ref()).await {
                SharedOutcome::Refreshed(jwks) => {
                    debug!(jwks_uri = %self.jwks_uri, "JWKS refreshed by concurrent caller");
                    Ok(jwks)
                }
                SharedOutcome::Stale(jwks) => {
                    warn!(jwks_uri = %self.jwks_uri, "Using stale JWKS cache after failed refresh");
                    Ok(jwks)
                }
                SharedOutcome::Unavailable => Err(AuthError::KeySetUnavailable(
                    "concurrent JWKS fetch failed".to_string(),
                )),
            };
        }

        info!(jwks_uri = %self.jwks_uri, "Fetching JWKS from endpoint");
        let fetched = self.fetcher.fetch(&self.jwks_uri, self.fetch_timeout).await;
        self.attempts.fetch_add(1, Ordering::AcqRel);

        match fetched {
            Ok(jwks) => {
                let jwks = Arc::new(jwks);
                info!(
                    jwks_uri = %self.jwks_uri,
                    key_count = jwks.keys.len(),
                    "JWKS cache updated"
                );
                *self.cache.write().await = Some(CachedJwks {
                    jwks: Arc::clone(&jwks),
                    cached_at: self.clock.now(),
                });
                Ok(jwks)
            }
            Err(e) => {
                error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to fetch JWKS");
                match self.any_entry().await {
                    Some(jwks) => {
                        warn!(
                            jwks_uri = %self.jwks_uri,
                            error = %e,
                            "Using stale JWKS cache due to fetch failure"
                        );
                        Ok(jwks)
                    }
                    None => Err(AuthError::KeySetUnavailable(e.to_string())),
                }
            }
        }
    }

    async fn fresh_entry(&self) -> Option<Arc<JwkSet>> {
        let now = self.clock.now();
        self.cache
            .read()
            .await
            .as_ref()
            .filter(|cached| cached.is_fresh(now, self.cache_ttl))
            .map(|cached| Arc::clone(&cached.jwks))
    }

    /// Classify a concurrent caller's fetch by whether the entry was replaced
    async fn shared_outcome(&self, entry_seen: Option<&Arc<JwkSet>>) -> SharedOutcome {
        match (self.any_entry().await, entry_seen) {
            (None, _) => SharedOutcome::Unavailable,
            (Some(current), Some(seen)) if Arc::ptr_eq(&current, seen) => {
                SharedOutcome::Stale(current)
            }
            (Some(current), _) => SharedOutcome::Refreshed(current),
        }
    }

    async fn any_entry(&self) -> Option<Arc<JwkSet>> {
        self.cache
            .read()
            .await
            .as_ref()
            .map(|cached| Arc::clone(&cached.jwks))
    }

    /// Get the JWKS endpoint URI
    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    /// Get the cache TTL
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// When the cached key set was fetched, if there is one
    pub async fn cached_at(&self) -> Option<SystemTime> {
        self.cache.read().await.as_ref().map(|cached| cached.cached_at)
    }

    /// Clear the cache (for testing or manual refresh)
    pub async fn clear_cache(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
        debug!(jwks_uri = %self.jwks_uri, "JWKS cache cleared");
    }
}
