//! Key set cache for an identity provider's published signing keys.
//!
//! Fetches `https://{issuer}/.well-known/jwks.json` and caches the result per
//! issuer domain with a configurable TTL.
//!
//! # Refresh policy
//!
//! - Fresh entries are served from a shared read lock
//! - Concurrent misses for one issuer share a single fetch and its outcome,
//!   success or failure
//! - Waiting on a fetch is bounded by the fetch timeout
//! - Failed fetches are never cached; the next request retries
//! - An expired entry is still served when its refetch fails
//! - An unknown `kid` triggers one refetch, at most once per
//!   `min_refresh_interval` counted from the last attempt, to pick up key
//!   rotation

use crate::errors::AuthError;
use crate::observability::metrics::{record_jwks_cache_lookup, record_jwks_fetch};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{instrument, Instrument};

/// Default cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default minimum age of an entry before an unknown `kid` forces a refetch.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Upper bound on connection setup, independent of the overall fetch timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Well-known path of the key set document.
const JWKS_PATH: &str = "/.well-known/jwks.json";

/// A public key published in the issuer's key set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SigningKey {
    /// Key type ("RSA" for keys this gate can use).
    pub kty: String,

    /// Key ID, matched against the token header's `kid`.
    pub kid: String,

    /// Intended use ("sig" for signing keys). Absent means unrestricted.
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Algorithm hint published with the key.
    #[serde(default)]
    pub alg: Option<String>,
}

impl SigningKey {
    /// Whether the key may be used to verify signatures.
    pub fn is_signing_key(&self) -> bool {
        self.key_use.as_deref().map_or(true, |u| u == "sig")
    }
}

/// Key set document as served by the provider.
///
/// Entries are parsed one by one so a single malformed key does not discard
/// the rest of the set.
#[derive(Deserialize)]
struct JwksDocument {
    keys: Vec<serde_json::Value>,
}

/// Keys published by one issuer, as of one fetch. Replaced wholesale on refresh.
#[derive(Debug)]
pub struct KeySet {
    issuer: String,
    keys: Vec<SigningKey>,
    fetched_at: Instant,
}

impl KeySet {
    pub fn new(issuer: impl Into<String>, keys: Vec<SigningKey>) -> Self {
        Self {
            issuer: issuer.into(),
            keys,
            fetched_at: Instant::now(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn keys(&self) -> &[SigningKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// First signing key whose `kid` matches, in document order.
    pub fn find(&self, kid: &str) -> Option<&SigningKey> {
        self.keys
            .iter()
            .find(|key| key.kid == kid && key.is_signing_key())
    }

    /// Time since this set was fetched.
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

#[derive(Debug, Error)]
pub enum KeySetCacheError {
    #[error("Failed to build JWKS HTTP client: {0}")]
    HttpClient(String),
}

/// Outcome of one key set fetch, shared by every request waiting on it.
type SharedFetch = Shared<BoxFuture<'static, Result<Arc<KeySet>, AuthError>>>;

/// Fetch bookkeeping for one issuer.
#[derive(Default)]
struct IssuerFetch {
    /// Most recent fetch. Still running while `peek()` is `None`.
    latest: Option<SharedFetch>,

    /// When the most recent fetch started, whatever its outcome.
    started_at: Option<Instant>,
}

impl IssuerFetch {
    /// The fetch still in progress, if any. A fetch older than `timeout` has
    /// finished even if no waiter observed it.
    fn running(&self, timeout: Duration) -> Option<SharedFetch> {
        let recent = self
            .started_at
            .is_some_and(|started| started.elapsed() < timeout);

        self.latest
            .as_ref()
            .filter(|fetch| recent && fetch.peek().is_none())
            .cloned()
    }
}

/// Per-issuer cache of key sets. Shared across requests through `Arc`.
pub struct KeySetCache {
    /// HTTP client with the fetch timeout applied.
    http_client: reqwest::Client,

    /// URL scheme for the key set endpoint (`https` in production).
    scheme: String,

    /// How long an entry is served without refetching.
    cache_ttl: Duration,

    /// Minimum gap between unknown-kid refetches for one issuer.
    min_refresh_interval: Duration,

    /// Longest a request waits on a fetch, its own or a shared one.
    fetch_timeout: Duration,

    /// Issuer domain to its most recent key set.
    entries: Arc<RwLock<HashMap<String, Arc<KeySet>>>>,

    /// Issuer domain to its in-flight fetch.
    fetches: Mutex<HashMap<String, IssuerFetch>>,
}

impl KeySetCache {
    /// Create a cache whose fetches are bounded by `fetch_timeout`.
    ///
    /// # Errors
    ///
    /// Returns `KeySetCacheError::HttpClient` if the HTTP client cannot be built.
    pub fn new(fetch_timeout: Duration) -> Result<Self, KeySetCacheError> {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(fetch_timeout))
            .build()
            .map_err(|e| KeySetCacheError::HttpClient(e.to_string()))?;

        Ok(Self {
            http_client,
            scheme: "https".to_string(),
            cache_ttl: DEFAULT_CACHE_TTL,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            fetch_timeout,
            entries: Arc::new(RwLock::new(HashMap::new())),
            fetches: Mutex::new(HashMap::new()),
        })
    }

    /// Set the cache TTL.
    pub fn with_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Set the minimum gap between unknown-kid refetches.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Override the URL scheme (local development and tests only).
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    /// Key set endpoint for `issuer`.
    pub fn jwks_url(&self, issuer: &str) -> String {
        format!("{}://{}{}", self.scheme, issuer, JWKS_PATH)
    }

    /// Current cache entry for `issuer`, fresh or not.
    pub async fn cached(&self, issuer: &str) -> Option<Arc<KeySet>> {
        self.entries.read().await.get(issuer).cloned()
    }

    /// Get the key set for `issuer`, fetching it when absent or expired.
    ///
    /// Concurrent callers share one fetch and all receive its outcome. No
    /// caller waits longer than the fetch timeout.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeySetUnavailable` when the fetch fails and no
    /// previous key set exists for the issuer.
    #[instrument(skip(self), fields(issuer = %issuer))]
    pub async fn get(&self, issuer: &str) -> Result<Arc<KeySet>, AuthError> {
        let previous = self.cached(issuer).await;
        if let Some(key_set) = &previous {
            if key_set.is_fresh(self.cache_ttl) {
                tracing::debug!(target: "gate.auth.jwks", "Key set cache hit");
                record_jwks_cache_lookup("hit");
                return Ok(Arc::clone(key_set));
            }
        }

        let fetch = {
            let mut fetches = self.fetches.lock().await;
            let slot = fetches.entry(issuer.to_string()).or_default();

            match slot.running(self.fetch_timeout) {
                Some(fetch) => {
                    tracing::debug!(target: "gate.auth.jwks", "Joining in-flight key set fetch");
                    fetch
                }
                None => {
                    // A fetch may have finished since the first lookup
                    if let Some(key_set) = self.cached(issuer).await {
                        if key_set.is_fresh(self.cache_ttl) {
                            tracing::debug!(target: "gate.auth.jwks", "Key set fetched by concurrent request");
                            record_jwks_cache_lookup("hit");
                            return Ok(key_set);
                        }
                    }
                    self.start_fetch(issuer, slot)
                }
            }
        };

        record_jwks_cache_lookup("miss");

        match self.wait_for(fetch).await {
            Ok(key_set) => Ok(key_set),
            Err(error) => match previous {
                Some(stale) => {
                    tracing::warn!(
                        target: "gate.auth.jwks",
                        age_secs = stale.age().as_secs(),
                        "Key set refresh failed, serving stale keys"
                    );
                    record_jwks_cache_lookup("stale");
                    Ok(stale)
                }
                None => Err(error),
            },
        }
    }

    /// Refetch after a token named a `kid` missing from `current`.
    ///
    /// At most one refetch starts per `min_refresh_interval` for an issuer,
    /// counted from the previous fetch attempt whether or not it succeeded.
    /// Returns the newer key set, or `None` when rate limited or the refetch
    /// fails.
    #[instrument(skip(self, current), fields(issuer = %issuer))]
    pub async fn refresh_for_unknown_kid(
        &self,
        issuer: &str,
        current: &Arc<KeySet>,
    ) -> Option<Arc<KeySet>> {
        if current.age() < self.min_refresh_interval {
            tracing::debug!(
                target: "gate.auth.jwks",
                age_secs = current.age().as_secs(),
                "Key set too recent for unknown-kid refresh"
            );
            return None;
        }

        let fetch = {
            let mut fetches = self.fetches.lock().await;
            let slot = fetches.entry(issuer.to_string()).or_default();

            match slot.running(self.fetch_timeout) {
                Some(fetch) => fetch,
                None => {
                    if let Some(latest) = self.cached(issuer).await {
                        if !Arc::ptr_eq(&latest, current) {
                            tracing::debug!(target: "gate.auth.jwks", "Key set already refreshed by concurrent request");
                            return Some(latest);
                        }
                    }

                    if slot
                        .started_at
                        .is_some_and(|started| started.elapsed() < self.min_refresh_interval)
                    {
                        tracing::debug!(target: "gate.auth.jwks", "Key set fetch attempted too recently for unknown-kid refresh");
                        return None;
                    }

                    self.start_fetch(issuer, slot)
                }
            }
        };

        match self.wait_for(fetch).await {
            Ok(key_set) => {
                tracing::info!(
                    target: "gate.auth.jwks",
                    key_count = key_set.len(),
                    "Key set refreshed after unknown kid"
                );
                Some(key_set)
            }
            Err(_) => None,
        }
    }

    /// Start a fetch for `issuer` and record it in `slot`.
    ///
    /// The fetch runs as its own task, so it completes and populates the
    /// cache even if every waiting request is dropped.
    fn start_fetch(&self, issuer: &str, slot: &mut IssuerFetch) -> SharedFetch {
        let http_client = self.http_client.clone();
        let url = self.jwks_url(issuer);
        let issuer = issuer.to_string();
        let entries = Arc::clone(&self.entries);

        let task = tokio::spawn(
            async move {
                let key_set = Arc::new(fetch_key_set(&http_client, &url, &issuer).await?);
                entries
                    .write()
                    .await
                    .insert(issuer, Arc::clone(&key_set));
                Ok::<_, AuthError>(key_set)
            }
            .in_current_span(),
        );

        let fetch = task
            .map(|joined| match joined {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(target: "gate.auth.jwks", error = %e, "Key set fetch task failed");
                    Err(AuthError::KeySetUnavailable)
                }
            })
            .boxed()
            .shared();

        slot.latest = Some(fetch.clone());
        slot.started_at = Some(Instant::now());
        fetch
    }

    async fn wait_for(&self, fetch: SharedFetch) -> Result<Arc<KeySet>, AuthError> {
        tokio::time::timeout(self.fetch_timeout, fetch)
            .await
            .unwrap_or_else(|_| {
                tracing::warn!(target: "gate.auth.jwks", "Timed out waiting for key set fetch");
                Err(AuthError::KeySetUnavailable)
            })
    }
}

/// Fetch the key set document once. No retries.
async fn fetch_key_set(
    http_client: &reqwest::Client,
    url: &str,
    issuer: &str,
) -> Result<KeySet, AuthError> {
    let start = Instant::now();

    tracing::debug!(target: "gate.auth.jwks", url = %url, "Fetching key set");

    let result = fetch_document(http_client, url).await;
    let status = if result.is_ok() { "success" } else { "error" };
    record_jwks_fetch(status, start.elapsed());

    let document = result?;

    let keys: Vec<SigningKey> = document
        .keys
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<SigningKey>(value) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::debug!(target: "gate.auth.jwks", error = %e, "Skipping malformed key entry");
                None
            }
        })
        .collect();

    tracing::info!(
        target: "gate.auth.jwks",
        key_count = keys.len(),
        "Key set fetched"
    );

    Ok(KeySet::new(issuer, keys))
}

async fn fetch_document(http_client: &reqwest::Client, url: &str) -> Result<JwksDocument, AuthError> {
    let response = http_client.get(url).send().await.map_err(|e| {
        tracing::error!(
            target: "gate.auth.jwks",
            error = %e,
            timeout = e.is_timeout(),
            "Failed to fetch key set"
        );
        AuthError::KeySetUnavailable
    })?;

    if !response.status().is_success() {
        tracing::error!(
            target: "gate.auth.jwks",
            status = %response.status(),
            "Key set endpoint returned error"
        );
        return Err(AuthError::KeySetUnavailable);
    }

    response.json::<JwksDocument>().await.map_err(|e| {
        tracing::error!(target: "gate.auth.jwks", error = %e, "Failed to parse key set response");
        AuthError::KeySetUnavailable
    })
}
