//! OpenF1 API client with caching and retries
//!
//! Every request goes through the same pipeline: check the cache, fall back to
//! the network with retries on transient failures, then write the response
//! back to the cache. Only a cache miss or an explicit bypass reaches the
//! network.

use futures::future::join_all;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::retry::{is_retryable_status, RetryPolicy};
use crate::cache::{derive_key, CacheStore};

/// Errors that can occur when fetching data from the API
///
/// Cache failures never appear here: the cache degrades to a miss or a no-op.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Upstream kept answering 429
    #[error("Rate limit hit after {attempts} attempts. Please slow down requests.")]
    RateLimited { attempts: u32 },

    /// Upstream answered with a 5xx status
    #[error("HTTP error {status} after {attempts} attempts")]
    ServerError { status: u16, attempts: u32 },

    /// Upstream rejected the request with a 4xx status
    #[error("HTTP error {status}")]
    ClientError { status: u16 },

    /// Connect or read deadline exceeded on every attempt
    #[error("Request timed out after {attempts} attempts")]
    Timeout { attempts: u32 },

    /// No response was received
    #[error("Network error after {attempts} attempts: {message}")]
    Network { message: String, attempts: u32 },

    /// Successful status but the body was not JSON
    #[error("Failed to parse JSON response: {0}")]
    InvalidBody(String),

    /// The HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    Setup(#[source] reqwest::Error),
}

impl FetchError {
    /// A stable short code for the failure class
    pub fn reason_code(&self) -> &'static str {
        match self {
            FetchError::RateLimited { .. } => "rate_limited",
            FetchError::ServerError { .. } => "server_error",
            FetchError::ClientError { .. } => "client_error",
            FetchError::Timeout { .. } => "timeout",
            FetchError::Network { .. } => "network_error",
            FetchError::InvalidBody(_) => "invalid_body",
            FetchError::Setup(_) => "setup",
        }
    }
}

/// Outcome of a single failed attempt, before retries are accounted for
#[derive(Debug)]
enum AttemptError {
    Status(StatusCode),
    Timeout,
    Network(String),
    InvalidBody(String),
}

impl AttemptError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AttemptError::Timeout
        } else if err.is_decode() {
            AttemptError::InvalidBody(err.to_string())
        } else {
            AttemptError::Network(err.to_string())
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            AttemptError::Status(status) => is_retryable_status(status.as_u16()),
            AttemptError::Timeout | AttemptError::Network(_) => true,
            AttemptError::InvalidBody(_) => false,
        }
    }

    fn into_fetch_error(self, attempts: u32) -> FetchError {
        match self {
            AttemptError::Status(StatusCode::TOO_MANY_REQUESTS) => FetchError::RateLimited { attempts },
            AttemptError::Status(status) if status.is_server_error() => FetchError::ServerError {
                status: status.as_u16(),
                attempts,
            },
            AttemptError::Status(status) => FetchError::ClientError {
                status: status.as_u16(),
            },
            AttemptError::Timeout => FetchError::Timeout { attempts },
            AttemptError::Network(message) => FetchError::Network { message, attempts },
            AttemptError::InvalidBody(message) => FetchError::InvalidBody(message),
        }
    }
}

/// Network settings for the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSettings {
    /// Deadline for establishing a connection
    pub connect_timeout: Duration,
    /// Deadline for a whole attempt, including reading the body
    pub request_timeout: Duration,
    /// Retry budget and backoff
    pub retry: RetryPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

/// One async mutex per cache key, so a key has at most one fetch in flight
#[derive(Debug, Default)]
struct KeyLocks {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    fn acquire(self: &Arc<Self>, key: &str) -> KeySlot {
        let lock = self
            .map()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        KeySlot {
            owner: Arc::clone(self),
            key: key.to_string(),
            lock,
        }
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A caller's claim on a key's mutex
///
/// Dropping the last claim removes the key from the map, including when the
/// fetch is cancelled while still waiting for the mutex.
struct KeySlot {
    owner: Arc<KeyLocks>,
    key: String,
    lock: Arc<Mutex<()>>,
}

impl Drop for KeySlot {
    fn drop(&mut self) {
        let mut locks = self.owner.map();
        // One reference in the map, one held here
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}

/// Client for fetching JSON from the OpenF1 API through the response cache
#[derive(Debug, Clone)]
pub struct OpenF1Client {
    /// HTTP client for making requests
    http_client: Client,
    /// Cache store for persisting responses
    cache: CacheStore,
    /// Retry budget and backoff
    retry: RetryPolicy,
    /// Serializes fetches that share a cache key
    in_flight: Arc<KeyLocks>,
}

impl OpenF1Client {
    /// Creates a client with default network settings
    pub fn new(cache: CacheStore) -> Result<Self, FetchError> {
        Self::with_settings(cache, ClientSettings::default())
    }

    /// Creates a client with custom timeouts and retry policy
    pub fn with_settings(cache: CacheStore, settings: ClientSettings) -> Result<Self, FetchError> {
        let http_client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(FetchError::Setup)?;

        Ok(Self {
            http_client,
            cache,
            retry: settings.retry,
            in_flight: Arc::new(KeyLocks::default()),
        })
    }

    /// Returns the cache store backing this client
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Fetches JSON for a request URL
    ///
    /// # Arguments
    /// * `url` - The request identity, e.g. `https://api.openf1.org/v1/laps?session_key=9636`
    /// * `bypass_cache` - Skip the cache lookup and always go to the network
    ///
    /// # Returns
    /// * `Ok(Value)` - The payload, unmodified
    /// * `Err(FetchError)` - If the network leg failed; the cache is left untouched
    ///
    /// # Behavior
    /// - Without bypass, a fresh cache entry is returned with no network call
    /// - On a miss or bypass, the request is sent with retries on 429/5xx,
    ///   timeouts and connection failures
    /// - A successful response overwrites the cache entry before returning
    /// - A failed bypass leaves any older entry in place
    pub async fn fetch(&self, url: &str, bypass_cache: bool) -> Result<Value, FetchError> {
        let slot = self.in_flight.acquire(&derive_key(url));
        let _guard = slot.lock.lock().await;
        self.fetch_exclusive(url, bypass_cache).await
    }

    /// Fetches several URLs concurrently
    ///
    /// Results are returned in the order of `urls`. Duplicate URLs never hit
    /// the network at the same time. Without bypass they share one request:
    /// later callers wait and are served from the cache. With bypass each
    /// duplicate waits its turn and then sends its own request.
    pub async fn fetch_all(&self, urls: &[String], bypass_cache: bool) -> Vec<Result<Value, FetchError>> {
        join_all(urls.iter().map(|url| self.fetch(url, bypass_cache))).await
    }

    /// The pipeline body; the caller holds the key's lock
    async fn fetch_exclusive(&self, url: &str, bypass_cache: bool) -> Result<Value, FetchError> {
        // Check cache first
        if !bypass_cache {
            if let Some(payload) = self.cache.lookup(url) {
                return Ok(payload);
            }
        }

        let payload = self.fetch_with_retry(url).await?;

        // A failed write must not fail the fetch
        if let Err(err) = self.cache.store(url, &payload) {
            warn!(url, error = %err, "failed to write cache entry");
        }

        Ok(payload)
    }

    /// Sends the request, retrying transient failures per the retry policy
    async fn fetch_with_retry(&self, url: &str) -> Result<Value, FetchError> {
        let mut schedule = self.retry.schedule();
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.fetch_once(url).await {
                Ok(payload) => {
                    if attempt > 1 {
                        debug!(url, attempt, "request succeeded after retry");
                    }
                    return Ok(payload);
                }
                Err(err) => {
                    if !err.is_retryable() || attempt >= self.retry.max_attempts() {
                        let err = err.into_fetch_error(attempt);
                        warn!(url, attempt, reason = err.reason_code(), error = %err, "request failed");
                        return Err(err);
                    }

                    let delay = schedule.next_delay();
                    debug!(
                        url,
                        attempt,
                        error = ?err,
                        delay_ms = delay.as_millis() as u64,
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Makes a single GET request and parses the JSON body
    async fn fetch_once(&self, url: &str) -> Result<Value, AttemptError> {
        info!(url, "fetching from API");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(AttemptError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status));
        }

        let body = response.bytes().await.map_err(AttemptError::from_reqwest)?;
        serde_json::from_slice(&body).map_err(|e| AttemptError::InvalidBody(e.to_string()))
    }
}
