//! Issuer key store with an embedded fallback and remote refresh.
//!
//! The store starts out seeded from the key set bundled with the crate, so
//! verification works offline. A refresh fetches a JWKS document and, only if
//! the fetch succeeds and the document parses into a non-empty key set,
//! replaces the whole set in one step. A failed refresh changes nothing.
//!
//! Readers take an [`Arc`] snapshot with [`KeyStore::current`]; a refresh that
//! lands mid-verification never affects a snapshot already taken.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::RwLock;

use crate::error::{KeySetError, RefreshError};
use crate::jwk::KeySet;

/// Key set bundled at build time.
const EMBEDDED_FALLBACK_JWKS: &str = include_str!("../keys/fallback_jwks.json");

/// Default timeout for a key-set fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("shc-verifier/", env!("CARGO_PKG_VERSION"));

/// Parse the bundled fallback key set.
pub fn embedded_fallback() -> Result<KeySet, KeySetError> {
    KeySet::from_json(EMBEDDED_FALLBACK_JWKS)
}

/// Where a key set comes from during refresh.
pub trait KeySetFetcher: Send + Sync {
    /// Fetch the raw JWKS document.
    fn fetch(&self) -> Result<String, RefreshError>;

    /// Human-readable location, for logs.
    fn source(&self) -> &str;
}

/// Fetches a JWKS document over HTTP(S).
pub struct HttpKeySetFetcher {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpKeySetFetcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RefreshError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl KeySetFetcher for HttpKeySetFetcher {
    fn fetch(&self) -> Result<String, RefreshError> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Status(status.as_u16()));
        }

        response
            .text()
            .map_err(|e| RefreshError::Network(e.to_string()))
    }

    fn source(&self) -> &str {
        &self.url
    }
}

/// Lifecycle of the store's key set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStoreState {
    /// Serving the fallback set it was created with.
    Seeded,
    /// Serving a set loaded by a successful refresh.
    Refreshed,
}

struct Snapshot {
    keys: Arc<KeySet>,
    state: KeyStoreState,
    /// Start order of the refresh that installed `keys`; 0 for the fallback.
    generation: u64,
}

/// Owns the active key set.
pub struct KeyStore {
    current: RwLock<Snapshot>,
    /// Last generation handed to a starting refresh.
    refresh_generation: AtomicU64,
    refresh_count: AtomicU64,
    refresh_failures: AtomicU64,
}

impl KeyStore {
    /// Create a store seeded with the bundled fallback key set.
    pub fn embedded() -> Result<Self, KeySetError> {
        Ok(Self::with_fallback(embedded_fallback()?))
    }

    /// Create a store seeded with `fallback`.
    pub fn with_fallback(fallback: KeySet) -> Self {
        tracing::debug!(keys = fallback.len(), "key store seeded");
        Self {
            current: RwLock::new(Snapshot {
                keys: Arc::new(fallback),
                state: KeyStoreState::Seeded,
                generation: 0,
            }),
            refresh_generation: AtomicU64::new(0),
            refresh_count: AtomicU64::new(0),
            refresh_failures: AtomicU64::new(0),
        }
    }

    /// The last successfully loaded key set. Never blocks on a refresh.
    pub fn current(&self) -> Arc<KeySet> {
        Arc::clone(&self.current.read().keys)
    }

    pub fn state(&self) -> KeyStoreState {
        self.current.read().state
    }

    /// Number of refreshes that replaced the key set.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::Relaxed)
    }

    /// Number of refreshes that failed and left the key set untouched.
    pub fn refresh_failures(&self) -> u64 {
        self.refresh_failures.load(Ordering::Relaxed)
    }

    /// Fetch and install a new key set, returning its size.
    ///
    /// On any error the current set stays in place. A refresh that finishes
    /// after a later-started one has already installed its keys is dropped.
    pub fn refresh(&self, fetcher: &dyn KeySetFetcher) -> Result<usize, RefreshError> {
        let generation = self.refresh_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let result = fetcher
            .fetch()
            .and_then(|body| KeySet::from_json(&body).map_err(RefreshError::from));

        match result {
            Ok(keys) => {
                let count = keys.len();
                if self.replace(keys, generation) {
                    self.refresh_count.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(source = fetcher.source(), keys = count, "key set refreshed");
                } else {
                    tracing::debug!(
                        source = fetcher.source(),
                        generation,
                        "newer key set already installed, dropping fetched keys"
                    );
                }
                Ok(count)
            }
            Err(err) => {
                self.refresh_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    source = fetcher.source(),
                    error = %err,
                    "key set refresh failed, keeping current keys"
                );
                Err(err)
            }
        }
    }

    /// Refresh from `url` with the default timeout.
    pub fn refresh_from_url(&self, url: &str) -> Result<usize, RefreshError> {
        let fetcher = HttpKeySetFetcher::new(url, DEFAULT_FETCH_TIMEOUT)?;
        self.refresh(&fetcher)
    }

    /// Run a refresh on a background thread. Failures are logged only.
    pub fn spawn_refresh(self: &Arc<Self>, fetcher: Arc<dyn KeySetFetcher>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        std::thread::spawn(move || {
            // Already logged inside refresh.
            let _ = store.refresh(fetcher.as_ref());
        })
    }

    fn replace(&self, keys: KeySet, generation: u64) -> bool {
        let mut current = self.current.write();
        if generation < current.generation {
            return false;
        }
        *current = Snapshot {
            keys: Arc::new(keys),
            state: KeyStoreState::Refreshed,
            generation,
        };
        true
    }
}
