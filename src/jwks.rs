//! Resolution of token verification keys from a remote JSON Web Key Set.
//!
//! Keys are cached for the lifetime of the process. The identity provider
//! rotates keys by publishing new key IDs, never by changing the key behind an
//! existing ID, so the cache is only ever extended and a fetch happens only
//! when an unknown key ID shows up.

use std::{sync::Arc, time::Duration};

use arc_swap::ArcSwap;
use fnv::FnvHashMap;
use jsonwebtoken::{jwk::JwkSet, DecodingKey};
use tracing::{debug, warn};

#[derive(thiserror::Error, Debug)]
pub enum KeyResolveError {
    #[error("key set fetch failed: {0}")]
    KeyFetchFailed(anyhow::Error),

    #[error("key not found: {0}")]
    KeyNotFound(String),
}

/// Process-wide cache of verification keys, by key ID.
///
/// Reads never block. Population copies the map and swaps it in, and an
/// existing entry is never replaced, so concurrent population with the same
/// key set is harmless.
#[derive(Default)]
pub struct KeySetCache {
    keys: ArcSwap<FnvHashMap<String, Arc<DecodingKey>>>,
}

impl KeySetCache {
    pub fn get(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        self.keys.load().get(kid).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add keys whose IDs are not yet known.
    pub fn populate(&self, keys: impl IntoIterator<Item = (String, DecodingKey)>) {
        let keys: Vec<(String, Arc<DecodingKey>)> = keys
            .into_iter()
            .map(|(kid, key)| (kid, Arc::new(key)))
            .collect();

        self.keys.rcu(|current| {
            let mut next = FnvHashMap::clone(current);
            for (kid, key) in &keys {
                next.entry(kid.clone()).or_insert_with(|| key.clone());
            }
            next
        });
    }

    /// Add every usable key of a JSON Web Key Set.
    ///
    /// Keys without a key ID, or of a kind that cannot verify signatures, are skipped.
    pub fn populate_from_jwk_set(&self, jwk_set: &JwkSet) {
        self.populate(jwk_set.keys.iter().filter_map(|jwk| {
            let Some(kid) = jwk.common.key_id.clone() else {
                debug!("skipping JWK without key ID");
                return None;
            };

            match DecodingKey::from_jwk(jwk) {
                Ok(key) => Some((kid, key)),
                Err(err) => {
                    warn!(?err, %kid, "skipping unusable JWK");
                    None
                }
            }
        }));
    }
}

/// Where the complete key set comes from.
#[async_trait::async_trait]
pub trait KeySetSource: Send + Sync {
    async fn fetch_key_set(&self) -> anyhow::Result<JwkSet>;
}

/// Fetches the key set from a well-known JWKS URL.
pub struct HttpKeySetSource {
    client: reqwest::Client,
    url: String,
}

impl HttpKeySetSource {
    const TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(Self::TIMEOUT).build()?,
            url: url.into(),
        })
    }
}

#[async_trait::async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch_key_set(&self) -> anyhow::Result<JwkSet> {
        Ok(self
            .client
            .get(&self.url)
            .header("accept", "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }
}

/// Resolves key IDs to verification keys, fetching the key set on a cache miss.
pub struct KeyResolver {
    source: Box<dyn KeySetSource>,
    cache: Arc<KeySetCache>,
}

impl KeyResolver {
    pub fn new(source: impl KeySetSource + 'static, cache: Arc<KeySetCache>) -> Self {
        Self {
            source: Box::new(source),
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<KeySetCache> {
        &self.cache
    }

    pub async fn resolve(&self, kid: &str) -> Result<Arc<DecodingKey>, KeyResolveError> {
        if let Some(key) = self.cache.get(kid) {
            return Ok(key);
        }

        debug!(kid, "unknown key ID, fetching key set");

        let jwk_set = self
            .source
            .fetch_key_set()
            .await
            .map_err(KeyResolveError::KeyFetchFailed)?;

        self.cache.populate_from_jwk_set(&jwk_set);

        self.cache
            .get(kid)
            .ok_or_else(|| KeyResolveError::KeyNotFound(kid.to_string()))
    }
}
