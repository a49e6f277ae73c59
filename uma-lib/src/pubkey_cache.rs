//! Cache of counterparty public keys, keyed by VASP domain.
//!
//! The cache sits in front of the `/.well-known/lnurlpubkey` HTTP lookup and
//! only governs reuse; the lookup itself lives behind
//! [`RemotePublicKeyFetcher`](crate::fetcher::RemotePublicKeyFetcher).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::protocol::PubKeyResponse;
use crate::{Result, UmaError};

/// Capability interface for caching counterparty key material.
///
/// `fetch_public_key_for_vasp` must treat an entry whose expiration has
/// passed as absent, so callers always re-resolve expired trust material
/// without an explicit remove.
#[async_trait]
pub trait PublicKeyCache: Send + Sync {
    /// Returns the cached, unexpired keys for a domain.
    async fn fetch_public_key_for_vasp(&self, vasp_domain: &str)
        -> Result<Option<PubKeyResponse>>;

    /// Stores keys for a domain, replacing any prior entry.
    async fn add_public_key_for_vasp(
        &self,
        vasp_domain: &str,
        keys: &PubKeyResponse,
    ) -> Result<()>;

    /// Drops the entry for a domain.
    async fn remove_public_key_for_vasp(&self, vasp_domain: &str) -> Result<()>;

    /// Drops every entry.
    async fn clear(&self) -> Result<()>;
}

/// In-memory reference implementation of [`PublicKeyCache`].
#[derive(Default)]
pub struct InMemoryPublicKeyCache {
    entries: Mutex<HashMap<String, PubKeyResponse>>,
}

impl InMemoryPublicKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, PubKeyResponse>>> {
        self.entries
            .lock()
            .map_err(|_| UmaError::Internal("public key cache lock poisoned".to_string()))
    }
}

#[async_trait]
impl PublicKeyCache for InMemoryPublicKeyCache {
    async fn fetch_public_key_for_vasp(
        &self,
        vasp_domain: &str,
    ) -> Result<Option<PubKeyResponse>> {
        let now = chrono::Utc::now().timestamp();
        let mut entries = self.lock()?;
        match entries.get(vasp_domain) {
            Some(keys) if keys.has_expired(now) => {
                entries.remove(vasp_domain);
                Ok(None)
            }
            Some(keys) => Ok(Some(keys.clone())),
            None => Ok(None),
        }
    }

    async fn add_public_key_for_vasp(
        &self,
        vasp_domain: &str,
        keys: &PubKeyResponse,
    ) -> Result<()> {
        self.lock()?.insert(vasp_domain.to_string(), keys.clone());
        Ok(())
    }

    async fn remove_public_key_for_vasp(&self, vasp_domain: &str) -> Result<()> {
        self.lock()?.remove(vasp_domain);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }
}
