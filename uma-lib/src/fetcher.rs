//! The HTTP boundary for counterparty key discovery.
//!
//! The engine never owns an HTTP client; callers inject a
//! [`RemotePublicKeyFetcher`]. A reqwest-backed reference implementation is
//! available behind the `http-client` feature for native targets. The
//! fetcher performs exactly one request per call; retry policy belongs to
//! the caller.

use async_trait::async_trait;

use crate::protocol::PubKeyResponse;
use crate::{Result, UmaError};

/// Capability interface for resolving a VASP's published keys.
#[async_trait]
pub trait RemotePublicKeyFetcher: Send + Sync {
    /// Fetches `https://<domain>/.well-known/lnurlpubkey` and parses the
    /// response.
    async fn fetch_pubkeys(&self, vasp_domain: &str) -> Result<PubKeyResponse>;
}

/// Builds the well-known key discovery URL for a domain. Plain `http` is
/// used only for `localhost` development hosts.
pub fn well_known_pubkey_url(vasp_domain: &str) -> Result<String> {
    if vasp_domain.is_empty() || vasp_domain.contains('/') || vasp_domain.contains('@') {
        return Err(UmaError::invalid_input(
            "vaspDomain",
            "expected a bare host[:port]",
        ));
    }
    let scheme = if vasp_domain == "localhost" || vasp_domain.starts_with("localhost:") {
        "http"
    } else {
        "https"
    };
    Ok(format!("{scheme}://{vasp_domain}/.well-known/lnurlpubkey"))
}

/// Reference [`RemotePublicKeyFetcher`] backed by reqwest.
#[cfg(feature = "http-client")]
pub struct ReqwestPublicKeyFetcher {
    client: reqwest::Client,
    timeout: std::time::Duration,
}

#[cfg(feature = "http-client")]
impl ReqwestPublicKeyFetcher {
    /// Create a fetcher with a 10 second per-request timeout.
    pub fn new() -> Self {
        Self::with_timeout(std::time::Duration::from_secs(10))
    }

    /// Create a fetcher with a caller-supplied per-request timeout.
    pub fn with_timeout(timeout: std::time::Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[cfg(feature = "http-client")]
impl Default for ReqwestPublicKeyFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "http-client")]
#[async_trait]
impl RemotePublicKeyFetcher for ReqwestPublicKeyFetcher {
    async fn fetch_pubkeys(&self, vasp_domain: &str) -> Result<PubKeyResponse> {
        let url = well_known_pubkey_url(vasp_domain)?;
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| UmaError::fetch_failed(vasp_domain, e))?;
        if !response.status().is_success() {
            return Err(UmaError::fetch_failed(
                vasp_domain,
                format!("status {}", response.status()),
            ));
        }
        response
            .json::<PubKeyResponse>()
            .await
            .map_err(|e| UmaError::fetch_failed(vasp_domain, e))
    }
}
