//! Published VASP key material.
//!
//! Served from `GET /.well-known/lnurlpubkey`. A VASP publishes either raw
//! hex public keys or PEM certificate chains; the signing and encryption
//! keys are distinct.

use serde::{Deserialize, Serialize};

use crate::crypto::certs;
use crate::{Result, UmaError};

/// A VASP's published signing and encryption keys.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PubKeyResponse {
    /// Compressed or uncompressed secp256k1 signing key, hex encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_pub_key: Option<String>,

    /// Compressed or uncompressed secp256k1 encryption key, hex encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_pub_key: Option<String>,

    /// PEM certificate chain, leaf first, whose leaf holds the signing key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_cert_chain: Option<String>,

    /// PEM certificate chain, leaf first, whose leaf holds the encryption
    /// key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_cert_chain: Option<String>,

    /// Unix seconds after which cached copies must be re-fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_timestamp: Option<i64>,
}

impl PubKeyResponse {
    /// Build a response from raw hex keys.
    pub fn from_hex_keys(
        signing_pub_key: impl Into<String>,
        encryption_pub_key: impl Into<String>,
    ) -> Self {
        Self {
            signing_pub_key: Some(signing_pub_key.into()),
            encryption_pub_key: Some(encryption_pub_key.into()),
            ..Self::default()
        }
    }

    /// The signing key bytes, preferring the certificate chain over the raw
    /// hex key.
    pub fn signing_pubkey(&self) -> Result<Vec<u8>> {
        key_bytes(
            self.signing_cert_chain.as_deref(),
            self.signing_pub_key.as_deref(),
            "signingPubKey",
        )
    }

    /// The encryption key bytes, preferring the certificate chain over the
    /// raw hex key.
    pub fn encryption_pubkey(&self) -> Result<Vec<u8>> {
        key_bytes(
            self.encryption_cert_chain.as_deref(),
            self.encryption_pub_key.as_deref(),
            "encryptionPubKey",
        )
    }

    /// True iff `expiration_timestamp` has passed at `now_secs`.
    pub fn has_expired(&self, now_secs: i64) -> bool {
        self.expiration_timestamp
            .map(|expiry| expiry <= now_secs)
            .unwrap_or(false)
    }
}

fn key_bytes(cert_chain: Option<&str>, hex_key: Option<&str>, field: &str) -> Result<Vec<u8>> {
    if let Some(chain) = cert_chain {
        return certs::pubkey_from_cert_chain_pem(chain);
    }
    let hex_key = hex_key
        .ok_or_else(|| UmaError::invalid_input(field, "no key or certificate published"))?;
    certs::pubkey_from_hex(hex_key)
}
