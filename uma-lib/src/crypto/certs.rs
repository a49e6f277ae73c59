//! Public-key extraction from raw hex keys and X.509 certificate chains.
//!
//! A VASP publishes either bare hex-encoded secp256k1 points or a PEM
//! certificate chain whose leaf certificate holds the key. Only EC keys on
//! secp256k1 are accepted; any other algorithm is a hard input error.

use bitcoin::secp256k1::PublicKey;
use x509_cert::der::asn1::ObjectIdentifier;
use x509_cert::der::DecodePem;
use x509_cert::Certificate;

use crate::{Result, UmaError};

const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const ID_SECP256K1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.10");

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// Errors specific to certificate parsing, folded into [`UmaError`] at the
/// module boundary.
#[derive(Debug, thiserror::Error)]
enum CertError {
    #[error("no certificate found in PEM chain")]
    NoCertificate,
    #[error("certificate is not parseable: {0}")]
    Malformed(String),
    #[error("certificate key algorithm {0} is not EC")]
    NotEcKey(String),
    #[error("certificate curve {0} is not secp256k1")]
    WrongCurve(String),
    #[error("certificate has no curve parameters")]
    MissingCurve,
}

impl From<CertError> for UmaError {
    fn from(err: CertError) -> Self {
        match err {
            CertError::NotEcKey(_) | CertError::WrongCurve(_) | CertError::MissingCurve => {
                UmaError::invalid_input("certificate", err.to_string())
            }
            other => UmaError::InvalidPublicKeyFormat(other.to_string()),
        }
    }
}

/// Decodes and validates a hex-encoded compressed or uncompressed secp256k1
/// public key, returning the raw point bytes.
pub fn pubkey_from_hex(hex_key: &str) -> Result<Vec<u8>> {
    let bytes = hex::decode(hex_key)
        .map_err(|e| UmaError::InvalidPublicKeyFormat(format!("key is not hex: {e}")))?;
    PublicKey::from_slice(&bytes).map_err(|e| UmaError::InvalidPublicKeyFormat(e.to_string()))?;
    Ok(bytes)
}

/// Extracts the secp256k1 public key from the leaf certificate of a PEM
/// chain (leaf first).
pub fn pubkey_from_cert_chain_pem(chain: &str) -> Result<Vec<u8>> {
    let leaf = leaf_pem(chain)?;
    let cert = Certificate::from_pem(leaf.as_bytes())
        .map_err(|e| CertError::Malformed(e.to_string()))?;

    let spki = &cert.tbs_certificate.subject_public_key_info;
    if spki.algorithm.oid != ID_EC_PUBLIC_KEY {
        return Err(CertError::NotEcKey(spki.algorithm.oid.to_string()).into());
    }
    let params = spki
        .algorithm
        .parameters
        .as_ref()
        .ok_or(CertError::MissingCurve)?;
    let curve: ObjectIdentifier = params
        .decode_as()
        .map_err(|e| CertError::Malformed(e.to_string()))?;
    if curve != ID_SECP256K1 {
        return Err(CertError::WrongCurve(curve.to_string()).into());
    }

    let bytes = spki
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| CertError::Malformed("public key has unused bits".to_string()))?;
    PublicKey::from_slice(bytes).map_err(|e| UmaError::InvalidPublicKeyFormat(e.to_string()))?;
    Ok(bytes.to_vec())
}

/// Accepts either a raw hex key or a PEM certificate chain, whichever the
/// input looks like.
pub fn pubkey_from_hex_or_cert(input: &str) -> Result<Vec<u8>> {
    if input.contains(PEM_BEGIN) {
        pubkey_from_cert_chain_pem(input)
    } else {
        pubkey_from_hex(input.trim())
    }
}

fn leaf_pem(chain: &str) -> std::result::Result<&str, CertError> {
    let start = chain.find(PEM_BEGIN).ok_or(CertError::NoCertificate)?;
    let end = chain[start..]
        .find(PEM_END)
        .ok_or(CertError::NoCertificate)?;
    Ok(&chain[start..start + end + PEM_END.len()])
}
