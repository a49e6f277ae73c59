//! Signing, verification, and travel-rule encryption.
//!
//! All protocol signatures are ECDSA over secp256k1 on the SHA-256 digest of
//! a canonical payload, DER-encoded and hex-encoded on the wire. Travel rule
//! payloads are encrypted with ECIES against the counterparty's encryption
//! key, which is distinct from its signing key.

pub mod certs;

use bitcoin::secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::{Result, UmaError};

/// Generates a single-use nonce: a random `u64` rendered in decimal.
pub fn generate_nonce() -> String {
    rand::rngs::OsRng.next_u64().to_string()
}

fn digest_message(payload: &[u8]) -> Result<Message> {
    let digest = Sha256::digest(payload);
    Message::from_slice(&digest).map_err(|e| UmaError::Crypto(e.to_string()))
}

/// Signs a canonical payload: SHA-256, ECDSA/secp256k1, DER, hex.
pub fn sign_payload(payload: &[u8], private_key_bytes: &[u8]) -> Result<String> {
    let secp = Secp256k1::new();
    let secret_key = SecretKey::from_slice(private_key_bytes)
        .map_err(|e| UmaError::Crypto(format!("invalid private key: {e}")))?;
    let message = digest_message(payload)?;
    let signature = secp.sign_ecdsa(&message, &secret_key);
    Ok(hex::encode(signature.serialize_der()))
}

/// Verifies a hex DER signature over a canonical payload.
///
/// Returns `Ok(false)` for a structurally valid but wrong signature. Errors
/// are reserved for malformed signature or key bytes. High-S signatures are
/// normalized to the canonical low-S form before verification.
pub fn verify_ecdsa(payload: &[u8], signature_hex: &str, pub_key_bytes: &[u8]) -> Result<bool> {
    let signature_bytes = hex::decode(signature_hex)
        .map_err(|e| UmaError::InvalidSignatureFormat(format!("signature is not hex: {e}")))?;
    let mut signature = Signature::from_der(&signature_bytes)
        .map_err(|e| UmaError::InvalidSignatureFormat(format!("signature is not DER: {e}")))?;
    signature.normalize_s();
    let public_key = PublicKey::from_slice(pub_key_bytes)
        .map_err(|e| UmaError::InvalidPublicKeyFormat(e.to_string()))?;

    let secp = Secp256k1::new();
    let message = digest_message(payload)?;
    Ok(secp.verify_ecdsa(&message, &signature, &public_key).is_ok())
}

/// Encrypts a travel-rule payload with ECIES against the receiver's
/// encryption public key. Returns hex ciphertext.
pub fn encrypt_travel_rule_info(
    travel_rule_info: &str,
    receiver_encryption_pubkey: &[u8],
) -> Result<String> {
    let ciphertext = ecies::encrypt(receiver_encryption_pubkey, travel_rule_info.as_bytes())
        .map_err(|e| UmaError::Crypto(format!("ecies encryption failed: {e:?}")))?;
    Ok(hex::encode(ciphertext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_keypair() -> ([u8; 32], Vec<u8>) {
        let secp = Secp256k1::new();
        let secret = [0x42u8; 32];
        let secret_key = SecretKey::from_slice(&secret).unwrap();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        (secret, public_key.serialize().to_vec())
    }

    #[test]
    fn test_sign_and_verify() {
        let (secret, public) = test_keypair();
        let payload = b"$bob@vasp2.com|12345|1700000000";

        let signature = sign_payload(payload, &secret).unwrap();
        assert!(verify_ecdsa(payload, &signature, &public).unwrap());
    }

    #[test]
    fn test_modified_payload_fails_verification() {
        let (secret, public) = test_keypair();
        let signature = sign_payload(b"payload", &secret).unwrap();
        assert!(!verify_ecdsa(b"payloae", &signature, &public).unwrap());
    }

    #[test]
    fn test_corrupted_signature_fails_verification() {
        let (secret, public) = test_keypair();
        let payload = b"payload";
        let signature = sign_payload(payload, &secret).unwrap();

        // Flip one bit inside the R integer; the DER structure stays valid.
        let mut bytes = hex::decode(&signature).unwrap();
        bytes[10] ^= 0x01;
        let corrupted = hex::encode(bytes);
        assert!(!verify_ecdsa(payload, &corrupted, &public).unwrap());
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let (secret, _) = test_keypair();
        let secp = Secp256k1::new();
        let other = PublicKey::from_secret_key(&secp, &SecretKey::from_slice(&[7u8; 32]).unwrap());

        let payload = b"payload";
        let signature = sign_payload(payload, &secret).unwrap();
        assert!(!verify_ecdsa(payload, &signature, &other.serialize()).unwrap());
    }

    #[test]
    fn test_malformed_signature_is_error_not_false() {
        let (_, public) = test_keypair();
        assert!(matches!(
            verify_ecdsa(b"payload", "zz-not-hex", &public),
            Err(UmaError::InvalidSignatureFormat(_))
        ));
        assert!(matches!(
            verify_ecdsa(b"payload", "aabbcc", &public),
            Err(UmaError::InvalidSignatureFormat(_))
        ));
    }

    #[test]
    fn test_malformed_key_is_error() {
        let (secret, _) = test_keypair();
        let signature = sign_payload(b"payload", &secret).unwrap();
        assert!(matches!(
            verify_ecdsa(b"payload", &signature, &[0u8; 33]),
            Err(UmaError::InvalidPublicKeyFormat(_))
        ));
    }

    #[test]
    fn test_generate_nonce_is_decimal_and_unique() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert!(a.parse::<u64>().is_ok());
        assert_ne!(a, b);
    }

    #[test]
    fn test_encrypt_travel_rule_info() {
        let (_, public) = test_keypair();
        let ciphertext = encrypt_travel_rule_info("{\"originator\":\"alice\"}", &public).unwrap();
        // Hex, and longer than the plaintext (ephemeral key + tag overhead).
        assert!(hex::decode(&ciphertext).unwrap().len() > 22);
    }

    #[test]
    fn test_encrypt_rejects_bad_key() {
        assert!(encrypt_travel_rule_info("info", &[0u8; 33]).is_err());
    }
}
