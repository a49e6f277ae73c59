//! Post-transaction settlement callback.

use serde::{Deserialize, Serialize};

use crate::{Result, UmaError};

/// Signed notification of the UTXOs a transaction settled over, posted to
/// the counterparty's UTXO callback URL after settlement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PostTransactionCallback {
    /// UTXOs of the channels used for settlement.
    pub utxos: Vec<String>,

    /// Domain where the sender's public keys are published.
    pub vasp_domain: String,

    /// Hex-encoded DER ECDSA signature over the canonical payload.
    pub signature: String,

    /// Single-use nonce covered by the signature.
    pub signature_nonce: String,

    /// Unix seconds covered by the signature.
    pub signature_timestamp: i64,
}

impl PostTransactionCallback {
    /// Canonical byte payload covered by `signature`:
    /// `utxo1,utxo2,...|nonce|timestamp`.
    pub fn signable_payload(&self) -> Result<Vec<u8>> {
        if self.signature_nonce.is_empty() {
            return Err(UmaError::invalid_input(
                "signatureNonce",
                "required for signing",
            ));
        }
        Ok(format!(
            "{}|{}|{}",
            self.utxos.join(","),
            self.signature_nonce,
            self.signature_timestamp
        )
        .into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signable_payload_shape() {
        let callback = PostTransactionCallback {
            utxos: vec!["txid1:0".to_string(), "txid2:1".to_string()],
            vasp_domain: "vasp1.com".to_string(),
            signature: String::new(),
            signature_nonce: "42".to_string(),
            signature_timestamp: 1_700_000_000,
        };
        assert_eq!(
            callback.signable_payload().unwrap(),
            b"txid1:0,txid2:1|42|1700000000".to_vec()
        );
    }

    #[test]
    fn test_wire_field_names() {
        let callback = PostTransactionCallback {
            utxos: vec![],
            vasp_domain: "vasp1.com".to_string(),
            signature: "aa".to_string(),
            signature_nonce: "42".to_string(),
            signature_timestamp: 1,
        };
        let json = serde_json::to_value(&callback).unwrap();
        assert_eq!(json["vaspDomain"], "vasp1.com");
        assert_eq!(json["signatureNonce"], "42");
        assert_eq!(json["signatureTimestamp"], 1);
    }
}
