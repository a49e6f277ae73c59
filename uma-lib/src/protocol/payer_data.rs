//! Payer/payee identity data and the compliance sub-object.
//!
//! Payer and payee data are the two documented-extensible objects in the
//! protocol: unknown fields pass through untouched. Everything else in the
//! wire layer is strict.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Result, UmaError};

/// Well-known counterparty data field: the `$user@domain` address.
pub const COUNTERPARTY_FIELD_IDENTIFIER: &str = "identifier";
/// Well-known counterparty data field: display name.
pub const COUNTERPARTY_FIELD_NAME: &str = "name";
/// Well-known counterparty data field: email address.
pub const COUNTERPARTY_FIELD_EMAIL: &str = "email";
/// Well-known counterparty data field: the compliance sub-object.
pub const COUNTERPARTY_FIELD_COMPLIANCE: &str = "compliance";

/// KYC state of a transacting user as attested by their VASP.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KycStatus {
    Unknown,
    NotVerified,
    Pending,
    Verified,
}

impl KycStatus {
    /// Wire name, as used in JSON and in the TLV invoice encoding.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::NotVerified => "NOT_VERIFIED",
            Self::Pending => "PENDING",
            Self::Verified => "VERIFIED",
        }
    }

    /// Parse a wire name back into a status.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "UNKNOWN" => Ok(Self::Unknown),
            "NOT_VERIFIED" => Ok(Self::NotVerified),
            "PENDING" => Ok(Self::Pending),
            "VERIFIED" => Ok(Self::Verified),
            other => Err(UmaError::invalid_input(
                "kycStatus",
                format!("unknown value {other:?}"),
            )),
        }
    }
}

/// Whether a requested counterparty data field is mandatory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CounterpartyDataOption {
    pub mandatory: bool,
}

/// The set of counterparty data fields one side asks the other to provide.
///
/// A `BTreeMap` keeps iteration deterministic, which the canonical text form
/// used inside the TLV invoice depends on.
pub type CounterpartyDataOptions = BTreeMap<String, CounterpartyDataOption>;

/// Builds the conventional option set: compliance and identifier mandatory,
/// name and email optional.
pub fn standard_counterparty_options(
    name_mandatory: bool,
    email_mandatory: bool,
) -> CounterpartyDataOptions {
    let mut options = CounterpartyDataOptions::new();
    options.insert(
        COUNTERPARTY_FIELD_IDENTIFIER.to_string(),
        CounterpartyDataOption { mandatory: true },
    );
    options.insert(
        COUNTERPARTY_FIELD_COMPLIANCE.to_string(),
        CounterpartyDataOption { mandatory: true },
    );
    options.insert(
        COUNTERPARTY_FIELD_NAME.to_string(),
        CounterpartyDataOption {
            mandatory: name_mandatory,
        },
    );
    options.insert(
        COUNTERPARTY_FIELD_EMAIL.to_string(),
        CounterpartyDataOption {
            mandatory: email_mandatory,
        },
    );
    options
}

/// Canonical `"email:0,identifier:1"` text form of an option set, used in the
/// TLV invoice encoding.
pub fn counterparty_options_to_string(options: &CounterpartyDataOptions) -> String {
    options
        .iter()
        .map(|(field, option)| format!("{}:{}", field, u8::from(option.mandatory)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses the canonical text form back into an option set.
pub fn counterparty_options_from_string(s: &str) -> Result<CounterpartyDataOptions> {
    let mut options = CounterpartyDataOptions::new();
    if s.is_empty() {
        return Ok(options);
    }
    for entry in s.split(',') {
        let (field, flag) = entry.split_once(':').ok_or_else(|| {
            UmaError::invalid_input("payerData", format!("malformed option entry {entry:?}"))
        })?;
        let mandatory = match flag {
            "0" => false,
            "1" => true,
            other => {
                return Err(UmaError::invalid_input(
                    "payerData",
                    format!("malformed mandatory flag {other:?}"),
                ))
            }
        };
        options.insert(field.to_string(), CounterpartyDataOption { mandatory });
    }
    Ok(options)
}

/// The compliance sub-object carried inside payer data (sender side) and
/// payee data (receiver side).
///
/// `signature` never covers this whole object; it covers the canonical
/// payload built from the relevant identifiers plus `signature_nonce` and
/// `signature_timestamp`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ComplianceData {
    /// UTXOs of channels that may be used to fund or settle the payment.
    pub utxos: Vec<String>,

    /// Lightning node public key, if shared.
    #[serde(rename = "nodePubKey", skip_serializing_if = "Option::is_none")]
    pub node_pubkey: Option<String>,

    /// KYC status of the transacting user.
    pub kyc_status: KycStatus,

    /// ECIES-encrypted travel rule payload, hex encoded. Sender side only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_travel_rule_info: Option<String>,

    /// Format tag for the travel rule payload, e.g. "IVMS@101.2023".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub travel_rule_format: Option<String>,

    /// Hex-encoded DER ECDSA signature over the canonical payload.
    pub signature: String,

    /// Single-use nonce covered by the signature.
    pub signature_nonce: String,

    /// Unix seconds covered by the signature.
    pub signature_timestamp: i64,

    /// URL the counterparty posts settlement UTXOs to.
    pub utxo_callback: String,
}

/// Data about the payer, keyed by counterparty data field names.
///
/// Extensible by design: fields beyond the well-known ones are preserved
/// across parse/serialize.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayerData(pub Map<String, Value>);

/// Data about the payee, keyed by counterparty data field names. Extensible
/// like [`PayerData`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayeeData(pub Map<String, Value>);

macro_rules! data_accessors {
    ($ty:ident) => {
        impl $ty {
            /// The `$user@domain` identifier, if present.
            pub fn identifier(&self) -> Option<&str> {
                self.0
                    .get(COUNTERPARTY_FIELD_IDENTIFIER)
                    .and_then(Value::as_str)
            }

            /// Display name, if present.
            pub fn name(&self) -> Option<&str> {
                self.0.get(COUNTERPARTY_FIELD_NAME).and_then(Value::as_str)
            }

            /// Email address, if present.
            pub fn email(&self) -> Option<&str> {
                self.0.get(COUNTERPARTY_FIELD_EMAIL).and_then(Value::as_str)
            }

            /// The typed compliance sub-object, if present.
            pub fn compliance(&self) -> Result<Option<ComplianceData>> {
                match self.0.get(COUNTERPARTY_FIELD_COMPLIANCE) {
                    None | Some(Value::Null) => Ok(None),
                    Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
                }
            }

            /// Insert or replace the compliance sub-object.
            pub fn set_compliance(&mut self, compliance: &ComplianceData) -> Result<()> {
                self.0.insert(
                    COUNTERPARTY_FIELD_COMPLIANCE.to_string(),
                    serde_json::to_value(compliance)?,
                );
                Ok(())
            }

            /// Insert or replace a string field.
            pub fn set_field(&mut self, field: &str, value: impl Into<String>) {
                self.0.insert(field.to_string(), Value::String(value.into()));
            }
        }
    };
}

data_accessors!(PayerData);
data_accessors!(PayeeData);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kyc_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&KycStatus::NotVerified).unwrap(),
            "\"NOT_VERIFIED\""
        );
        assert_eq!(KycStatus::parse("VERIFIED").unwrap(), KycStatus::Verified);
        assert!(KycStatus::parse("MAYBE").is_err());
    }

    #[test]
    fn test_counterparty_options_round_trip() {
        let options = standard_counterparty_options(false, false);
        let text = counterparty_options_to_string(&options);
        // BTreeMap ordering: compliance, email, identifier, name.
        assert_eq!(text, "compliance:1,email:0,identifier:1,name:0");
        assert_eq!(counterparty_options_from_string(&text).unwrap(), options);
    }

    #[test]
    fn test_counterparty_options_malformed() {
        assert!(counterparty_options_from_string("name").is_err());
        assert!(counterparty_options_from_string("name:2").is_err());
        assert!(counterparty_options_from_string("").unwrap().is_empty());
    }

    #[test]
    fn test_payer_data_unknown_fields_pass_through() {
        let json = r#"{"identifier":"$alice@vasp1.com","favoriteColor":"teal"}"#;
        let data: PayerData = serde_json::from_str(json).unwrap();
        assert_eq!(data.identifier(), Some("$alice@vasp1.com"));

        let out = serde_json::to_value(&data).unwrap();
        assert_eq!(out["favoriteColor"], "teal");
    }

    #[test]
    fn test_compliance_round_trip() {
        let compliance = ComplianceData {
            utxos: vec!["txid1:0".to_string()],
            node_pubkey: None,
            kyc_status: KycStatus::Verified,
            encrypted_travel_rule_info: None,
            travel_rule_format: None,
            signature: "aa".to_string(),
            signature_nonce: "123".to_string(),
            signature_timestamp: 1_700_000_000,
            utxo_callback: "https://vasp1.com/utxos".to_string(),
        };

        let mut data = PayerData::default();
        data.set_field(COUNTERPARTY_FIELD_IDENTIFIER, "$alice@vasp1.com");
        data.set_compliance(&compliance).unwrap();

        let parsed = data.compliance().unwrap().unwrap();
        assert_eq!(parsed, compliance);

        // Absent optionals are omitted on the wire, not null.
        let json = serde_json::to_string(&data).unwrap();
        assert!(!json.contains("nodePubKey"));
        assert!(!json.contains("encryptedTravelRuleInfo"));
    }
}
