//! LNURLP request and response messages.
//!
//! A request is either a plain LNURL-pay query or a UMA query. The two shapes
//! are separate variants decided at parse time: a query is UMA iff `nonce`,
//! `signature`, `vaspDomain`, `timestamp` and `umaVersion` are all present
//! (`isSubjectToTravelRule` stays optional).

use serde::{Deserialize, Serialize};
use url::Url;

use super::currency::Currency;
use super::payer_data::{CounterpartyDataOptions, KycStatus};
use crate::{Result, UmaError};

/// A parsed `GET /.well-known/lnurlp/<user>` query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LnurlpRequest {
    /// A generic LNURL-pay query with no UMA signature material.
    Legacy(LegacyLnurlpQuery),
    /// A fully formed UMA query.
    Uma(UmaLnurlpQuery),
}

impl LnurlpRequest {
    /// The receiver address, regardless of variant.
    pub fn receiver_address(&self) -> &str {
        match self {
            Self::Legacy(q) => &q.receiver_address,
            Self::Uma(q) => &q.receiver_address,
        }
    }

    /// Narrow to the UMA variant.
    pub fn as_uma(&self) -> Option<&UmaLnurlpQuery> {
        match self {
            Self::Uma(q) => Some(q),
            Self::Legacy(_) => None,
        }
    }

    /// Parses an LNURLP URL, choosing the variant from the query parameters
    /// present. Malformed values of UMA parameters are hard errors rather
    /// than a silent fallback to the legacy shape.
    pub fn parse_from_url(url: &Url) -> Result<Self> {
        let receiver_address = receiver_address_from_url(url)?;

        let param = |name: &str| -> Option<String> {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };

        let nonce = param("nonce");
        let signature = param("signature");
        let vasp_domain = param("vaspDomain");
        let timestamp = param("timestamp");
        let uma_version = param("umaVersion");

        let (Some(nonce), Some(signature), Some(vasp_domain), Some(timestamp), Some(uma_version)) =
            (nonce, signature, vasp_domain, timestamp, uma_version)
        else {
            return Ok(Self::Legacy(LegacyLnurlpQuery { receiver_address }));
        };

        let timestamp = timestamp.parse::<i64>().map_err(|_| {
            UmaError::invalid_input("timestamp", "expected unix seconds as an integer")
        })?;
        let is_subject_to_travel_rule = match param("isSubjectToTravelRule").as_deref() {
            None => false,
            Some("true") | Some("TRUE") | Some("True") => true,
            Some("false") | Some("FALSE") | Some("False") => false,
            Some(other) => {
                return Err(UmaError::invalid_input(
                    "isSubjectToTravelRule",
                    format!("expected a boolean, got {other:?}"),
                ))
            }
        };

        Ok(Self::Uma(UmaLnurlpQuery {
            receiver_address,
            nonce,
            signature,
            is_subject_to_travel_rule,
            vasp_domain,
            timestamp,
            uma_version,
        }))
    }
}

fn receiver_address_from_url(url: &Url) -> Result<String> {
    let segments: Vec<&str> = url
        .path_segments()
        .ok_or_else(|| UmaError::invalid_input("url", "request URL has no path"))?
        .collect();
    if segments.len() != 3 || segments[0] != ".well-known" || segments[1] != "lnurlp" {
        return Err(UmaError::invalid_input(
            "url",
            "expected path /.well-known/lnurlp/<user>",
        ));
    }
    let host = url
        .host_str()
        .ok_or_else(|| UmaError::invalid_input("url", "request URL has no host"))?;
    let domain = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Ok(format!("${}@{}", segments[2], domain))
}

/// A plain LNURL-pay query: only the receiver address is known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyLnurlpQuery {
    /// `$user@domain` receiver address derived from the URL.
    pub receiver_address: String,
}

/// A UMA LNURLP query with all signature material present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UmaLnurlpQuery {
    /// `$user@domain` receiver address derived from the URL.
    pub receiver_address: String,
    /// Single-use nonce covered by the signature.
    pub nonce: String,
    /// Hex-encoded DER ECDSA signature over the canonical payload.
    pub signature: String,
    /// Whether the sending VASP must exchange travel rule information.
    pub is_subject_to_travel_rule: bool,
    /// Domain where the sender's public keys are published.
    pub vasp_domain: String,
    /// Unix seconds covered by the signature.
    pub timestamp: i64,
    /// Protocol version the sender speaks.
    pub uma_version: String,
}

impl UmaLnurlpQuery {
    /// Canonical byte payload covered by `signature`.
    pub fn signable_payload(&self) -> Result<Vec<u8>> {
        if self.receiver_address.is_empty() || self.nonce.is_empty() {
            return Err(UmaError::invalid_input(
                "lnurlpRequest",
                "receiverAddress and nonce are required for signing",
            ));
        }
        Ok(format!(
            "{}|{}|{}",
            self.receiver_address, self.nonce, self.timestamp
        )
        .into_bytes())
    }

    /// Encodes the query as a full request URL on the receiver's domain.
    pub fn encode_to_url(&self) -> Result<Url> {
        let (user, domain) = self
            .receiver_address
            .strip_prefix('$')
            .unwrap_or(&self.receiver_address)
            .split_once('@')
            .ok_or_else(|| {
                UmaError::invalid_input("receiverAddress", "expected $user@domain")
            })?;
        let scheme = if domain.starts_with("localhost:") {
            "http"
        } else {
            "https"
        };
        let mut url = Url::parse(&format!("{scheme}://{domain}/.well-known/lnurlp/{user}"))
            .map_err(|e| UmaError::invalid_input("receiverAddress", e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("signature", &self.signature)
            .append_pair("vaspDomain", &self.vasp_domain)
            .append_pair("nonce", &self.nonce)
            .append_pair(
                "isSubjectToTravelRule",
                if self.is_subject_to_travel_rule {
                    "true"
                } else {
                    "false"
                },
            )
            .append_pair("timestamp", &self.timestamp.to_string())
            .append_pair("umaVersion", &self.uma_version);
        Ok(url)
    }
}

/// The compliance block of a UMA LNURLP response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LnurlComplianceResponse {
    /// KYC status of the receiving user.
    pub kyc_status: KycStatus,
    /// Hex-encoded DER ECDSA signature over the canonical payload.
    pub signature: String,
    /// Single-use nonce covered by the signature.
    pub signature_nonce: String,
    /// Unix seconds covered by the signature.
    pub signature_timestamp: i64,
    /// Whether the receiving VASP must exchange travel rule information.
    pub is_subject_to_travel_rule: bool,
    /// `$user@domain` identifier of the receiver.
    pub receiver_identifier: String,
}

impl LnurlComplianceResponse {
    /// Canonical byte payload covered by `signature`.
    pub fn signable_payload(&self) -> Result<Vec<u8>> {
        if self.receiver_identifier.is_empty() || self.signature_nonce.is_empty() {
            return Err(UmaError::invalid_input(
                "compliance",
                "receiverIdentifier and signatureNonce are required for signing",
            ));
        }
        Ok(format!(
            "{}|{}|{}",
            self.receiver_identifier, self.signature_nonce, self.signature_timestamp
        )
        .into_bytes())
    }
}

/// Response to an LNURLP query, listing what the receiver accepts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LnurlpResponse {
    /// Always "payRequest" for this protocol.
    pub tag: String,

    /// URL the sender posts the PayRequest to.
    pub callback: String,

    /// Minimum sendable amount in millisatoshis.
    pub min_sendable: i64,

    /// Maximum sendable amount in millisatoshis.
    pub max_sendable: i64,

    /// LNURL metadata string (JSON-encoded array of tuples).
    #[serde(rename = "metadata")]
    pub encoded_metadata: String,

    /// Currencies the receiver can settle into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currencies: Option<Vec<Currency>>,

    /// Payer data fields the receiver requires or requests.
    #[serde(rename = "payerData", skip_serializing_if = "Option::is_none")]
    pub required_payer_data: Option<CounterpartyDataOptions>,

    /// UMA compliance block. Present iff this is a UMA response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliance: Option<LnurlComplianceResponse>,

    /// Negotiated protocol version. Present iff this is a UMA response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uma_version: Option<String>,

    /// Maximum comment length accepted, if comments are allowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_allowed: Option<i64>,

    /// Nostr pubkey for zap receipts, if supported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nostr_pubkey: Option<String>,

    /// Whether the receiver supports Nostr zaps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allows_nostr: Option<bool>,
}

impl LnurlpResponse {
    /// True iff this response carries the UMA compliance material.
    pub fn is_uma_response(&self) -> bool {
        self.compliance.is_some() && self.uma_version.is_some()
    }

    /// The compliance block, or an error for a legacy response where UMA
    /// material is required.
    pub fn require_compliance(&self) -> Result<&LnurlComplianceResponse> {
        self.compliance.as_ref().ok_or_else(|| {
            UmaError::invalid_input("compliance", "response is not a UMA response")
        })
    }
}
