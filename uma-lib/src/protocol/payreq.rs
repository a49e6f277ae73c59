//! PayRequest and PayReqResponse messages.
//!
//! The PayRequest amount rides the wire as a string: `"<int>"` for an amount
//! in the settlement unit (millisatoshis), or `"<int>.<CODE>"` for an amount
//! in the smallest unit of the named currency. The direction decides which
//! conversion formula the receiver applies, so a malformed amount is a hard
//! parse error, never a truncation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::payer_data::{CounterpartyDataOptions, PayeeData, PayerData};
use crate::{Result, UmaError};

/// Currency code reported for amounts expressed in the settlement unit.
pub const SETTLEMENT_CURRENCY_CODE: &str = "SAT";

/// Parses a PayRequest amount string into `(amount, currency_code)`.
///
/// `currency_code` is `None` for plain settlement-unit amounts. At most one
/// `.` separator is allowed and the integer part must fit an `i64`.
pub fn parse_amount_string(s: &str) -> Result<(i64, Option<String>)> {
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or_default();
    let amount = int_part
        .parse::<i64>()
        .map_err(|_| UmaError::invalid_amount(s, "integer part must parse as a 64-bit integer"))?;
    match (parts.next(), parts.next()) {
        (None, _) => Ok((amount, None)),
        (Some(code), None) if !code.is_empty() => Ok((amount, Some(code.to_string()))),
        (Some(_), None) => Err(UmaError::invalid_amount(s, "empty currency code")),
        (_, Some(_)) => Err(UmaError::invalid_amount(s, "at most one '.' separator")),
    }
}

fn amount_to_string(amount: i64, currency_code: Option<&str>) -> String {
    match currency_code {
        Some(code) => format!("{amount}.{code}"),
        None => amount.to_string(),
    }
}

/// A request for an invoice, posted to the receiver's callback URL.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PayRequestWire", into = "PayRequestWire")]
pub struct PayRequest {
    /// Currency the sender asks the receiver to settle into. `None` keeps
    /// the invoice denominated in millisatoshis.
    pub receiving_currency_code: Option<String>,

    /// Requested amount, in the smallest unit of
    /// `sending_amount_currency_code` (millisatoshis when `None`).
    pub amount: i64,

    /// Currency the amount is expressed in. `None` means the settlement
    /// unit (millisatoshis).
    pub sending_amount_currency_code: Option<String>,

    /// Data about the payer, including the compliance block for UMA.
    pub payer_data: Option<PayerData>,

    /// Payee data fields the sender wants back in the response.
    pub requested_payee_data: Option<CounterpartyDataOptions>,

    /// Freeform comment, when the receiver's `commentAllowed` permits one.
    pub comment: Option<String>,
}

impl PayRequest {
    /// The requested amount and the currency it is expressed in.
    ///
    /// Reports [`SETTLEMENT_CURRENCY_CODE`] for plain settlement-unit
    /// amounts.
    pub fn sending_amount(&self) -> (i64, &str) {
        (
            self.amount,
            self.sending_amount_currency_code
                .as_deref()
                .unwrap_or(SETTLEMENT_CURRENCY_CODE),
        )
    }

    /// True iff this request carries the UMA payer compliance material.
    pub fn is_uma_request(&self) -> bool {
        self.payer_data
            .as_ref()
            .map(|data| {
                data.identifier().is_some()
                    && matches!(data.compliance(), Ok(Some(_)))
            })
            .unwrap_or(false)
    }

    /// Canonical byte payload covered by the payer compliance signature:
    /// `payerIdentifier|nonce|timestamp`.
    pub fn signable_payload(&self) -> Result<Vec<u8>> {
        let payer_data = self.payer_data.as_ref().ok_or_else(|| {
            UmaError::invalid_input("payerData", "required for a signed pay request")
        })?;
        let identifier = payer_data.identifier().ok_or_else(|| {
            UmaError::invalid_input("payerData.identifier", "required for signing")
        })?;
        let compliance = payer_data.compliance()?.ok_or_else(|| {
            UmaError::invalid_input("payerData.compliance", "required for signing")
        })?;
        Ok(format!(
            "{}|{}|{}",
            identifier, compliance.signature_nonce, compliance.signature_timestamp
        )
        .into_bytes())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PayRequestWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    convert: Option<String>,
    amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    payer_data: Option<PayerData>,
    #[serde(rename = "payeeData", skip_serializing_if = "Option::is_none")]
    requested_payee_data: Option<CounterpartyDataOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
}

impl TryFrom<PayRequestWire> for PayRequest {
    type Error = UmaError;

    fn try_from(wire: PayRequestWire) -> Result<Self> {
        let (amount, sending_amount_currency_code) = parse_amount_string(&wire.amount)?;
        Ok(Self {
            receiving_currency_code: wire.convert,
            amount,
            sending_amount_currency_code,
            payer_data: wire.payer_data,
            requested_payee_data: wire.requested_payee_data,
            comment: wire.comment,
        })
    }
}

impl From<PayRequest> for PayRequestWire {
    fn from(request: PayRequest) -> Self {
        Self {
            convert: request.receiving_currency_code,
            amount: amount_to_string(
                request.amount,
                request.sending_amount_currency_code.as_deref(),
            ),
            payer_data: request.payer_data,
            requested_payee_data: request.requested_payee_data,
            comment: request.comment,
        }
    }
}

/// The receiver's committed conversion for a pay request.
///
/// The sender cannot second-guess these numbers; they are what the receiver
/// promises to apply at settlement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PayReqResponsePaymentInfo {
    /// Amount the receiver will credit, in the smallest unit of
    /// `currency_code`.
    pub amount: i64,

    /// Currency the receiver converts into.
    pub currency_code: String,

    /// Number of decimal digits in the currency's display convention.
    pub decimals: i32,

    /// Millisatoshis per smallest currency unit used for the conversion.
    pub multiplier: f64,

    /// Receiver's conversion fee in millisatoshis, already included in the
    /// invoice amount.
    pub fee: i64,
}

/// Response to a PayRequest: the invoice plus the committed conversion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PayReqResponse {
    /// BOLT11 invoice to pay.
    pub pr: String,

    /// Always empty; kept for LNURL compatibility.
    pub routes: Vec<Value>,

    /// The committed conversion. Present iff a receiving currency was
    /// requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted: Option<PayReqResponsePaymentInfo>,

    /// Data about the payee, including the compliance block for UMA.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payee_data: Option<PayeeData>,

    /// Whether the invoice may only be paid once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disposable: Option<bool>,

    /// LUD-09 success action, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_action: Option<std::collections::BTreeMap<String, String>>,
}

impl PayReqResponse {
    /// True iff this response carries the UMA payee compliance material.
    pub fn is_uma_response(&self) -> bool {
        self.payee_data
            .as_ref()
            .map(|data| matches!(data.compliance(), Ok(Some(_))))
            .unwrap_or(false)
    }

    /// Canonical byte payload covered by the payee compliance signature:
    /// `payerIdentifier|payeeIdentifier|nonce|timestamp`.
    ///
    /// The payer identifier is not part of this message, so the caller
    /// supplies the one from the originating PayRequest.
    pub fn signable_payload(&self, payer_identifier: &str) -> Result<Vec<u8>> {
        if payer_identifier.is_empty() {
            return Err(UmaError::invalid_input(
                "payerIdentifier",
                "required for signing",
            ));
        }
        let payee_data = self.payee_data.as_ref().ok_or_else(|| {
            UmaError::invalid_input("payeeData", "required for a signed response")
        })?;
        let identifier = payee_data.identifier().ok_or_else(|| {
            UmaError::invalid_input("payeeData.identifier", "required for signing")
        })?;
        let compliance = payee_data.compliance()?.ok_or_else(|| {
            UmaError::invalid_input("payeeData.compliance", "required for signing")
        })?;
        Ok(format!(
            "{}|{}|{}|{}",
            payer_identifier, identifier, compliance.signature_nonce, compliance.signature_timestamp
        )
        .into_bytes())
    }
}
