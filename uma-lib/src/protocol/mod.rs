//! Wire types for every UMA message.
//!
//! Each inbound payload (JSON body or URL query string) is validated against
//! these types before any field is trusted. Signable messages expose a
//! `signable_payload()` method that is the single source of truth for the
//! bytes that get hashed and signed; builders and verifiers both call it.

mod callback;
mod currency;
mod lnurlp;
mod payer_data;
mod payreq;
mod pubkey;

pub use callback::PostTransactionCallback;
pub use currency::Currency;
pub use lnurlp::{
    LegacyLnurlpQuery, LnurlComplianceResponse, LnurlpRequest, LnurlpResponse, UmaLnurlpQuery,
};
pub use payer_data::{
    counterparty_options_from_string, counterparty_options_to_string,
    standard_counterparty_options, ComplianceData, CounterpartyDataOption,
    CounterpartyDataOptions, KycStatus, PayeeData, PayerData, COUNTERPARTY_FIELD_COMPLIANCE,
    COUNTERPARTY_FIELD_EMAIL, COUNTERPARTY_FIELD_IDENTIFIER, COUNTERPARTY_FIELD_NAME,
};
pub use payreq::{
    parse_amount_string, PayReqResponse, PayReqResponsePaymentInfo, PayRequest,
    SETTLEMENT_CURRENCY_CODE,
};
pub use pubkey::PubKeyResponse;

use crate::{Result, UmaError};

/// Extracts the VASP domain from a `$user@domain` UMA address.
///
/// The leading `$` is optional on parse; exactly one `@` is required and both
/// sides must be non-empty.
pub fn vasp_domain_from_uma_address(address: &str) -> Result<String> {
    let trimmed = address.strip_prefix('$').unwrap_or(address);
    match trimmed.split_once('@') {
        Some((user, domain))
            if !user.is_empty() && !domain.is_empty() && !domain.contains('@') =>
        {
            Ok(domain.to_string())
        }
        _ => Err(UmaError::invalid_input(
            "receiverAddress",
            "expected $user@domain",
        )),
    }
}

/// Validates the shape of a `$user@domain` UMA address.
pub fn is_valid_uma_address(address: &str) -> bool {
    vasp_domain_from_uma_address(address).is_ok()
}
