//! Protocol orchestration.
//!
//! Stitches the wire types, canonical payloads, crypto, replay guard, key
//! cache, and version negotiation into the message-building functions and
//! their verifiers. The flow between two VASPs:
//!
//! 1. Sender builds and signs an LNURLP request URL.
//! 2. Receiver parses it, verifies signature and nonce, and answers with a
//!    signed LNURLP response listing currency options.
//! 3. Sender posts a PayRequest (optionally carrying encrypted travel rule
//!    data) to the receiver's callback.
//! 4. Receiver converts the amount, creates an invoice through the injected
//!    [`UmaInvoiceCreator`], and answers with a signed PayReqResponse.
//! 5. After settlement, either side posts a signed PostTransactionCallback.
//!
//! Each hop verifies the previous hop's signature with keys resolved through
//! [`fetch_public_key_for_vasp`] and replay-checked nonces.

use async_trait::async_trait;
use url::Url;

use crate::crypto;
use crate::fetcher::RemotePublicKeyFetcher;
use crate::invoice::{self, Invoice, InvoiceCurrency};
use crate::nonce_store::NonceValidator;
use crate::protocol::{
    ComplianceData, CounterpartyDataOptions, Currency, KycStatus, LnurlComplianceResponse,
    LnurlpRequest, LnurlpResponse, PayReqResponse, PayReqResponsePaymentInfo, PayRequest,
    PayeeData, PayerData, PostTransactionCallback, PubKeyResponse, UmaLnurlpQuery,
    COUNTERPARTY_FIELD_EMAIL, COUNTERPARTY_FIELD_IDENTIFIER, COUNTERPARTY_FIELD_NAME,
};
use crate::pubkey_cache::PublicKeyCache;
use crate::version::{select_lower_version, ProtocolVersionTable};
use crate::{Result, UmaError};

/// Capability for creating Lightning invoices. Implemented by the caller's
/// node or invoicing backend.
#[async_trait]
pub trait UmaInvoiceCreator: Send + Sync {
    /// Creates an invoice for `amount_msats` whose description hash commits
    /// to `metadata`. Returning `Ok(None)` means the backend declined; the
    /// engine treats that as a hard failure.
    async fn create_uma_invoice(
        &self,
        amount_msats: i64,
        metadata: &str,
        receiver_identifier: &str,
    ) -> Result<Option<String>>;
}

/// Fetches the published keys for a counterparty VASP, consulting the cache
/// first and recording a fresh fetch back into it.
#[cfg_attr(feature = "tracing", tracing::instrument(skip(cache, fetcher)))]
pub async fn fetch_public_key_for_vasp<C, F>(
    vasp_domain: &str,
    cache: &C,
    fetcher: &F,
) -> Result<PubKeyResponse>
where
    C: PublicKeyCache + ?Sized,
    F: RemotePublicKeyFetcher + ?Sized,
{
    if let Some(keys) = cache.fetch_public_key_for_vasp(vasp_domain).await? {
        return Ok(keys);
    }
    let keys = fetcher.fetch_pubkeys(vasp_domain).await?;
    cache.add_public_key_for_vasp(vasp_domain, &keys).await?;
    Ok(keys)
}

/// Builds and signs an LNURLP request URL for a receiver address.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(skip(signing_private_key, version_table))
)]
pub fn get_signed_lnurlp_request_url(
    signing_private_key: &[u8],
    receiver_address: &str,
    sender_vasp_domain: &str,
    is_subject_to_travel_rule: bool,
    version_table: &ProtocolVersionTable,
    uma_version_override: Option<&str>,
) -> Result<Url> {
    let uma_version = match uma_version_override {
        Some(version) => {
            version.parse::<crate::version::ParsedVersion>()?;
            version.to_string()
        }
        None => version_table.current_version(),
    };
    let mut query = UmaLnurlpQuery {
        receiver_address: receiver_address.to_string(),
        nonce: crypto::generate_nonce(),
        signature: String::new(),
        is_subject_to_travel_rule,
        vasp_domain: sender_vasp_domain.to_string(),
        timestamp: chrono::Utc::now().timestamp(),
        uma_version,
    };
    query.signature = crypto::sign_payload(&query.signable_payload()?, signing_private_key)?;
    query.encode_to_url()
}

/// Parses an inbound LNURLP URL into a legacy or UMA query.
pub fn parse_lnurlp_request(url: &Url) -> Result<LnurlpRequest> {
    LnurlpRequest::parse_from_url(url)
}

/// True iff the URL parses as a fully formed UMA query.
pub fn is_uma_lnurlp_query(url: &Url) -> bool {
    matches!(LnurlpRequest::parse_from_url(url), Ok(LnurlpRequest::Uma(_)))
}

/// Verifies an inbound UMA LNURLP query: protocol version, replay guard,
/// then signature.
pub async fn verify_uma_lnurlp_query_signature<N>(
    query: &UmaLnurlpQuery,
    other_vasp_signing_pubkey: &[u8],
    nonce_validator: &N,
    version_table: &ProtocolVersionTable,
) -> Result<()>
where
    N: NonceValidator + ?Sized,
{
    if !version_table.is_version_supported(&query.uma_version) {
        return Err(version_table.unsupported_version_error(&query.uma_version));
    }
    check_nonce(nonce_validator, &query.nonce, query.timestamp).await?;
    check_signature(
        &query.signable_payload()?,
        &query.signature,
        other_vasp_signing_pubkey,
    )
}

/// Builds a signed LNURLP response advertising the receiver's currencies
/// and payer data requirements.
#[allow(clippy::too_many_arguments)]
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(skip(receiver_signing_private_key, version_table, currency_options))
)]
pub fn get_lnurlp_response(
    query: &UmaLnurlpQuery,
    receiver_signing_private_key: &[u8],
    requires_travel_rule_info: bool,
    callback: &str,
    encoded_metadata: &str,
    min_sendable_msats: i64,
    max_sendable_msats: i64,
    payer_data_options: &CounterpartyDataOptions,
    currency_options: &[Currency],
    receiver_kyc_status: KycStatus,
    version_table: &ProtocolVersionTable,
) -> Result<LnurlpResponse> {
    if min_sendable_msats > max_sendable_msats {
        return Err(UmaError::invalid_input(
            "minSendable",
            "must not exceed maxSendable",
        ));
    }
    for currency in currency_options {
        currency.validate()?;
    }
    let uma_version =
        select_lower_version(&query.uma_version, &version_table.current_version())?;

    let mut compliance = LnurlComplianceResponse {
        kyc_status: receiver_kyc_status,
        signature: String::new(),
        signature_nonce: crypto::generate_nonce(),
        signature_timestamp: chrono::Utc::now().timestamp(),
        is_subject_to_travel_rule: requires_travel_rule_info,
        receiver_identifier: query.receiver_address.clone(),
    };
    compliance.signature = crypto::sign_payload(
        &compliance.signable_payload()?,
        receiver_signing_private_key,
    )?;

    Ok(LnurlpResponse {
        tag: "payRequest".to_string(),
        callback: callback.to_string(),
        min_sendable: min_sendable_msats,
        max_sendable: max_sendable_msats,
        encoded_metadata: encoded_metadata.to_string(),
        currencies: Some(currency_options.to_vec()),
        required_payer_data: Some(payer_data_options.clone()),
        compliance: Some(compliance),
        uma_version: Some(uma_version),
        comment_allowed: None,
        nostr_pubkey: None,
        allows_nostr: None,
    })
}

/// Parses an LNURLP response body.
pub fn parse_lnurlp_response(bytes: &[u8]) -> Result<LnurlpResponse> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Verifies an inbound UMA LNURLP response: protocol version, replay guard,
/// then signature.
pub async fn verify_uma_lnurlp_response_signature<N>(
    response: &LnurlpResponse,
    other_vasp_signing_pubkey: &[u8],
    nonce_validator: &N,
    version_table: &ProtocolVersionTable,
) -> Result<()>
where
    N: NonceValidator + ?Sized,
{
    let version = response.uma_version.as_deref().ok_or_else(|| {
        UmaError::invalid_input("umaVersion", "response is not a UMA response")
    })?;
    if !version_table.is_version_supported(version) {
        return Err(version_table.unsupported_version_error(version));
    }
    let compliance = response.require_compliance()?;
    check_nonce(
        nonce_validator,
        &compliance.signature_nonce,
        compliance.signature_timestamp,
    )
    .await?;
    check_signature(
        &compliance.signable_payload()?,
        &compliance.signature,
        other_vasp_signing_pubkey,
    )
}

/// Builds a signed PayRequest, encrypting travel rule information against
/// the receiver's encryption key when present.
#[allow(clippy::too_many_arguments)]
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(skip_all, fields(payer = %payer_identifier, currency = %receiving_currency_code))
)]
pub fn get_pay_request(
    receiver_encryption_pubkey: &[u8],
    sending_vasp_private_key: &[u8],
    receiving_currency_code: &str,
    amount: i64,
    is_amount_in_receiving_currency: bool,
    payer_identifier: &str,
    payer_name: Option<&str>,
    payer_email: Option<&str>,
    travel_rule_info: Option<&str>,
    travel_rule_format: Option<&str>,
    payer_kyc_status: KycStatus,
    payer_utxos: &[String],
    payer_node_pubkey: Option<&str>,
    utxo_callback: &str,
    requested_payee_data: Option<CounterpartyDataOptions>,
    comment: Option<&str>,
) -> Result<PayRequest> {
    if amount <= 0 {
        return Err(UmaError::invalid_amount(
            amount.to_string(),
            "must be positive",
        ));
    }
    let encrypted_travel_rule_info = travel_rule_info
        .map(|info| crypto::encrypt_travel_rule_info(info, receiver_encryption_pubkey))
        .transpose()?;

    let mut compliance = ComplianceData {
        utxos: payer_utxos.to_vec(),
        node_pubkey: payer_node_pubkey.map(str::to_string),
        kyc_status: payer_kyc_status,
        encrypted_travel_rule_info,
        travel_rule_format: travel_rule_format.map(str::to_string),
        signature: String::new(),
        signature_nonce: crypto::generate_nonce(),
        signature_timestamp: chrono::Utc::now().timestamp(),
        utxo_callback: utxo_callback.to_string(),
    };

    let mut payer_data = PayerData::default();
    payer_data.set_field(COUNTERPARTY_FIELD_IDENTIFIER, payer_identifier);
    if let Some(name) = payer_name {
        payer_data.set_field(COUNTERPARTY_FIELD_NAME, name);
    }
    if let Some(email) = payer_email {
        payer_data.set_field(COUNTERPARTY_FIELD_EMAIL, email);
    }
    payer_data.set_compliance(&compliance)?;

    let mut request = PayRequest {
        receiving_currency_code: Some(receiving_currency_code.to_string()),
        amount,
        sending_amount_currency_code: is_amount_in_receiving_currency
            .then(|| receiving_currency_code.to_string()),
        payer_data: Some(payer_data),
        requested_payee_data,
        comment: comment.map(str::to_string),
    };

    // Sign through the same canonical payload the verifier reads.
    compliance.signature =
        crypto::sign_payload(&request.signable_payload()?, sending_vasp_private_key)?;
    if let Some(payer_data) = request.payer_data.as_mut() {
        payer_data.set_compliance(&compliance)?;
    }
    Ok(request)
}

/// Parses a PayRequest body.
pub fn parse_pay_request(bytes: &[u8]) -> Result<PayRequest> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Verifies an inbound PayRequest: replay guard, then signature.
pub async fn verify_pay_req_signature<N>(
    request: &PayRequest,
    other_vasp_signing_pubkey: &[u8],
    nonce_validator: &N,
) -> Result<()>
where
    N: NonceValidator + ?Sized,
{
    let compliance = request
        .payer_data
        .as_ref()
        .and_then(|data| data.compliance().transpose())
        .transpose()?
        .ok_or_else(|| {
            UmaError::invalid_input("payerData.compliance", "required for a UMA pay request")
        })?;
    check_nonce(
        nonce_validator,
        &compliance.signature_nonce,
        compliance.signature_timestamp,
    )
    .await?;
    check_signature(
        &request.signable_payload()?,
        &compliance.signature,
        other_vasp_signing_pubkey,
    )
}

/// Builds a signed PayReqResponse, converting the requested amount and
/// creating an invoice through the injected capability.
///
/// The conversion direction follows the request exactly: an amount in the
/// receiving currency is multiplied up to millisatoshis with the fee added
/// on top; an amount already in millisatoshis has the fee deducted before
/// dividing down to the receiving currency.
#[allow(clippy::too_many_arguments)]
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(skip_all, fields(receiver = %receiver_identifier, currency = %receiving_currency.code))
)]
pub async fn get_pay_req_response<T>(
    request: &PayRequest,
    invoice_creator: &T,
    metadata: &str,
    receiving_currency: &Currency,
    receiver_fees_msats: i64,
    receiver_identifier: &str,
    receiver_utxos: &[String],
    receiver_node_pubkey: Option<&str>,
    utxo_callback: &str,
    receiver_kyc_status: KycStatus,
    receiving_vasp_private_key: &[u8],
    extra_payee_data: Option<PayeeData>,
) -> Result<PayReqResponse>
where
    T: UmaInvoiceCreator + ?Sized,
{
    receiving_currency.validate()?;
    if let Some(code) = &request.receiving_currency_code {
        if code != &receiving_currency.code {
            return Err(UmaError::invalid_input(
                "convert",
                format!(
                    "requested currency {code} does not match offered {}",
                    receiving_currency.code
                ),
            ));
        }
    }
    let is_amount_in_receiving_currency = match &request.sending_amount_currency_code {
        None => false,
        Some(code) if code == &receiving_currency.code => true,
        Some(code) => {
            return Err(UmaError::invalid_amount(
                format!("{}.{code}", request.amount),
                format!("amount currency must be {} or millisatoshis", receiving_currency.code),
            ))
        }
    };

    let (msats_amount, converted_amount) = if is_amount_in_receiving_currency {
        if request.amount < receiving_currency.min_sendable
            || request.amount > receiving_currency.max_sendable
        {
            return Err(UmaError::invalid_amount(
                request.amount.to_string(),
                "outside the currency's sendable range",
            ));
        }
        let msats = (request.amount as f64 * receiving_currency.multiplier).round() as i64
            + receiver_fees_msats;
        (msats, request.amount)
    } else {
        let converted = ((request.amount - receiver_fees_msats) as f64
            / receiving_currency.multiplier)
            .round() as i64;
        (request.amount, converted)
    };

    let payer_identifier = request
        .payer_data
        .as_ref()
        .and_then(PayerData::identifier)
        .ok_or_else(|| {
            UmaError::invalid_input("payerData.identifier", "required for a UMA pay request")
        })?;

    let invoice_metadata = match &request.payer_data {
        Some(payer_data) => format!("{metadata}{}", serde_json::to_string(payer_data)?),
        None => metadata.to_string(),
    };
    let pr = invoice_creator
        .create_uma_invoice(msats_amount, &invoice_metadata, receiver_identifier)
        .await?
        .ok_or_else(|| {
            UmaError::FailedToCreateInvoice("invoice creator returned no invoice".to_string())
        })?;

    let mut compliance = ComplianceData {
        utxos: receiver_utxos.to_vec(),
        node_pubkey: receiver_node_pubkey.map(str::to_string),
        kyc_status: receiver_kyc_status,
        encrypted_travel_rule_info: None,
        travel_rule_format: None,
        signature: String::new(),
        signature_nonce: crypto::generate_nonce(),
        signature_timestamp: chrono::Utc::now().timestamp(),
        utxo_callback: utxo_callback.to_string(),
    };

    let mut payee_data = extra_payee_data.unwrap_or_default();
    payee_data.set_field(COUNTERPARTY_FIELD_IDENTIFIER, receiver_identifier);
    payee_data.set_compliance(&compliance)?;

    let mut response = PayReqResponse {
        pr,
        routes: Vec::new(),
        converted: Some(PayReqResponsePaymentInfo {
            amount: converted_amount,
            currency_code: receiving_currency.code.clone(),
            decimals: receiving_currency.decimals,
            multiplier: receiving_currency.multiplier,
            fee: receiver_fees_msats,
        }),
        payee_data: Some(payee_data),
        disposable: Some(true),
        success_action: None,
    };

    // Sign through the same canonical payload the verifier reads.
    compliance.signature = crypto::sign_payload(
        &response.signable_payload(payer_identifier)?,
        receiving_vasp_private_key,
    )?;
    if let Some(payee_data) = response.payee_data.as_mut() {
        payee_data.set_compliance(&compliance)?;
    }
    Ok(response)
}

/// Parses a PayReqResponse body.
pub fn parse_pay_req_response(bytes: &[u8]) -> Result<PayReqResponse> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Verifies an inbound PayReqResponse: replay guard, then signature. The
/// payer identifier comes from the originating PayRequest.
pub async fn verify_pay_req_response_signature<N>(
    response: &PayReqResponse,
    payer_identifier: &str,
    other_vasp_signing_pubkey: &[u8],
    nonce_validator: &N,
) -> Result<()>
where
    N: NonceValidator + ?Sized,
{
    let compliance = response
        .payee_data
        .as_ref()
        .and_then(|data| data.compliance().transpose())
        .transpose()?
        .ok_or_else(|| {
            UmaError::invalid_input("payeeData.compliance", "required for a UMA response")
        })?;
    check_nonce(
        nonce_validator,
        &compliance.signature_nonce,
        compliance.signature_timestamp,
    )
    .await?;
    check_signature(
        &response.signable_payload(payer_identifier)?,
        &compliance.signature,
        other_vasp_signing_pubkey,
    )
}

/// Builds a signed post-transaction settlement callback.
pub fn get_post_transaction_callback(
    utxos: &[String],
    vasp_domain: &str,
    signing_private_key: &[u8],
) -> Result<PostTransactionCallback> {
    let mut callback = PostTransactionCallback {
        utxos: utxos.to_vec(),
        vasp_domain: vasp_domain.to_string(),
        signature: String::new(),
        signature_nonce: crypto::generate_nonce(),
        signature_timestamp: chrono::Utc::now().timestamp(),
    };
    callback.signature =
        crypto::sign_payload(&callback.signable_payload()?, signing_private_key)?;
    Ok(callback)
}

/// Parses a PostTransactionCallback body.
pub fn parse_post_transaction_callback(bytes: &[u8]) -> Result<PostTransactionCallback> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Verifies an inbound PostTransactionCallback: replay guard, then
/// signature.
pub async fn verify_post_transaction_callback_signature<N>(
    callback: &PostTransactionCallback,
    other_vasp_signing_pubkey: &[u8],
    nonce_validator: &N,
) -> Result<()>
where
    N: NonceValidator + ?Sized,
{
    check_nonce(
        nonce_validator,
        &callback.signature_nonce,
        callback.signature_timestamp,
    )
    .await?;
    check_signature(
        &callback.signable_payload()?,
        &callback.signature,
        other_vasp_signing_pubkey,
    )
}

/// Builds and signs a self-contained invoice for out-of-band transport.
#[allow(clippy::too_many_arguments)]
pub fn get_signed_uma_invoice(
    receiver_uma: &str,
    invoice_uuid: &str,
    amount: i64,
    receiving_currency: InvoiceCurrency,
    expiration: i64,
    is_subject_to_travel_rule: bool,
    required_payer_data: Option<CounterpartyDataOptions>,
    version_table: &ProtocolVersionTable,
    comment_chars_allowed: Option<i64>,
    sender_uma: Option<&str>,
    max_num_payments: Option<i64>,
    kyc_status: Option<KycStatus>,
    callback: &str,
    signing_private_key: &[u8],
) -> Result<Invoice> {
    let mut uma_invoice = Invoice {
        receiver_uma: receiver_uma.to_string(),
        invoice_uuid: invoice_uuid.to_string(),
        amount,
        receiving_currency,
        expiration,
        is_subject_to_travel_rule,
        required_payer_data,
        uma_versions: version_table.supported_versions_string(),
        comment_chars_allowed,
        sender_uma: sender_uma.map(str::to_string),
        max_num_payments,
        kyc_status,
        callback: callback.to_string(),
        signature: None,
    };
    uma_invoice.validate()?;
    invoice::sign_invoice(&mut uma_invoice, signing_private_key)?;
    Ok(uma_invoice)
}

async fn check_nonce<N>(nonce_validator: &N, nonce: &str, timestamp_secs: i64) -> Result<()>
where
    N: NonceValidator + ?Sized,
{
    if nonce_validator
        .check_and_save_nonce(nonce, timestamp_secs)
        .await?
    {
        Ok(())
    } else {
        Err(UmaError::ReplayRejected)
    }
}

fn check_signature(payload: &[u8], signature_hex: &str, pubkey: &[u8]) -> Result<()> {
    if crypto::verify_ecdsa(payload, signature_hex, pubkey)? {
        Ok(())
    } else {
        Err(UmaError::InvalidSignature(
            "signature does not verify against the counterparty key".to_string(),
        ))
    }
}
