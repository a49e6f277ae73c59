//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and functions for
//! quick setup. Import everything with:
//!
//! ```rust,ignore
//! use uma_lib::prelude::*;
//! ```
//!
//! ## What's Included
//!
//! - Error types: `UmaError`, `UmaErrorCode`, `Result`
//! - Wire types: `Currency`, `LnurlpRequest`, `LnurlpResponse`,
//!   `PayRequest`, `PayReqResponse`, `PostTransactionCallback`,
//!   `PubKeyResponse`, `KycStatus`
//! - Capability traits and reference implementations
//! - The build/verify function pairs and the invoice codec

// Error handling
pub use crate::errors::{UmaError, UmaErrorCode};
pub use crate::Result;

// Wire types
pub use crate::protocol::{
    ComplianceData, CounterpartyDataOptions, Currency, KycStatus, LnurlpRequest, LnurlpResponse,
    PayReqResponse, PayRequest, PayeeData, PayerData, PostTransactionCallback, PubKeyResponse,
    UmaLnurlpQuery,
};

// Capability traits and reference implementations
pub use crate::fetcher::RemotePublicKeyFetcher;
pub use crate::nonce_store::{InMemoryNonceValidator, NonceValidator};
pub use crate::pubkey_cache::{InMemoryPublicKeyCache, PublicKeyCache};
pub use crate::UmaInvoiceCreator;

// Version negotiation
pub use crate::version::{select_lower_version, ParsedVersion, ProtocolVersionTable};

// Protocol orchestration
pub use crate::{
    fetch_public_key_for_vasp, get_lnurlp_response, get_pay_req_response, get_pay_request,
    get_post_transaction_callback, get_signed_lnurlp_request_url, get_signed_uma_invoice,
    is_uma_lnurlp_query, parse_lnurlp_request, parse_lnurlp_response, parse_pay_req_response,
    parse_pay_request, parse_post_transaction_callback, verify_pay_req_response_signature,
    verify_pay_req_signature, verify_post_transaction_callback_signature,
    verify_uma_lnurlp_query_signature, verify_uma_lnurlp_response_signature,
};

// Invoice codec
pub use crate::invoice::{
    decode_invoice_bech32, encode_invoice_bech32, sign_invoice, verify_invoice_signature, Invoice,
    InvoiceCurrency,
};

// HTTP reference fetcher (when available)
#[cfg(feature = "http-client")]
pub use crate::fetcher::ReqwestPublicKeyFetcher;
