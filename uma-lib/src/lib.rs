//! UMA (Universal Money Address) protocol engine.
//!
//! This crate implements the LNURL-derived payment handshake run between two
//! independent VASPs that do not otherwise trust each other: the wire
//! messages exchanged over HTTPS, the canonical payloads that get signed,
//! replay defense and key-trust bookkeeping, protocol version negotiation,
//! and a compact TLV + bech32m invoice format usable outside HTTP.
//!
//! The crate intentionally stays stateless and delegates side effects to
//! callers through trait-based capability injection:
//!
//! - [`NonceValidator`](nonce_store::NonceValidator) — replay bookkeeping
//!   (in-memory reference included)
//! - [`PublicKeyCache`](pubkey_cache::PublicKeyCache) — counterparty key
//!   trust (in-memory reference included)
//! - [`UmaInvoiceCreator`] — the Lightning invoicing backend
//! - [`RemotePublicKeyFetcher`](fetcher::RemotePublicKeyFetcher) — the HTTP
//!   client (reqwest reference behind the `http-client` feature)
//!
//! # Example
//!
//! ```ignore
//! use uma_lib::prelude::*;
//!
//! let table = ProtocolVersionTable::current();
//! let url = get_signed_lnurlp_request_url(
//!     &sender_signing_key,
//!     "$bob@vasp2.com",
//!     "vasp1.com",
//!     true,
//!     &table,
//!     None,
//! )?;
//! // GET the url; the receiving VASP parses and verifies it:
//! let request = parse_lnurlp_request(&url)?;
//! ```

pub mod errors;
pub mod fetcher;
pub mod invoice;
pub mod nonce_store;
pub mod prelude;
pub mod protocol;
pub mod pubkey_cache;
mod uma;
pub mod version;

pub mod crypto;

pub use errors::{UmaError, UmaErrorCode};
pub use uma::{
    fetch_public_key_for_vasp, get_lnurlp_response, get_pay_req_response, get_pay_request,
    get_post_transaction_callback, get_signed_lnurlp_request_url, get_signed_uma_invoice,
    is_uma_lnurlp_query, parse_lnurlp_request, parse_lnurlp_response, parse_pay_req_response,
    parse_pay_request, parse_post_transaction_callback, verify_pay_req_response_signature,
    verify_pay_req_signature, verify_post_transaction_callback_signature,
    verify_uma_lnurlp_query_signature, verify_uma_lnurlp_response_signature, UmaInvoiceCreator,
};

/// Common result alias for UMA operations.
pub type Result<T> = std::result::Result<T, UmaError>;
