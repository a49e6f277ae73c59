//! End-to-end protocol flow between two VASPs.
//!
//! Walks the full handshake with in-memory capabilities on both sides:
//! signed LNURLP request, signed response with currency options, PayRequest
//! with compliance data, PayReqResponse with the committed conversion, and
//! the post-transaction callback. Every hop independently resolves the
//! counterparty key and verifies the previous hop's signature.

use std::sync::Mutex;

use async_trait::async_trait;
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};

use uma_lib::prelude::*;

struct Vasp {
    signing_key: [u8; 32],
    encryption_key: [u8; 32],
    domain: &'static str,
}

impl Vasp {
    fn new(seed: u8, domain: &'static str) -> Self {
        Self {
            signing_key: [seed; 32],
            encryption_key: [seed + 1; 32],
            domain,
        }
    }

    fn signing_pubkey(&self) -> Vec<u8> {
        pubkey_for(&self.signing_key)
    }

    fn published_keys(&self) -> PubKeyResponse {
        PubKeyResponse::from_hex_keys(
            hex::encode(pubkey_for(&self.signing_key)),
            hex::encode(pubkey_for(&self.encryption_key)),
        )
    }
}

fn pubkey_for(secret: &[u8; 32]) -> Vec<u8> {
    let secp = Secp256k1::new();
    PublicKey::from_secret_key(&secp, &SecretKey::from_slice(secret).unwrap())
        .serialize()
        .to_vec()
}

/// Serves each VASP's published keys the way the well-known endpoint would.
struct Directory(Vec<(&'static str, PubKeyResponse)>);

#[async_trait]
impl RemotePublicKeyFetcher for Directory {
    async fn fetch_pubkeys(&self, vasp_domain: &str) -> uma_lib::Result<PubKeyResponse> {
        self.0
            .iter()
            .find(|(domain, _)| *domain == vasp_domain)
            .map(|(_, keys)| keys.clone())
            .ok_or_else(|| UmaError::CounterpartyFetchFailed {
                domain: vasp_domain.to_string(),
                reason: "unknown domain".to_string(),
            })
    }
}

/// Invoice backend that records the amount it was asked to invoice.
struct RecordingInvoiceCreator {
    last_amount_msats: Mutex<Option<i64>>,
}

#[async_trait]
impl UmaInvoiceCreator for RecordingInvoiceCreator {
    async fn create_uma_invoice(
        &self,
        amount_msats: i64,
        _metadata: &str,
        _receiver_identifier: &str,
    ) -> uma_lib::Result<Option<String>> {
        *self.last_amount_msats.lock().unwrap() = Some(amount_msats);
        Ok(Some("lnbc3415100n1fakeinvoice".to_string()))
    }
}

fn usd() -> Currency {
    Currency {
        code: "USD".to_string(),
        name: "US Dollars".to_string(),
        symbol: "$".to_string(),
        multiplier: 34_150.0,
        min_sendable: 1,
        max_sendable: 10_000_000,
        decimals: 2,
    }
}

#[tokio::test]
async fn full_payment_handshake() {
    let sender_vasp = Vasp::new(0x10, "vasp1.com");
    let receiver_vasp = Vasp::new(0x20, "vasp2.com");
    let table = ProtocolVersionTable::current();

    let directory = Directory(vec![
        (sender_vasp.domain, sender_vasp.published_keys()),
        (receiver_vasp.domain, receiver_vasp.published_keys()),
    ]);
    let sender_cache = InMemoryPublicKeyCache::new();
    let receiver_cache = InMemoryPublicKeyCache::new();
    let sender_nonces = InMemoryNonceValidator::new(0);
    let receiver_nonces = InMemoryNonceValidator::new(0);

    // Sender builds and signs the LNURLP request.
    let request_url = get_signed_lnurlp_request_url(
        &sender_vasp.signing_key,
        "$bob@vasp2.com",
        sender_vasp.domain,
        true,
        &table,
        None,
    )
    .unwrap();
    assert!(is_uma_lnurlp_query(&request_url));

    // Receiver parses the request and verifies it against the sender's
    // published key.
    let query = match parse_lnurlp_request(&request_url).unwrap() {
        LnurlpRequest::Uma(query) => query,
        LnurlpRequest::Legacy(_) => panic!("expected a UMA query"),
    };
    let sender_keys =
        fetch_public_key_for_vasp(&query.vasp_domain, &receiver_cache, &directory)
            .await
            .unwrap();
    verify_uma_lnurlp_query_signature(
        &query,
        &sender_keys.signing_pubkey().unwrap(),
        &receiver_nonces,
        &table,
    )
    .await
    .unwrap();

    // Receiver answers with its currency options.
    let payer_data_options = uma_lib::protocol::standard_counterparty_options(false, false);
    let response = get_lnurlp_response(
        &query,
        &receiver_vasp.signing_key,
        true,
        "https://vasp2.com/api/uma/payreq/bob",
        "[[\"text/plain\",\"Pay to bob@vasp2.com\"]]",
        1_000,
        10_000_000_000,
        &payer_data_options,
        &[usd()],
        KycStatus::Verified,
        &table,
    )
    .unwrap();

    // Sender verifies the response against the receiver's published key.
    let response_bytes = serde_json::to_vec(&response).unwrap();
    let response = parse_lnurlp_response(&response_bytes).unwrap();
    let receiver_keys =
        fetch_public_key_for_vasp(receiver_vasp.domain, &sender_cache, &directory)
            .await
            .unwrap();
    verify_uma_lnurlp_response_signature(
        &response,
        &receiver_keys.signing_pubkey().unwrap(),
        &sender_nonces,
        &table,
    )
    .await
    .unwrap();

    let offered = &response.currencies.as_ref().unwrap()[0];
    assert_eq!(offered.code, "USD");
    assert_eq!(offered.multiplier, 34_150.0);
    assert_eq!(offered.decimals, 2);

    // Sender requests 1000 minor units of USD with travel rule data.
    let pay_request = get_pay_request(
        &receiver_keys.encryption_pubkey().unwrap(),
        &sender_vasp.signing_key,
        &offered.code,
        1000,
        true,
        "$alice@vasp1.com",
        Some("Alice"),
        Some("alice@vasp1.com"),
        Some("{\"originator\":{\"name\":\"Alice\"}}"),
        Some("IVMS@101.2023"),
        KycStatus::Verified,
        &["sendertx:0".to_string()],
        None,
        "https://vasp1.com/api/uma/utxocallback",
        None,
        None,
    )
    .unwrap();

    // Receiver verifies the pay request and answers with the committed
    // conversion and an invoice.
    let pay_request_bytes = serde_json::to_vec(&pay_request).unwrap();
    let pay_request = parse_pay_request(&pay_request_bytes).unwrap();
    verify_pay_req_signature(
        &pay_request,
        &sender_keys.signing_pubkey().unwrap(),
        &receiver_nonces,
    )
    .await
    .unwrap();

    let creator = RecordingInvoiceCreator {
        last_amount_msats: Mutex::new(None),
    };
    let fee_msats = 100_000;
    let pay_response = get_pay_req_response(
        &pay_request,
        &creator,
        "[[\"text/plain\",\"Pay to bob@vasp2.com\"]]",
        &usd(),
        fee_msats,
        "$bob@vasp2.com",
        &["receivertx:1".to_string()],
        None,
        "https://vasp2.com/api/uma/utxocallback",
        KycStatus::Verified,
        &receiver_vasp.signing_key,
        None,
    )
    .await
    .unwrap();

    // The invoice covers the converted amount plus the receiver's fee.
    assert_eq!(
        creator.last_amount_msats.lock().unwrap().unwrap(),
        1000 * 34_150 + fee_msats
    );
    let converted = pay_response.converted.as_ref().unwrap();
    assert_eq!(converted.amount, 1000);
    assert_eq!(converted.currency_code, "USD");
    assert_eq!(converted.fee, fee_msats);

    // Sender independently verifies the response signature and accepts.
    let pay_response_bytes = serde_json::to_vec(&pay_response).unwrap();
    let pay_response = parse_pay_req_response(&pay_response_bytes).unwrap();
    verify_pay_req_response_signature(
        &pay_response,
        "$alice@vasp1.com",
        &receiver_keys.signing_pubkey().unwrap(),
        &sender_nonces,
    )
    .await
    .unwrap();
    assert_eq!(pay_response.pr, "lnbc3415100n1fakeinvoice");

    // After settlement the sender reports its UTXOs.
    let callback = get_post_transaction_callback(
        &["sendertx:0".to_string()],
        sender_vasp.domain,
        &sender_vasp.signing_key,
    )
    .unwrap();
    let callback_bytes = serde_json::to_vec(&callback).unwrap();
    let callback = parse_post_transaction_callback(&callback_bytes).unwrap();
    verify_post_transaction_callback_signature(
        &callback,
        &sender_keys.signing_pubkey().unwrap(),
        &receiver_nonces,
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn legacy_lnurl_query_is_not_uma() {
    let url = url::Url::parse("https://vasp2.com/.well-known/lnurlp/bob").unwrap();
    assert!(!is_uma_lnurlp_query(&url));
    match parse_lnurlp_request(&url).unwrap() {
        LnurlpRequest::Legacy(query) => assert_eq!(query.receiver_address, "$bob@vasp2.com"),
        LnurlpRequest::Uma(_) => panic!("bare query must parse as legacy"),
    }
}

#[tokio::test]
async fn cross_vasp_replay_is_rejected_per_store() {
    let sender_vasp = Vasp::new(0x10, "vasp1.com");
    let table = ProtocolVersionTable::current();
    let nonces = InMemoryNonceValidator::new(0);

    let url = get_signed_lnurlp_request_url(
        &sender_vasp.signing_key,
        "$bob@vasp2.com",
        sender_vasp.domain,
        false,
        &table,
        None,
    )
    .unwrap();
    let query = match parse_lnurlp_request(&url).unwrap() {
        LnurlpRequest::Uma(query) => query,
        LnurlpRequest::Legacy(_) => panic!("expected a UMA query"),
    };

    verify_uma_lnurlp_query_signature(&query, &sender_vasp.signing_pubkey(), &nonces, &table)
        .await
        .unwrap();

    // The same signed URL presented again hits the replay guard before the
    // signature is even checked.
    let replayed = verify_uma_lnurlp_query_signature(
        &query,
        &sender_vasp.signing_pubkey(),
        &nonces,
        &table,
    )
    .await;
    assert!(matches!(replayed, Err(UmaError::ReplayRejected)));
}
