//! Out-of-band invoice transport.
//!
//! A receiver mints a signed invoice, carries it through the bech32m text
//! form (a QR code or link), and a sender decodes it, checks the caller-side
//! lifecycle fields, verifies the signature against the receiver's published
//! key, and starts a pay request flow against the embedded callback.

use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};

use uma_lib::invoice::MAX_INVOICE_LENGTH;
use uma_lib::prelude::*;
use uma_lib::protocol::standard_counterparty_options;

fn pubkey_for(secret: &[u8; 32]) -> Vec<u8> {
    let secp = Secp256k1::new();
    PublicKey::from_secret_key(&secp, &SecretKey::from_slice(secret).unwrap())
        .serialize()
        .to_vec()
}

fn usd_invoice_currency() -> InvoiceCurrency {
    InvoiceCurrency {
        code: "USD".to_string(),
        name: "US Dollars".to_string(),
        symbol: "$".to_string(),
        decimals: 2,
        multiplier: 34_150.0,
    }
}

#[test]
fn invoice_survives_qr_transport() {
    let receiver_signing_key = [0x20u8; 32];
    let table = ProtocolVersionTable::current();

    let invoice = get_signed_uma_invoice(
        "$bob@vasp2.com",
        "8d9c3a1e-5f7b-4f31-bb6e-33a1c56e8a90",
        2500,
        usd_invoice_currency(),
        1_700_010_000,
        true,
        Some(standard_counterparty_options(true, false)),
        &table,
        Some(140),
        Some("$alice@vasp1.com"),
        Some(1),
        Some(KycStatus::Verified),
        "https://vasp2.com/api/uma/payreq/bob",
        &receiver_signing_key,
    )
    .unwrap();

    let text = encode_invoice_bech32(&invoice).unwrap();
    assert!(text.starts_with("uma1"));
    assert!(text.len() <= MAX_INVOICE_LENGTH);

    // Sender side: decode, verify, inspect.
    let decoded = decode_invoice_bech32(&text).unwrap();
    assert_eq!(decoded, invoice);

    verify_invoice_signature(&decoded, &pubkey_for(&receiver_signing_key)).unwrap();

    // Lifecycle fields are the caller's to enforce.
    assert!(decoded.expiration > 0);
    assert_eq!(decoded.max_num_payments, Some(1));
    assert_eq!(decoded.sender_uma.as_deref(), Some("$alice@vasp1.com"));

    // The embedded data is enough to start the pay request flow.
    assert_eq!(decoded.callback, "https://vasp2.com/api/uma/payreq/bob");
    assert_eq!(decoded.receiving_currency.code, "USD");
    let required = decoded.required_payer_data.unwrap();
    assert!(required.get("compliance").unwrap().mandatory);
    assert!(required.get("name").unwrap().mandatory);
}

#[test]
fn tampered_invoice_text_is_rejected() {
    let receiver_signing_key = [0x20u8; 32];
    let invoice = get_signed_uma_invoice(
        "$bob@vasp2.com",
        "8d9c3a1e-5f7b-4f31-bb6e-33a1c56e8a90",
        2500,
        usd_invoice_currency(),
        1_700_010_000,
        false,
        None,
        &ProtocolVersionTable::current(),
        None,
        None,
        None,
        None,
        "https://vasp2.com/api/uma/payreq/bob",
        &receiver_signing_key,
    )
    .unwrap();

    let text = encode_invoice_bech32(&invoice).unwrap();

    // Any flipped character breaks the bech32m checksum.
    let mut tampered: Vec<char> = text.chars().collect();
    let last = tampered.len() - 1;
    tampered[last] = if tampered[last] == 'q' { 'p' } else { 'q' };
    let tampered: String = tampered.into_iter().collect();
    assert!(decode_invoice_bech32(&tampered).is_err());
}

#[test]
fn wrong_receiver_key_fails_verification() {
    let receiver_signing_key = [0x20u8; 32];
    let other_key = [0x30u8; 32];
    let invoice = get_signed_uma_invoice(
        "$bob@vasp2.com",
        "8d9c3a1e-5f7b-4f31-bb6e-33a1c56e8a90",
        2500,
        usd_invoice_currency(),
        1_700_010_000,
        false,
        None,
        &ProtocolVersionTable::current(),
        None,
        None,
        None,
        None,
        "https://vasp2.com/api/uma/payreq/bob",
        &receiver_signing_key,
    )
    .unwrap();

    let decoded = decode_invoice_bech32(&encode_invoice_bech32(&invoice).unwrap()).unwrap();
    assert!(verify_invoice_signature(&decoded, &pubkey_for(&other_key)).is_err());
}
