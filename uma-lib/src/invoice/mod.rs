//! Self-contained UMA invoice and its TLV + bech32m codec.
//!
//! An invoice is created by a receiver, transported out of band (QR code or
//! link), and consumed exactly once by resolving its callback into a pay
//! request flow. The engine does not track invoice state; `expiration` and
//! `max_num_payments` are checked by the caller.
//!
//! The wire form is a TLV stream wrapped in bech32m with human-readable
//! prefix `uma`. Decoding skips unrecognized tags, so future fields do not
//! break older readers.

mod tlv;

use bech32::{FromBase32, ToBase32, Variant};

use crate::crypto;
use crate::protocol::{
    counterparty_options_from_string, counterparty_options_to_string, CounterpartyDataOptions,
    KycStatus,
};
use crate::{Result, UmaError};

use tlv::{IntWidth, TlvReader, TlvWriter};

/// Human-readable part of the bech32m invoice encoding.
pub const INVOICE_HRP: &str = "uma";

/// Default ceiling on the encoded invoice length in characters.
pub const MAX_INVOICE_LENGTH: usize = 1024;

mod tags {
    pub const RECEIVER_UMA: u8 = 0;
    pub const INVOICE_UUID: u8 = 1;
    pub const AMOUNT: u8 = 2;
    pub const RECEIVING_CURRENCY: u8 = 3;
    pub const EXPIRATION: u8 = 4;
    pub const IS_SUBJECT_TO_TRAVEL_RULE: u8 = 5;
    pub const REQUIRED_PAYER_DATA: u8 = 6;
    pub const UMA_VERSIONS: u8 = 7;
    pub const COMMENT_CHARS_ALLOWED: u8 = 8;
    pub const SENDER_UMA: u8 = 9;
    pub const MAX_NUM_PAYMENTS: u8 = 10;
    pub const KYC_STATUS: u8 = 11;
    pub const CALLBACK: u8 = 12;
    pub const SIGNATURE: u8 = 100;
}

mod currency_tags {
    pub const CODE: u8 = 0;
    pub const NAME: u8 = 1;
    pub const SYMBOL: u8 = 2;
    pub const DECIMALS: u8 = 3;
    pub const MULTIPLIER: u8 = 4;
}

/// The currency an invoice is denominated in, nested in its own TLV record.
#[derive(Clone, Debug, PartialEq)]
pub struct InvoiceCurrency {
    pub code: String,
    pub name: String,
    pub symbol: String,
    pub decimals: i64,
    /// Millisatoshis per smallest currency unit at creation time.
    pub multiplier: f64,
}

impl InvoiceCurrency {
    fn to_tlv(&self) -> Result<Vec<u8>> {
        let mut writer = TlvWriter::new();
        writer.put_str(currency_tags::CODE, &self.code)?;
        writer.put_str(currency_tags::NAME, &self.name)?;
        writer.put_str(currency_tags::SYMBOL, &self.symbol)?;
        writer.put_int(currency_tags::DECIMALS, self.decimals, IntWidth::W1)?;
        writer.put_f64(currency_tags::MULTIPLIER, self.multiplier)?;
        Ok(writer.into_bytes())
    }

    fn from_tlv(bytes: &[u8]) -> Result<Self> {
        let mut code = None;
        let mut name = None;
        let mut symbol = None;
        let mut decimals = None;
        let mut multiplier = None;

        let mut reader = TlvReader::new(bytes);
        while let Some((tag, value)) = reader.next_record()? {
            match tag {
                currency_tags::CODE => code = Some(tlv::decode_str(tag, value)?),
                currency_tags::NAME => name = Some(tlv::decode_str(tag, value)?),
                currency_tags::SYMBOL => symbol = Some(tlv::decode_str(tag, value)?),
                currency_tags::DECIMALS => decimals = Some(tlv::decode_int(tag, value)?),
                currency_tags::MULTIPLIER => multiplier = Some(tlv::decode_f64(tag, value)?),
                _ => {}
            }
        }

        Ok(Self {
            code: required(code, "receivingCurrency.code")?,
            name: required(name, "receivingCurrency.name")?,
            symbol: required(symbol, "receivingCurrency.symbol")?,
            decimals: required(decimals, "receivingCurrency.decimals")?,
            multiplier: required(multiplier, "receivingCurrency.multiplier")?,
        })
    }
}

/// A self-contained, bech32-transportable payment request.
#[derive(Clone, Debug, PartialEq)]
pub struct Invoice {
    /// `$user@domain` address of the receiver.
    pub receiver_uma: String,

    /// Receiver-assigned unique invoice id.
    pub invoice_uuid: String,

    /// Amount in the smallest unit of `receiving_currency`.
    pub amount: i64,

    /// Currency the amount is denominated in.
    pub receiving_currency: InvoiceCurrency,

    /// Unix seconds after which the invoice must not be honored.
    pub expiration: i64,

    /// Whether the receiving VASP must exchange travel rule information.
    pub is_subject_to_travel_rule: bool,

    /// Payer data fields the receiver requires from the sender.
    pub required_payer_data: Option<CounterpartyDataOptions>,

    /// Protocol versions the receiver speaks, e.g. `"0.3,1.0"`.
    pub uma_versions: String,

    /// Maximum comment length accepted, if comments are allowed.
    pub comment_chars_allowed: Option<i64>,

    /// `$user@domain` address of the intended sender, for invoices pinned
    /// to one counterparty.
    pub sender_uma: Option<String>,

    /// How many times the invoice may be paid. Checked by the caller, not
    /// the engine.
    pub max_num_payments: Option<i64>,

    /// KYC status of the receiving user.
    pub kyc_status: Option<KycStatus>,

    /// URL the sender posts the PayRequest to.
    pub callback: String,

    /// DER ECDSA signature over the TLV encoding minus this field.
    pub signature: Option<Vec<u8>>,
}

impl Invoice {
    /// Validates the fields a well-formed invoice must carry.
    pub fn validate(&self) -> Result<()> {
        let check = |ok: bool, what: &str| -> Result<()> {
            if ok {
                Ok(())
            } else {
                Err(UmaError::InvalidInvoice(what.to_string()))
            }
        };
        check(
            self.receiver_uma.contains('@'),
            "receiverUma must be a $user@domain address",
        )?;
        check(!self.invoice_uuid.is_empty(), "invoiceUUID must not be empty")?;
        check(self.amount > 0, "amount must be positive")?;
        check(
            !self.receiving_currency.code.is_empty(),
            "receivingCurrency.code must not be empty",
        )?;
        check(self.expiration > 0, "expiration must be a unix timestamp")?;
        check(!self.uma_versions.is_empty(), "umaVersions must not be empty")?;
        check(!self.callback.is_empty(), "callback must not be empty")?;
        Ok(())
    }

    /// TLV encoding of every present field, optionally without the
    /// signature record.
    fn to_tlv(&self, include_signature: bool) -> Result<Vec<u8>> {
        let mut writer = TlvWriter::new();
        writer.put_str(tags::RECEIVER_UMA, &self.receiver_uma)?;
        writer.put_str(tags::INVOICE_UUID, &self.invoice_uuid)?;
        writer.put_int(tags::AMOUNT, self.amount, IntWidth::W8)?;
        writer.put_bytes(tags::RECEIVING_CURRENCY, &self.receiving_currency.to_tlv()?)?;
        writer.put_int(tags::EXPIRATION, self.expiration, IntWidth::W8)?;
        writer.put_bool(
            tags::IS_SUBJECT_TO_TRAVEL_RULE,
            self.is_subject_to_travel_rule,
        )?;
        if let Some(options) = &self.required_payer_data {
            writer.put_str(
                tags::REQUIRED_PAYER_DATA,
                &counterparty_options_to_string(options),
            )?;
        }
        writer.put_str(tags::UMA_VERSIONS, &self.uma_versions)?;
        if let Some(chars) = self.comment_chars_allowed {
            writer.put_int(tags::COMMENT_CHARS_ALLOWED, chars, IntWidth::W2)?;
        }
        if let Some(sender) = &self.sender_uma {
            writer.put_str(tags::SENDER_UMA, sender)?;
        }
        if let Some(payments) = self.max_num_payments {
            writer.put_int(tags::MAX_NUM_PAYMENTS, payments, IntWidth::W2)?;
        }
        if let Some(status) = self.kyc_status {
            writer.put_str(tags::KYC_STATUS, status.as_str())?;
        }
        writer.put_str(tags::CALLBACK, &self.callback)?;
        if include_signature {
            if let Some(signature) = &self.signature {
                writer.put_bytes(tags::SIGNATURE, signature)?;
            }
        }
        Ok(writer.into_bytes())
    }

    fn from_tlv(bytes: &[u8]) -> Result<Self> {
        let mut receiver_uma = None;
        let mut invoice_uuid = None;
        let mut amount = None;
        let mut receiving_currency = None;
        let mut expiration = None;
        let mut is_subject_to_travel_rule = None;
        let mut required_payer_data = None;
        let mut uma_versions = None;
        let mut comment_chars_allowed = None;
        let mut sender_uma = None;
        let mut max_num_payments = None;
        let mut kyc_status = None;
        let mut callback = None;
        let mut signature = None;

        let mut reader = TlvReader::new(bytes);
        while let Some((tag, value)) = reader.next_record()? {
            match tag {
                tags::RECEIVER_UMA => receiver_uma = Some(tlv::decode_str(tag, value)?),
                tags::INVOICE_UUID => invoice_uuid = Some(tlv::decode_str(tag, value)?),
                tags::AMOUNT => amount = Some(tlv::decode_int(tag, value)?),
                tags::RECEIVING_CURRENCY => {
                    receiving_currency = Some(InvoiceCurrency::from_tlv(value)?)
                }
                tags::EXPIRATION => expiration = Some(tlv::decode_int(tag, value)?),
                tags::IS_SUBJECT_TO_TRAVEL_RULE => {
                    is_subject_to_travel_rule = Some(tlv::decode_bool(tag, value)?)
                }
                tags::REQUIRED_PAYER_DATA => {
                    required_payer_data = Some(counterparty_options_from_string(
                        &tlv::decode_str(tag, value)?,
                    )?)
                }
                tags::UMA_VERSIONS => uma_versions = Some(tlv::decode_str(tag, value)?),
                tags::COMMENT_CHARS_ALLOWED => {
                    comment_chars_allowed = Some(tlv::decode_int(tag, value)?)
                }
                tags::SENDER_UMA => sender_uma = Some(tlv::decode_str(tag, value)?),
                tags::MAX_NUM_PAYMENTS => max_num_payments = Some(tlv::decode_int(tag, value)?),
                tags::KYC_STATUS => {
                    kyc_status = Some(KycStatus::parse(&tlv::decode_str(tag, value)?)?)
                }
                tags::CALLBACK => callback = Some(tlv::decode_str(tag, value)?),
                tags::SIGNATURE => signature = Some(value.to_vec()),
                // Unrecognized tags are skipped for forward compatibility.
                _ => {}
            }
        }

        let invoice = Self {
            receiver_uma: required(receiver_uma, "receiverUma")?,
            invoice_uuid: required(invoice_uuid, "invoiceUUID")?,
            amount: required(amount, "amount")?,
            receiving_currency: required(receiving_currency, "receivingCurrency")?,
            expiration: required(expiration, "expiration")?,
            is_subject_to_travel_rule: required(
                is_subject_to_travel_rule,
                "isSubjectToTravelRule",
            )?,
            required_payer_data,
            uma_versions: required(uma_versions, "umaVersions")?,
            comment_chars_allowed,
            sender_uma,
            max_num_payments,
            kyc_status,
            callback: required(callback, "callback")?,
            signature,
        };
        invoice.validate()?;
        Ok(invoice)
    }

    /// Canonical byte payload covered by `signature`: the TLV encoding of
    /// every field except the signature itself.
    pub fn signable_payload(&self) -> Result<Vec<u8>> {
        self.to_tlv(false)
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| UmaError::InvalidInvoice(format!("missing required field {field}")))
}

/// Signs an invoice with the receiving VASP's signing key, replacing any
/// prior signature.
pub fn sign_invoice(invoice: &mut Invoice, signing_private_key: &[u8]) -> Result<()> {
    let signature_hex = crypto::sign_payload(&invoice.signable_payload()?, signing_private_key)?;
    let signature = hex::decode(signature_hex)
        .map_err(|e| UmaError::Internal(format!("signature hex round trip failed: {e}")))?;
    invoice.signature = Some(signature);
    Ok(())
}

/// Verifies the invoice signature against the receiving VASP's signing key.
pub fn verify_invoice_signature(invoice: &Invoice, signing_pubkey: &[u8]) -> Result<()> {
    let signature = invoice
        .signature
        .as_ref()
        .ok_or_else(|| UmaError::InvalidSignature("invoice is unsigned".to_string()))?;
    let verified = crypto::verify_ecdsa(
        &invoice.signable_payload()?,
        &hex::encode(signature),
        signing_pubkey,
    )?;
    if !verified {
        return Err(UmaError::InvalidSignature(
            "invoice signature does not verify".to_string(),
        ));
    }
    Ok(())
}

/// Encodes an invoice as a bech32m string with HRP `uma`, bounded by
/// [`MAX_INVOICE_LENGTH`] characters.
pub fn encode_invoice_bech32(invoice: &Invoice) -> Result<String> {
    encode_invoice_bech32_with_limit(invoice, MAX_INVOICE_LENGTH)
}

/// Like [`encode_invoice_bech32`] with a caller-chosen length ceiling.
pub fn encode_invoice_bech32_with_limit(invoice: &Invoice, max_length: usize) -> Result<String> {
    invoice.validate()?;
    let payload = invoice.to_tlv(true)?;
    let encoded = bech32::encode(INVOICE_HRP, payload.to_base32(), Variant::Bech32m)
        .map_err(|e| UmaError::Codec(format!("bech32 encoding failed: {e}")))?;
    if encoded.len() > max_length {
        return Err(UmaError::Codec(format!(
            "encoded invoice is {} chars, limit is {max_length}",
            encoded.len()
        )));
    }
    Ok(encoded)
}

/// Decodes a bech32m invoice string back into an [`Invoice`].
pub fn decode_invoice_bech32(encoded: &str) -> Result<Invoice> {
    let (hrp, data, variant) =
        bech32::decode(encoded).map_err(|e| UmaError::Codec(format!("bech32: {e}")))?;
    if hrp != INVOICE_HRP {
        return Err(UmaError::Codec(format!(
            "unexpected bech32 prefix {hrp:?}, expected {INVOICE_HRP:?}"
        )));
    }
    if variant != Variant::Bech32m {
        return Err(UmaError::Codec("invoice must use bech32m".to_string()));
    }
    let payload = Vec::<u8>::from_base32(&data)
        .map_err(|e| UmaError::Codec(format!("bech32 payload: {e}")))?;
    Invoice::from_tlv(&payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::standard_counterparty_options;

    fn test_invoice() -> Invoice {
        Invoice {
            receiver_uma: "$bob@vasp2.com".to_string(),
            invoice_uuid: "2c4edb7a-66a4-4d1e-a5a0-2e85e7cc9e2a".to_string(),
            amount: 1000,
            receiving_currency: InvoiceCurrency {
                code: "USD".to_string(),
                name: "US Dollars".to_string(),
                symbol: "$".to_string(),
                decimals: 2,
                multiplier: 34_150.0,
            },
            expiration: 1_700_010_000,
            is_subject_to_travel_rule: true,
            required_payer_data: Some(standard_counterparty_options(false, false)),
            uma_versions: "0.3,1.0".to_string(),
            comment_chars_allowed: Some(140),
            sender_uma: Some("$alice@vasp1.com".to_string()),
            max_num_payments: Some(1),
            kyc_status: Some(KycStatus::Verified),
            callback: "https://vasp2.com/api/uma/payreq/bob".to_string(),
            signature: None,
        }
    }

    #[test]
    fn test_bech32_round_trip() {
        let invoice = test_invoice();
        let encoded = encode_invoice_bech32(&invoice).unwrap();
        assert!(encoded.starts_with("uma1"));
        assert!(encoded.len() <= MAX_INVOICE_LENGTH);

        let decoded = decode_invoice_bech32(&encoded).unwrap();
        assert_eq!(decoded, invoice);
    }

    #[test]
    fn test_round_trip_with_absent_optionals() {
        let invoice = Invoice {
            required_payer_data: None,
            comment_chars_allowed: None,
            sender_uma: None,
            max_num_payments: None,
            kyc_status: None,
            ..test_invoice()
        };
        let decoded = decode_invoice_bech32(&encode_invoice_bech32(&invoice).unwrap()).unwrap();
        assert_eq!(decoded, invoice);
    }

    #[test]
    fn test_signed_round_trip_verifies() {
        use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};

        let secret = [0x42u8; 32];
        let secp = Secp256k1::new();
        let public = PublicKey::from_secret_key(&secp, &SecretKey::from_slice(&secret).unwrap());

        let mut invoice = test_invoice();
        sign_invoice(&mut invoice, &secret).unwrap();

        let decoded = decode_invoice_bech32(&encode_invoice_bech32(&invoice).unwrap()).unwrap();
        verify_invoice_signature(&decoded, &public.serialize()).unwrap();

        // Any field change invalidates the signature.
        let mut tampered = decoded.clone();
        tampered.amount += 1;
        assert!(verify_invoice_signature(&tampered, &public.serialize()).is_err());
    }

    #[test]
    fn test_unknown_tag_skipped() {
        let invoice = test_invoice();
        let mut payload = invoice.to_tlv(true).unwrap();
        // Append a record with an unassigned tag.
        payload.extend_from_slice(&[77, 3, 1, 2, 3]);

        let encoded = bech32::encode(INVOICE_HRP, payload.to_base32(), Variant::Bech32m).unwrap();
        let decoded = decode_invoice_bech32(&encoded).unwrap();
        assert_eq!(decoded, invoice);
    }

    #[test]
    fn test_missing_required_field_is_invalid_invoice() {
        let invoice = test_invoice();
        let mut writer = TlvWriter::new();
        // Only the receiver address; everything else missing.
        writer.put_str(tags::RECEIVER_UMA, &invoice.receiver_uma).unwrap();
        let encoded =
            bech32::encode(INVOICE_HRP, writer.into_bytes().to_base32(), Variant::Bech32m)
                .unwrap();

        assert!(matches!(
            decode_invoice_bech32(&encoded),
            Err(UmaError::InvalidInvoice(_))
        ));
    }

    #[test]
    fn test_wrong_hrp_rejected() {
        let invoice = test_invoice();
        let payload = invoice.to_tlv(true).unwrap();
        let encoded = bech32::encode("lnurl", payload.to_base32(), Variant::Bech32m).unwrap();
        assert!(decode_invoice_bech32(&encoded).is_err());
    }

    #[test]
    fn test_bech32_variant_enforced() {
        let invoice = test_invoice();
        let payload = invoice.to_tlv(true).unwrap();
        let encoded = bech32::encode(INVOICE_HRP, payload.to_base32(), Variant::Bech32).unwrap();
        assert!(matches!(
            decode_invoice_bech32(&encoded),
            Err(UmaError::Codec(_))
        ));
    }

    #[test]
    fn test_length_ceiling() {
        let invoice = test_invoice();
        assert!(matches!(
            encode_invoice_bech32_with_limit(&invoice, 32),
            Err(UmaError::Codec(_))
        ));
    }

    #[test]
    fn test_width_constraint_enforced_on_encode() {
        let mut invoice = test_invoice();
        invoice.comment_chars_allowed = Some(100_000);
        assert!(matches!(
            encode_invoice_bech32(&invoice),
            Err(UmaError::Codec(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let mut invoice = test_invoice();
        invoice.amount = 0;
        assert!(invoice.validate().is_err());

        let mut invoice = test_invoice();
        invoice.receiver_uma = "bob".to_string();
        assert!(invoice.validate().is_err());

        let mut invoice = test_invoice();
        invoice.callback = String::new();
        assert!(invoice.validate().is_err());
    }
}
