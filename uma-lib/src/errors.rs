//! Error types for UMA protocol operations.
//!
//! This module provides structured error types for the UMA engine, enabling
//! precise error handling and recovery strategies. The engine never produces
//! an HTTP response itself; callers translate errors into transport responses
//! using [`UmaError::http_status`].

use std::fmt;

/// Error codes for machine-readable error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum UmaErrorCode {
    /// Counterparty public-key or HTTP lookup failed
    CounterpartyFetchFailed = 2000,
    /// Signature verification returned false
    InvalidSignature = 3000,
    /// Signature bytes malformed
    InvalidSignatureFormat = 3001,
    /// Public key bytes or certificate malformed
    InvalidPublicKeyFormat = 3002,
    /// Cryptographic operation failed
    Crypto = 3003,
    /// Counterparty protocol major version unsupported
    UnsupportedVersion = 4100,
    /// No common protocol major version with counterparty
    NoCompatibleVersion = 4101,
    /// Nonce reuse or stale timestamp
    ReplayRejected = 4200,
    /// Malformed field
    InvalidInput = 5000,
    /// Malformed amount string
    InvalidAmount = 5001,
    /// Malformed version string
    InvalidVersionString = 5002,
    /// TLV or bech32 decode failure
    Codec = 5100,
    /// Decoded invoice failed schema validation
    InvalidInvoice = 5101,
    /// Serialization error
    Serialization = 5200,
    /// Invoice-creator capability returned no invoice
    FailedToCreateInvoice = 6000,
    /// Internal/unexpected error
    Internal = 9999,
}

/// Comprehensive error type for UMA protocol operations.
#[derive(Debug)]
pub enum UmaError {
    /// Public-key discovery or another counterparty lookup failed.
    CounterpartyFetchFailed {
        /// Domain of the counterparty VASP
        domain: String,
        /// Underlying failure message
        reason: String,
    },

    /// Signature verification returned false for a structurally valid signature.
    InvalidSignature(String),

    /// Signature bytes could not be decoded (hex or DER).
    InvalidSignatureFormat(String),

    /// Public key bytes or certificate could not be decoded, or the key is
    /// not an EC secp256k1 key.
    InvalidPublicKeyFormat(String),

    /// A cryptographic primitive failed (signing, encryption).
    Crypto(String),

    /// The counterparty's protocol major version is not supported.
    ///
    /// Carries the supported major list so the caller can retry with a
    /// compatible version rather than abort.
    UnsupportedVersion {
        /// The version the counterparty asked for
        version: String,
        /// Major versions this engine supports
        supported_major_versions: Vec<u16>,
    },

    /// Version negotiation found no common major version.
    NoCompatibleVersion {
        /// Major versions this engine supports
        supported_major_versions: Vec<u16>,
    },

    /// Nonce reuse or stale timestamp. Deliberately carries no detail
    /// distinguishing the two causes.
    ReplayRejected,

    /// Invalid field in a wire message.
    InvalidInput {
        /// Field or parameter name
        field: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Malformed amount string.
    InvalidAmount {
        /// The offending amount string
        value: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Malformed protocol version string.
    InvalidVersionString(String),

    /// TLV or bech32 decode failure. Always fatal to that decode attempt.
    Codec(String),

    /// A decoded invoice failed schema validation.
    InvalidInvoice(String),

    /// Serialization/deserialization error.
    Serialization(String),

    /// The invoice-creator capability returned no invoice.
    FailedToCreateInvoice(String),

    /// Internal/unexpected error.
    Internal(String),
}

impl UmaError {
    /// Get the machine-readable error code.
    pub fn code(&self) -> UmaErrorCode {
        match self {
            Self::CounterpartyFetchFailed { .. } => UmaErrorCode::CounterpartyFetchFailed,
            Self::InvalidSignature(_) => UmaErrorCode::InvalidSignature,
            Self::InvalidSignatureFormat(_) => UmaErrorCode::InvalidSignatureFormat,
            Self::InvalidPublicKeyFormat(_) => UmaErrorCode::InvalidPublicKeyFormat,
            Self::Crypto(_) => UmaErrorCode::Crypto,
            Self::UnsupportedVersion { .. } => UmaErrorCode::UnsupportedVersion,
            Self::NoCompatibleVersion { .. } => UmaErrorCode::NoCompatibleVersion,
            Self::ReplayRejected => UmaErrorCode::ReplayRejected,
            Self::InvalidInput { .. } => UmaErrorCode::InvalidInput,
            Self::InvalidAmount { .. } => UmaErrorCode::InvalidAmount,
            Self::InvalidVersionString(_) => UmaErrorCode::InvalidVersionString,
            Self::Codec(_) => UmaErrorCode::Codec,
            Self::InvalidInvoice(_) => UmaErrorCode::InvalidInvoice,
            Self::Serialization(_) => UmaErrorCode::Serialization,
            Self::FailedToCreateInvoice(_) => UmaErrorCode::FailedToCreateInvoice,
            Self::Internal(_) => UmaErrorCode::Internal,
        }
    }

    /// Get the error message as an owned String.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns true if this error is potentially recoverable by retrying.
    ///
    /// Retries themselves are the HTTP collaborator's responsibility; the
    /// engine only classifies.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CounterpartyFetchFailed { .. })
    }

    /// Suggested HTTP status code for transport-facing callers.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::CounterpartyFetchFailed { .. } | Self::NoCompatibleVersion { .. } => 424,
            Self::InvalidSignature(_) => 401,
            Self::UnsupportedVersion { .. } => 412,
            Self::Crypto(_) | Self::FailedToCreateInvoice(_) | Self::Internal(_) => 500,
            _ => 400,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid amount error.
    pub fn invalid_amount(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAmount {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a counterparty fetch error from any error type.
    pub fn fetch_failed(domain: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::CounterpartyFetchFailed {
            domain: domain.into(),
            reason: err.to_string(),
        }
    }
}

impl fmt::Display for UmaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CounterpartyFetchFailed { domain, reason } => {
                write!(f, "fetch from counterparty {} failed: {}", domain, reason)
            }
            Self::InvalidSignature(msg) => write!(f, "invalid signature: {}", msg),
            Self::InvalidSignatureFormat(msg) => {
                write!(f, "malformed signature: {}", msg)
            }
            Self::InvalidPublicKeyFormat(msg) => {
                write!(f, "malformed public key: {}", msg)
            }
            Self::Crypto(msg) => write!(f, "crypto error: {}", msg),
            Self::UnsupportedVersion {
                version,
                supported_major_versions,
            } => {
                write!(
                    f,
                    "unsupported protocol version {} (supported majors: {:?})",
                    version, supported_major_versions
                )
            }
            Self::NoCompatibleVersion {
                supported_major_versions,
            } => {
                write!(
                    f,
                    "no compatible protocol version (supported majors: {:?})",
                    supported_major_versions
                )
            }
            Self::ReplayRejected => write!(f, "message rejected by replay guard"),
            Self::InvalidInput { field, reason } => {
                write!(f, "invalid {}: {}", field, reason)
            }
            Self::InvalidAmount { value, reason } => {
                write!(f, "invalid amount {:?}: {}", value, reason)
            }
            Self::InvalidVersionString(v) => write!(f, "invalid version string {:?}", v),
            Self::Codec(msg) => write!(f, "codec error: {}", msg),
            Self::InvalidInvoice(msg) => write!(f, "invalid invoice: {}", msg),
            Self::Serialization(msg) => write!(f, "serialization error: {}", msg),
            Self::FailedToCreateInvoice(msg) => {
                write!(f, "failed to create invoice: {}", msg)
            }
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for UmaError {}

impl From<serde_json::Error> for UmaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
