//! Receiving-currency descriptions advertised in an LNURLP response.

use serde::{Deserialize, Serialize};

use crate::{Result, UmaError};

/// A currency the receiving VASP can settle into.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Currency {
    /// ISO 4217-style currency code, e.g. "USD".
    pub code: String,

    /// Full display name, e.g. "US Dollars".
    pub name: String,

    /// Display symbol, e.g. "$".
    pub symbol: String,

    /// Millisatoshis (or smallest settlement unit) per smallest unit of this
    /// currency. The committed conversion rate.
    pub multiplier: f64,

    /// Minimum amount the receiver will accept, in the currency's smallest
    /// unit.
    pub min_sendable: i64,

    /// Maximum amount the receiver will accept, in the currency's smallest
    /// unit.
    pub max_sendable: i64,

    /// Number of digits after the decimal point in the currency's display
    /// convention (e.g. 2 for USD cents).
    pub decimals: i32,
}

impl Currency {
    /// Validates the invariants a currency entry must satisfy before it is
    /// advertised to a counterparty.
    pub fn validate(&self) -> Result<()> {
        if self.code.is_empty() {
            return Err(UmaError::invalid_input("currency.code", "must not be empty"));
        }
        if self.min_sendable > self.max_sendable {
            return Err(UmaError::invalid_input(
                "currency.minSendable",
                "must not exceed maxSendable",
            ));
        }
        if self.min_sendable < 0 {
            return Err(UmaError::invalid_input(
                "currency.minSendable",
                "must not be negative",
            ));
        }
        if !(self.multiplier.is_finite() && self.multiplier > 0.0) {
            return Err(UmaError::invalid_input(
                "currency.multiplier",
                "must be a positive finite number",
            ));
        }
        if self.decimals < 0 {
            return Err(UmaError::invalid_input(
                "currency.decimals",
                "must not be negative",
            ));
        }
        Ok(())
    }
}
