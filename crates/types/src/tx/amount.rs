// Path: crates/types/src/tx/amount.rs

//! Decimal token amounts.
//!
//! Amounts travel on the wire as decimal strings so that the canonical
//! encoding never depends on a binary float representation. Arithmetic
//! happens on [`rust_decimal::Decimal`], parsed on demand.

use crate::error::TxError;
use parity_scale_codec::{Decode, Encode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A token amount rendered as a decimal string.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct TokenAmount(pub String);

impl TokenAmount {
    /// Wraps a decimal string without validating it.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The zero amount.
    pub fn zero() -> Self {
        Self("0".to_string())
    }

    /// Parses the amount into a [`Decimal`] for arithmetic.
    pub fn decimal(&self) -> Result<Decimal, TxError> {
        Decimal::from_str(&self.0).map_err(|e| TxError::InvalidAmount {
            value: self.0.clone(),
            reason: e.to_string(),
        })
    }

    /// Returns true if the amount parses and is zero.
    pub fn is_zero(&self) -> bool {
        self.decimal().map(|d| d.is_zero()).unwrap_or(false)
    }

    /// The canonical encoded length of this field, used when computing a
    /// transaction's economic size.
    pub fn encoded_len(&self) -> usize {
        self.encode().len()
    }
}

impl Default for TokenAmount {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<&str> for TokenAmount {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_strings() {
        assert_eq!(
            TokenAmount::from("0.1").decimal().unwrap(),
            Decimal::from_str("0.1").unwrap()
        );
        assert!(TokenAmount::zero().is_zero());
    }

    #[test]
    fn rejects_garbage() {
        let err = TokenAmount::from("ten").decimal().unwrap_err();
        assert!(matches!(err, TxError::InvalidAmount { .. }));
    }
}
