//! # Asset Symbols and Amounts
//!
//! Value on the ledger is denominated in whole units of an asset. Amounts
//! are `u64`; every arithmetic path that can overflow uses checked math.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Quantity of an asset in its smallest unit.
pub type Amount = u64;

/// A validated asset symbol, e.g. `WETH` or `USD-C`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetId(String);

impl AssetId {
    /// Create a validated asset symbol.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidAsset`] unless the symbol is 1-16 chars
    /// of uppercase ASCII letters, digits, `-` or `_`.
    pub fn new(symbol: impl Into<String>) -> Result<Self, CoreError> {
        let symbol = symbol.into();
        let valid = !symbol.is_empty()
            && symbol.len() <= 16
            && symbol
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if !valid {
            return Err(CoreError::InvalidAsset(symbol));
        }
        Ok(Self(symbol))
    }

    /// The default stake asset, `WETH`.
    pub fn weth() -> Self {
        Self("WETH".to_string())
    }

    /// The symbol as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AssetId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AssetId> for String {
    fn from(value: AssetId) -> Self {
        value.0
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
