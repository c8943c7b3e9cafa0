//! Asset metadata.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::AssetId;

/// A registered fungible asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub id: AssetId,
    /// Ticker, e.g. "USDC".
    pub symbol: String,
    /// Number of decimal places one whole unit is split into.
    pub decimals: u32,
}

impl AssetInfo {
    /// Describe an asset whose id is derived from its symbol.
    #[must_use]
    pub fn new(symbol: impl Into<String>, decimals: u32) -> Self {
        let symbol = symbol.into();
        Self {
            id: AssetId::from_symbol(&symbol),
            symbol,
            decimals,
        }
    }

    /// Convert raw units to whole units, e.g. `30_000000` → `30.000000`
    /// for a 6-decimal asset.
    #[must_use]
    pub fn ui_amount(&self, raw: u64) -> Decimal {
        Decimal::from_i128_with_scale(i128::from(raw), self.decimals)
    }
}
