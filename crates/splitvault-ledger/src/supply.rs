//! Supply conservation invariant checker.
//!
//! Mathematical invariant enforced by the ledger:
//! ```text
//! ∀ asset: Σ(account balances) == Σ(minted)
//! ```
//!
//! Transfers only move value between accounts. If the sum of balances ever
//! drifts from what was minted, value was created or destroyed.

use std::collections::HashMap;

use splitvault_types::{AssetId, Result, VaultError};

/// Tracks per-asset minted totals and validates held balances against them.
#[derive(Debug, Clone, Default)]
pub struct SupplyConservation {
    /// Total minted per asset since genesis.
    minted: HashMap<AssetId, u128>,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record newly minted units.
    pub fn record_mint(&mut self, asset: &AssetId, amount: u64) {
        *self.minted.entry(*asset).or_insert(0) += u128::from(amount);
    }

    /// Expected total supply for an asset.
    #[must_use]
    pub fn expected_supply(&self, asset: &AssetId) -> u128 {
        self.minted.get(asset).copied().unwrap_or(0)
    }

    /// Verify the actual held supply against the minted total.
    ///
    /// # Errors
    /// Returns [`VaultError::ConservationViolation`] if actual ≠ expected.
    pub fn verify(&self, asset: &AssetId, actual_supply: u128) -> Result<()> {
        let expected = self.expected_supply(asset);
        if actual_supply != expected {
            return Err(VaultError::ConservationViolation {
                reason: format!("{asset}: held supply {actual_supply} != minted {expected}"),
            });
        }
        Ok(())
    }

    /// All assets that have ever been minted.
    #[must_use]
    pub fn tracked_assets(&self) -> Vec<AssetId> {
        self.minted.keys().copied().collect()
    }
}
