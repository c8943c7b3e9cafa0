//! Post-settlement conservation audit.
//!
//! ```text
//! custody_before - custody_after == amount
//! Σ(dest_after - dest_before)    == amount
//! ```
//!
//! Captured after destination accounts exist and before the transfer; checked
//! right after it, inside the same ledger transaction, so a failure rolls
//! the transfer back. A failure means the ledger moved value it was not
//! asked to move.

use std::collections::BTreeMap;

use splitvault_ledger::AssetLedger;
use splitvault_types::{Address, Result, VaultError};

/// Balances of the accounts a settlement touches, taken before it runs.
#[derive(Debug, Clone)]
pub struct SettlementAudit {
    custody: Address,
    custody_before: u64,
    /// Deduplicated destinations (merchant may also be the fee receiver).
    destinations_before: BTreeMap<Address, u64>,
}

impl SettlementAudit {
    /// Snapshot custody and destination balances.
    ///
    /// # Errors
    /// Returns `RecordNotFound` if any account does not exist yet.
    pub fn capture<L: AssetLedger + ?Sized>(
        ledger: &L,
        custody: Address,
        destinations: &[Address],
    ) -> Result<Self> {
        let custody_before = ledger.balance_of(&custody)?;
        let mut destinations_before = BTreeMap::new();
        for dest in destinations {
            if !destinations_before.contains_key(dest) {
                destinations_before.insert(*dest, ledger.balance_of(dest)?);
            }
        }
        Ok(Self {
            custody,
            custody_before,
            destinations_before,
        })
    }

    /// Check that exactly `amount` left custody and arrived at the
    /// destinations. Returns the custody balance after the settlement.
    ///
    /// # Errors
    /// Returns [`VaultError::ConservationViolation`] on any mismatch.
    pub fn verify<L: AssetLedger + ?Sized>(&self, ledger: &L, amount: u64) -> Result<u64> {
        let custody_after = ledger.balance_of(&self.custody)?;
        let released = self.custody_before.checked_sub(custody_after);
        if released != Some(amount) {
            return Err(self.violation(format!(
                "custody {} moved from {} to {custody_after}, expected release of {amount}",
                self.custody, self.custody_before
            )));
        }

        let mut received: u128 = 0;
        for (dest, before) in &self.destinations_before {
            let after = ledger.balance_of(dest)?;
            let Some(delta) = after.checked_sub(*before) else {
                return Err(self.violation(format!("destination {dest} decreased from {before} to {after}")));
            };
            received += u128::from(delta);
        }
        if received != u128::from(amount) {
            return Err(self.violation(format!(
                "destinations received {received}, custody released {amount}"
            )));
        }
        Ok(custody_after)
    }

    fn violation(&self, reason: String) -> VaultError {
        tracing::error!(custody = %self.custody, %reason, "Settlement conservation violated");
        VaultError::ConservationViolation { reason }
    }
}
