//! Fee payers fund the creation of new holding accounts.

use splitvault_types::{Address, Result, VaultError};

/// Pays for materializing holding accounts on first use.
pub trait FeePayer {
    /// Identity recorded as the funder of created accounts.
    fn address(&self) -> Address;

    /// Whether `accounts` more creations can be funded right now.
    fn can_fund(&self, accounts: usize) -> bool;

    /// Pay for one account creation.
    ///
    /// # Errors
    /// Returns [`VaultError::FeePayerExhausted`] when funds run out.
    fn fund_account(&mut self, account: &Address) -> Result<()>;

    /// Undo a [`FeePayer::fund_account`] whose account creation was rolled
    /// back. No-op for accounts this payer did not fund.
    fn refund_account(&mut self, account: &Address);
}

/// Fee payer drawing a fixed cost per account from a prepaid budget.
#[derive(Debug, Clone)]
pub struct PrepaidFeePayer {
    address: Address,
    remaining: u64,
    cost_per_account: u64,
    funded: Vec<Address>,
}

impl PrepaidFeePayer {
    #[must_use]
    pub fn new(address: Address, budget: u64, cost_per_account: u64) -> Self {
        Self {
            address,
            remaining: budget,
            cost_per_account,
            funded: Vec::new(),
        }
    }

    /// Budget left.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    #[must_use]
    pub fn cost_per_account(&self) -> u64 {
        self.cost_per_account
    }

    /// Accounts funded so far, in creation order.
    #[must_use]
    pub fn funded_accounts(&self) -> &[Address] {
        &self.funded
    }
}

impl FeePayer for PrepaidFeePayer {
    fn address(&self) -> Address {
        self.address
    }

    fn can_fund(&self, accounts: usize) -> bool {
        u64::try_from(accounts)
            .ok()
            .and_then(|n| n.checked_mul(self.cost_per_account))
            .is_some_and(|cost| cost <= self.remaining)
    }

    fn fund_account(&mut self, account: &Address) -> Result<()> {
        if self.remaining < self.cost_per_account {
            return Err(VaultError::FeePayerExhausted {
                payer: self.address,
                required: 1,
            });
        }
        self.remaining -= self.cost_per_account;
        self.funded.push(*account);
        tracing::debug!(
            payer = %self.address,
            account = %account,
            remaining = self.remaining,
            "Account creation funded"
        );
        Ok(())
    }

    fn refund_account(&mut self, account: &Address) {
        let Some(pos) = self.funded.iter().rposition(|a| a == account) else {
            return;
        };
        self.funded.remove(pos);
        self.remaining += self.cost_per_account;
        tracing::debug!(
            payer = %self.address,
            account = %account,
            remaining = self.remaining,
            "Account creation refunded"
        );
    }
}
