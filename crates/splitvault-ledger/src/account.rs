//! Holding accounts and transfer legs.

use serde::{Deserialize, Serialize};
use splitvault_types::{Address, AssetId};

/// A balance of one asset held at one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingAccount {
    pub address: Address,
    /// Identity that must authorize outbound transfers.
    pub owner: Address,
    pub asset: AssetId,
    /// Raw units held.
    pub amount: u64,
    /// Fee payer that funded creation, if any.
    pub funded_by: Option<Address>,
}

impl HoldingAccount {
    /// A zero-balance account.
    #[must_use]
    pub fn empty(address: Address, owner: Address, asset: AssetId) -> Self {
        Self {
            address,
            owner,
            asset,
            amount: 0,
            funded_by: None,
        }
    }

    /// Custody accounts own themselves.
    #[must_use]
    pub fn is_self_owned(&self) -> bool {
        self.owner == self.address
    }
}

/// One credit within a multi-leg transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLeg {
    pub destination: Address,
    pub amount: u64,
}

impl TransferLeg {
    #[must_use]
    pub fn new(destination: Address, amount: u64) -> Self {
        Self {
            destination,
            amount,
        }
    }
}
