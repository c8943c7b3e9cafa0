//! Settlement request, split, and receipt types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Address, AssetId, SettlementId};

/// The optional third participant of a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Referrer {
    None,
    Some {
        /// The referrer's identity.
        identity: Address,
        /// The referrer's holding account for the vault asset.
        destination: Address,
    },
}

impl Referrer {
    #[must_use]
    pub fn is_some(&self) -> bool {
        matches!(self, Self::Some { .. })
    }

    /// `(identity, destination)` when present.
    #[must_use]
    pub fn parts(&self) -> Option<(Address, Address)> {
        match *self {
            Self::None => None,
            Self::Some {
                identity,
                destination,
            } => Some((identity, destination)),
        }
    }
}

/// A merchant's request to settle part of a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettleRequest {
    /// Custody address of the vault being settled.
    pub vault: Address,
    /// Raw units to move out of custody.
    pub amount: u64,
    /// Fee share in basis points.
    pub fee_bps: u16,
    /// Referrer share in basis points.
    pub referrer_bps: u16,
    pub referrer: Referrer,
    /// Identity of the fee receiver.
    pub fee_receiver: Address,
    /// Fee receiver's holding account for the vault asset.
    pub fee_destination: Address,
    /// Merchant's holding account for the vault asset.
    pub merchant_destination: Address,
}

/// How a settled amount was divided.
///
/// `merchant_amount + referrer_amount + fee_amount` always equals the
/// settled amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SettlementSplit {
    pub merchant_amount: u64,
    pub referrer_amount: u64,
    pub fee_amount: u64,
}

impl SettlementSplit {
    /// `(merchant_amount, referrer_amount, fee_amount)`.
    #[must_use]
    pub fn as_tuple(&self) -> (u64, u64, u64) {
        (self.merchant_amount, self.referrer_amount, self.fee_amount)
    }

    /// Sum of all shares, `None` on overflow.
    #[must_use]
    pub fn total(&self) -> Option<u64> {
        self.merchant_amount
            .checked_add(self.referrer_amount)?
            .checked_add(self.fee_amount)
    }
}

/// Record of one executed settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub id: SettlementId,
    /// Custody address of the settled vault.
    pub vault: Address,
    pub merchant: Address,
    pub asset: AssetId,
    /// Total raw units moved out of custody.
    pub amount: u64,
    pub split: SettlementSplit,
    pub fee_bps: u16,
    pub referrer_bps: u16,
    /// Referrer identity, if one took part.
    pub referrer: Option<Address>,
    /// Custody balance after the settlement committed.
    pub custody_balance_after: u64,
    pub settled_at: DateTime<Utc>,
}
