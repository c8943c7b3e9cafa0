//! The vault record.
//!
//! One vault exists per (merchant, asset) pair. All fields are written once
//! at creation; the registry hands out shared references or clones only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Address, AssetId};

/// Lookup key of a vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct VaultKey {
    pub merchant: Address,
    pub asset: AssetId,
}

impl VaultKey {
    #[must_use]
    pub fn new(merchant: Address, asset: AssetId) -> Self {
        Self { merchant, asset }
    }
}

/// A merchant's escrow vault for a single asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    /// The only identity allowed to settle this vault.
    pub merchant: Address,
    /// The asset held in custody.
    pub asset: AssetId,
    /// Derived, off-curve address of the custody holding account.
    pub custody_address: Address,
    /// Bump that makes `custody_address` derivable without a search.
    pub bump: u8,
    /// When the vault was created.
    pub created_at: DateTime<Utc>,
}

impl Vault {
    #[must_use]
    pub fn key(&self) -> VaultKey {
        VaultKey::new(self.merchant, self.asset)
    }
}
