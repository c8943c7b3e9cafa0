//! Transfer authorities.
//!
//! Every outbound ledger transfer names the authority that signs for the
//! source account. Externally owned accounts are authorized by a
//! [`Keypair`]; vault custody accounts by a [`CustodyAuthority`].
//!
//! A custody address is public and anyone can re-derive it, so derivation
//! alone cannot be the proof. Each issued authority carries a random secret,
//! and the ledger binds a custody account to the [`CustodyAuthority::seal`]
//! of the authority that opened it:
//!
//! ```text
//! registry: issue() ──▶ authority{address, bump, secret}
//!                           │ open_custody_account
//!                           ▼
//! ledger:   custody account ◀── seal = SHA-256(marker || secret)
//!
//! transfer(Custody(a)) ok ⇔ a.address == owner ∧ seal(a) == stored seal
//! ```
//!
//! An authority re-issued from the same public data has a different secret
//! and is refused.

use std::fmt;

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::{Address, AssetId, Keypair, Result, create_derived_address, vault_seeds};

const SEAL_MARKER: &[u8] = b"splitvault:custody-seal";

/// Capability proving the holder may move funds out of one vault custody
/// account.
///
/// Not `Clone`: the registry that issued it keeps the only copy.
pub struct CustodyAuthority {
    address: Address,
    bump: u8,
    secret: [u8; 32],
}

impl CustodyAuthority {
    /// Derive the custody address for a vault and issue a fresh authority
    /// for it.
    ///
    /// # Errors
    /// Returns `AddressDerivationFailed` if `bump` yields an on-curve point.
    pub fn issue(program_id: &Address, merchant: &Address, asset: &AssetId, bump: u8) -> Result<Self> {
        let address = create_derived_address(program_id, &vault_seeds(merchant, asset), bump)?;
        let mut secret = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut secret);
        Ok(Self {
            address,
            bump,
            secret,
        })
    }

    /// The custody address this authority signs for.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    #[must_use]
    pub fn bump(&self) -> u8 {
        self.bump
    }

    /// One-way commitment to the secret, stored by the ledger.
    #[must_use]
    pub fn seal(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(SEAL_MARKER);
        hasher.update(self.secret);
        hasher.finalize().into()
    }

    #[must_use]
    pub fn matches_seal(&self, seal: &[u8; 32]) -> bool {
        self.seal() == *seal
    }
}

impl fmt::Debug for CustodyAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustodyAuthority")
            .field("address", &self.address)
            .field("bump", &self.bump)
            .finish_non_exhaustive()
    }
}

/// Who is authorizing a transfer out of a source account.
#[derive(Debug, Clone, Copy)]
pub enum TransferAuthority<'a> {
    /// An externally owned account, signed by its keypair.
    Owner(&'a Keypair),
    /// A vault custody account, signed by its issued authority.
    Custody(&'a CustodyAuthority),
}

impl TransferAuthority<'_> {
    /// The address whose ownership this authority proves.
    #[must_use]
    pub fn address(&self) -> Address {
        match self {
            Self::Owner(keypair) => keypair.address(),
            Self::Custody(authority) => authority.address(),
        }
    }
}
