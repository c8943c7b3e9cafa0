//! Deterministic derived addresses.
//!
//! A derived address is `SHA-256(seeds || [bump] || program_id || marker)`
//! for the highest `bump` whose digest does **not** decompress to an
//! ed25519 point. No private key exists for such an address, so outbound
//! transfers from it need a separately issued capability
//! (see [`crate::CustodyAuthority`]).
//!
//! ```text
//! bump = 255 ──▶ hash ──▶ on curve? ──yes──▶ bump = 254 ──▶ ...
//!                             │ no
//!                             ▼
//!                     (address, bump)
//! ```

use ed25519_dalek::VerifyingKey;
use sha2::{Digest, Sha256};

use crate::{Address, AssetId, Result, VaultError, constants};

/// Returns `true` if `address` is a valid compressed ed25519 point.
#[must_use]
pub fn is_on_curve(address: &Address) -> bool {
    VerifyingKey::from_bytes(address.as_bytes()).is_ok()
}

fn hash_candidate(program_id: &Address, seeds: &[&[u8]], bump: u8) -> Address {
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update([bump]);
    hasher.update(program_id.as_bytes());
    hasher.update(constants::DERIVED_ADDRESS_MARKER);
    Address(hasher.finalize().into())
}

/// Derive the address for an explicit `bump`.
///
/// # Errors
/// Returns [`VaultError::AddressDerivationFailed`] if the candidate lies on
/// the curve (it would be controllable by an external key).
pub fn create_derived_address(program_id: &Address, seeds: &[&[u8]], bump: u8) -> Result<Address> {
    let candidate = hash_candidate(program_id, seeds, bump);
    if is_on_curve(&candidate) {
        return Err(VaultError::AddressDerivationFailed {
            reason: format!("bump {bump} yields an on-curve address"),
        });
    }
    Ok(candidate)
}

/// Search bumps from 255 downwards and return the first off-curve address.
///
/// # Errors
/// Returns [`VaultError::AddressDerivationFailed`] if every bump lands on
/// the curve.
pub fn find_derived_address(program_id: &Address, seeds: &[&[u8]]) -> Result<(Address, u8)> {
    for bump in (0..=constants::MAX_BUMP).rev() {
        if let Ok(address) = create_derived_address(program_id, seeds, bump) {
            tracing::debug!(
                program = %program_id,
                address = %address,
                bump,
                "Derived address found"
            );
            return Ok((address, bump));
        }
    }
    Err(VaultError::AddressDerivationFailed {
        reason: "no off-curve bump found".to_string(),
    })
}

/// Seeds identifying the custody account of a (merchant, asset) vault.
#[must_use]
pub fn vault_seeds<'a>(merchant: &'a Address, asset: &'a AssetId) -> [&'a [u8]; 3] {
    [constants::VAULT_SEED, merchant.as_ref(), asset.as_ref()]
}

/// Canonical holding account address for `(owner, asset)` under the
/// holding program.
///
/// # Errors
/// Returns [`VaultError::AddressDerivationFailed`] if no bump yields an
/// off-curve address.
pub fn holding_address(
    holding_program_id: &Address,
    owner: &Address,
    asset: &AssetId,
) -> Result<Address> {
    let seeds: [&[u8]; 3] = [constants::HOLDING_SEED, owner.as_ref(), asset.as_ref()];
    find_derived_address(holding_program_id, &seeds).map(|(address, _)| address)
}
