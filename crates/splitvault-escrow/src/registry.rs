//! Vault registry: creates vault records and their custody accounts.
//!
//! Vaults are stored by custody address. Because the custody address is a
//! pure function of (program id, merchant, asset), uniqueness per address is
//! uniqueness per (merchant, asset).
//!
//! The registry is also the only holder of each vault's
//! [`CustodyAuthority`]. It is issued once when the vault is created and
//! never leaves this crate.

use std::collections::{HashMap, hash_map::Entry};

use chrono::Utc;
use splitvault_ledger::AssetLedger;
use splitvault_types::{
    Address, AssetId, CustodyAuthority, Keypair, Result, Vault, VaultError, VaultKey,
    find_derived_address, vault_seeds,
};

/// Keyed store of vault records.
pub struct VaultRegistry {
    /// Namespace under which custody addresses are derived.
    program_id: Address,
    /// Vaults indexed by custody address.
    vaults: HashMap<Address, Vault>,
    /// Issued custody authorities, same keys as `vaults`.
    authorities: HashMap<Address, CustodyAuthority>,
}

impl VaultRegistry {
    #[must_use]
    pub fn new(program_id: Address) -> Self {
        Self {
            program_id,
            vaults: HashMap::new(),
            authorities: HashMap::new(),
        }
    }

    /// Derive the custody address and bump for a (merchant, asset) pair.
    ///
    /// # Errors
    /// Returns `AddressDerivationFailed` if no off-curve bump exists.
    pub fn derive_custody(&self, merchant: &Address, asset: &AssetId) -> Result<(Address, u8)> {
        find_derived_address(&self.program_id, &vault_seeds(merchant, asset))
    }

    /// Create the vault for `(merchant, asset)` and open its zero-balance
    /// custody account.
    ///
    /// The merchant authenticates by presenting its keypair.
    ///
    /// # Errors
    /// - `UnknownAsset` if the ledger does not know the asset
    /// - `VaultAlreadyExists` if the pair already has a vault
    pub fn initialize_vault<L: AssetLedger>(
        &mut self,
        ledger: &mut L,
        merchant: &Keypair,
        asset: &AssetId,
    ) -> Result<Vault> {
        let merchant = merchant.address();
        if ledger.asset(asset).is_none() {
            return Err(VaultError::UnknownAsset(*asset));
        }

        let (custody_address, bump) = self.derive_custody(&merchant, asset)?;
        let Entry::Vacant(slot) = self.vaults.entry(custody_address) else {
            tracing::warn!(merchant = %merchant, asset = %asset, "Vault already exists");
            return Err(VaultError::VaultAlreadyExists {
                merchant,
                asset: *asset,
            });
        };

        let authority = CustodyAuthority::issue(&self.program_id, &merchant, asset, bump)?;
        ledger.open_custody_account(&authority, asset).map_err(|err| match err {
            VaultError::AccountAlreadyExists(_) => VaultError::VaultAlreadyExists {
                merchant,
                asset: *asset,
            },
            other => other,
        })?;

        let vault = slot
            .insert(Vault {
                merchant,
                asset: *asset,
                custody_address,
                bump,
                created_at: Utc::now(),
            })
            .clone();
        self.authorities.insert(custody_address, authority);

        tracing::info!(
            merchant = %merchant,
            asset = %asset,
            custody = %custody_address,
            bump,
            "Vault initialized"
        );
        Ok(vault)
    }

    /// Look up a vault by custody address.
    ///
    /// # Errors
    /// Returns `RecordNotFound` for any address that is not a registered
    /// vault, including addresses derived from the wrong seeds.
    pub fn get(&self, custody_address: &Address) -> Result<&Vault> {
        self.vaults
            .get(custody_address)
            .ok_or(VaultError::RecordNotFound(*custody_address))
    }

    /// Look up a vault by (merchant, asset).
    #[must_use]
    pub fn vault(&self, merchant: &Address, asset: &AssetId) -> Option<&Vault> {
        let (custody_address, _) = self.derive_custody(merchant, asset).ok()?;
        self.vaults.get(&custody_address)
    }

    /// The authority issued for a vault's custody account.
    ///
    /// # Errors
    /// Returns `RecordNotFound` if the vault was not created by this
    /// registry.
    pub(crate) fn custody_authority(&self, vault: &Vault) -> Result<&CustodyAuthority> {
        self.authorities
            .get(&vault.custody_address)
            .filter(|authority| authority.bump() == vault.bump)
            .ok_or(VaultError::RecordNotFound(vault.custody_address))
    }

    /// All vaults opened by `merchant`, one per asset.
    #[must_use]
    pub fn vaults_for_merchant(&self, merchant: &Address) -> Vec<&Vault> {
        let mut vaults: Vec<&Vault> = self
            .vaults
            .values()
            .filter(|v| v.merchant == *merchant)
            .collect();
        vaults.sort_by_key(|v| v.key());
        vaults
    }

    /// Whether a vault exists for the key.
    #[must_use]
    pub fn contains(&self, key: &VaultKey) -> bool {
        self.vault(&key.merchant, &key.asset).is_some()
    }

    #[must_use]
    pub fn program_id(&self) -> Address {
        self.program_id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vaults.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vaults.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splitvault_ledger::InMemoryLedger;
    use splitvault_types::{AssetInfo, EscrowConfig, TransferAuthority, is_on_curve};

    fn setup() -> (VaultRegistry, InMemoryLedger, AssetId) {
        let config = EscrowConfig::default();
        let mut ledger = InMemoryLedger::from_config(&config);
        let usdc = ledger.register_asset(AssetInfo::new("USDC", 6)).unwrap();
        (VaultRegistry::new(config.program_id), ledger, usdc)
    }

    #[test]
    fn initialize_creates_zero_balance_custody() {
        let (mut registry, mut ledger, usdc) = setup();
        let merchant = Keypair::from_label("merchant");

        let vault = registry
            .initialize_vault(&mut ledger, &merchant, &usdc)
            .unwrap();

        assert_eq!(vault.merchant, merchant.address());
        assert_eq!(vault.asset, usdc);
        assert!(!is_on_curve(&vault.custody_address));
        assert_eq!(ledger.balance_of(&vault.custody_address).unwrap(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn second_initialize_rejected_without_overwrite() {
        let (mut registry, mut ledger, usdc) = setup();
        let merchant = Keypair::from_label("merchant");
        let first = registry
            .initialize_vault(&mut ledger, &merchant, &usdc)
            .unwrap();

        let err = registry
            .initialize_vault(&mut ledger, &merchant, &usdc)
            .unwrap_err();
        assert!(matches!(err, VaultError::VaultAlreadyExists { .. }));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&first.custody_address).unwrap(), &first);
    }

    #[test]
    fn same_merchant_different_assets_are_separate_vaults() {
        let (mut registry, mut ledger, usdc) = setup();
        let sol = ledger.register_asset(AssetInfo::new("SOL", 9)).unwrap();
        let merchant = Keypair::from_label("merchant");

        let a = registry
            .initialize_vault(&mut ledger, &merchant, &usdc)
            .unwrap();
        let b = registry
            .initialize_vault(&mut ledger, &merchant, &sol)
            .unwrap();
        assert_ne!(a.custody_address, b.custody_address);
        assert_eq!(registry.vaults_for_merchant(&merchant.address()).len(), 2);
    }

    #[test]
    fn unknown_asset_rejected() {
        let (mut registry, mut ledger, _) = setup();
        let merchant = Keypair::from_label("merchant");
        let err = registry
            .initialize_vault(&mut ledger, &merchant, &AssetId::from_symbol("NOPE"))
            .unwrap_err();
        assert!(matches!(err, VaultError::UnknownAsset(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn lookup_by_pair_and_address() {
        let (mut registry, mut ledger, usdc) = setup();
        let merchant = Keypair::from_label("merchant");
        let vault = registry
            .initialize_vault(&mut ledger, &merchant, &usdc)
            .unwrap();

        assert_eq!(registry.vault(&merchant.address(), &usdc), Some(&vault));
        assert!(registry.contains(&vault.key()));
        assert!(matches!(
            registry.get(&Address([0u8; 32])).unwrap_err(),
            VaultError::RecordNotFound(_)
        ));
    }

    #[test]
    fn custody_authority_matches_vault() {
        let (mut registry, mut ledger, usdc) = setup();
        let merchant = Keypair::from_label("merchant");
        let vault = registry
            .initialize_vault(&mut ledger, &merchant, &usdc)
            .unwrap();

        let authority = registry.custody_authority(&vault).unwrap();
        assert_eq!(authority.address(), vault.custody_address);
        assert_eq!(authority.bump(), vault.bump);
    }

    #[test]
    fn custody_authority_refuses_foreign_records() {
        let (mut registry, mut ledger, usdc) = setup();
        let merchant = Keypair::from_label("merchant");
        let mut vault = registry
            .initialize_vault(&mut ledger, &merchant, &usdc)
            .unwrap();

        vault.custody_address = Address([0x11; 32]);
        assert!(matches!(
            registry.custody_authority(&vault).unwrap_err(),
            VaultError::RecordNotFound(_)
        ));
    }

    #[test]
    fn reissued_authority_cannot_drain_custody() {
        let (mut registry, mut ledger, usdc) = setup();
        let merchant = Keypair::from_label("merchant");
        let thief = Keypair::from_label("thief");
        let vault = registry
            .initialize_vault(&mut ledger, &merchant, &usdc)
            .unwrap();
        let buyer = ledger.mint_to(&thief.address(), &usdc, 500).unwrap();
        ledger
            .transfer(
                TransferAuthority::Owner(&thief),
                &buyer,
                &vault.custody_address,
                500,
            )
            .unwrap();

        // Everything needed to re-issue is public: program id, merchant,
        // asset and the bump stored on the vault record.
        let forged = CustodyAuthority::issue(
            &registry.program_id(),
            &vault.merchant,
            &vault.asset,
            vault.bump,
        )
        .unwrap();
        assert_eq!(forged.address(), vault.custody_address);

        let err = ledger
            .transfer(
                TransferAuthority::Custody(&forged),
                &vault.custody_address,
                &buyer,
                500,
            )
            .unwrap_err();
        assert!(matches!(err, VaultError::Unauthorized { .. }));
        assert_eq!(ledger.balance_of(&vault.custody_address).unwrap(), 500);
        assert_eq!(ledger.balance_of(&buyer).unwrap(), 0);

        // The issued authority still works.
        let issued = registry.custody_authority(&vault).unwrap();
        ledger
            .transfer(
                TransferAuthority::Custody(issued),
                &vault.custody_address,
                &buyer,
                1,
            )
            .unwrap();
        assert_eq!(ledger.balance_of(&vault.custody_address).unwrap(), 499);
    }
}
