//! The asset-ledger interface and its in-memory implementation.
//!
//! Every single operation is atomic: either it fully succeeds or every
//! touched balance is unchanged. Multi-step sequences run inside
//! [`AssetLedger::atomically`] to get the same guarantee, and are checked
//! first with [`AssetLedger::preflight_transfer`] so the common failures
//! never create anything.

use std::collections::{HashMap, HashSet};

use splitvault_types::{
    Address, AssetId, AssetInfo, CustodyAuthority, EscrowConfig, Result, TransferAuthority,
    VaultError, constants, holding_address,
};

use crate::account::{HoldingAccount, TransferLeg};
use crate::fee_payer::FeePayer;
use crate::supply::SupplyConservation;

/// Narrow interface the escrow core uses to read and move balances.
pub trait AssetLedger {
    /// Metadata of a registered asset.
    fn asset(&self, id: &AssetId) -> Option<&AssetInfo>;

    /// The account stored at `address`, if any.
    fn account(&self, address: &Address) -> Option<&HoldingAccount>;

    /// Balance held at `address`.
    ///
    /// # Errors
    /// Returns [`VaultError::RecordNotFound`] if no account exists there.
    fn balance_of(&self, address: &Address) -> Result<u64> {
        self.account(address)
            .map(|acct| acct.amount)
            .ok_or(VaultError::RecordNotFound(*address))
    }

    /// Canonical holding account address for `(owner, asset)`.
    fn holding_address(&self, owner: &Address, asset: &AssetId) -> Result<Address>;

    /// Create the zero-balance, self-owned custody account a vault
    /// authority signs for.
    ///
    /// # Errors
    /// - `UnknownAsset` if the asset is not registered
    /// - `AccountAlreadyExists` if the address is taken
    fn open_custody_account(&mut self, authority: &CustodyAuthority, asset: &AssetId) -> Result<()>;

    /// Create `(owner, asset)`'s holding account if absent, funded by
    /// `fee_payer`. Returns its address either way.
    fn create_holding_account(
        &mut self,
        fee_payer: &mut dyn FeePayer,
        owner: &Address,
        asset: &AssetId,
    ) -> Result<Address>;

    /// Create every missing holding account for `owners`, or none of them
    /// if the fee payer cannot cover all. Returns the addresses in `owners`
    /// order.
    fn ensure_holding_accounts(
        &mut self,
        fee_payer: &mut dyn FeePayer,
        owners: &[Address],
        asset: &AssetId,
    ) -> Result<Vec<Address>>;

    /// Atomically debit `source` by the sum of `legs` and credit each leg's
    /// destination.
    ///
    /// # Errors
    /// - `RecordNotFound` if the source or any destination is missing
    /// - `Unauthorized` if `authority` does not own `source`
    /// - `AssetMismatch` if a destination holds another asset
    /// - `InsufficientSourceFunds` if the source cannot cover the total
    /// - `ArithmeticOverflow` if a total or credit would overflow
    fn transfer_many(
        &mut self,
        authority: TransferAuthority<'_>,
        source: &Address,
        legs: &[TransferLeg],
    ) -> Result<()>;

    /// Run every check [`AssetLedger::transfer_many`] would run, without
    /// moving anything. Destinations that do not exist yet are treated as
    /// empty accounts of the source asset, since callers create them right
    /// before transferring.
    ///
    /// # Errors
    /// The same errors `transfer_many` would return, except `RecordNotFound`
    /// for destinations.
    fn preflight_transfer(
        &self,
        authority: TransferAuthority<'_>,
        source: &Address,
        legs: &[TransferLeg],
    ) -> Result<()>;

    /// Run `op` as one transaction: if it fails, every account, balance
    /// and supply change it made is discarded.
    ///
    /// # Errors
    /// The error returned by `op`, or `ConservationViolation` if `op`
    /// left supply unbalanced.
    fn atomically(&mut self, op: &mut dyn FnMut(&mut Self) -> Result<()>) -> Result<()>
    where
        Self: Sized;

    /// Single-leg [`AssetLedger::transfer_many`].
    fn transfer(
        &mut self,
        authority: TransferAuthority<'_>,
        source: &Address,
        destination: &Address,
        amount: u64,
    ) -> Result<()> {
        self.transfer_many(authority, source, &[TransferLeg::new(*destination, amount)])
    }
}

/// In-process ledger keeping every account in a hash map.
#[derive(Clone)]
pub struct InMemoryLedger {
    holding_program_id: Address,
    assets: HashMap<AssetId, AssetInfo>,
    accounts: HashMap<Address, HoldingAccount>,
    /// Seal of the authority each custody account was opened with.
    custody_seals: HashMap<Address, [u8; 32]>,
    supply: SupplyConservation,
}

impl InMemoryLedger {
    /// Create an empty ledger deriving holding accounts under
    /// `holding_program_id`.
    #[must_use]
    pub fn new(holding_program_id: Address) -> Self {
        Self {
            holding_program_id,
            assets: HashMap::new(),
            accounts: HashMap::new(),
            custody_seals: HashMap::new(),
            supply: SupplyConservation::new(),
        }
    }

    /// Ledger matching an escrow configuration.
    #[must_use]
    pub fn from_config(config: &EscrowConfig) -> Self {
        Self::new(config.holding_program_id)
    }

    /// Register an asset. Re-registering identical metadata is a no-op.
    ///
    /// # Errors
    /// Returns `Configuration` if decimals exceed the supported precision
    /// or the id is already registered with different metadata.
    pub fn register_asset(&mut self, info: AssetInfo) -> Result<AssetId> {
        if info.decimals > constants::MAX_ASSET_DECIMALS {
            return Err(VaultError::Configuration(format!(
                "asset {} has {} decimals, max is {}",
                info.symbol,
                info.decimals,
                constants::MAX_ASSET_DECIMALS
            )));
        }
        let id = info.id;
        if let Some(existing) = self.assets.get(&id) {
            if *existing != info {
                return Err(VaultError::Configuration(format!(
                    "asset {id} already registered as {}",
                    existing.symbol
                )));
            }
            return Ok(id);
        }
        tracing::info!(asset = %id, symbol = %info.symbol, decimals = info.decimals, "Asset registered");
        self.assets.insert(id, info);
        Ok(id)
    }

    /// Mint new units into `owner`'s holding account, creating it if needed.
    ///
    /// The faucet path: supply enters the ledger only through here.
    ///
    /// # Errors
    /// - `UnknownAsset` if the asset is not registered
    /// - `ArithmeticOverflow` if the balance would overflow
    pub fn mint_to(&mut self, owner: &Address, asset: &AssetId, amount: u64) -> Result<Address> {
        if !self.assets.contains_key(asset) {
            return Err(VaultError::UnknownAsset(*asset));
        }
        let address = self.holding_address(owner, asset)?;
        let account = self
            .accounts
            .entry(address)
            .or_insert_with(|| HoldingAccount::empty(address, *owner, *asset));
        account.amount = account
            .amount
            .checked_add(amount)
            .ok_or(VaultError::ArithmeticOverflow("mint"))?;
        self.supply.record_mint(asset, amount);
        tracing::debug!(owner = %owner, account = %address, amount, "Minted");
        Ok(address)
    }

    /// Sum of all balances of `asset`.
    #[must_use]
    pub fn total_supply(&self, asset: &AssetId) -> u128 {
        self.accounts
            .values()
            .filter(|acct| acct.asset == *asset)
            .map(|acct| u128::from(acct.amount))
            .sum()
    }

    /// Verify supply conservation for one asset.
    ///
    /// # Errors
    /// Returns `ConservationViolation` if held supply differs from minted.
    pub fn verify_supply(&self, asset: &AssetId) -> Result<()> {
        self.supply.verify(asset, self.total_supply(asset))
    }

    /// Verify supply conservation for every asset ever minted.
    ///
    /// # Errors
    /// Returns `ConservationViolation` for the first unbalanced asset.
    pub fn verify_all_supply(&self) -> Result<()> {
        self.supply
            .tracked_assets()
            .iter()
            .try_for_each(|asset| self.verify_supply(asset))
    }

    /// Number of accounts stored.
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    fn require_asset(&self, asset: &AssetId) -> Result<()> {
        if self.assets.contains_key(asset) {
            Ok(())
        } else {
            Err(VaultError::UnknownAsset(*asset))
        }
    }

    /// Whether `authority` may move funds out of `src`.
    ///
    /// Custody accounts own themselves and only answer to the sealed
    /// authority that opened them; all others answer to their owner's key.
    fn authorizes(&self, authority: TransferAuthority<'_>, src: &HoldingAccount) -> bool {
        match authority {
            TransferAuthority::Owner(keypair) => {
                !src.is_self_owned() && src.owner == keypair.address()
            }
            TransferAuthority::Custody(custody) => {
                src.is_self_owned()
                    && src.owner == custody.address()
                    && self
                        .custody_seals
                        .get(&src.address)
                        .is_some_and(|seal| custody.matches_seal(seal))
            }
        }
    }

    /// Compute every balance a transfer would produce, touching nothing.
    fn stage(
        &self,
        authority: TransferAuthority<'_>,
        source: &Address,
        legs: &[TransferLeg],
        missing_destinations_empty: bool,
    ) -> Result<HashMap<Address, u64>> {
        let src = self
            .accounts
            .get(source)
            .ok_or(VaultError::RecordNotFound(*source))?;

        if !self.authorizes(authority, src) {
            return Err(VaultError::Unauthorized {
                expected: src.owner,
                actual: authority.address(),
            });
        }

        let total = legs
            .iter()
            .try_fold(0u64, |acc, leg| acc.checked_add(leg.amount))
            .ok_or(VaultError::ArithmeticOverflow("transfer total"))?;

        if src.amount < total {
            return Err(VaultError::InsufficientSourceFunds {
                needed: total,
                available: src.amount,
            });
        }

        let asset = src.asset;
        let mut staged: HashMap<Address, u64> = HashMap::with_capacity(legs.len() + 1);
        staged.insert(*source, src.amount - total);
        for leg in legs {
            let current = match self.accounts.get(&leg.destination) {
                Some(dest) if dest.asset != asset => {
                    return Err(VaultError::AssetMismatch {
                        expected: asset,
                        actual: dest.asset,
                    });
                }
                Some(dest) => staged.get(&leg.destination).copied().unwrap_or(dest.amount),
                None if missing_destinations_empty => {
                    staged.get(&leg.destination).copied().unwrap_or(0)
                }
                None => return Err(VaultError::RecordNotFound(leg.destination)),
            };
            let next = current
                .checked_add(leg.amount)
                .ok_or(VaultError::ArithmeticOverflow("credit"))?;
            staged.insert(leg.destination, next);
        }
        Ok(staged)
    }

    fn insert_funded(
        &mut self,
        fee_payer: &mut dyn FeePayer,
        address: Address,
        owner: &Address,
        asset: &AssetId,
    ) -> Result<()> {
        fee_payer.fund_account(&address)?;
        let mut account = HoldingAccount::empty(address, *owner, *asset);
        account.funded_by = Some(fee_payer.address());
        self.accounts.insert(address, account);
        tracing::debug!(owner = %owner, account = %address, "Holding account created");
        Ok(())
    }
}

impl AssetLedger for InMemoryLedger {
    fn asset(&self, id: &AssetId) -> Option<&AssetInfo> {
        self.assets.get(id)
    }

    fn account(&self, address: &Address) -> Option<&HoldingAccount> {
        self.accounts.get(address)
    }

    fn holding_address(&self, owner: &Address, asset: &AssetId) -> Result<Address> {
        holding_address(&self.holding_program_id, owner, asset)
    }

    fn open_custody_account(&mut self, authority: &CustodyAuthority, asset: &AssetId) -> Result<()> {
        self.require_asset(asset)?;
        let address = authority.address();
        if self.accounts.contains_key(&address) {
            return Err(VaultError::AccountAlreadyExists(address));
        }
        self.accounts
            .insert(address, HoldingAccount::empty(address, address, *asset));
        self.custody_seals.insert(address, authority.seal());
        tracing::debug!(account = %address, bump = authority.bump(), "Custody account opened");
        Ok(())
    }

    fn create_holding_account(
        &mut self,
        fee_payer: &mut dyn FeePayer,
        owner: &Address,
        asset: &AssetId,
    ) -> Result<Address> {
        self.require_asset(asset)?;
        let address = self.holding_address(owner, asset)?;
        if !self.accounts.contains_key(&address) {
            self.insert_funded(fee_payer, address, owner, asset)?;
        }
        Ok(address)
    }

    fn ensure_holding_accounts(
        &mut self,
        fee_payer: &mut dyn FeePayer,
        owners: &[Address],
        asset: &AssetId,
    ) -> Result<Vec<Address>> {
        self.require_asset(asset)?;
        let addresses = owners
            .iter()
            .map(|owner| self.holding_address(owner, asset))
            .collect::<Result<Vec<_>>>()?;

        // Owners may repeat (merchant == fee receiver); fund each account once.
        let mut seen = HashSet::new();
        let missing: Vec<(Address, Address)> = owners
            .iter()
            .zip(&addresses)
            .filter(|(_, addr)| !self.accounts.contains_key(*addr) && seen.insert(**addr))
            .map(|(owner, addr)| (*owner, *addr))
            .collect();

        if !fee_payer.can_fund(missing.len()) {
            return Err(VaultError::FeePayerExhausted {
                payer: fee_payer.address(),
                required: missing.len(),
            });
        }
        for (owner, address) in missing {
            self.insert_funded(fee_payer, address, &owner, asset)?;
        }
        Ok(addresses)
    }

    fn preflight_transfer(
        &self,
        authority: TransferAuthority<'_>,
        source: &Address,
        legs: &[TransferLeg],
    ) -> Result<()> {
        self.stage(authority, source, legs, true).map(|_| ())
    }

    fn transfer_many(
        &mut self,
        authority: TransferAuthority<'_>,
        source: &Address,
        legs: &[TransferLeg],
    ) -> Result<()> {
        let staged = self.stage(authority, source, legs, false)?;

        // Commit.
        for (address, amount) in staged {
            if let Some(account) = self.accounts.get_mut(&address) {
                account.amount = amount;
            }
        }
        for leg in legs {
            tracing::debug!(
                source = %source,
                destination = %leg.destination,
                amount = leg.amount,
                "Transfer leg committed"
            );
        }
        Ok(())
    }

    fn atomically(&mut self, op: &mut dyn FnMut(&mut Self) -> Result<()>) -> Result<()> {
        // Whole-map copies: the in-memory ledger trades speed for a trivially
        // correct restore.
        let accounts = self.accounts.clone();
        let custody_seals = self.custody_seals.clone();
        let supply = self.supply.clone();

        let result = op(self).and_then(|()| self.verify_all_supply());
        if let Err(err) = &result {
            self.accounts = accounts;
            self.custody_seals = custody_seals;
            self.supply = supply;
            tracing::debug!(error = %err, "Ledger transaction rolled back");
        }
        result
    }
}
