//! `EscrowProgram`: one deployment of the escrow over a ledger and fee payer.
//!
//! Every mutating method takes `&mut self`, so deposits and settlements
//! against the same program are serialized by the borrow checker. Callers
//! sharing a program across threads wrap it in their own lock.

use splitvault_ledger::{AssetLedger, FeePayer, InMemoryLedger};
use splitvault_types::{
    Address, AssetId, EscrowConfig, Keypair, Referrer, Result, SettleRequest, SettlementReceipt,
    SettlementSplit, Vault, constants,
};

use crate::engine::SettlementEngine;
use crate::registry::VaultRegistry;
use crate::split::{SplitRatios, compute_split};

/// Vault registry and settlement engine bound to a ledger.
pub struct EscrowProgram<L: AssetLedger, F: FeePayer> {
    config: EscrowConfig,
    registry: VaultRegistry,
    engine: SettlementEngine,
    ledger: L,
    fee_payer: F,
}

impl<L: AssetLedger, F: FeePayer> EscrowProgram<L, F> {
    /// Build a program after validating `config`.
    ///
    /// # Errors
    /// Returns `Configuration` if the config is inconsistent.
    pub fn new(config: EscrowConfig, ledger: L, fee_payer: F) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            engine = constants::ENGINE_NAME,
            version = constants::VERSION,
            program = %config.program_id,
            holding_program = %config.holding_program_id,
            fee_payer = %fee_payer.address(),
            "Escrow program started"
        );
        Ok(Self {
            registry: VaultRegistry::new(config.program_id),
            engine: SettlementEngine::new(),
            config,
            ledger,
            fee_payer,
        })
    }

    /// See [`VaultRegistry::initialize_vault`].
    ///
    /// # Errors
    /// `UnknownAsset` or `VaultAlreadyExists`.
    pub fn initialize_vault(&mut self, merchant: &Keypair, asset: &AssetId) -> Result<Vault> {
        self.registry
            .initialize_vault(&mut self.ledger, merchant, asset)
    }

    /// See [`SettlementEngine::deposit`].
    ///
    /// # Errors
    /// `RecordNotFound`, `AmountIsZero` or `InsufficientSourceFunds`.
    pub fn deposit(&mut self, vault: &Address, depositor: &Keypair, amount: u64) -> Result<()> {
        self.engine
            .deposit(&self.registry, &mut self.ledger, vault, depositor, amount)
    }

    /// See [`SettlementEngine::settle`].
    ///
    /// # Errors
    /// Any error listed on [`SettlementEngine::settle`].
    pub fn settle(&mut self, caller: &Keypair, request: &SettleRequest) -> Result<SettlementReceipt> {
        self.engine.settle(
            &self.registry,
            &mut self.ledger,
            &mut self.fee_payer,
            caller,
            request,
        )
    }

    /// Preview a split without touching any balance.
    ///
    /// # Errors
    /// `AmountIsZero` or `InvalidBasisPoints`.
    pub fn quote_split(
        &self,
        amount: u64,
        fee_bps: u16,
        referrer_bps: u16,
        referrer: &Referrer,
    ) -> Result<SettlementSplit> {
        compute_split(amount, SplitRatios::new(fee_bps, referrer_bps), referrer)
    }

    #[must_use]
    pub fn vault(&self, merchant: &Address, asset: &AssetId) -> Option<&Vault> {
        self.registry.vault(merchant, asset)
    }

    /// Current custody balance of the vault at `vault`.
    ///
    /// # Errors
    /// `RecordNotFound` if no vault lives there.
    pub fn custody_balance(&self, vault: &Address) -> Result<u64> {
        let vault = self.registry.get(vault)?;
        self.ledger.balance_of(&vault.custody_address)
    }

    /// Holding-account address for `(owner, asset)`, for building requests.
    ///
    /// # Errors
    /// `AddressDerivationFailed` in the unlikely case no bump works.
    pub fn holding_address(&self, owner: &Address, asset: &AssetId) -> Result<Address> {
        self.ledger.holding_address(owner, asset)
    }

    #[must_use]
    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &VaultRegistry {
        &self.registry
    }

    #[must_use]
    pub fn engine(&self) -> &SettlementEngine {
        &self.engine
    }

    #[must_use]
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    #[must_use]
    pub fn fee_payer(&self) -> &F {
        &self.fee_payer
    }
}

impl<F: FeePayer> EscrowProgram<InMemoryLedger, F> {
    /// Faucet: mint new units into `owner`'s holding account.
    ///
    /// The only write path into the ledger besides the escrow operations.
    /// It can add value but never move existing balances.
    ///
    /// # Errors
    /// `UnknownAsset` or `ArithmeticOverflow`.
    pub fn mint_to(&mut self, owner: &Address, asset: &AssetId, amount: u64) -> Result<Address> {
        self.ledger.mint_to(owner, asset, amount)
    }
}
