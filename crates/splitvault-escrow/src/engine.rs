//! Settlement engine: deposits into custody and split settlements out of it.
//!
//! Settle runs in three phases:
//! 1. Account checks (vault exists, caller is the merchant, destinations are
//!    the canonical holding accounts of their owners)
//! 2. Validation (amount, basis points, custody balance)
//! 3. Effects (dry-run the transfer, then create missing destinations, move
//!    the funds and run the conservation audit in one ledger transaction)
//!
//! Nothing is written before phase 3. If any step of phase 3 fails the
//! ledger rolls back, created accounts included, and the fee payer is
//! refunded for them.

use std::collections::HashSet;

use chrono::Utc;
use splitvault_ledger::{AssetLedger, FeePayer, TransferLeg};
use splitvault_types::{
    Address, AssetId, Keypair, Result, SettleRequest, SettlementId, SettlementReceipt, TransferAuthority,
    Vault, VaultError,
};

use crate::conservation::SettlementAudit;
use crate::registry::VaultRegistry;
use crate::split::{SplitRatios, compute_split};

/// Executes deposits and settlements against a ledger.
#[derive(Debug, Default)]
pub struct SettlementEngine {
    /// Deposits committed.
    deposits: u64,
    /// Settlements committed.
    settlements: u64,
}

impl SettlementEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `amount` from the depositor's own holding account into a vault's
    /// custody account. Anyone may deposit into any vault.
    ///
    /// # Errors
    /// - `RecordNotFound` if the vault or the depositor's holding account
    ///   does not exist
    /// - `AmountIsZero` if `amount == 0`
    /// - `InsufficientSourceFunds` from the ledger on a short balance
    pub fn deposit<L: AssetLedger + ?Sized>(
        &mut self,
        registry: &VaultRegistry,
        ledger: &mut L,
        vault_address: &Address,
        depositor: &Keypair,
        amount: u64,
    ) -> Result<()> {
        let vault = registry.get(vault_address)?;
        if amount == 0 {
            return Err(VaultError::AmountIsZero);
        }

        let source = ledger.holding_address(&depositor.address(), &vault.asset)?;
        if ledger.account(&source).is_none() {
            return Err(VaultError::RecordNotFound(source));
        }

        ledger.transfer(
            TransferAuthority::Owner(depositor),
            &source,
            &vault.custody_address,
            amount,
        )?;
        self.deposits += 1;

        tracing::info!(
            vault = %vault.custody_address,
            depositor = %depositor.address(),
            amount,
            ui_amount = %ui_amount(&*ledger, &vault.asset, amount),
            "Deposit committed"
        );
        Ok(())
    }

    /// Release `request.amount` from custody, split between merchant,
    /// referrer and fee receiver.
    ///
    /// # Errors
    /// - `RecordNotFound` if the vault does not exist
    /// - `Unauthorized` if `caller` is not the vault's merchant
    /// - `InvalidDestination` if a destination is not its owner's holding
    ///   account for the vault asset
    /// - `AmountIsZero`, `InvalidBasisPoints` from split validation
    /// - `InsufficientVaultBalance` if custody holds less than `amount`
    /// - `FeePayerExhausted` if missing destinations cannot all be funded
    /// - `ArithmeticOverflow` if a destination balance would overflow
    /// - `ConservationViolation` if the transfer did not conserve
    pub fn settle<L: AssetLedger>(
        &mut self,
        registry: &VaultRegistry,
        ledger: &mut L,
        fee_payer: &mut dyn FeePayer,
        caller: &Keypair,
        request: &SettleRequest,
    ) -> Result<SettlementReceipt> {
        let receipt = settle_once(registry, ledger, fee_payer, caller, request).inspect_err(|err| {
            tracing::warn!(
                vault = %request.vault,
                caller = %caller.address(),
                amount = request.amount,
                kind = ?err.kind(),
                error = %err,
                "Settlement rejected"
            );
        })?;
        self.settlements += 1;

        tracing::info!(
            settlement = %receipt.id,
            vault = %receipt.vault,
            amount = receipt.amount,
            ui_amount = %ui_amount(&*ledger, &receipt.asset, receipt.amount),
            merchant_amount = receipt.split.merchant_amount,
            referrer_amount = receipt.split.referrer_amount,
            fee_amount = receipt.split.fee_amount,
            custody_after = receipt.custody_balance_after,
            "Settlement committed"
        );
        Ok(receipt)
    }

    #[must_use]
    pub fn deposit_count(&self) -> u64 {
        self.deposits
    }

    #[must_use]
    pub fn settlement_count(&self) -> u64 {
        self.settlements
    }
}

fn settle_once<L: AssetLedger>(
    registry: &VaultRegistry,
    ledger: &mut L,
    fee_payer: &mut dyn FeePayer,
    caller: &Keypair,
    request: &SettleRequest,
) -> Result<SettlementReceipt> {
    // ── Account checks ──────────────────────────────────────────────────
    let vault = registry.get(&request.vault)?.clone();
    if caller.address() != vault.merchant {
        return Err(VaultError::Unauthorized {
            expected: vault.merchant,
            actual: caller.address(),
        });
    }
    check_destination(&*ledger, &vault, "merchant", &vault.merchant, &request.merchant_destination)?;
    check_destination(&*ledger, &vault, "fee", &request.fee_receiver, &request.fee_destination)?;
    if let Some((identity, destination)) = request.referrer.parts() {
        check_destination(&*ledger, &vault, "referrer", &identity, &destination)?;
    }

    // ── Validation ──────────────────────────────────────────────────────
    let ratios = SplitRatios::new(request.fee_bps, request.referrer_bps);
    let split = compute_split(request.amount, ratios, &request.referrer)?;
    let available = ledger.balance_of(&vault.custody_address)?;
    if available < request.amount {
        return Err(VaultError::InsufficientVaultBalance {
            requested: request.amount,
            available,
        });
    }
    let authority = registry.custody_authority(&vault)?;

    // ── Effects ─────────────────────────────────────────────────────────
    let mut owners = vec![vault.merchant, request.fee_receiver];
    let mut destinations = vec![request.merchant_destination, request.fee_destination];
    if let Some((identity, destination)) = request.referrer.parts() {
        owners.push(identity);
        destinations.push(destination);
    }
    let legs: Vec<TransferLeg> = [
        (request.merchant_destination, split.merchant_amount),
        (request.fee_destination, split.fee_amount),
    ]
    .into_iter()
    .chain(request.referrer.parts().map(|(_, dest)| (dest, split.referrer_amount)))
    .filter(|(_, amount)| *amount > 0)
    .map(|(dest, amount)| TransferLeg::new(dest, amount))
    .collect();
    ledger.preflight_transfer(TransferAuthority::Custody(authority), &vault.custody_address, &legs)?;

    // Accounts this settlement will create, refunded if it rolls back.
    let mut seen = HashSet::new();
    let created: Vec<Address> = destinations
        .iter()
        .copied()
        .filter(|dest| ledger.account(dest).is_none() && seen.insert(*dest))
        .collect();

    let mut custody_balance_after = 0;
    let committed = ledger.atomically(&mut |ledger: &mut L| {
        ledger.ensure_holding_accounts(&mut *fee_payer, &owners, &vault.asset)?;
        let audit = SettlementAudit::capture(&*ledger, vault.custody_address, &destinations)?;
        ledger.transfer_many(
            TransferAuthority::Custody(authority),
            &vault.custody_address,
            &legs,
        )?;
        custody_balance_after = audit.verify(&*ledger, request.amount)?;
        Ok(())
    });
    if let Err(err) = committed {
        for account in &created {
            fee_payer.refund_account(account);
        }
        return Err(err);
    }

    Ok(SettlementReceipt {
        id: SettlementId::new(),
        vault: vault.custody_address,
        merchant: vault.merchant,
        asset: vault.asset,
        amount: request.amount,
        split,
        fee_bps: request.fee_bps,
        referrer_bps: request.referrer_bps,
        referrer: request.referrer.parts().map(|(identity, _)| identity),
        custody_balance_after,
        settled_at: Utc::now(),
    })
}

fn check_destination<L: AssetLedger + ?Sized>(
    ledger: &L,
    vault: &Vault,
    role: &'static str,
    owner: &Address,
    actual: &Address,
) -> Result<()> {
    let expected = ledger.holding_address(owner, &vault.asset)?;
    if expected != *actual {
        return Err(VaultError::InvalidDestination {
            role,
            expected,
            actual: *actual,
        });
    }
    Ok(())
}

fn ui_amount<L: AssetLedger + ?Sized>(ledger: &L, asset: &AssetId, raw: u64) -> String {
    ledger
        .asset(asset)
        .map(|info| format!("{} {}", info.ui_amount(raw), info.symbol))
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use splitvault_ledger::{InMemoryLedger, PrepaidFeePayer};
    use splitvault_types::{AssetInfo, EscrowConfig, Referrer};

    struct Harness {
        registry: VaultRegistry,
        ledger: InMemoryLedger,
        payer: PrepaidFeePayer,
        engine: SettlementEngine,
        usdc: AssetId,
        merchant: Keypair,
        vault: Vault,
    }

    impl Harness {
        fn new() -> Self {
            let config = EscrowConfig::default();
            let mut ledger = InMemoryLedger::from_config(&config);
            let usdc = ledger.register_asset(AssetInfo::new("USDC", 6)).unwrap();
            let mut registry = VaultRegistry::new(config.program_id);
            let merchant = Keypair::from_label("merchant");
            let vault = registry
                .initialize_vault(&mut ledger, &merchant, &usdc)
                .unwrap();
            Self {
                registry,
                ledger,
                payer: PrepaidFeePayer::new(Address([0xfe; 32]), 1_000, 10),
                engine: SettlementEngine::new(),
                usdc,
                merchant,
                vault,
            }
        }

        fn fund_custody(&mut self, amount: u64) {
            let buyer = Keypair::from_label("buyer");
            self.ledger.mint_to(&buyer.address(), &self.usdc, amount).unwrap();
            self.engine
                .deposit(
                    &self.registry,
                    &mut self.ledger,
                    &self.vault.custody_address,
                    &buyer,
                    amount,
                )
                .unwrap();
        }

        fn holding(&self, owner: &Address) -> Address {
            self.ledger.holding_address(owner, &self.usdc).unwrap()
        }

        fn request(&self, amount: u64, fee_bps: u16, referrer_bps: u16, referrer: Referrer) -> SettleRequest {
            let fee_receiver = Address([0xfa; 32]);
            SettleRequest {
                vault: self.vault.custody_address,
                amount,
                fee_bps,
                referrer_bps,
                referrer,
                fee_receiver,
                fee_destination: self.holding(&fee_receiver),
                merchant_destination: self.holding(&self.merchant.address()),
            }
        }

        fn referrer(&self) -> Referrer {
            let identity = Address([0xaa; 32]);
            Referrer::Some {
                identity,
                destination: self.holding(&identity),
            }
        }

        fn settle(&mut self, request: &SettleRequest) -> Result<SettlementReceipt> {
            self.engine.settle(
                &self.registry,
                &mut self.ledger,
                &mut self.payer,
                &self.merchant,
                request,
            )
        }

        fn custody(&self) -> u64 {
            self.ledger.balance_of(&self.vault.custody_address).unwrap()
        }
    }

    #[test]
    fn deposit_moves_exact_amount() {
        let mut h = Harness::new();
        h.fund_custody(150);
        assert_eq!(h.custody(), 150);
        assert_eq!(h.engine.deposit_count(), 1);
        h.ledger.verify_supply(&h.usdc).unwrap();
    }

    #[test]
    fn deposit_zero_rejected() {
        let mut h = Harness::new();
        let buyer = Keypair::from_label("buyer");
        h.ledger.mint_to(&buyer.address(), &h.usdc, 10).unwrap();
        let err = h
            .engine
            .deposit(&h.registry, &mut h.ledger, &h.vault.custody_address, &buyer, 0)
            .unwrap_err();
        assert!(matches!(err, VaultError::AmountIsZero));
    }

    #[test]
    fn deposit_into_unknown_vault_rejected() {
        let mut h = Harness::new();
        let buyer = Keypair::from_label("buyer");
        h.ledger.mint_to(&buyer.address(), &h.usdc, 10).unwrap();
        let err = h
            .engine
            .deposit(&h.registry, &mut h.ledger, &Address([1u8; 32]), &buyer, 5)
            .unwrap_err();
        assert!(matches!(err, VaultError::RecordNotFound(_)));
    }

    #[test]
    fn deposit_without_source_account_rejected() {
        let mut h = Harness::new();
        let stranger = Keypair::from_label("stranger");
        let err = h
            .engine
            .deposit(&h.registry, &mut h.ledger, &h.vault.custody_address, &stranger, 5)
            .unwrap_err();
        assert!(matches!(err, VaultError::RecordNotFound(_)));
    }

    #[test]
    fn deposit_short_balance_passes_through_ledger_error() {
        let mut h = Harness::new();
        let buyer = Keypair::from_label("buyer");
        h.ledger.mint_to(&buyer.address(), &h.usdc, 10).unwrap();
        let err = h
            .engine
            .deposit(&h.registry, &mut h.ledger, &h.vault.custody_address, &buyer, 11)
            .unwrap_err();
        assert!(matches!(err, VaultError::InsufficientSourceFunds { .. }));
        assert_eq!(h.custody(), 0);
    }

    #[test]
    fn settle_fee_only() {
        let mut h = Harness::new();
        h.fund_custody(150);
        let request = h.request(60, 500, 0, Referrer::None);
        let receipt = h.settle(&request).unwrap();

        assert_eq!(receipt.split.as_tuple(), (57, 0, 3));
        assert_eq!(receipt.custody_balance_after, 90);
        assert_eq!(h.custody(), 90);
        assert_eq!(h.ledger.balance_of(&request.merchant_destination).unwrap(), 57);
        assert_eq!(h.ledger.balance_of(&request.fee_destination).unwrap(), 3);
        assert_eq!(receipt.referrer, None);
        assert_eq!(h.engine.settlement_count(), 1);
    }

    #[test]
    fn settle_three_way() {
        let mut h = Harness::new();
        h.fund_custody(30_000_000);
        let request = h.request(30_000_000, 300, 200, h.referrer());
        let receipt = h.settle(&request).unwrap();

        assert_eq!(receipt.split.as_tuple(), (28_500_000, 600_000, 900_000));
        assert_eq!(h.custody(), 0);
        let Referrer::Some { identity, destination } = request.referrer else {
            unreachable!()
        };
        assert_eq!(receipt.referrer, Some(identity));
        assert_eq!(h.ledger.balance_of(&destination).unwrap(), 600_000);
        h.ledger.verify_supply(&h.usdc).unwrap();
    }

    #[test]
    fn non_merchant_caller_unauthorized() {
        let mut h = Harness::new();
        h.fund_custody(100);
        let request = h.request(10, 0, 0, Referrer::None);
        let intruder = Keypair::from_label("intruder");
        let err = h
            .engine
            .settle(&h.registry, &mut h.ledger, &mut h.payer, &intruder, &request)
            .unwrap_err();
        assert!(matches!(err, VaultError::Unauthorized { .. }));
        assert_eq!(h.custody(), 100);
    }

    #[test]
    fn wrong_merchant_destination_rejected() {
        let mut h = Harness::new();
        h.fund_custody(100);
        let mut request = h.request(10, 0, 0, Referrer::None);
        request.merchant_destination = h.holding(&Address([0x66; 32]));
        let err = h.settle(&request).unwrap_err();
        assert!(matches!(err, VaultError::InvalidDestination { role: "merchant", .. }));
    }

    #[test]
    fn wrong_referrer_destination_rejected() {
        let mut h = Harness::new();
        h.fund_custody(100);
        let referrer = Referrer::Some {
            identity: Address([0xaa; 32]),
            destination: h.holding(&Address([0xbb; 32])),
        };
        let request = h.request(10, 100, 100, referrer);
        let err = h.settle(&request).unwrap_err();
        assert!(matches!(err, VaultError::InvalidDestination { role: "referrer", .. }));
    }

    #[test]
    fn account_checks_precede_validation() {
        let mut h = Harness::new();
        let mut request = h.request(0, 9_000, 9_000, Referrer::None);
        request.fee_destination = Address([0x01; 32]);
        let err = h.settle(&request).unwrap_err();
        assert!(matches!(err, VaultError::InvalidDestination { role: "fee", .. }));
    }

    #[test]
    fn basis_points_over_total_rejected() {
        let mut h = Harness::new();
        h.fund_custody(10_000_000);
        let request = h.request(10_000_000, 6_000, 5_000, h.referrer());
        let err = h.settle(&request).unwrap_err();
        assert!(matches!(err, VaultError::InvalidBasisPoints { .. }));
        assert_eq!(h.custody(), 10_000_000);
    }

    #[test]
    fn referrer_share_without_referrer_rejected() {
        let mut h = Harness::new();
        h.fund_custody(100);
        let request = h.request(100, 0, 50, Referrer::None);
        let err = h.settle(&request).unwrap_err();
        assert!(matches!(err, VaultError::InvalidBasisPoints { .. }));
    }

    #[test]
    fn insufficient_vault_balance_changes_nothing() {
        let mut h = Harness::new();
        h.fund_custody(50);
        let accounts_before = h.ledger.account_count();
        let request = h.request(51, 500, 0, Referrer::None);
        let err = h.settle(&request).unwrap_err();
        assert!(matches!(
            err,
            VaultError::InsufficientVaultBalance {
                requested: 51,
                available: 50
            }
        ));
        assert_eq!(h.custody(), 50);
        assert_eq!(h.ledger.account_count(), accounts_before);
        assert!(h.payer.funded_accounts().is_empty());
    }

    #[test]
    fn zero_shares_still_create_destinations() {
        let mut h = Harness::new();
        h.fund_custody(30);
        let request = h.request(30, 300, 200, h.referrer());
        let receipt = h.settle(&request).unwrap();
        assert_eq!(receipt.split.as_tuple(), (30, 0, 0));
        assert_eq!(h.ledger.balance_of(&request.fee_destination).unwrap(), 0);
        assert_eq!(h.payer.funded_accounts().len(), 3);
    }

    #[test]
    fn merchant_as_fee_receiver_accumulates() {
        let mut h = Harness::new();
        h.fund_custody(1_000);
        let mut request = h.request(1_000, 1_000, 0, Referrer::None);
        request.fee_receiver = h.merchant.address();
        request.fee_destination = request.merchant_destination;
        h.settle(&request).unwrap();
        assert_eq!(h.ledger.balance_of(&request.merchant_destination).unwrap(), 1_000);
        assert_eq!(h.payer.funded_accounts().len(), 1);
    }

    #[test]
    fn overflowing_destination_leaves_no_trace() {
        let mut h = Harness::new();
        h.fund_custody(1_000);
        h.ledger
            .mint_to(&h.merchant.address(), &h.usdc, u64::MAX - 900)
            .unwrap();
        let accounts_before = h.ledger.account_count();
        let budget_before = h.payer.remaining();

        // The fee destination does not exist yet; the merchant credit of
        // 950 overflows.
        let request = h.request(1_000, 500, 0, Referrer::None);
        let err = h.settle(&request).unwrap_err();

        assert!(matches!(err, VaultError::ArithmeticOverflow("credit")));
        assert_eq!(h.custody(), 1_000);
        assert_eq!(h.ledger.account_count(), accounts_before);
        assert!(h.ledger.account(&request.fee_destination).is_none());
        assert!(h.payer.funded_accounts().is_empty());
        assert_eq!(h.payer.remaining(), budget_before);
        assert_eq!(h.engine.settlement_count(), 0);
        h.ledger.verify_all_supply().unwrap();
    }

    /// Ledger whose transfers always fail, after account creation succeeded.
    struct RejectingTransfers(InMemoryLedger);

    impl AssetLedger for RejectingTransfers {
        fn asset(&self, id: &AssetId) -> Option<&AssetInfo> {
            self.0.asset(id)
        }

        fn account(&self, address: &Address) -> Option<&splitvault_ledger::HoldingAccount> {
            self.0.account(address)
        }

        fn holding_address(&self, owner: &Address, asset: &AssetId) -> Result<Address> {
            self.0.holding_address(owner, asset)
        }

        fn open_custody_account(
            &mut self,
            authority: &splitvault_types::CustodyAuthority,
            asset: &AssetId,
        ) -> Result<()> {
            self.0.open_custody_account(authority, asset)
        }

        fn create_holding_account(
            &mut self,
            fee_payer: &mut dyn FeePayer,
            owner: &Address,
            asset: &AssetId,
        ) -> Result<Address> {
            self.0.create_holding_account(fee_payer, owner, asset)
        }

        fn ensure_holding_accounts(
            &mut self,
            fee_payer: &mut dyn FeePayer,
            owners: &[Address],
            asset: &AssetId,
        ) -> Result<Vec<Address>> {
            self.0.ensure_holding_accounts(fee_payer, owners, asset)
        }

        fn transfer_many(
            &mut self,
            _authority: TransferAuthority<'_>,
            _source: &Address,
            _legs: &[TransferLeg],
        ) -> Result<()> {
            Err(VaultError::ConservationViolation {
                reason: "transfer rejected".into(),
            })
        }

        fn preflight_transfer(
            &self,
            authority: TransferAuthority<'_>,
            source: &Address,
            legs: &[TransferLeg],
        ) -> Result<()> {
            self.0.preflight_transfer(authority, source, legs)
        }

        fn atomically(&mut self, op: &mut dyn FnMut(&mut Self) -> Result<()>) -> Result<()> {
            let saved = self.0.clone();
            let result = op(self);
            if result.is_err() {
                self.0 = saved;
            }
            result
        }
    }

    #[test]
    fn failed_transfer_rolls_back_created_accounts_and_refunds() {
        let mut h = Harness::new();
        h.fund_custody(100);
        let request = h.request(100, 500, 0, Referrer::None);
        let Harness {
            registry,
            ledger,
            mut payer,
            mut engine,
            merchant,
            vault,
            ..
        } = h;
        let mut ledger = RejectingTransfers(ledger);
        let accounts_before = ledger.0.account_count();
        let budget_before = payer.remaining();

        let err = engine
            .settle(&registry, &mut ledger, &mut payer, &merchant, &request)
            .unwrap_err();

        assert!(matches!(err, VaultError::ConservationViolation { .. }));
        assert_eq!(ledger.0.account_count(), accounts_before);
        assert!(ledger.0.account(&request.fee_destination).is_none());
        assert_eq!(ledger.0.balance_of(&vault.custody_address).unwrap(), 100);
        assert!(payer.funded_accounts().is_empty());
        assert_eq!(payer.remaining(), budget_before);
    }

    #[test]
    fn exhausted_fee_payer_blocks_settlement() {
        let mut h = Harness::new();
        h.fund_custody(100);
        h.payer = PrepaidFeePayer::new(Address([0xfe; 32]), 15, 10);
        let request = h.request(100, 500, 0, Referrer::None);
        let err = h.settle(&request).unwrap_err();
        assert!(matches!(err, VaultError::FeePayerExhausted { required: 2, .. }));
        assert_eq!(h.custody(), 100);
        assert!(h.ledger.account(&request.merchant_destination).is_none());
        assert_eq!(h.payer.remaining(), 15);
    }
}
