//! # splitvault-escrow
//!
//! **Custodial escrow**: per-(merchant, asset) vaults that accept deposits
//! from anyone and release funds only on the merchant's instruction, split
//! between merchant, optional referrer and fee receiver.
//!
//! ## Architecture
//!
//! 1. **VaultRegistry**: derives custody addresses, records vaults and
//!    holds the custody authority issued for each
//! 2. **SettlementEngine**: deposits and settlements against an `AssetLedger`
//! 3. **split**: pure basis-point math, usable for quoting
//! 4. **SettlementAudit**: post-transfer conservation check
//! 5. **EscrowProgram**: owns all of the above plus ledger and fee payer
//!
//! ## Settlement Flow
//!
//! ```text
//! settle(caller, request)
//!     → vault exists? → caller is merchant? → destinations canonical?
//!     → amount > 0? → bps ≤ 10 000? → referrer present if paid? → custody ≥ amount?
//!     → dry-run the legs (overflow, asset mismatch)
//!     → ┌ ledger transaction ──────────────────────────────────────┐
//!       │ create missing destinations (fee payer, all-or-nothing)  │
//!       │ one multi-leg transfer signed by the custody authority   │
//!       │ conservation audit                                       │
//!       └─ on error: restore ledger, refund fee payer ─────────────┘
//!     → receipt
//! ```

pub mod conservation;
pub mod engine;
pub mod program;
pub mod registry;
pub mod split;

pub use conservation::SettlementAudit;
pub use engine::SettlementEngine;
pub use program::EscrowProgram;
pub use registry::VaultRegistry;
pub use split::{SplitRatios, compute_split};
