//! # splitvault-ledger
//!
//! **Asset ledger**: the collaborator that holds balances and moves them.
//!
//! ## Architecture
//!
//! 1. **AssetLedger**: the narrow interface the escrow core consumes:
//!    balance lookups, holding-account creation, atomic transfers
//! 2. **InMemoryLedger**: reference implementation with staged commits
//! 3. **FeePayer**: funds creation of new holding accounts
//! 4. **SupplyConservation**: per-asset minted-vs-held invariant
//!
//! ## Transfer Flow
//!
//! ```text
//! transfer_many(authority, source, legs)
//!     → authority owns source? → same asset everywhere? → source covers Σ legs?
//!     → stage every balance on a scratch map → commit all at once
//! ```
//!
//! Either every leg of a transfer commits or none does.

pub mod account;
pub mod fee_payer;
pub mod ledger;
pub mod supply;

pub use account::{HoldingAccount, TransferLeg};
pub use fee_payer::{FeePayer, PrepaidFeePayer};
pub use ledger::{AssetLedger, InMemoryLedger};
pub use supply::SupplyConservation;
