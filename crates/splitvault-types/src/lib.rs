//! # splitvault-types
//!
//! Shared types, errors, and configuration for **SplitVault** escrow vaults.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`Address`], [`AssetId`], [`SettlementId`]
//! - **Identity**: [`Keypair`] (ed25519 signing capability)
//! - **Derivation**: [`find_derived_address`], [`create_derived_address`], [`holding_address`]
//! - **Authority**: [`CustodyAuthority`], [`TransferAuthority`]
//! - **Vault model**: [`Vault`], [`AssetInfo`]
//! - **Settlement model**: [`Referrer`], [`SettlementSplit`], [`SettlementReceipt`]
//! - **Configuration**: [`EscrowConfig`]
//! - **Errors**: [`VaultError`] with `VS_ERR_` prefix codes
//! - **Constants**: basis-point denominator, seeds, defaults

pub mod asset;
pub mod authority;
pub mod config;
pub mod constants;
pub mod derive;
pub mod error;
pub mod ids;
pub mod keypair;
pub mod settlement;
pub mod vault;

// Re-export all primary types at crate root for ergonomic imports:
//   use splitvault_types::{Address, Vault, Referrer, VaultError, ...};

pub use asset::*;
pub use authority::*;
pub use config::*;
pub use derive::*;
pub use error::*;
pub use ids::*;
pub use keypair::*;
pub use settlement::*;
pub use vault::*;

// Constants are accessed via `splitvault_types::constants::FOO`
// (not re-exported to avoid name collisions).
