//! System-wide constants for SplitVault.

/// Basis-point denominator: 10 000 bps = 100.00%.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Seed tag for vault custody addresses.
pub const VAULT_SEED: &[u8] = b"vault";

/// Seed tag for ordinary (owner, asset) holding accounts.
pub const HOLDING_SEED: &[u8] = b"holding";

/// Domain separator appended to every derived-address preimage.
pub const DERIVED_ADDRESS_MARKER: &[u8] = b"splitvault:derived";

/// Label hashed into the default escrow program id.
pub const DEFAULT_PROGRAM_LABEL: &str = "splitvault:program:escrow:v1";

/// Label hashed into the default holding-account program id.
pub const DEFAULT_HOLDING_PROGRAM_LABEL: &str = "splitvault:program:holding:v1";

/// Default cost charged to the fee payer per materialized holding account.
pub const DEFAULT_ACCOUNT_CREATION_COST: u64 = 2_039_280;

/// Largest decimal precision an asset may register with.
pub const MAX_ASSET_DECIMALS: u32 = 18;

/// Highest bump tried during derivation; the search walks down to 0.
pub const MAX_BUMP: u8 = u8::MAX;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "SplitVault";
