//! Error types for SplitVault.
//!
//! All errors use the `VS_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Registry / record existence errors
//! - 2xx: Authorization errors
//! - 3xx: Request validation errors
//! - 4xx: Funds errors
//! - 5xx: Ledger errors
//! - 8xx: Invariant violations
//! - 9xx: General / internal errors

use thiserror::Error;

use crate::{Address, AssetId};

/// Coarse classification of a [`VaultError`].
///
/// Lets callers tell a malformed request apart from a caller that is not
/// permitted and from a request that simply lacks funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A record is missing or already present.
    Existence,
    /// The caller does not hold the required authority.
    NotPermitted,
    /// The request itself violates a domain rule.
    MalformedRequest,
    /// A balance is too small for the requested movement.
    InsufficientFunds,
    /// Invariant breach, configuration, or serialization failure.
    Internal,
}

/// Central error enum for all SplitVault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    // =================================================================
    // Registry Errors (1xx)
    // =================================================================
    /// A vault for this (merchant, asset) pair already exists.
    #[error("VS_ERR_100: Vault already exists for merchant {merchant} and asset {asset}")]
    VaultAlreadyExists { merchant: Address, asset: AssetId },

    /// No record exists at the given address.
    #[error("VS_ERR_101: Record not found: {0}")]
    RecordNotFound(Address),

    /// The ledger already holds an account at this address.
    #[error("VS_ERR_102: Account already exists: {0}")]
    AccountAlreadyExists(Address),

    /// The asset is not registered with the ledger.
    #[error("VS_ERR_103: Unknown asset: {0}")]
    UnknownAsset(AssetId),

    // =================================================================
    // Authorization Errors (2xx)
    // =================================================================
    /// The presented authority does not match the required owner.
    #[error("VS_ERR_200: Unauthorized: expected {expected}, got {actual}")]
    Unauthorized { expected: Address, actual: Address },

    // =================================================================
    // Validation Errors (3xx)
    // =================================================================
    /// A zero amount was supplied where a positive one is required.
    #[error("VS_ERR_300: Amount must be greater than zero")]
    AmountIsZero,

    /// Basis points exceed 10 000 in total, or a referrer share was
    /// requested without a referrer.
    #[error("VS_ERR_301: Invalid basis points: {reason}")]
    InvalidBasisPoints { reason: String },

    /// A destination account is not the holding account of its owner.
    #[error("VS_ERR_302: Invalid destination for {role}: expected {expected}, got {actual}")]
    InvalidDestination {
        role: &'static str,
        expected: Address,
        actual: Address,
    },

    // =================================================================
    // Funds Errors (4xx)
    // =================================================================
    /// The vault custody balance cannot cover the settlement.
    #[error("VS_ERR_400: Insufficient vault balance: requested {requested}, available {available}")]
    InsufficientVaultBalance { requested: u64, available: u64 },

    /// The transfer source balance cannot cover the transfer.
    #[error("VS_ERR_401: Insufficient source funds: need {needed}, have {available}")]
    InsufficientSourceFunds { needed: u64, available: u64 },

    /// The fee payer cannot fund the required account creations.
    #[error("VS_ERR_402: Fee payer {payer} exhausted: {required} account(s) need funding")]
    FeePayerExhausted { payer: Address, required: usize },

    // =================================================================
    // Ledger Errors (5xx)
    // =================================================================
    /// Source and destination hold different assets.
    #[error("VS_ERR_500: Asset mismatch: expected {expected}, got {actual}")]
    AssetMismatch { expected: AssetId, actual: AssetId },

    /// A balance computation overflowed.
    #[error("VS_ERR_501: Arithmetic overflow: {0}")]
    ArithmeticOverflow(&'static str),

    /// No bump produced an off-curve address, or the supplied bump
    /// yields an on-curve point.
    #[error("VS_ERR_502: Address derivation failed: {reason}")]
    AddressDerivationFailed { reason: String },

    // =================================================================
    // Invariant Violations (8xx)
    // =================================================================
    /// Value was created or destroyed. Critical safety alert.
    #[error("VS_ERR_800: Conservation violation: {reason}")]
    ConservationViolation { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Configuration error (invalid config, missing fields, etc.).
    #[error("VS_ERR_900: Configuration error: {0}")]
    Configuration(String),

    /// Serialization / deserialization error.
    #[error("VS_ERR_901: Serialization error: {0}")]
    Serialization(String),
}

impl VaultError {
    /// Classify this error for callers.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::VaultAlreadyExists { .. }
            | Self::RecordNotFound(_)
            | Self::AccountAlreadyExists(_)
            | Self::UnknownAsset(_) => ErrorKind::Existence,
            Self::Unauthorized { .. } => ErrorKind::NotPermitted,
            Self::AmountIsZero
            | Self::InvalidBasisPoints { .. }
            | Self::InvalidDestination { .. }
            | Self::AssetMismatch { .. } => ErrorKind::MalformedRequest,
            Self::InsufficientVaultBalance { .. }
            | Self::InsufficientSourceFunds { .. }
            | Self::FeePayerExhausted { .. } => ErrorKind::InsufficientFunds,
            Self::ArithmeticOverflow(_)
            | Self::AddressDerivationFailed { .. }
            | Self::ConservationViolation { .. }
            | Self::Configuration(_)
            | Self::Serialization(_) => ErrorKind::Internal,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, VaultError>;

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
