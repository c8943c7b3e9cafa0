//! Configuration for an escrow deployment.

use serde::{Deserialize, Serialize};

use crate::{Address, Result, VaultError, constants};

/// Escrow program configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscrowConfig {
    /// Namespace under which vault custody addresses are derived.
    pub program_id: Address,
    /// Namespace under which ordinary holding accounts are derived.
    pub holding_program_id: Address,
    /// Cost the fee payer is charged per newly created holding account.
    pub account_creation_cost: u64,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            program_id: Address::from_label(constants::DEFAULT_PROGRAM_LABEL),
            holding_program_id: Address::from_label(constants::DEFAULT_HOLDING_PROGRAM_LABEL),
            account_creation_cost: constants::DEFAULT_ACCOUNT_CREATION_COST,
        }
    }
}

impl EscrowConfig {
    /// Parse and validate a JSON configuration. Missing fields take their
    /// defaults.
    ///
    /// # Errors
    /// Returns `Serialization` for malformed JSON and `Configuration` when
    /// validation fails.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency.
    ///
    /// # Errors
    /// Returns [`VaultError::Configuration`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        if self.program_id == self.holding_program_id {
            return Err(VaultError::Configuration(
                "program_id and holding_program_id must differ".to_string(),
            ));
        }
        if self.account_creation_cost == 0 {
            return Err(VaultError::Configuration(
                "account_creation_cost must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
