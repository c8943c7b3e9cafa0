//! Basis-point split math.
//!
//! ```text
//! fee      = floor(amount * fee_bps      / 10 000)
//! referrer = floor(amount * referrer_bps / 10 000)   (0 when referrer_bps == 0)
//! merchant = amount - fee - referrer
//! ```
//!
//! Products are taken in `u128`, so `u64::MAX * 10 000` cannot overflow.
//! Rounding dust always lands in the merchant share.

use splitvault_types::{Referrer, Result, SettlementSplit, VaultError, constants::BPS_DENOMINATOR};

/// Fee and referrer shares requested for one settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitRatios {
    pub fee_bps: u16,
    pub referrer_bps: u16,
}

impl SplitRatios {
    #[must_use]
    pub fn new(fee_bps: u16, referrer_bps: u16) -> Self {
        Self {
            fee_bps,
            referrer_bps,
        }
    }

    /// Combined share, summed without `u16` overflow.
    #[must_use]
    pub fn total_bps(&self) -> u64 {
        u64::from(self.fee_bps) + u64::from(self.referrer_bps)
    }

    /// Check the ratios against the referrer that was supplied.
    ///
    /// # Errors
    /// Returns [`VaultError::InvalidBasisPoints`] if the shares exceed
    /// 10 000 in total, or a referrer share is requested without a referrer.
    pub fn validate(&self, referrer: &Referrer) -> Result<()> {
        if self.total_bps() > BPS_DENOMINATOR {
            return Err(VaultError::InvalidBasisPoints {
                reason: format!(
                    "fee_bps {} + referrer_bps {} = {} exceeds {BPS_DENOMINATOR}",
                    self.fee_bps,
                    self.referrer_bps,
                    self.total_bps()
                ),
            });
        }
        if self.referrer_bps > 0 && !referrer.is_some() {
            return Err(VaultError::InvalidBasisPoints {
                reason: format!("referrer_bps {} without a referrer", self.referrer_bps),
            });
        }
        Ok(())
    }
}

fn share(amount: u64, bps: u16) -> Result<u64> {
    let product = u128::from(amount) * u128::from(bps);
    u64::try_from(product / u128::from(BPS_DENOMINATOR))
        .map_err(|_| VaultError::ArithmeticOverflow("bps share"))
}

/// Split `amount` between merchant, referrer and fee receiver.
///
/// # Errors
/// - `AmountIsZero` if `amount == 0`
/// - `InvalidBasisPoints` per [`SplitRatios::validate`]
pub fn compute_split(amount: u64, ratios: SplitRatios, referrer: &Referrer) -> Result<SettlementSplit> {
    if amount == 0 {
        return Err(VaultError::AmountIsZero);
    }
    ratios.validate(referrer)?;

    let fee_amount = share(amount, ratios.fee_bps)?;
    let referrer_amount = if ratios.referrer_bps > 0 {
        share(amount, ratios.referrer_bps)?
    } else {
        0
    };
    let merchant_amount = amount
        .checked_sub(fee_amount)
        .and_then(|rest| rest.checked_sub(referrer_amount))
        .ok_or(VaultError::ArithmeticOverflow("merchant share"))?;

    Ok(SettlementSplit {
        merchant_amount,
        referrer_amount,
        fee_amount,
    })
}
