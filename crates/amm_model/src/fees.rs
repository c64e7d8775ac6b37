//! Trade fees: proportional to the curve amount, capped by notional

use serde::{Deserialize, Serialize};

use crate::curve::Side;
use crate::fixed::{mul_div, Rounding};
use crate::{ModelError, BPS_SCALE};

/// Fee parameters in basis points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Fee on the collateral amount quoted by the curve
    pub trade_fee_bps: u16,
    /// Cap on the fee as a fraction of the trade's notional collateral
    pub max_option_fee_bps: u16,
}

impl FeeSchedule {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.trade_fee_bps as u128 > BPS_SCALE || self.max_option_fee_bps as u128 > BPS_SCALE {
            return Err(ModelError::InvalidBps);
        }
        Ok(())
    }
}

/// Curve amount with the fee applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuote {
    /// Pre-fee collateral from the curve
    pub gross: u128,
    /// Fee routed to the fee destination
    pub fee: u128,
    /// What the trader pays (buy) or receives (sell)
    pub net: u128,
}

/// Apply the fee schedule to a curve quote
///
/// `fee = min(gross · trade_fee_bps, notional · max_option_fee_bps) / 10,000`,
/// rounded down. Buyers pay `gross + fee`, sellers receive `gross - fee`.
///
/// # Arguments
/// * `side` - Trader's direction
/// * `gross` - Collateral amount from the bonding curve
/// * `notional` - Collateral backing the traded options
/// * `schedule` - Fee parameters
pub fn apply_fee(side: Side, gross: u128, notional: u128, schedule: &FeeSchedule) -> Result<FeeQuote, ModelError> {
    schedule.validate()?;

    let proportional = mul_div(gross, schedule.trade_fee_bps as u128, BPS_SCALE, Rounding::Down)?;
    let cap = mul_div(notional, schedule.max_option_fee_bps as u128, BPS_SCALE, Rounding::Down)?;
    let fee = proportional.min(cap);

    let net = match side {
        Side::Buy => gross.checked_add(fee).ok_or(ModelError::Overflow)?,
        // fee <= gross since trade_fee_bps <= BPS_SCALE
        Side::Sell => gross - fee,
    };

    Ok(FeeQuote { gross, fee, net })
}
