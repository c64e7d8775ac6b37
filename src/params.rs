//! Pool configuration and tunable parameters

use amm_model::{mul_div, FeeSchedule, OptionStyle, Rounding, BPS_SCALE};
use serde::{Deserialize, Serialize};

use crate::series::{Series, MAX_SERIES};
use crate::{Address, AmmError, Result};

/// Immutable per-pool configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Account holding the pool's collateral and residual tokens
    pub pool_address: Address,

    /// Series controller: registers series and escrows option collateral
    pub series_controller: Address,

    /// Decimals of the collateral token
    pub collateral_decimals: u8,

    /// Decimals of the underlying token (option tokens share them)
    pub underlying_decimals: u8,

    /// Decimals of the underlying price feed and strikes
    pub price_decimals: u8,
}

impl PoolConfig {
    /// Collateral `amount` options of `series` are worth at par, rounded down
    ///
    /// Calls lock one underlying per option. Puts lock the strike,
    /// converted from price-feed units into collateral units. Releases from
    /// escrow and every valuation use this.
    pub fn collateral_per_option(&self, series: &Series, amount: u128) -> Result<u128> {
        self.convert(series, amount, Rounding::Down)
    }

    /// Collateral escrowed to mint `amount` options of `series`, rounded up
    ///
    /// Escrow always covers the rounded-down releases of the same options,
    /// however they are later split across closes and claims.
    pub fn collateral_to_lock(&self, series: &Series, amount: u128) -> Result<u128> {
        self.convert(series, amount, Rounding::Up)
    }

    fn convert(&self, series: &Series, amount: u128, rounding: Rounding) -> Result<u128> {
        match series.style {
            OptionStyle::Call => Ok(amount),
            OptionStyle::Put => {
                let strike_in_collateral = series
                    .strike_price
                    .checked_mul(pow10(self.collateral_decimals)?)
                    .ok_or(AmmError::Overflow)?;
                let scale = pow10(self.price_decimals.saturating_add(self.underlying_decimals))?;
                Ok(mul_div(amount, strike_in_collateral, scale, rounding)?)
            }
        }
    }
}

fn pow10(exp: u8) -> Result<u128> {
    10u128.checked_pow(exp as u32).ok_or(AmmError::Overflow)
}

/// Administrator-tunable parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmmParams {
    /// Trading fee in basis points of the curve amount
    pub trade_fee_bps: u16,

    /// Fee cap in basis points of the trade's notional collateral
    pub max_option_fee_bps: u16,

    /// Recipient of trading fees
    pub fee_destination: Address,

    /// Reject deposits that push collateral over `global_deposit_limit`
    pub enforce_deposit_limits: bool,

    /// Upper bound on pool collateral while limits are enforced
    pub global_deposit_limit: u128,

    /// Only allow-listed addresses may deposit
    pub allow_list_enabled: bool,

    /// Active series capacity (at most MAX_SERIES)
    pub max_series: u16,

    /// Smallest tradeable option amount, in option-token base units
    pub min_trade_size: u128,

    /// Oldest acceptable underlying price, in seconds
    pub max_price_staleness_secs: u64,
}

impl Default for AmmParams {
    fn default() -> Self {
        Self {
            trade_fee_bps: 0,
            max_option_fee_bps: 0,
            fee_destination: [0u8; 32],
            enforce_deposit_limits: false,
            global_deposit_limit: 0,
            allow_list_enabled: false,
            max_series: MAX_SERIES as u16,
            min_trade_size: 1_000,
            max_price_staleness_secs: 3_600,
        }
    }
}

impl AmmParams {
    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule {
            trade_fee_bps: self.trade_fee_bps,
            max_option_fee_bps: self.max_option_fee_bps,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.trade_fee_bps as u128 > BPS_SCALE || self.max_option_fee_bps as u128 > BPS_SCALE {
            return Err(AmmError::InvalidParams);
        }
        if self.max_series == 0 || self.max_series as usize > MAX_SERIES {
            return Err(AmmError::InvalidParams);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PoolConfig {
        PoolConfig {
            pool_address: [1u8; 32],
            series_controller: [2u8; 32],
            collateral_decimals: 6,
            underlying_decimals: 8,
            price_decimals: 8,
        }
    }

    fn series(style: OptionStyle, strike_price: u128) -> Series {
        Series { id: 1, strike_price, expiration: 1_000, style }
    }

    #[test]
    fn test_call_locks_one_underlying() {
        assert_eq!(config().collateral_per_option(&series(OptionStyle::Call, 1), 12_345).unwrap(), 12_345);
    }

    #[test]
    fn test_put_locks_strike_in_collateral_units() {
        // 1 option (1e8 base units) struck at 20,000.00000000 locks 20,000 USDC
        let s = series(OptionStyle::Put, 20_000 * 100_000_000);
        let locked = config().collateral_per_option(&s, 100_000_000).unwrap();
        assert_eq!(locked, 20_000 * 1_000_000);
    }

    #[test]
    fn test_fractional_put_locks_round_up() {
        // 1.23456789 strike into 6-decimal collateral: 0.0123456789 per base unit
        let s = series(OptionStyle::Put, 123_456_789);
        let cfg = config();
        assert_eq!(cfg.collateral_per_option(&s, 1_050).unwrap(), 12);
        assert_eq!(cfg.collateral_to_lock(&s, 1_050).unwrap(), 13);
        assert_eq!(cfg.collateral_per_option(&s, 2_100).unwrap(), 25);
        // Two separate mints escrow more than one release of both together
        assert!(2 * cfg.collateral_to_lock(&s, 1_050).unwrap() >= cfg.collateral_per_option(&s, 2_100).unwrap());
        // Calls and exact puts convert identically either way
        let call = series(OptionStyle::Call, 1);
        assert_eq!(cfg.collateral_to_lock(&call, 777).unwrap(), 777);
        let exact = series(OptionStyle::Put, 20_000 * 100_000_000);
        assert_eq!(cfg.collateral_to_lock(&exact, 100_000_000).unwrap(), 20_000 * 1_000_000);
    }

    #[test]
    fn test_default_params_valid() {
        let params = AmmParams::default();
        params.validate().unwrap();
        assert_eq!(params.max_series, 100);
        assert_eq!(params.min_trade_size, 1_000);
    }

    #[test]
    fn test_validate_rejects_bad_params() {
        let mut params = AmmParams { trade_fee_bps: 10_001, ..AmmParams::default() };
        assert_eq!(params.validate(), Err(AmmError::InvalidParams));
        params.trade_fee_bps = 0;
        params.max_series = 101;
        assert_eq!(params.validate(), Err(AmmError::InvalidParams));
    }
}
