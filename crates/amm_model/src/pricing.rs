//! Option pricing model
//!
//! Normalized price of the bToken leg (the option holder's claim) as a
//! fraction of one option's collateral, using a moneyness-damped
//! Brenner–Subrahmanyam approximation:
//!
//! ```text
//! time_value = 0.4 · σ · sqrt(t / year) · min(S, K) / max(S, K)
//! intrinsic  = (S - K) / S  for in-the-money calls
//!            = (K - S) / K  for in-the-money puts
//! b          = min(intrinsic + time_value, 1)
//! w          = 1 - b
//! ```
//!
//! Call collateral is the underlying, so call value is normalized by spot.
//! Put collateral is the strike asset, so put value is normalized by strike.

use serde::{Deserialize, Serialize};

use crate::fixed::{self, mul_div, Rounding};
use crate::{ModelError, ONE, SECONDS_PER_YEAR};

/// 1/sqrt(2π) rounded to 0.4, scaled by ONE
pub const ATM_FACTOR: u128 = 400_000_000_000_000_000;

/// Payoff style of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionStyle {
    Call,
    Put,
}

/// Normalized prices of both legs, each in [0, ONE], summing to ONE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegPrices {
    pub b_token: u128,
    pub w_token: u128,
}

impl LegPrices {
    fn from_b_token(b_token: u128) -> Self {
        let b_token = b_token.min(ONE);
        Self { b_token, w_token: ONE - b_token }
    }
}

/// Fraction of collateral an in-the-money holder receives
fn intrinsic(style: OptionStyle, strike: u128, spot: u128) -> Result<u128, ModelError> {
    match style {
        OptionStyle::Call if spot > strike => mul_div(spot - strike, ONE, spot, Rounding::Down),
        OptionStyle::Put if strike > spot => mul_div(strike - spot, ONE, strike, Rounding::Down),
        _ => Ok(0),
    }
}

/// sqrt(t / year) scaled by ONE
fn sqrt_year_fraction(time_to_expiry: u64) -> Result<u128, ModelError> {
    let numerator = fixed::mul(fixed::wide(time_to_expiry as u128), fixed::wide(ONE * ONE))?;
    let scaled = fixed::div(numerator, fixed::wide(SECONDS_PER_YEAR as u128), Rounding::Down)?;
    fixed::narrow(fixed::sqrt(scaled, Rounding::Down)?)
}

/// Price both legs of a series
///
/// # Arguments
/// * `time_to_expiry` - Seconds until expiration (must be > 0)
/// * `strike` - Strike price in price-feed units
/// * `underlying_price` - Spot price in price-feed units
/// * `volatility` - Annualized volatility scaled by ONE
/// * `style` - Call or put
///
/// # Errors
/// * `NonPositiveTimeToExpiry` if `time_to_expiry <= 0`
/// * `InvalidPrice` if strike or spot is zero
pub fn price(
    time_to_expiry: i64,
    strike: u128,
    underlying_price: u128,
    volatility: u128,
    style: OptionStyle,
) -> Result<LegPrices, ModelError> {
    if time_to_expiry <= 0 {
        return Err(ModelError::NonPositiveTimeToExpiry);
    }
    if strike == 0 || underlying_price == 0 {
        return Err(ModelError::InvalidPrice);
    }

    let root_t = sqrt_year_fraction(time_to_expiry as u64)?;
    let at_the_money = mul_div(mul_div(ATM_FACTOR, volatility, ONE, Rounding::Down)?, root_t, ONE, Rounding::Down)?;

    let (low, high) = if strike < underlying_price {
        (strike, underlying_price)
    } else {
        (underlying_price, strike)
    };
    let time_value = mul_div(at_the_money, low, high, Rounding::Down)?;

    let b_token = intrinsic(style, strike, underlying_price)?.saturating_add(time_value);
    Ok(LegPrices::from_b_token(b_token))
}

/// Per-leg payout fraction once the settlement price is known
///
/// The bToken receives the intrinsic value, the wToken the remainder.
pub fn settlement_payout(style: OptionStyle, strike: u128, settlement_price: u128) -> Result<LegPrices, ModelError> {
    if strike == 0 || settlement_price == 0 {
        return Err(ModelError::InvalidPrice);
    }
    Ok(LegPrices::from_b_token(intrinsic(style, strike, settlement_price)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICE: u128 = 100_000_000; // 1.0 with 8 decimals
    const VOL: u128 = 150_000_000_000_000_000; // 15%
    const YEAR: i64 = SECONDS_PER_YEAR as i64;

    #[test]
    fn test_atm_one_year() {
        // 0.4 * 0.15 * sqrt(1) = 0.06 exactly
        let legs = price(YEAR, 2_000 * PRICE, 2_000 * PRICE, VOL, OptionStyle::Call).unwrap();
        assert_eq!(legs.b_token, 60_000_000_000_000_000);
        assert_eq!(legs.w_token, ONE - 60_000_000_000_000_000);
    }

    #[test]
    fn test_quarter_year_halves_time_value() {
        let legs = price(YEAR / 4, PRICE, PRICE, VOL, OptionStyle::Put).unwrap();
        assert_eq!(legs.b_token, 30_000_000_000_000_000);
    }

    #[test]
    fn test_expired_rejected() {
        assert_eq!(price(0, PRICE, PRICE, VOL, OptionStyle::Call), Err(ModelError::NonPositiveTimeToExpiry));
        assert_eq!(price(-5, PRICE, PRICE, VOL, OptionStyle::Call), Err(ModelError::NonPositiveTimeToExpiry));
    }

    #[test]
    fn test_zero_prices_rejected() {
        assert_eq!(price(YEAR, 0, PRICE, VOL, OptionStyle::Call), Err(ModelError::InvalidPrice));
        assert_eq!(price(YEAR, PRICE, 0, VOL, OptionStyle::Put), Err(ModelError::InvalidPrice));
    }

    #[test]
    fn test_moneyness_ordering() {
        let itm = price(YEAR, 80 * PRICE, 100 * PRICE, VOL, OptionStyle::Call).unwrap();
        let atm = price(YEAR, 100 * PRICE, 100 * PRICE, VOL, OptionStyle::Call).unwrap();
        let otm = price(YEAR, 120 * PRICE, 100 * PRICE, VOL, OptionStyle::Call).unwrap();
        assert!(itm.b_token > atm.b_token);
        assert!(atm.b_token > otm.b_token);

        let put_itm = price(YEAR, 120 * PRICE, 100 * PRICE, VOL, OptionStyle::Put).unwrap();
        let put_otm = price(YEAR, 80 * PRICE, 100 * PRICE, VOL, OptionStyle::Put).unwrap();
        assert!(put_itm.b_token > put_otm.b_token);
    }

    #[test]
    fn test_clamped_to_one() {
        // 400% vol over 4 years puts the raw time value above 1
        let legs = price(4 * YEAR, PRICE, PRICE, 4 * ONE, OptionStyle::Call).unwrap();
        assert_eq!(legs.b_token, ONE);
        assert_eq!(legs.w_token, 0);
    }

    #[test]
    fn test_one_second_to_expiry_is_nearly_intrinsic() {
        let legs = price(1, 80 * PRICE, 100 * PRICE, VOL, OptionStyle::Call).unwrap();
        assert!(legs.b_token >= ONE / 5);
        assert!(legs.b_token < ONE / 5 + 10_000_000_000_000);
        assert_eq!(legs.b_token + legs.w_token, ONE);
    }

    #[test]
    fn test_settlement_payout() {
        // Call settles at 2x strike: holder gets half the underlying
        let call = settlement_payout(OptionStyle::Call, 100 * PRICE, 200 * PRICE).unwrap();
        assert_eq!(call.b_token, ONE / 2);
        assert_eq!(call.w_token, ONE / 2);

        // Put settles at 3/4 of strike: holder gets a quarter of the strike
        let put = settlement_payout(OptionStyle::Put, 100 * PRICE, 75 * PRICE).unwrap();
        assert_eq!(put.b_token, ONE / 4);

        let otm = settlement_payout(OptionStyle::Put, 100 * PRICE, 150 * PRICE).unwrap();
        assert_eq!(otm.b_token, 0);
        assert_eq!(otm.w_token, ONE);
    }

    proptest::proptest! {
        #[test]
        fn prop_leg_prices_clamped_and_complementary(
            time_to_expiry in 1i64..4 * YEAR,
            strike in 1u128..1_000_000 * PRICE,
            spot in 1u128..1_000_000 * PRICE,
            volatility in 0u128..5 * ONE,
            put in proptest::bool::ANY,
        ) {
            let style = if put { OptionStyle::Put } else { OptionStyle::Call };
            let legs = price(time_to_expiry, strike, spot, volatility, style).unwrap();
            proptest::prop_assert!(legs.b_token <= ONE);
            proptest::prop_assert_eq!(legs.b_token + legs.w_token, ONE);

            // Never below intrinsic value
            proptest::prop_assert!(legs.b_token >= intrinsic(style, strike, spot).unwrap());
        }
    }
}
