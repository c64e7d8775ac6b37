//! Virtual reserve bonding curve
//!
//! The pool never holds a reserve pair of its own. For every quote it
//! derives virtual reserves of the traded leg (`Rr`) and the opposite leg
//! (`Rc`) whose ratio reproduces the model price, `p = Rc / (Rr + Rc)`,
//! capped by what the pool could actually deliver: residual tokens plus
//! everything its collateral could mint.
//!
//! Buying Δ of the traded leg costs the collateral `c` that keeps
//! `(Rr - Δ + c)(Rc + c) = Rr·Rc`, selling Δ pays the `c` that keeps
//! `(Rr + Δ - c)(Rc - c) = Rr·Rc`:
//!
//! ```text
//! buy:  c = ½·(sqrt((Rr + Rc - Δ)² + 4·Δ·Rc) + Δ - Rr - Rc)
//! sell: c = ½·((Rr + Rc + Δ) - sqrt((Rr + Rc + Δ)² - 4·Δ·Rc))
//! ```
//!
//! All amounts are in collateral units; callers convert put legs first.

use serde::{Deserialize, Serialize};

use crate::fixed::{self, add, mul, mul_div, sub, wide, Rounding, U256};
use crate::{ModelError, ONE};

/// Sub-units per collateral unit carried by virtual reserves
pub const RESERVE_PRECISION: u128 = 1_000_000_000;

/// Trade direction from the trader's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// Virtual reserves in RESERVE_PRECISION sub-units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualReserves {
    /// Reserve of the leg being traded
    pub traded: u128,
    /// Reserve of the complementary leg
    pub opposite: u128,
}

fn to_sub_units(amount: u128) -> Result<u128, ModelError> {
    amount.checked_mul(RESERVE_PRECISION).ok_or(ModelError::Overflow)
}

/// Compute virtual reserves for one quote
///
/// The side with the larger share of the price sits at its maximum and the
/// other is derived from the price ratio. A derived reserve that would
/// exceed its own maximum is clamped, and the first side is recomputed.
/// Derived reserves round so that the effective price favors the pool.
///
/// # Arguments
/// * `traded_price` - Model price of the traded leg (scaled by ONE)
/// * `residual_traded` - Traded-leg tokens held by the pool
/// * `residual_opposite` - Opposite-leg tokens held by the pool
/// * `collateral` - Pool collateral available for minting
/// * `side` - Trader's direction
pub fn virtual_reserves(
    traded_price: u128,
    residual_traded: u128,
    residual_opposite: u128,
    collateral: u128,
    side: Side,
) -> Result<VirtualReserves, ModelError> {
    if traded_price > ONE {
        return Err(ModelError::InvalidPrice);
    }
    let opposite_price = ONE - traded_price;

    let traded_max = to_sub_units(residual_traded.checked_add(collateral).ok_or(ModelError::Overflow)?)?;
    let opposite_max = to_sub_units(residual_opposite.checked_add(collateral).ok_or(ModelError::Overflow)?)?;

    // Buyers pay more when Rc is larger or Rr smaller; sellers the reverse
    let (traded_rounding, opposite_rounding) = match side {
        Side::Buy => (Rounding::Down, Rounding::Up),
        Side::Sell => (Rounding::Up, Rounding::Down),
    };

    let reserves = if traded_price <= opposite_price {
        let mut traded = traded_max;
        let mut opposite = mul_div(traded, traded_price, opposite_price, opposite_rounding)?;
        if opposite > opposite_max {
            opposite = opposite_max;
            traded = mul_div(opposite, opposite_price, traded_price, traded_rounding)?;
        }
        VirtualReserves { traded, opposite }
    } else {
        let mut opposite = opposite_max;
        let mut traded = mul_div(opposite, opposite_price, traded_price, traded_rounding)?;
        if traded > traded_max {
            traded = traded_max;
            opposite = mul_div(traded, traded_price, opposite_price, opposite_rounding)?;
        }
        VirtualReserves { traded, opposite }
    };

    Ok(reserves)
}

fn from_sub_units(value: U256, rounding: Rounding) -> Result<u128, ModelError> {
    fixed::narrow(fixed::div(value, wide(RESERVE_PRECISION), rounding)?)
}

/// Collateral a buyer pays for `amount` of the traded leg (rounded up)
pub fn buy_collateral(reserves: &VirtualReserves, amount: u128) -> Result<u128, ModelError> {
    let delta = wide(to_sub_units(amount)?);
    let traded = wide(reserves.traded);
    let opposite = wide(reserves.opposite);

    let base = add(traded, opposite)?;
    let gap = if base > delta { base - delta } else { delta - base };
    let discriminant = add(mul(gap, gap)?, mul(mul(wide(4), delta)?, opposite)?)?;
    let root = fixed::sqrt(discriminant, Rounding::Up)?;

    // root >= |base - delta|, so the numerator cannot go negative
    let numerator = sub(add(root, delta)?, base)?;
    let cost = fixed::div(numerator, wide(2), Rounding::Up)?;
    from_sub_units(cost, Rounding::Up)
}

/// Collateral a seller receives for `amount` of the traded leg (rounded down)
pub fn sell_collateral(reserves: &VirtualReserves, amount: u128) -> Result<u128, ModelError> {
    let delta = wide(to_sub_units(amount)?);
    let opposite = wide(reserves.opposite);

    let sum = add(add(wide(reserves.traded), opposite)?, delta)?;
    let discriminant = sub(mul(sum, sum)?, mul(mul(wide(4), delta)?, opposite)?)?;
    let root = fixed::sqrt(discriminant, Rounding::Up)?;

    let proceeds = fixed::div(sub(sum, root)?, wide(2), Rounding::Down)?;
    from_sub_units(proceeds, Rounding::Down)
}
