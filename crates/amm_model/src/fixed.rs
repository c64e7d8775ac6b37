//! Fixed-point helpers with explicit rounding direction
//!
//! Every division in the model states which way it rounds. Amounts charged
//! to a trader round up, amounts paid out round down, so rounding dust always
//! stays with the pool.

use uint::construct_uint;

use crate::ModelError;

construct_uint! {
    /// 256-bit unsigned integer for intermediate products.
    pub struct U256(4);
}

/// Direction of integer rounding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
}

pub(crate) fn wide(value: u128) -> U256 {
    U256::from(value)
}

pub(crate) fn add(a: U256, b: U256) -> Result<U256, ModelError> {
    a.checked_add(b).ok_or(ModelError::Overflow)
}

pub(crate) fn sub(a: U256, b: U256) -> Result<U256, ModelError> {
    a.checked_sub(b).ok_or(ModelError::Overflow)
}

pub(crate) fn mul(a: U256, b: U256) -> Result<U256, ModelError> {
    let (res, overflow) = a.overflowing_mul(b);
    if overflow {
        Err(ModelError::Overflow)
    } else {
        Ok(res)
    }
}

/// `numerator / denominator` rounded in the requested direction
pub(crate) fn div(numerator: U256, denominator: U256, rounding: Rounding) -> Result<U256, ModelError> {
    if denominator.is_zero() {
        return Err(ModelError::DivisionByZero);
    }
    let quotient = numerator / denominator;
    match rounding {
        Rounding::Down => Ok(quotient),
        Rounding::Up => {
            if (numerator % denominator).is_zero() {
                Ok(quotient)
            } else {
                add(quotient, U256::one())
            }
        }
    }
}

/// Narrow a 256-bit value back to u128, failing if it does not fit
pub fn narrow(value: U256) -> Result<u128, ModelError> {
    if value.bits() > 128 {
        Err(ModelError::Overflow)
    } else {
        Ok(value.low_u128())
    }
}

/// Integer square root; `Rounding::Up` returns the smallest r with r² >= x
pub fn sqrt(x: U256, rounding: Rounding) -> Result<U256, ModelError> {
    let root = x.integer_sqrt();
    match rounding {
        Rounding::Down => Ok(root),
        Rounding::Up => {
            if mul(root, root)? == x {
                Ok(root)
            } else {
                add(root, U256::one())
            }
        }
    }
}

/// `a * b / denominator` with a 256-bit intermediate
///
/// # Errors
/// * `DivisionByZero` if `denominator == 0`
/// * `Overflow` if the result does not fit in u128
pub fn mul_div(a: u128, b: u128, denominator: u128, rounding: Rounding) -> Result<u128, ModelError> {
    let product = mul(wide(a), wide(b))?;
    narrow(div(product, wide(denominator), rounding)?)
}
