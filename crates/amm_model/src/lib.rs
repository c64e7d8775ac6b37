//! AMM Model - Pure pricing and bonding-curve math for the options pool
//!
//! Everything in this crate is deterministic integer math over explicit
//! inputs: no state, no I/O, no floating point. The engine crate feeds it
//! oracle snapshots and pool balances and applies the results.
//!
//! Fixed-point conventions:
//! - prices and fractions are scaled by [`ONE`] (1e18)
//! - fees are in basis points of [`BPS_SCALE`]
//! - curve reserves carry [`curve::RESERVE_PRECISION`] sub-units

#![forbid(unsafe_code)]

pub mod curve;
pub mod fees;
pub mod fixed;
pub mod pricing;

#[cfg(kani)]
mod proofs;

pub use curve::{buy_collateral, sell_collateral, virtual_reserves, Side, VirtualReserves};
pub use fees::{apply_fee, FeeQuote, FeeSchedule};
pub use fixed::{mul_div, Rounding, U256};
pub use pricing::{price, settlement_payout, LegPrices, OptionStyle};

/// Fixed-point one (1e18)
pub const ONE: u128 = 1_000_000_000_000_000_000;

/// Basis points scale (10,000 bps = 100%)
pub const BPS_SCALE: u128 = 10_000;

/// Seconds in a 365-day year
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Error types for model math
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Option has no time left to price
    #[error("time to expiry must be positive")]
    NonPositiveTimeToExpiry,
    /// Zero strike, zero underlying or zero settlement price
    #[error("price input must be positive")]
    InvalidPrice,
    /// Basis points outside [0, BPS_SCALE]
    #[error("basis points out of range")]
    InvalidBps,
    /// Division by zero
    #[error("division by zero")]
    DivisionByZero,
    /// Arithmetic overflow
    #[error("arithmetic overflow")]
    Overflow,
}
