//! Collaborator interfaces
//!
//! The engine owns pool accounting only. Token balances, series terms,
//! prices, volatility and roles belong to the host and are reached through
//! these traits. A host usually implements all four on one type; [`Host`]
//! is implemented for any such type.

use serde::{Deserialize, Serialize};

use crate::series::SeriesId;
use crate::{Address, Result};

/// Tokens the engine moves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Token {
    Collateral,
    LpShare,
    BToken(SeriesId),
    WToken(SeriesId),
}

/// A single ledger effect emitted after state is committed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerOp {
    Transfer { token: Token, from: Address, to: Address, amount: u128 },
    Mint { token: Token, to: Address, amount: u128 },
    Burn { token: Token, from: Address, amount: u128 },
}

/// Raw underlying price feed reading
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFeedValue {
    /// Price in feed units; non-positive answers are invalid
    pub answer: i128,
    /// Unix seconds of the last update
    pub updated_at: u64,
}

// ============================================================================
// Collaborator Traits
// ============================================================================

pub trait TokenLedger {
    fn balance_of(&self, token: Token, owner: &Address) -> u128;

    fn transfer(&mut self, token: Token, from: &Address, to: &Address, amount: u128) -> Result<()>;

    fn mint(&mut self, token: Token, to: &Address, amount: u128) -> Result<()>;

    fn burn(&mut self, token: Token, from: &Address, amount: u128) -> Result<()>;

    /// Dispatch a recorded effect
    fn apply(&mut self, op: &LedgerOp) -> Result<()> {
        match *op {
            LedgerOp::Transfer { token, from, to, amount } => self.transfer(token, &from, &to, amount),
            LedgerOp::Mint { token, to, amount } => self.mint(token, &to, amount),
            LedgerOp::Burn { token, from, amount } => self.burn(token, &from, amount),
        }
    }
}

/// Series terms, clock and underlying prices
pub trait SeriesOracle {
    /// Current unix time in seconds
    fn current_time(&self) -> u64;

    /// Expiration registered with the series controller
    fn expiration_date(&self, series: SeriesId) -> Option<u64>;

    fn is_expired(&self, series: SeriesId) -> bool;

    /// Settlement price once published
    fn settlement_price(&self, series: SeriesId) -> Option<u128>;

    fn underlying_price(&self) -> PriceFeedValue;
}

pub trait VolatilityOracle {
    /// Annualized volatility scaled by ONE
    fn volatility_for(&self, series: SeriesId) -> u128;
}

pub trait Authorization {
    fn is_owner(&self, caller: &Address) -> bool;

    fn is_on_deposit_allow_list(&self, caller: &Address) -> bool;
}

/// Everything the engine needs from its environment
pub trait Host: TokenLedger + SeriesOracle + VolatilityOracle + Authorization {}

impl<T> Host for T where T: TokenLedger + SeriesOracle + VolatilityOracle + Authorization {}
