//! Options AMM - pricing and accounting engine for a tokenized options pool
//!
//! Liquidity providers deposit collateral into one shared pool. Traders buy
//! and sell the two complementary legs of each option series against it:
//! the bToken (the holder's claim) and the wToken (the writer's claim on the
//! remaining collateral). Prices come from an option model and are turned
//! into executable quotes by a virtual-reserve bonding curve.
//!
//! The engine is a pure state machine over [`OptionsAmm`]. Tokens, oracles
//! and authorization live behind the traits in [`host`]; every mutating call
//! stages its new state, commits it, and only then emits ledger effects.

#![forbid(unsafe_code)]

pub mod admin;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod liquidity;
pub mod params;
pub mod pool;
pub mod series;
pub mod sim;
pub mod trade;

pub use amm_model::{LegPrices, OptionStyle, Side, ONE};
pub use error::{AmmError, Result};
pub use host::{Authorization, Host, LedgerOp, PriceFeedValue, SeriesOracle, Token, TokenLedger, VolatilityOracle};
pub use lifecycle::ClaimReceipt;
pub use liquidity::{DepositReceipt, WithdrawReceipt};
pub use params::{AmmParams, PoolConfig};
pub use pool::{OptionsAmm, PoolState};
pub use series::{Leg, Residuals, Series, SeriesId, SeriesRegistry, SeriesState, MAX_SERIES};
pub use sim::SimHost;
pub use trade::TradeQuote;

/// 32-byte account identifier
pub type Address = [u8; 32];
