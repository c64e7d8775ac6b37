//! Error types

use amm_model::ModelError;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AmmError {
    // Validation
    /// Trade amount below the pool's minimum trade size
    #[error("trade amount is below the minimum trade size")]
    MinTradeSize,

    /// Series is not in the pool's active set, or is malformed
    #[error("series is not registered with this pool")]
    InvalidSeries,

    /// Series is past expiration and no longer tradeable
    #[error("series is not open for trading")]
    SeriesNotOpen,

    /// Series has no time left to price or register
    #[error("series has expired")]
    SeriesExpired,

    /// Claim attempted before expiration
    #[error("series has not expired yet")]
    SeriesNotExpired,

    /// Active set is at capacity
    #[error("too many active series")]
    TooManySeries,

    /// Zero or otherwise unusable amount
    #[error("invalid amount")]
    InvalidAmount,

    /// Parameter update rejected
    #[error("invalid parameters")]
    InvalidParams,

    // Economic
    /// Quote moved past the caller's bound
    #[error("slippage bound exceeded")]
    SlippageExceeded,

    /// Auto-selling residual tokens requires a nonzero collateral minimum
    #[error("withdrawal with auto-sell requires a collateral minimum")]
    WithdrawCollateralMinimumRequired,

    /// Pool cannot fund the trade or payout
    #[error("insufficient pool collateral")]
    InsufficientPoolCollateral,

    /// Deposit would exceed the global deposit limit
    #[error("deposit limit exceeded")]
    DepositLimitExceeded,

    /// Depositor is not on the allow-list
    #[error("depositor is not on the allow-list")]
    NotOnAllowList,

    /// Caller does not hold enough of a token
    #[error("insufficient balance")]
    InsufficientBalance,

    /// Outstanding shares but the pool is worth nothing
    #[error("pool value is zero with outstanding shares")]
    ZeroPoolValue,

    /// No LP shares are outstanding, so nobody would own the pool's side of a trade
    #[error("pool has no liquidity providers")]
    NoLiquidity,

    // Authorization
    /// Caller lacks the required role
    #[error("unauthorized")]
    Unauthorized,

    // Oracle
    /// Non-positive or stale price feed value
    #[error("invalid price feed value")]
    InvalidPriceFeedValue,

    /// Expired series has no settlement price yet
    #[error("no settlement price yet")]
    NoSettlementPriceYet,

    // Arithmetic / host
    /// Arithmetic overflow
    #[error("arithmetic overflow")]
    Overflow,

    /// Token ledger refused an effect
    #[error("ledger rejected operation: {0}")]
    LedgerRejected(String),
}

impl From<ModelError> for AmmError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::NonPositiveTimeToExpiry => AmmError::SeriesExpired,
            ModelError::InvalidPrice => AmmError::InvalidPriceFeedValue,
            ModelError::InvalidBps => AmmError::InvalidParams,
            ModelError::DivisionByZero | ModelError::Overflow => AmmError::Overflow,
        }
    }
}

pub type Result<T> = core::result::Result<T, AmmError>;
