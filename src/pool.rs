//! Pool state, mark-to-model valuation and the commit protocol

use std::collections::{BTreeMap, BTreeSet};

use amm_model::{mul_div, pricing, LegPrices, Rounding, ONE};

use crate::host::{Host, LedgerOp, SeriesOracle, Token, TokenLedger};
use crate::params::{AmmParams, PoolConfig};
use crate::series::{Leg, Series, SeriesId, SeriesRegistry, SeriesState};
use crate::{Address, AmmError, Result};

// ============================================================================
// Core Data Structures
// ============================================================================

/// Mutable pool state; cloned and staged by every mutating operation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolState {
    /// Collateral held by the pool (authoritative, mirrors the ledger)
    pub collateral: u128,

    /// Outstanding LP shares
    pub lp_supply: u128,

    /// Active series in insertion order
    pub series: SeriesRegistry,

    /// Addresses allowed to deposit while the allow-list is enabled
    pub deposit_allow_list: BTreeSet<Address>,
}

/// The options AMM engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionsAmm {
    pub config: PoolConfig,
    pub params: AmmParams,
    pub state: PoolState,
}

// ============================================================================
// Price Snapshot
// ============================================================================

/// Prices read once per call
///
/// Every quote, fee and slippage check inside one operation reads the same
/// clock, underlying price and per-series leg prices.
pub(crate) struct PriceBook {
    pub now: u64,
    underlying: Option<u128>,
    legs: BTreeMap<SeriesId, LegPrices>,
}

impl PriceBook {
    pub fn open<H: SeriesOracle>(host: &H) -> Self {
        Self { now: host.current_time(), underlying: None, legs: BTreeMap::new() }
    }

    /// Past expiration by the oracle's flag or by the clock
    pub fn is_expired<H: SeriesOracle>(&self, host: &H, series: &Series) -> bool {
        host.is_expired(series.id) || self.now >= series.expiration
    }

    fn underlying<H: SeriesOracle>(&mut self, host: &H, params: &AmmParams) -> Result<u128> {
        if let Some(price) = self.underlying {
            return Ok(price);
        }
        let feed = host.underlying_price();
        if feed.answer <= 0 {
            log::warn!("rejecting non-positive price feed answer {}", feed.answer);
            return Err(AmmError::InvalidPriceFeedValue);
        }
        if self.now.saturating_sub(feed.updated_at) > params.max_price_staleness_secs {
            log::warn!("rejecting stale price feed, updated at {} (now {})", feed.updated_at, self.now);
            return Err(AmmError::InvalidPriceFeedValue);
        }
        let price = feed.answer as u128;
        self.underlying = Some(price);
        Ok(price)
    }

    pub fn leg_prices<H: Host>(&mut self, host: &H, params: &AmmParams, series: &Series) -> Result<LegPrices> {
        if let Some(legs) = self.legs.get(&series.id) {
            return Ok(*legs);
        }
        let underlying = self.underlying(host, params)?;
        let time_to_expiry = seconds_until(series.expiration, self.now)?;
        let volatility = host.volatility_for(series.id);
        let legs = pricing::price(time_to_expiry, series.strike_price, underlying, volatility, series.style)?;
        log::debug!(
            "series {} priced at b={} w={} (spot {}, vol {}, t={}s)",
            series.id, legs.b_token, legs.w_token, underlying, volatility, time_to_expiry
        );
        self.legs.insert(series.id, legs);
        Ok(legs)
    }
}

/// Signed seconds from `now` until `expiration`
pub(crate) fn seconds_until(expiration: u64, now: u64) -> Result<i64> {
    let expiration = i64::try_from(expiration).map_err(|_| AmmError::InvalidSeries)?;
    let now = i64::try_from(now).map_err(|_| AmmError::Overflow)?;
    expiration.checked_sub(now).ok_or(AmmError::Overflow)
}

// ============================================================================
// Ledger Effects
// ============================================================================

/// Ledger effects recorded while staging; zero amounts are dropped
#[derive(Debug, Default)]
pub(crate) struct Effects {
    ops: Vec<LedgerOp>,
}

impl Effects {
    pub fn transfer(&mut self, token: Token, from: Address, to: Address, amount: u128) {
        if amount > 0 {
            self.ops.push(LedgerOp::Transfer { token, from, to, amount });
        }
    }

    pub fn mint(&mut self, token: Token, to: Address, amount: u128) {
        if amount > 0 {
            self.ops.push(LedgerOp::Mint { token, to, amount });
        }
    }

    pub fn burn(&mut self, token: Token, from: Address, amount: u128) {
        if amount > 0 {
            self.ops.push(LedgerOp::Burn { token, from, amount });
        }
    }
}

pub(crate) fn leg_token(series: SeriesId, leg: Leg) -> Token {
    match leg {
        Leg::BToken => Token::BToken(series),
        Leg::WToken => Token::WToken(series),
    }
}

pub(crate) fn require_balance<L: TokenLedger>(ledger: &L, token: Token, owner: &Address, amount: u128) -> Result<()> {
    if ledger.balance_of(token, owner) < amount {
        log::warn!("{:?} balance below {} for caller", token, amount);
        return Err(AmmError::InsufficientBalance);
    }
    Ok(())
}

// ============================================================================
// Engine
// ============================================================================

impl OptionsAmm {
    pub fn new(config: PoolConfig, params: AmmParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { config, params, state: PoolState::default() })
    }

    pub fn collateral(&self) -> u128 {
        self.state.collateral
    }

    pub fn lp_supply(&self) -> u128 {
        self.state.lp_supply
    }

    pub fn series(&self, id: SeriesId) -> Option<&SeriesState> {
        self.state.series.get(id)
    }

    /// Active series ids in insertion order
    pub fn active_series(&self) -> Vec<SeriesId> {
        self.state.series.ids()
    }

    /// Total pool value in collateral units
    ///
    /// Collateral plus open series' residual tokens marked to model. With
    /// `include_unclaimed`, expired series not yet claimed count at their
    /// settlement value.
    pub fn pool_value<H: Host>(&self, host: &H, include_unclaimed: bool) -> Result<u128> {
        let mut book = PriceBook::open(host);
        self.value_of(&self.state, host, &mut book, include_unclaimed)
    }

    pub(crate) fn value_of<H: Host>(
        &self,
        state: &PoolState,
        host: &H,
        book: &mut PriceBook,
        include_unclaimed: bool,
    ) -> Result<u128> {
        let mut value = state.collateral;
        for entry in state.series.iter() {
            let series_value = if book.is_expired(host, &entry.series) {
                if !include_unclaimed {
                    continue;
                }
                self.settlement_value(host, entry)?
            } else {
                let legs = book.leg_prices(host, &self.params, &entry.series)?;
                self.residual_value(entry, &legs)?
            };
            value = value.checked_add(series_value).ok_or(AmmError::Overflow)?;
        }
        Ok(value)
    }

    /// Residual tokens of one series valued at the given leg prices
    pub(crate) fn residual_value(&self, entry: &SeriesState, legs: &LegPrices) -> Result<u128> {
        let b = self.config.collateral_per_option(&entry.series, entry.residuals.b_token)?;
        let w = self.config.collateral_per_option(&entry.series, entry.residuals.w_token)?;
        let b_value = mul_div(b, legs.b_token, ONE, Rounding::Down)?;
        let w_value = mul_div(w, legs.w_token, ONE, Rounding::Down)?;
        b_value.checked_add(w_value).ok_or(AmmError::Overflow)
    }

    /// Collateral the residual tokens of an expired series redeem for
    pub(crate) fn settlement_value<H: Host>(&self, host: &H, entry: &SeriesState) -> Result<u128> {
        let settlement_price = host.settlement_price(entry.series.id).ok_or(AmmError::NoSettlementPriceYet)?;
        let payout = pricing::settlement_payout(entry.series.style, entry.series.strike_price, settlement_price)?;
        self.residual_value(entry, &payout)
    }

    // ========================================================================
    // Series controller interactions
    // ========================================================================

    /// Lock collateral with the series controller and mint `amount` pairs
    pub(crate) fn mint_pairs(&self, state: &mut PoolState, effects: &mut Effects, id: SeriesId, amount: u128) -> Result<()> {
        let entry = state.series.get_mut(id).ok_or(AmmError::InvalidSeries)?;
        let locked = self.config.collateral_to_lock(&entry.series, amount)?;
        entry.residuals.b_token = entry.residuals.b_token.checked_add(amount).ok_or(AmmError::Overflow)?;
        entry.residuals.w_token = entry.residuals.w_token.checked_add(amount).ok_or(AmmError::Overflow)?;
        state.collateral = state.collateral.checked_sub(locked).ok_or(AmmError::InsufficientPoolCollateral)?;

        let pool = self.config.pool_address;
        effects.transfer(Token::Collateral, pool, self.config.series_controller, locked);
        effects.mint(Token::BToken(id), pool, amount);
        effects.mint(Token::WToken(id), pool, amount);
        Ok(())
    }

    /// Redeem `amount` matched pairs back to collateral; returns the collateral released
    pub(crate) fn close_pairs(&self, state: &mut PoolState, effects: &mut Effects, id: SeriesId, amount: u128) -> Result<u128> {
        let entry = state.series.get_mut(id).ok_or(AmmError::InvalidSeries)?;
        if amount > entry.residuals.matched_pairs() {
            return Err(AmmError::InsufficientBalance);
        }
        entry.residuals.b_token -= amount;
        entry.residuals.w_token -= amount;
        let released = self.config.collateral_per_option(&entry.series, amount)?;
        state.collateral = state.collateral.checked_add(released).ok_or(AmmError::Overflow)?;

        let pool = self.config.pool_address;
        effects.burn(Token::BToken(id), pool, amount);
        effects.burn(Token::WToken(id), pool, amount);
        effects.transfer(Token::Collateral, self.config.series_controller, pool, released);
        Ok(released)
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Swap in staged state, then apply its ledger effects
    ///
    /// If the ledger rejects an effect the previous state is restored and
    /// the error is returned. Callers check balances before staging, so a
    /// rejection means the host ledger disagrees with the engine.
    pub(crate) fn commit<L: TokenLedger>(&mut self, ledger: &mut L, staged: PoolState, effects: Effects) -> Result<()> {
        let previous = std::mem::replace(&mut self.state, staged);
        for op in &effects.ops {
            if let Err(err) = ledger.apply(op) {
                log::error!("ledger rejected {:?}: {}; rolling back pool state", op, err);
                self.state = previous;
                return Err(err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimHost;
    use amm_model::OptionStyle;

    fn engine() -> OptionsAmm {
        let config = PoolConfig {
            pool_address: [1u8; 32],
            series_controller: [2u8; 32],
            collateral_decimals: 8,
            underlying_decimals: 8,
            price_decimals: 8,
        };
        OptionsAmm::new(config, AmmParams::default()).unwrap()
    }

    fn call_series(id: SeriesId) -> Series {
        Series { id, strike_price: 100_000_000, expiration: 2_000, style: OptionStyle::Call }
    }

    #[test]
    fn test_mint_then_close_pairs() {
        let amm = engine();
        let mut state = PoolState { collateral: 5_000, ..PoolState::default() };
        state.series.insert(SeriesState::new(call_series(1)), 100).unwrap();
        let mut effects = Effects::default();

        amm.mint_pairs(&mut state, &mut effects, 1, 2_000).unwrap();
        assert_eq!(state.collateral, 3_000);
        assert_eq!(state.series.get(1).unwrap().residuals.get(Leg::BToken), 2_000);

        let released = amm.close_pairs(&mut state, &mut effects, 1, 1_500).unwrap();
        assert_eq!(released, 1_500);
        assert_eq!(state.collateral, 4_500);
        assert_eq!(state.series.get(1).unwrap().residuals.matched_pairs(), 500);
        assert_eq!(effects.ops.len(), 6);
    }

    #[test]
    fn test_mint_beyond_collateral_rejected() {
        let amm = engine();
        let mut state = PoolState { collateral: 10, ..PoolState::default() };
        state.series.insert(SeriesState::new(call_series(1)), 100).unwrap();
        let err = amm.mint_pairs(&mut state, &mut Effects::default(), 1, 11).unwrap_err();
        assert_eq!(err, AmmError::InsufficientPoolCollateral);
    }

    #[test]
    fn test_price_book_rejects_bad_feed() {
        let amm = engine();
        let mut host = SimHost::new(1_000);
        host.set_underlying_price(0, 1_000);
        let mut book = PriceBook::open(&host);
        let err = book.leg_prices(&host, &amm.params, &call_series(1)).unwrap_err();
        assert_eq!(err, AmmError::InvalidPriceFeedValue);

        // Stale by more than an hour
        host.set_underlying_price(100_000_000, 1_000);
        host.set_time(1_000 + 3_601);
        let mut book = PriceBook::open(&host);
        let err = book.leg_prices(&host, &amm.params, &Series { expiration: 100_000, ..call_series(1) }).unwrap_err();
        assert_eq!(err, AmmError::InvalidPriceFeedValue);
    }

    #[test]
    fn test_seconds_until() {
        assert_eq!(seconds_until(2_000, 500), Ok(1_500));
        assert_eq!(seconds_until(500, 2_000), Ok(-1_500));
        assert_eq!(seconds_until(u64::MAX, 0), Err(AmmError::InvalidSeries));
        assert_eq!(seconds_until(0, u64::MAX), Err(AmmError::Overflow));
    }

    #[test]
    fn test_commit_rolls_back_on_ledger_rejection() {
        let mut amm = engine();
        let mut host = SimHost::new(1_000);
        let staged = PoolState { collateral: 99, ..PoolState::default() };
        let mut effects = Effects::default();
        // Pool holds nothing on the ledger, so this transfer fails
        effects.transfer(Token::Collateral, [1u8; 32], [3u8; 32], 5);

        let err = amm.commit(&mut host, staged, effects).unwrap_err();
        assert!(matches!(err, AmmError::LedgerRejected(_)));
        assert_eq!(amm.state, PoolState::default());
    }
}
