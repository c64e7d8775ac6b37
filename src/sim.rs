//! In-memory host for simulations and tests
//!
//! Implements every collaborator trait over plain maps: a token ledger, a
//! settable clock and price feed, per-series expiration flags and settlement
//! prices, volatilities, and role sets.

use std::collections::{BTreeMap, BTreeSet};

use crate::host::{Authorization, PriceFeedValue, SeriesOracle, Token, TokenLedger, VolatilityOracle};
use crate::params::PoolConfig;
use crate::series::{Series, SeriesId};
use crate::{Address, AmmError, Result};

/// 80% annualized volatility, scaled by ONE
pub const DEFAULT_VOLATILITY: u128 = 800_000_000_000_000_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimHost {
    balances: BTreeMap<(Token, Address), u128>,
    now: u64,
    feed: PriceFeedValue,
    expirations: BTreeMap<SeriesId, u64>,
    expired: BTreeSet<SeriesId>,
    settlement_prices: BTreeMap<SeriesId, u128>,
    volatilities: BTreeMap<SeriesId, u128>,
    default_volatility: u128,
    owners: BTreeSet<Address>,
    allow_list: BTreeSet<Address>,
}

impl SimHost {
    pub fn new(now: u64) -> Self {
        Self {
            balances: BTreeMap::new(),
            now,
            feed: PriceFeedValue { answer: 0, updated_at: now },
            expirations: BTreeMap::new(),
            expired: BTreeSet::new(),
            settlement_prices: BTreeMap::new(),
            volatilities: BTreeMap::new(),
            default_volatility: DEFAULT_VOLATILITY,
            owners: BTreeSet::new(),
            allow_list: BTreeSet::new(),
        }
    }

    // ========================================
    // Clock & market
    // ========================================

    pub fn set_time(&mut self, now: u64) {
        self.now = now;
    }

    pub fn advance_time(&mut self, seconds: u64) {
        self.now = self.now.saturating_add(seconds);
    }

    pub fn set_underlying_price(&mut self, answer: i128, updated_at: u64) {
        self.feed = PriceFeedValue { answer, updated_at };
    }

    pub fn set_default_volatility(&mut self, volatility: u128) {
        self.default_volatility = volatility;
    }

    pub fn set_volatility(&mut self, series: SeriesId, volatility: u128) {
        self.volatilities.insert(series, volatility);
    }

    // ========================================
    // Series controller
    // ========================================

    /// Record a series' expiration as the series controller would
    pub fn register_series(&mut self, series: &Series) {
        self.expirations.insert(series.id, series.expiration);
    }

    /// Force the expired flag regardless of the clock
    pub fn set_expired(&mut self, series: SeriesId, expired: bool) {
        if expired {
            self.expired.insert(series);
        } else {
            self.expired.remove(&series);
        }
    }

    pub fn set_settlement_price(&mut self, series: SeriesId, price: u128) {
        self.settlement_prices.insert(series, price);
    }

    /// Write `amount` options for `holder` directly at the series controller
    ///
    /// Moves the backing collateral from the holder into escrow and mints
    /// both legs to the holder.
    pub fn write_options(&mut self, config: &PoolConfig, series: &Series, holder: &Address, amount: u128) -> Result<()> {
        let locked = config.collateral_to_lock(series, amount)?;
        self.transfer(Token::Collateral, holder, &config.series_controller, locked)?;
        self.mint(Token::BToken(series.id), holder, amount)?;
        self.mint(Token::WToken(series.id), holder, amount)
    }

    // ========================================
    // Roles & balances
    // ========================================

    pub fn add_owner(&mut self, owner: Address) {
        self.owners.insert(owner);
    }

    pub fn allow_depositor(&mut self, depositor: Address) {
        self.allow_list.insert(depositor);
    }

    /// Fund an account out of thin air
    pub fn credit(&mut self, token: Token, owner: &Address, amount: u128) {
        *self.balances.entry((token, *owner)).or_insert(0) += amount;
    }

    fn debit(&mut self, token: Token, owner: &Address, amount: u128) -> Result<()> {
        let balance = self.balances.entry((token, *owner)).or_insert(0);
        if *balance < amount {
            return Err(AmmError::LedgerRejected(format!(
                "{:?} balance {} below {}",
                token, balance, amount
            )));
        }
        *balance -= amount;
        Ok(())
    }
}

impl TokenLedger for SimHost {
    fn balance_of(&self, token: Token, owner: &Address) -> u128 {
        self.balances.get(&(token, *owner)).copied().unwrap_or(0)
    }

    fn transfer(&mut self, token: Token, from: &Address, to: &Address, amount: u128) -> Result<()> {
        self.debit(token, from, amount)?;
        self.credit(token, to, amount);
        Ok(())
    }

    fn mint(&mut self, token: Token, to: &Address, amount: u128) -> Result<()> {
        self.credit(token, to, amount);
        Ok(())
    }

    fn burn(&mut self, token: Token, from: &Address, amount: u128) -> Result<()> {
        self.debit(token, from, amount)
    }
}

impl SeriesOracle for SimHost {
    fn current_time(&self) -> u64 {
        self.now
    }

    fn expiration_date(&self, series: SeriesId) -> Option<u64> {
        self.expirations.get(&series).copied()
    }

    fn is_expired(&self, series: SeriesId) -> bool {
        self.expired.contains(&series) || self.expirations.get(&series).is_some_and(|&expiry| self.now >= expiry)
    }

    fn settlement_price(&self, series: SeriesId) -> Option<u128> {
        self.settlement_prices.get(&series).copied()
    }

    fn underlying_price(&self) -> PriceFeedValue {
        self.feed
    }
}

impl VolatilityOracle for SimHost {
    fn volatility_for(&self, series: SeriesId) -> u128 {
        self.volatilities.get(&series).copied().unwrap_or(self.default_volatility)
    }
}

impl Authorization for SimHost {
    fn is_owner(&self, caller: &Address) -> bool {
        self.owners.contains(caller)
    }

    fn is_on_deposit_allow_list(&self, caller: &Address) -> bool {
        self.allow_list.contains(caller)
    }
}
