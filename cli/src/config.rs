//! Scenario files and account labels
//!
//! A scenario is a TOML file describing one pool, its market data, the
//! series it lists, funded accounts and a script of actions:
//!
//! ```toml
//! [market]
//! now = 1700000000
//! spot = "2000"
//! volatility = "0.15"
//!
//! [accounts]
//! alice = 10000
//!
//! [[series]]
//! id = 1
//! strike = "2000"
//! days = 365
//! style = "call"
//!
//! [[actions]]
//! action = "deposit"
//! account = "alice"
//! amount = 10000
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use options_amm::{Address, AmmParams, Leg, OptionStyle, PoolConfig, Series, SeriesId, Side};
use serde::{Deserialize, Serialize};

use crate::units::parse_decimal;

pub const SECONDS_PER_DAY: u64 = 86_400;
pub const POOL_LABEL: &str = "pool";
pub const CONTROLLER_LABEL: &str = "controller";
pub const OWNER_LABEL: &str = "owner";
pub const FEES_LABEL: &str = "fees";

/// Derive a 32-byte account id from a human label
///
/// The label's bytes fill the id from the front; longer labels are truncated.
pub fn address_for(label: &str) -> Address {
    let mut address = [0u8; 32];
    for (slot, byte) in address.iter_mut().zip(label.as_bytes()) {
        *slot = *byte;
    }
    address
}

pub fn days_to_seconds(days: u64) -> Result<u64> {
    days.checked_mul(SECONDS_PER_DAY)
        .with_context(|| format!("{} days is too far out", days))
}

pub fn display_address(address: &Address) -> String {
    bs58::encode(address).into_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolSection {
    pub collateral_decimals: u8,
    pub underlying_decimals: u8,
    pub price_decimals: u8,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self { collateral_decimals: 8, underlying_decimals: 8, price_decimals: 8 }
    }
}

/// Tunables; anything omitted keeps the engine default
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParamsSection {
    pub trade_fee_bps: Option<u16>,
    pub max_option_fee_bps: Option<u16>,
    pub deposit_limit: Option<u64>,
    pub allow_list: Option<Vec<String>>,
    pub max_series: Option<u16>,
    pub min_trade_size: Option<u64>,
    pub max_price_staleness_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketSection {
    /// Unix seconds
    pub now: u64,

    /// Underlying spot as a decimal string
    pub spot: String,

    /// Annualized volatility as a decimal string ("0.15" for 15%)
    pub volatility: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesSection {
    pub id: SeriesId,
    pub strike: String,
    /// Days from `market.now` until expiration
    pub days: u64,
    pub style: OptionStyle,
    /// Per-series volatility override
    pub volatility: Option<String>,
}

/// One scripted step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Deposit {
        account: String,
        amount: u64,
        #[serde(default)]
        min_lp_out: u64,
    },
    Buy {
        account: String,
        series: SeriesId,
        leg: Leg,
        amount: u64,
        max_collateral_in: Option<u64>,
    },
    Sell {
        account: String,
        series: SeriesId,
        leg: Leg,
        amount: u64,
        #[serde(default)]
        min_collateral_out: u64,
    },
    /// Write options at the series controller outside the pool
    Write {
        account: String,
        series: SeriesId,
        amount: u64,
    },
    Withdraw {
        account: String,
        /// Shares to burn; all the account holds when omitted
        shares: Option<u64>,
        #[serde(default)]
        auto_sell: bool,
        #[serde(default)]
        min_collateral_out: u64,
    },
    AdvanceTime {
        #[serde(default)]
        days: u64,
        #[serde(default)]
        seconds: u64,
    },
    SetPrice {
        spot: String,
    },
    Expire {
        series: SeriesId,
        settlement: String,
    },
    ClaimAll,
    PoolValue {
        #[serde(default = "default_true")]
        include_unclaimed: bool,
    },
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub pool: PoolSection,
    #[serde(default)]
    pub params: ParamsSection,
    pub market: MarketSection,
    /// Label to starting collateral balance
    #[serde(default)]
    pub accounts: BTreeMap<String, u64>,
    #[serde(default)]
    pub series: Vec<SeriesSection>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file: {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("Invalid scenario: {}", path.display()))
    }

    pub fn parse(data: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(data).context("Failed to parse scenario TOML")?;
        scenario.amm_params().validate().context("Invalid pool parameters")?;
        Ok(scenario)
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            pool_address: address_for(POOL_LABEL),
            series_controller: address_for(CONTROLLER_LABEL),
            collateral_decimals: self.pool.collateral_decimals,
            underlying_decimals: self.pool.underlying_decimals,
            price_decimals: self.pool.price_decimals,
        }
    }

    pub fn amm_params(&self) -> AmmParams {
        let defaults = AmmParams::default();
        let p = &self.params;
        AmmParams {
            trade_fee_bps: p.trade_fee_bps.unwrap_or(defaults.trade_fee_bps),
            max_option_fee_bps: p.max_option_fee_bps.unwrap_or(defaults.max_option_fee_bps),
            fee_destination: address_for(FEES_LABEL),
            enforce_deposit_limits: p.deposit_limit.is_some(),
            global_deposit_limit: p.deposit_limit.map_or(defaults.global_deposit_limit, u128::from),
            allow_list_enabled: p.allow_list.is_some(),
            max_series: p.max_series.unwrap_or(defaults.max_series),
            min_trade_size: p.min_trade_size.map_or(defaults.min_trade_size, u128::from),
            max_price_staleness_secs: p.max_price_staleness_secs.unwrap_or(defaults.max_price_staleness_secs),
        }
    }

    /// Spot in price-feed units
    pub fn spot(&self) -> Result<u128> {
        self.price(&self.market.spot)
    }

    pub fn price(&self, value: &str) -> Result<u128> {
        parse_decimal(value, self.pool.price_decimals as u32).with_context(|| format!("Invalid price '{}'", value))
    }

    pub fn volatility(&self) -> Result<u128> {
        parse_decimal(&self.market.volatility, 18).context("Invalid market volatility")
    }

    /// Resolve listed series against the market clock
    pub fn listed_series(&self) -> Result<Vec<Series>> {
        self.series
            .iter()
            .map(|s| {
                let expiration = self
                    .market
                    .now
                    .checked_add(days_to_seconds(s.days)?)
                    .with_context(|| format!("Series {} expires too far out", s.id))?;
                Ok(Series { id: s.id, strike_price: self.price(&s.strike)?, expiration, style: s.style })
            })
            .collect()
    }
}

/// Parse "buy"/"sell"
pub fn parse_side(value: &str) -> Result<Side> {
    match value.to_ascii_lowercase().as_str() {
        "buy" => Ok(Side::Buy),
        "sell" => Ok(Side::Sell),
        _ => anyhow::bail!("Unknown side: {}. Use buy or sell", value),
    }
}

/// Parse "b"/"btoken"/"w"/"wtoken"
pub fn parse_leg(value: &str) -> Result<Leg> {
    match value.to_ascii_lowercase().as_str() {
        "b" | "btoken" | "b_token" => Ok(Leg::BToken),
        "w" | "wtoken" | "w_token" => Ok(Leg::WToken),
        _ => anyhow::bail!("Unknown leg: {}. Use b or w", value),
    }
}
