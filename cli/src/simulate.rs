//! Run a scenario against an in-memory host

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use options_amm::{
    Address, ClaimReceipt, DepositReceipt, OptionsAmm, SeriesOracle, SimHost, Token, TokenLedger, TradeQuote,
    WithdrawReceipt,
};
use serde::Serialize;

use crate::config::{address_for, days_to_seconds, Action, Scenario, CONTROLLER_LABEL, OWNER_LABEL};
use crate::units::parse_decimal;

/// Result of one scripted action
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Deposit(DepositReceipt),
    Trade(TradeQuote),
    Written { series: u64, amount: u128 },
    Withdraw(WithdrawReceipt),
    Clock { now: u64 },
    Price { spot: u128 },
    Expired { series: u64, settlement: u128 },
    Claims { receipts: Vec<ClaimReceipt> },
    PoolValue { value: u128, include_unclaimed: bool },
}

/// One executed step; engine errors are recorded, not fatal
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub action: Action,
    pub outcome: Option<Outcome>,
    pub error: Option<String>,
}

pub struct Simulation {
    pub amm: OptionsAmm,
    pub host: SimHost,
    scenario: Scenario,
}

impl Simulation {
    /// Build the pool, fund accounts and list every series
    pub fn new(scenario: Scenario) -> Result<Self> {
        let config = scenario.pool_config();
        let params = scenario.amm_params();
        let mut amm = OptionsAmm::new(config, params).context("Failed to create pool")?;

        let now = scenario.market.now;
        let mut host = SimHost::new(now);
        host.set_underlying_price(to_feed_answer(scenario.spot()?)?, now);
        host.set_default_volatility(scenario.volatility()?);
        let owner = address_for(OWNER_LABEL);
        host.add_owner(owner);

        for (label, balance) in &scenario.accounts {
            host.credit(Token::Collateral, &address_for(label), u128::from(*balance));
        }
        if let Some(allowed) = &scenario.params.allow_list {
            for label in allowed {
                amm.set_allow_list_entry(&host, &owner, address_for(label), true)
                    .with_context(|| format!("Failed to allow-list {}", label))?;
            }
        }

        let controller = address_for(CONTROLLER_LABEL);
        for (series, section) in scenario.listed_series()?.into_iter().zip(&scenario.series) {
            host.register_series(&series);
            if let Some(volatility) = &section.volatility {
                let volatility = parse_decimal(volatility, 18)
                    .with_context(|| format!("Invalid volatility for series {}", series.id))?;
                host.set_volatility(series.id, volatility);
            }
            amm.add_series(&host, &controller, series)
                .with_context(|| format!("Failed to list series {}", series.id))?;
        }

        log::info!(
            "scenario ready: {} accounts, {} series, {} actions",
            scenario.accounts.len(),
            scenario.series.len(),
            scenario.actions.len()
        );
        Ok(Self { amm, host, scenario })
    }

    /// Execute every scripted action in order
    pub fn run(&mut self) -> Vec<StepReport> {
        let actions = self.scenario.actions.clone();
        actions
            .into_iter()
            .enumerate()
            .map(|(step, action)| {
                let (outcome, error) = match self.apply(&action) {
                    Ok(outcome) => (Some(outcome), None),
                    Err(err) => {
                        log::warn!("step {} failed: {:#}", step, err);
                        (None, Some(format!("{:#}", err)))
                    }
                };
                StepReport { step, action, outcome, error }
            })
            .collect()
    }

    pub fn apply(&mut self, action: &Action) -> Result<Outcome> {
        log::debug!("applying {:?}", action);
        let outcome = match action {
            Action::Deposit { account, amount, min_lp_out } => {
                let who = address_for(account);
                let receipt = self.amm.provide_capital(&mut self.host, &who, u128::from(*amount), u128::from(*min_lp_out))?;
                Outcome::Deposit(receipt)
            }
            Action::Buy { account, series, leg, amount, max_collateral_in } => {
                let who = address_for(account);
                let max_in = max_collateral_in.map_or(u128::MAX, u128::from);
                let quote = self.amm.execute_buy(&mut self.host, &who, *series, *leg, u128::from(*amount), max_in)?;
                Outcome::Trade(quote)
            }
            Action::Sell { account, series, leg, amount, min_collateral_out } => {
                let who = address_for(account);
                let quote = self.amm.execute_sell(
                    &mut self.host,
                    &who,
                    *series,
                    *leg,
                    u128::from(*amount),
                    u128::from(*min_collateral_out),
                )?;
                Outcome::Trade(quote)
            }
            Action::Write { account, series, amount } => {
                let entry = self.amm.series(*series).ok_or_else(|| anyhow!("Unknown series: {}", series))?;
                let terms = entry.series;
                let config = self.amm.config;
                self.host.write_options(&config, &terms, &address_for(account), u128::from(*amount))?;
                Outcome::Written { series: *series, amount: u128::from(*amount) }
            }
            Action::Withdraw { account, shares, auto_sell, min_collateral_out } => {
                let who = address_for(account);
                let shares = match shares {
                    Some(s) => u128::from(*s),
                    None => self.host.balance_of(Token::LpShare, &who),
                };
                let receipt = self.amm.withdraw_capital(
                    &mut self.host,
                    &who,
                    shares,
                    *auto_sell,
                    u128::from(*min_collateral_out),
                )?;
                Outcome::Withdraw(receipt)
            }
            Action::AdvanceTime { days, seconds } => {
                let delta = days_to_seconds(*days)?
                    .checked_add(*seconds)
                    .context("Time step is too large")?;
                self.host.advance_time(delta);
                // The simulated feed keeps publishing at the current spot
                let spot = self.host.underlying_price().answer;
                let now = self.host.current_time();
                self.host.set_underlying_price(spot, now);
                Outcome::Clock { now }
            }
            Action::SetPrice { spot } => {
                let spot = self.scenario.price(spot)?;
                let now = self.host.current_time();
                self.host.set_underlying_price(to_feed_answer(spot)?, now);
                Outcome::Price { spot }
            }
            Action::Expire { series, settlement } => {
                let settlement = self.scenario.price(settlement)?;
                self.host.set_expired(*series, true);
                self.host.set_settlement_price(*series, settlement);
                Outcome::Expired { series: *series, settlement }
            }
            Action::ClaimAll => {
                let receipts = self.amm.claim_all_expired_tokens(&mut self.host)?;
                Outcome::Claims { receipts }
            }
            Action::PoolValue { include_unclaimed } => {
                let value = self.amm.pool_value(&self.host, *include_unclaimed)?;
                Outcome::PoolValue { value, include_unclaimed: *include_unclaimed }
            }
        };
        Ok(outcome)
    }

    pub fn collateral_of(&self, label: &str) -> u128 {
        self.host.balance_of(Token::Collateral, &address_for(label))
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&String, Address)> {
        self.scenario.accounts.keys().map(|label| (label, address_for(label)))
    }
}

fn to_feed_answer(spot: u128) -> Result<i128> {
    i128::try_from(spot).context("Spot price out of range")
}

/// Print one step the way the rest of the CLI reports progress
pub fn print_step(report: &StepReport) {
    let label = format!("[{}] {}", report.step, describe(&report.action));
    match (&report.outcome, &report.error) {
        (Some(outcome), _) => println!("{} {} {}", "✓".bright_green(), label, summarize(outcome).dimmed()),
        (None, Some(error)) => println!("{} {}: {}", "✗".bright_red(), label, error.red()),
        (None, None) => println!("{} {}", "?".yellow(), label),
    }
}

fn describe(action: &Action) -> String {
    match action {
        Action::Deposit { account, amount, .. } => format!("{} deposits {}", account, amount),
        Action::Buy { account, series, leg, amount, .. } => {
            format!("{} buys {} {:?} of series {}", account, amount, leg, series)
        }
        Action::Sell { account, series, leg, amount, .. } => {
            format!("{} sells {} {:?} of series {}", account, amount, leg, series)
        }
        Action::Write { account, series, amount } => format!("{} writes {} of series {}", account, amount, series),
        Action::Withdraw { account, shares, auto_sell, .. } => {
            let shares = shares.map_or_else(|| "all".to_string(), |s| s.to_string());
            let mode = if *auto_sell { "auto-sell" } else { "in kind" };
            format!("{} withdraws {} shares ({})", account, shares, mode)
        }
        Action::AdvanceTime { days, seconds } => format!("advance {}d {}s", days, seconds),
        Action::SetPrice { spot } => format!("spot -> {}", spot),
        Action::Expire { series, settlement } => format!("series {} settles at {}", series, settlement),
        Action::ClaimAll => "claim expired series".to_string(),
        Action::PoolValue { .. } => "pool value".to_string(),
    }
}

fn summarize(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Deposit(r) => format!("minted {} shares", r.lp_minted),
        Outcome::Trade(q) => format!("gross {}, fee {}, net {}", q.gross_collateral, q.fee, q.net_collateral),
        Outcome::Written { amount, .. } => format!("{} pairs", amount),
        Outcome::Withdraw(r) => format!(
            "{} collateral, {} token payouts, {} claims",
            r.collateral_out,
            r.tokens_out.len(),
            r.claims.len()
        ),
        Outcome::Clock { now } => format!("now {}", crate::format_timestamp(*now)),
        Outcome::Price { spot } => format!("{}", spot),
        Outcome::Expired { settlement, .. } => format!("settlement {}", settlement),
        Outcome::Claims { receipts } => {
            let total: u128 = receipts.iter().map(|r| r.collateral).sum();
            format!("{} series for {} collateral", receipts.len(), total)
        }
        Outcome::PoolValue { value, .. } => format!("{}", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SCENARIO: &str = r#"
[market]
now = 1700000000
spot = "2000"
volatility = "0.15"

[accounts]
alice = 10000
bob = 1000

[[series]]
id = 1
strike = "2000"
days = 365
style = "call"

[[actions]]
action = "deposit"
account = "alice"
amount = 10000

[[actions]]
action = "buy"
account = "bob"
series = 1
leg = "b_token"
amount = 3000
max_collateral_in = 242

[[actions]]
action = "buy"
account = "bob"
series = 1
leg = "b_token"
amount = 3000
max_collateral_in = 243

[[actions]]
action = "pool_value"

[[actions]]
action = "advance_time"
days = 365

[[actions]]
action = "expire"
series = 1
settlement = "2500"

[[actions]]
action = "withdraw"
account = "alice"
auto_sell = true
min_collateral_out = 1
"#;

    fn load(data: &str) -> Simulation {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(data.as_bytes()).unwrap();
        let scenario = Scenario::load(file.path()).unwrap();
        Simulation::new(scenario).unwrap()
    }

    #[test]
    fn test_scenario_runs_end_to_end() {
        let mut sim = load(SCENARIO);
        let reports = sim.run();
        assert_eq!(reports.len(), 7);

        // The first buy is over its slippage bound and leaves nothing behind
        assert!(reports[1].error.as_deref().unwrap().contains("slippage"));
        match &reports[2].outcome {
            Some(Outcome::Trade(q)) => assert_eq!(q.net_collateral, 243),
            other => panic!("unexpected outcome {:?}", other),
        }
        match &reports[3].outcome {
            Some(Outcome::PoolValue { value, .. }) => assert_eq!(*value, 10_063),
            other => panic!("unexpected outcome {:?}", other),
        }

        // Withdrawal claims the expired series: 7,243 + 3,000 * 0.8
        match &reports[6].outcome {
            Some(Outcome::Withdraw(r)) => {
                assert_eq!(r.claims.len(), 1);
                assert_eq!(r.collateral_out, 9_643);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(sim.collateral_of("alice"), 9_643);
        assert_eq!(sim.collateral_of("bob"), 1_000 - 243);
        assert_eq!(sim.amm.lp_supply(), 0);
    }

    #[test]
    fn test_reports_serialize() {
        let mut sim = load(SCENARIO);
        let reports = sim.run();
        let json = serde_json::to_string(&reports).unwrap();
        assert!(json.contains("\"outcome\":\"pool_value\""));
        assert!(json.contains("\"action\":\"deposit\""));
    }

    #[test]
    fn test_expired_listing_fails() {
        let data = SCENARIO.replace("days = 365", "days = 0");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(data.as_bytes()).unwrap();
        let scenario = Scenario::load(file.path()).unwrap();
        assert!(Simulation::new(scenario).is_err());
    }
}
