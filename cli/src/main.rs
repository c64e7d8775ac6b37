//! Options AMM CLI - price options and replay pool scenarios
//!
//! Every command runs locally against the in-memory host: `price` evaluates
//! the option model, `quote` replays a scenario and prices one more trade,
//! and `simulate` replays a scenario step by step.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use options_amm::{OptionStyle, SeriesOracle, Side};

mod config;
mod simulate;
mod units;

use config::{days_to_seconds, display_address, parse_leg, parse_side, Scenario};
use simulate::{print_step, Simulation};
use units::{format_decimal, parse_decimal};

const PRICE_DECIMALS: u32 = 18;

#[derive(Parser)]
#[command(name = "optamm")]
#[command(about = "Options AMM CLI - price options and replay pool scenarios", long_about = None)]
#[command(version)]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Price both legs of an option
    Price {
        /// Underlying spot price
        #[arg(long)]
        spot: String,

        /// Strike price
        #[arg(long)]
        strike: String,

        /// Days until expiration
        #[arg(long, default_value = "30")]
        days: u64,

        /// Annualized volatility (0.8 for 80%)
        #[arg(long, default_value = "0.8")]
        volatility: String,

        /// call or put
        #[arg(long, default_value = "call")]
        style: String,

        /// Decimals of the spot and strike values
        #[arg(long, default_value = "8")]
        price_decimals: u32,
    },

    /// Replay a scenario, then quote one more trade
    Quote {
        /// Scenario TOML file
        scenario: PathBuf,

        /// Series id
        #[arg(long)]
        series: u64,

        /// b or w
        #[arg(long, default_value = "b")]
        leg: String,

        /// buy or sell
        #[arg(long, default_value = "buy")]
        side: String,

        /// Option amount in base units
        #[arg(long)]
        amount: u64,
    },

    /// Replay a scenario step by step
    Simulate {
        /// Scenario TOML file
        scenario: PathBuf,
    },
}

/// Render unix seconds for humans
pub fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| chrono::DateTime::from_timestamp(s, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

fn parse_style(value: &str) -> Result<OptionStyle> {
    match value.to_ascii_lowercase().as_str() {
        "call" => Ok(OptionStyle::Call),
        "put" => Ok(OptionStyle::Put),
        _ => anyhow::bail!("Unknown option style: {}. Use call or put", value),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Price { spot, strike, days, volatility, style, price_decimals } => {
            let spot = parse_decimal(&spot, price_decimals).context("Invalid spot")?;
            let strike = parse_decimal(&strike, price_decimals).context("Invalid strike")?;
            let volatility = parse_decimal(&volatility, 18).context("Invalid volatility")?;
            let style = parse_style(&style)?;
            let seconds = i64::try_from(days_to_seconds(days)?).context("Expiry too far out")?;

            let legs = amm_model::price(seconds, strike, spot, volatility, style)
                .context("Failed to price option")?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&legs)?);
            } else {
                println!("{}", "=== Option Price ===".bright_green().bold());
                println!("{} {:?}", "Style:".bright_cyan(), style);
                println!("{} {} days", "Expiry:".bright_cyan(), days);
                println!("{} {}", "bToken:".bright_cyan(), format_decimal(legs.b_token, PRICE_DECIMALS));
                println!("{} {}", "wToken:".bright_cyan(), format_decimal(legs.w_token, PRICE_DECIMALS));
            }
        }
        Commands::Quote { scenario, series, leg, side, amount } => {
            let leg = parse_leg(&leg)?;
            let side = parse_side(&side)?;
            let mut sim = Simulation::new(Scenario::load(&scenario)?)?;
            let reports = sim.run();
            if cli.verbose {
                reports.iter().for_each(print_step);
            }

            let quote = match side {
                Side::Buy => sim.amm.quote_buy(&sim.host, series, leg, u128::from(amount)),
                Side::Sell => sim.amm.quote_sell(&sim.host, series, leg, u128::from(amount)),
            }
            .context("Failed to quote trade")?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&quote)?);
            } else {
                println!("{}", "=== Quote ===".bright_green().bold());
                println!("{} {} {} {:?} of series {}", "Trade:".bright_cyan(), format!("{:?}", side).to_lowercase(), amount, leg, series);
                println!("{} {}", "Model price:".bright_cyan(), format_decimal(quote.price, PRICE_DECIMALS));
                println!("{} {}", "Curve amount:".bright_cyan(), quote.gross_collateral);
                println!("{} {}", "Fee:".bright_cyan(), quote.fee);
                println!("{} {}", "Net collateral:".bright_cyan(), quote.net_collateral.to_string().bold());
            }
        }
        Commands::Simulate { scenario } => {
            let mut sim = Simulation::new(Scenario::load(&scenario)?)?;
            let reports = sim.run();

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
                return Ok(());
            }

            println!("{}", "=== Simulation ===".bright_green().bold());
            println!("{} {}\n", "Scenario:".bright_cyan(), scenario.display());
            reports.iter().for_each(print_step);

            let failed = reports.iter().filter(|r| r.error.is_some()).count();
            println!(
                "\n{} {} passed, {} failed",
                "Steps:".bright_cyan(),
                reports.len() - failed,
                failed
            );

            println!("\n{}", "=== Pool ===".bright_green().bold());
            println!("{} {}", "Clock:".bright_cyan(), format_timestamp(sim.host.current_time()));
            println!("{} {}", "Collateral:".bright_cyan(), sim.amm.collateral());
            println!("{} {}", "LP supply:".bright_cyan(), sim.amm.lp_supply());
            match sim.amm.pool_value(&sim.host, true) {
                Ok(value) => println!("{} {}", "Pool value:".bright_cyan(), value),
                Err(err) => println!("{} {}", "Pool value:".bright_cyan(), err.to_string().yellow()),
            }
            for id in sim.amm.active_series() {
                if let Some(entry) = sim.amm.series(id) {
                    println!(
                        "  series {} {:?} strike {} expires {} | residual b {} w {}",
                        id,
                        entry.series.style,
                        entry.series.strike_price,
                        format_timestamp(entry.series.expiration),
                        entry.residuals.b_token,
                        entry.residuals.w_token
                    );
                }
            }

            if cli.verbose {
                println!("\n{}", "=== Accounts ===".bright_green().bold());
                for (label, address) in sim.accounts() {
                    println!(
                        "  {} ({}) collateral {}",
                        label,
                        display_address(&address).dimmed(),
                        sim.collateral_of(label)
                    );
                }
            }
        }
    }

    Ok(())
}
