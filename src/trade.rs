//! Trading against the pool
//!
//! Quotes and executions share one staging path: a quote is an execution
//! run against a scratch copy of the state with its effects discarded, so
//! what a trader is quoted is exactly what executes under the same prices.

use amm_model::{apply_fee, buy_collateral, sell_collateral, virtual_reserves, Side};
use serde::{Deserialize, Serialize};

use crate::host::{Host, Token};
use crate::pool::{leg_token, require_balance, Effects, OptionsAmm, PoolState, PriceBook};
use crate::series::{Leg, SeriesId};
use crate::{Address, AmmError, Result};

/// Priced trade, before or after execution
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeQuote {
    pub series_id: SeriesId,
    pub leg: Leg,
    pub side: Side,

    /// Option tokens bought or sold
    pub amount: u128,

    /// Model price of the traded leg (scaled by ONE)
    pub price: u128,

    /// Collateral from the bonding curve, before fees
    pub gross_collateral: u128,

    /// Fee routed to the fee destination
    pub fee: u128,

    /// Collateral the trader pays (buy) or receives (sell)
    pub net_collateral: u128,
}

impl OptionsAmm {
    /// Quote buying `amount` of one leg
    pub fn quote_buy<H: Host>(&self, host: &H, series_id: SeriesId, leg: Leg, amount: u128) -> Result<TradeQuote> {
        let mut scratch = self.state.clone();
        let pool = self.config.pool_address;
        let (quote, _) = self.stage_trade(host, &mut scratch, &pool, series_id, leg, Side::Buy, amount)?;
        Ok(quote)
    }

    /// Quote selling `amount` of one leg
    pub fn quote_sell<H: Host>(&self, host: &H, series_id: SeriesId, leg: Leg, amount: u128) -> Result<TradeQuote> {
        let mut scratch = self.state.clone();
        let pool = self.config.pool_address;
        let (quote, _) = self.stage_trade(host, &mut scratch, &pool, series_id, leg, Side::Sell, amount)?;
        Ok(quote)
    }

    /// Buy `amount` of one leg, paying at most `max_collateral_in` including fees
    ///
    /// Residual tokens held by the pool are sold first; the remainder is
    /// minted from pool collateral, leaving the pool long the opposite leg.
    ///
    /// # Errors
    /// * `InvalidSeries`, `SeriesNotOpen`, `MinTradeSize` on bad requests
    /// * `NoLiquidity` while no LP shares are outstanding
    /// * `InsufficientPoolCollateral` if minting would overdraw the pool
    /// * `SlippageExceeded` if the net cost exceeds `max_collateral_in`
    /// * `InsufficientBalance` if the caller cannot pay
    pub fn execute_buy<H: Host>(
        &mut self,
        host: &mut H,
        caller: &Address,
        series_id: SeriesId,
        leg: Leg,
        amount: u128,
        max_collateral_in: u128,
    ) -> Result<TradeQuote> {
        let mut staged = self.state.clone();
        let (quote, effects) = self.stage_trade(&*host, &mut staged, caller, series_id, leg, Side::Buy, amount)?;

        if quote.net_collateral > max_collateral_in {
            log::warn!("buy of {} costs {}, above bound {}", amount, quote.net_collateral, max_collateral_in);
            return Err(AmmError::SlippageExceeded);
        }
        require_balance(&*host, Token::Collateral, caller, quote.net_collateral)?;

        self.commit(host, staged, effects)?;
        log::info!(
            "bought {} {:?} of series {} for {} (fee {})",
            amount, leg, series_id, quote.net_collateral, quote.fee
        );
        Ok(quote)
    }

    /// Sell `amount` of one leg, receiving at least `min_collateral_out` after fees
    ///
    /// Matched pairs the pool ends up holding are redeemed to collateral
    /// before the payout.
    ///
    /// # Errors
    /// * `InvalidSeries`, `SeriesNotOpen`, `MinTradeSize` on bad requests
    /// * `NoLiquidity` while no LP shares are outstanding
    /// * `InsufficientPoolCollateral` if the pool cannot fund the payout
    /// * `SlippageExceeded` if the net proceeds fall below `min_collateral_out`
    /// * `InsufficientBalance` if the caller does not hold the tokens
    pub fn execute_sell<H: Host>(
        &mut self,
        host: &mut H,
        caller: &Address,
        series_id: SeriesId,
        leg: Leg,
        amount: u128,
        min_collateral_out: u128,
    ) -> Result<TradeQuote> {
        let mut staged = self.state.clone();
        let (quote, effects) = self.stage_trade(&*host, &mut staged, caller, series_id, leg, Side::Sell, amount)?;

        if quote.net_collateral < min_collateral_out {
            log::warn!("sell of {} pays {}, below bound {}", amount, quote.net_collateral, min_collateral_out);
            return Err(AmmError::SlippageExceeded);
        }
        require_balance(&*host, leg_token(series_id, leg), caller, amount)?;

        self.commit(host, staged, effects)?;
        log::info!(
            "sold {} {:?} of series {} for {} (fee {})",
            amount, leg, series_id, quote.net_collateral, quote.fee
        );
        Ok(quote)
    }

    /// Price a trade and apply it to `state`
    #[allow(clippy::too_many_arguments)]
    fn stage_trade<H: Host>(
        &self,
        host: &H,
        state: &mut PoolState,
        caller: &Address,
        series_id: SeriesId,
        leg: Leg,
        side: Side,
        amount: u128,
    ) -> Result<(TradeQuote, Effects)> {
        let mut book = PriceBook::open(host);
        let entry = *state.series.get(series_id).ok_or(AmmError::InvalidSeries)?;
        if book.is_expired(host, &entry.series) {
            return Err(AmmError::SeriesNotOpen);
        }
        if amount == 0 {
            return Err(AmmError::InvalidAmount);
        }
        if amount < self.params.min_trade_size {
            return Err(AmmError::MinTradeSize);
        }
        if state.lp_supply == 0 {
            return Err(AmmError::NoLiquidity);
        }

        let legs = book.leg_prices(host, &self.params, &entry.series)?;
        let price = match leg {
            Leg::BToken => legs.b_token,
            Leg::WToken => legs.w_token,
        };

        // Curve math runs in collateral units
        let per_option = |options: u128| self.config.collateral_per_option(&entry.series, options);
        let reserves = virtual_reserves(
            price,
            per_option(entry.residuals.get(leg))?,
            per_option(entry.residuals.get(leg.opposite()))?,
            state.collateral,
            side,
        )?;
        let notional = per_option(amount)?;
        let gross = match side {
            Side::Buy => buy_collateral(&reserves, notional)?,
            Side::Sell => sell_collateral(&reserves, notional)?,
        };
        let fees = apply_fee(side, gross, notional, &self.params.fee_schedule())?;
        log::debug!("{:?} {} {:?}: reserves {:?}, gross {}, fee {}", side, amount, leg, reserves, gross, fees.fee);

        let quote = TradeQuote {
            series_id,
            leg,
            side,
            amount,
            price,
            gross_collateral: fees.gross,
            fee: fees.fee,
            net_collateral: fees.net,
        };

        let mut effects = Effects::default();
        let pool = self.config.pool_address;
        let fee_destination = self.params.fee_destination;
        let token = leg_token(series_id, leg);

        match side {
            Side::Buy => {
                state.collateral = state.collateral.checked_add(fees.gross).ok_or(AmmError::Overflow)?;
                effects.transfer(Token::Collateral, *caller, pool, fees.gross);
                effects.transfer(Token::Collateral, *caller, fee_destination, fees.fee);

                let held = entry.residuals.get(leg);
                if held < amount {
                    self.mint_pairs(state, &mut effects, series_id, amount - held)?;
                }
                let residual = series_residual(state, series_id, leg)?;
                *residual -= amount;
                effects.transfer(token, pool, *caller, amount);
            }
            Side::Sell => {
                effects.transfer(token, *caller, pool, amount);
                let residual = series_residual(state, series_id, leg)?;
                *residual = residual.checked_add(amount).ok_or(AmmError::Overflow)?;

                let pairs = state.series.get(series_id).map_or(0, |s| s.residuals.matched_pairs());
                if pairs > 0 {
                    self.close_pairs(state, &mut effects, series_id, pairs)?;
                }
                state.collateral = state
                    .collateral
                    .checked_sub(fees.gross)
                    .ok_or(AmmError::InsufficientPoolCollateral)?;
                effects.transfer(Token::Collateral, pool, *caller, fees.net);
                effects.transfer(Token::Collateral, pool, fee_destination, fees.fee);
            }
        }

        Ok((quote, effects))
    }
}

fn series_residual(state: &mut PoolState, series_id: SeriesId, leg: Leg) -> Result<&mut u128> {
    let entry = state.series.get_mut(series_id).ok_or(AmmError::InvalidSeries)?;
    Ok(entry.residuals.get_mut(leg))
}
