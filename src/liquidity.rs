//! LP deposits and withdrawals

use amm_model::{mul_div, sell_collateral, virtual_reserves, Rounding, Side};
use serde::{Deserialize, Serialize};

use crate::host::{Host, Token};
use crate::lifecycle::ClaimReceipt;
use crate::pool::{leg_token, require_balance, Effects, OptionsAmm, PoolState, PriceBook};
use crate::series::{Leg, Residuals, SeriesId, SeriesState};
use crate::{Address, AmmError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositReceipt {
    pub collateral_in: u128,
    pub lp_minted: u128,
    /// Pool value the shares were priced against
    pub pool_value_before: u128,
}

/// Option tokens paid out directly on withdrawal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayout {
    pub series_id: SeriesId,
    pub leg: Leg,
    pub amount: u128,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawReceipt {
    pub lp_burned: u128,
    /// Collateral paid out, including redeemed pairs and auto-sale proceeds
    pub collateral_out: u128,
    pub tokens_out: Vec<TokenPayout>,
    /// Expired series settled as part of the withdrawal
    pub claims: Vec<ClaimReceipt>,
}

impl OptionsAmm {
    /// Deposit collateral and mint LP shares
    ///
    /// Shares are minted 1:1 into an empty pool, otherwise at
    /// `collateral_in * lp_supply / pool_value`, where pool value includes
    /// expired series that have not been claimed yet.
    ///
    /// # Errors
    /// * `DepositLimitExceeded` / `NotOnAllowList` when gated
    /// * `SlippageExceeded` if fewer than `min_lp_out` shares would be minted
    /// * `InvalidAmount` if the deposit is zero or mints zero shares
    pub fn provide_capital<H: Host>(
        &mut self,
        host: &mut H,
        caller: &Address,
        collateral_in: u128,
        min_lp_out: u128,
    ) -> Result<DepositReceipt> {
        if collateral_in == 0 {
            return Err(AmmError::InvalidAmount);
        }
        if self.params.enforce_deposit_limits {
            let after = self.state.collateral.checked_add(collateral_in).ok_or(AmmError::Overflow)?;
            if after > self.params.global_deposit_limit {
                log::warn!("deposit of {} would exceed limit {}", collateral_in, self.params.global_deposit_limit);
                return Err(AmmError::DepositLimitExceeded);
            }
        }
        if self.params.allow_list_enabled
            && !self.state.deposit_allow_list.contains(caller)
            && !host.is_on_deposit_allow_list(caller)
        {
            return Err(AmmError::NotOnAllowList);
        }

        let pool_value_before = self.pool_value(&*host, true)?;
        let supply = self.state.lp_supply;
        let lp_minted = if supply == 0 {
            collateral_in
        } else {
            if pool_value_before == 0 {
                return Err(AmmError::ZeroPoolValue);
            }
            mul_div(collateral_in, supply, pool_value_before, Rounding::Down)?
        };
        if lp_minted == 0 {
            return Err(AmmError::InvalidAmount);
        }
        if lp_minted < min_lp_out {
            log::warn!("deposit mints {} shares, below bound {}", lp_minted, min_lp_out);
            return Err(AmmError::SlippageExceeded);
        }
        require_balance(&*host, Token::Collateral, caller, collateral_in)?;

        let mut staged = self.state.clone();
        staged.collateral = staged.collateral.checked_add(collateral_in).ok_or(AmmError::Overflow)?;
        staged.lp_supply = staged.lp_supply.checked_add(lp_minted).ok_or(AmmError::Overflow)?;

        let mut effects = Effects::default();
        effects.transfer(Token::Collateral, *caller, self.config.pool_address, collateral_in);
        effects.mint(Token::LpShare, *caller, lp_minted);

        self.commit(host, staged, effects)?;
        log::info!("deposit {} collateral for {} shares (pool value {})", collateral_in, lp_minted, pool_value_before);
        Ok(DepositReceipt { collateral_in, lp_minted, pool_value_before })
    }

    /// Burn LP shares for a pro-rata slice of the pool
    ///
    /// Expired series are claimed first. With `auto_sell_residual` the
    /// withdrawer's slice of each open series is converted to collateral:
    /// matched pairs redeem at par and the unmatched rest is sold into the
    /// curve against the collateral that stays in the pool. Otherwise, or
    /// when the last LP exits, residual tokens are transferred as they are
    /// and collateral makes up the rest of the withdrawer's share of the
    /// marked pool value.
    ///
    /// # Errors
    /// * `WithdrawCollateralMinimumRequired` if auto-selling with a zero minimum
    /// * `SlippageExceeded` if the collateral paid is below `min_collateral_out`
    /// * `InsufficientBalance` if the caller holds fewer shares
    /// * `NoSettlementPriceYet` if an expired series cannot be claimed
    pub fn withdraw_capital<H: Host>(
        &mut self,
        host: &mut H,
        caller: &Address,
        lp_amount: u128,
        auto_sell_residual: bool,
        min_collateral_out: u128,
    ) -> Result<WithdrawReceipt> {
        if auto_sell_residual && min_collateral_out == 0 {
            return Err(AmmError::WithdrawCollateralMinimumRequired);
        }
        if lp_amount == 0 {
            return Err(AmmError::InvalidAmount);
        }
        let supply = self.state.lp_supply;
        if lp_amount > supply {
            return Err(AmmError::InsufficientBalance);
        }
        require_balance(&*host, Token::LpShare, caller, lp_amount)?;

        let mut staged = self.state.clone();
        let mut effects = Effects::default();
        let mut book = PriceBook::open(&*host);
        let claims = self.stage_expired_claims(&*host, &book, &mut staged, &mut effects)?;

        let slice = Slice { lp_amount, supply };
        let (payout, tokens_out) = if auto_sell_residual && lp_amount < supply {
            let payout = self.stage_auto_sell(&*host, &mut book, &mut staged, &mut effects, slice)?;
            (payout, Vec::new())
        } else {
            self.stage_in_kind(&*host, &mut book, &mut staged, &mut effects, caller, slice)?
        };

        if payout < min_collateral_out {
            log::warn!("withdrawal pays {}, below bound {}", payout, min_collateral_out);
            return Err(AmmError::SlippageExceeded);
        }
        staged.collateral = staged.collateral.checked_sub(payout).ok_or(AmmError::InsufficientPoolCollateral)?;
        staged.lp_supply -= lp_amount;

        effects.burn(Token::LpShare, *caller, lp_amount);
        effects.transfer(Token::Collateral, self.config.pool_address, *caller, payout);

        self.commit(host, staged, effects)?;
        log::info!(
            "withdrew {} shares for {} collateral and {} token payouts",
            lp_amount, payout, tokens_out.len()
        );
        Ok(WithdrawReceipt { lp_burned: lp_amount, collateral_out: payout, tokens_out, claims })
    }

    /// Pay the withdrawer's tokens as they are, topped up with collateral
    ///
    /// The entitlement is one floor of the marked pool value, so the
    /// collateral paid is that entitlement less the marked value of the
    /// tokens handed over. A full exit takes everything without pricing.
    fn stage_in_kind<H: Host>(
        &self,
        host: &H,
        book: &mut PriceBook,
        staged: &mut PoolState,
        effects: &mut Effects,
        caller: &Address,
        slice: Slice,
    ) -> Result<(u128, Vec<TokenPayout>)> {
        let pool = self.config.pool_address;
        let full_exit = slice.lp_amount == slice.supply;
        let mut marked = staged.collateral;
        let mut tokens_value: u128 = 0;
        let mut tokens_out = Vec::new();

        for id in staged.series.ids() {
            let entry = *staged.series.get(id).ok_or(AmmError::InvalidSeries)?;
            let share = Residuals {
                b_token: slice.of(entry.residuals.b_token)?,
                w_token: slice.of(entry.residuals.w_token)?,
            };

            if !full_exit && !entry.residuals.is_empty() {
                let legs = book.leg_prices(host, &self.params, &entry.series)?;
                marked = marked.checked_add(self.residual_value(&entry, &legs)?).ok_or(AmmError::Overflow)?;
                let paid = SeriesState { residuals: share, ..entry };
                tokens_value = tokens_value
                    .checked_add(self.residual_value(&paid, &legs)?)
                    .ok_or(AmmError::Overflow)?;
            }

            for (leg, amount) in [(Leg::BToken, share.b_token), (Leg::WToken, share.w_token)] {
                if amount == 0 {
                    continue;
                }
                if let Some(s) = staged.series.get_mut(id) {
                    *s.residuals.get_mut(leg) -= amount;
                }
                effects.transfer(leg_token(id, leg), pool, *caller, amount);
                tokens_out.push(TokenPayout { series_id: id, leg, amount });
            }
        }

        if full_exit {
            return Ok((staged.collateral, tokens_out));
        }
        let entitlement = slice.of(marked)?;
        log::debug!("in-kind withdrawal: entitlement {}, tokens marked at {}", entitlement, tokens_value);
        // Token rounding can only overshoot the entitlement on a pool with almost no collateral
        Ok((entitlement.saturating_sub(tokens_value), tokens_out))
    }

    /// Convert the withdrawer's slice of every open series into collateral
    fn stage_auto_sell<H: Host>(
        &self,
        host: &H,
        book: &mut PriceBook,
        staged: &mut PoolState,
        effects: &mut Effects,
        slice: Slice,
    ) -> Result<u128> {
        let collateral_share = slice.of(staged.collateral)?;
        let mut collateral_left = staged.collateral - collateral_share;
        let mut payout = collateral_share;

        for id in staged.series.ids() {
            let entry = *staged.series.get(id).ok_or(AmmError::InvalidSeries)?;
            let b_share = slice.of(entry.residuals.b_token)?;
            let w_share = slice.of(entry.residuals.w_token)?;

            // Redeemed collateral lands in the pool and is paid straight out
            let pairs = b_share.min(w_share);
            if pairs > 0 {
                payout = payout
                    .checked_add(self.close_pairs(staged, effects, id, pairs)?)
                    .ok_or(AmmError::Overflow)?;
            }

            let (leg, remainder) = if b_share > pairs {
                (Leg::BToken, b_share - pairs)
            } else {
                (Leg::WToken, w_share - pairs)
            };
            if remainder == 0 {
                continue;
            }

            let legs = book.leg_prices(host, &self.params, &entry.series)?;
            let price = match leg {
                Leg::BToken => legs.b_token,
                Leg::WToken => legs.w_token,
            };
            let residuals = staged.series.get(id).ok_or(AmmError::InvalidSeries)?.residuals;
            let per_option = |options: u128| self.config.collateral_per_option(&entry.series, options);
            let reserves = virtual_reserves(
                price,
                per_option(residuals.get(leg))?,
                per_option(residuals.get(leg.opposite()))?,
                collateral_left,
                Side::Sell,
            )?;
            let proceeds = sell_collateral(&reserves, per_option(remainder)?)?;
            log::debug!("withdrawal sells {} {:?} of series {} for {}", remainder, leg, id, proceeds);

            collateral_left = collateral_left.checked_sub(proceeds).ok_or(AmmError::InsufficientPoolCollateral)?;
            payout = payout.checked_add(proceeds).ok_or(AmmError::Overflow)?;
        }
        Ok(payout)
    }
}

/// The withdrawer's fraction of the pool
#[derive(Clone, Copy)]
struct Slice {
    lp_amount: u128,
    supply: u128,
}

impl Slice {
    fn of(&self, amount: u128) -> Result<u128> {
        Ok(mul_div(amount, self.lp_amount, self.supply, Rounding::Down)?)
    }
}
