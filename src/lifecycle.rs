//! Series registration and expiry claims

use serde::{Deserialize, Serialize};

use crate::host::{Host, Token};
use crate::pool::{Effects, OptionsAmm, PoolState, PriceBook};
use crate::series::{Series, SeriesId, SeriesState};
use crate::{Address, AmmError, Result};

/// Residual tokens of an expired series converted to collateral
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub series_id: SeriesId,
    pub b_token_redeemed: u128,
    pub w_token_redeemed: u128,
    pub collateral: u128,
}

impl OptionsAmm {
    /// Register a new series with the pool
    ///
    /// Only the series controller or the owner may add series. The series
    /// must match the expiration the oracle reports and must not have
    /// expired already.
    ///
    /// # Errors
    /// * `Unauthorized` for any other caller
    /// * `InvalidSeries` for duplicates, zero strikes, expirations past
    ///   `i64::MAX` or expiration mismatches
    /// * `SeriesExpired` if already past expiration
    /// * `TooManySeries` once `max_series` series are active
    pub fn add_series<H: Host>(&mut self, host: &H, caller: &Address, series: Series) -> Result<()> {
        if *caller != self.config.series_controller && !host.is_owner(caller) {
            return Err(AmmError::Unauthorized);
        }
        if series.strike_price == 0
            || i64::try_from(series.expiration).is_err()
            || host.expiration_date(series.id) != Some(series.expiration)
        {
            return Err(AmmError::InvalidSeries);
        }
        if host.is_expired(series.id) || host.current_time() >= series.expiration {
            return Err(AmmError::SeriesExpired);
        }

        self.state.series.insert(SeriesState::new(series), self.params.max_series as usize)?;
        log::info!(
            "added series {} ({:?} strike {} expiring {}), {} active",
            series.id, series.style, series.strike_price, series.expiration, self.state.series.len()
        );
        Ok(())
    }

    /// Redeem the pool's residual tokens of one expired series
    ///
    /// # Errors
    /// * `InvalidSeries` if the series is not active
    /// * `SeriesNotExpired` if it is still open
    /// * `NoSettlementPriceYet` if the settlement price is not published
    pub fn claim_expired_tokens<H: Host>(&mut self, host: &mut H, series_id: SeriesId) -> Result<ClaimReceipt> {
        let book = PriceBook::open(&*host);
        let entry = self.state.series.get(series_id).ok_or(AmmError::InvalidSeries)?;
        if !book.is_expired(&*host, &entry.series) {
            return Err(AmmError::SeriesNotExpired);
        }

        let mut staged = self.state.clone();
        let mut effects = Effects::default();
        let receipt = self.stage_claim(&*host, &mut staged, &mut effects, series_id)?;
        self.commit(host, staged, effects)?;
        log::info!("claimed series {} for {} collateral", series_id, receipt.collateral);
        Ok(receipt)
    }

    /// Redeem every expired series, in insertion order
    ///
    /// Succeeds without touching anything when nothing is claimable.
    pub fn claim_all_expired_tokens<H: Host>(&mut self, host: &mut H) -> Result<Vec<ClaimReceipt>> {
        let mut staged = self.state.clone();
        let mut effects = Effects::default();
        let book = PriceBook::open(&*host);
        let receipts = self.stage_expired_claims(&*host, &book, &mut staged, &mut effects)?;
        if receipts.is_empty() {
            return Ok(receipts);
        }
        self.commit(host, staged, effects)?;
        log::info!("claimed {} expired series", receipts.len());
        Ok(receipts)
    }

    pub(crate) fn stage_expired_claims<H: Host>(
        &self,
        host: &H,
        book: &PriceBook,
        state: &mut PoolState,
        effects: &mut Effects,
    ) -> Result<Vec<ClaimReceipt>> {
        let expired: Vec<SeriesId> = state
            .series
            .iter()
            .filter(|entry| book.is_expired(host, &entry.series))
            .map(|entry| entry.series.id)
            .collect();

        let mut receipts = Vec::with_capacity(expired.len());
        for id in expired {
            receipts.push(self.stage_claim(host, state, effects, id)?);
        }
        Ok(receipts)
    }

    fn stage_claim<H: Host>(
        &self,
        host: &H,
        state: &mut PoolState,
        effects: &mut Effects,
        series_id: SeriesId,
    ) -> Result<ClaimReceipt> {
        let entry = state.series.remove(series_id).ok_or(AmmError::InvalidSeries)?;
        let collateral = self.settlement_value(host, &entry)?;
        state.collateral = state.collateral.checked_add(collateral).ok_or(AmmError::Overflow)?;

        let pool = self.config.pool_address;
        effects.burn(Token::BToken(series_id), pool, entry.residuals.b_token);
        effects.burn(Token::WToken(series_id), pool, entry.residuals.w_token);
        effects.transfer(Token::Collateral, self.config.series_controller, pool, collateral);

        log::debug!(
            "claiming series {}: {} bTokens and {} wTokens for {} collateral",
            series_id, entry.residuals.b_token, entry.residuals.w_token, collateral
        );
        Ok(ClaimReceipt {
            series_id,
            b_token_redeemed: entry.residuals.b_token,
            w_token_redeemed: entry.residuals.w_token,
            collateral,
        })
    }
}
