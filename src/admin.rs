//! Owner-gated parameter updates
//!
//! Every setter is idempotent: writing the current value succeeds and
//! changes nothing.

use crate::host::Authorization;
use crate::params::AmmParams;
use crate::pool::OptionsAmm;
use crate::{Address, AmmError, Result};

fn require_owner<A: Authorization>(auth: &A, caller: &Address) -> Result<()> {
    if !auth.is_owner(caller) {
        log::warn!("rejecting admin call from non-owner");
        return Err(AmmError::Unauthorized);
    }
    Ok(())
}

impl OptionsAmm {
    fn update_params<A, F>(&mut self, auth: &A, caller: &Address, what: &str, update: F) -> Result<()>
    where
        A: Authorization,
        F: FnOnce(&mut AmmParams),
    {
        require_owner(auth, caller)?;
        let mut params = self.params;
        update(&mut params);
        params.validate()?;
        if params != self.params {
            self.params = params;
            log::info!("updated {}", what);
        }
        Ok(())
    }

    /// Set the trading fee and its notional cap, both in basis points
    pub fn set_fee_params<A: Authorization>(
        &mut self,
        auth: &A,
        caller: &Address,
        trade_fee_bps: u16,
        max_option_fee_bps: u16,
    ) -> Result<()> {
        self.update_params(auth, caller, "fee parameters", |p| {
            p.trade_fee_bps = trade_fee_bps;
            p.max_option_fee_bps = max_option_fee_bps;
        })
    }

    pub fn set_fee_destination<A: Authorization>(&mut self, auth: &A, caller: &Address, destination: Address) -> Result<()> {
        self.update_params(auth, caller, "fee destination", |p| p.fee_destination = destination)
    }

    pub fn set_deposit_limits<A: Authorization>(
        &mut self,
        auth: &A,
        caller: &Address,
        enforce: bool,
        global_deposit_limit: u128,
    ) -> Result<()> {
        self.update_params(auth, caller, "deposit limits", |p| {
            p.enforce_deposit_limits = enforce;
            p.global_deposit_limit = global_deposit_limit;
        })
    }

    pub fn set_allow_list_enabled<A: Authorization>(&mut self, auth: &A, caller: &Address, enabled: bool) -> Result<()> {
        self.update_params(auth, caller, "allow-list flag", |p| p.allow_list_enabled = enabled)
    }

    /// Add or remove one depositor from the pool's own allow-list
    pub fn set_allow_list_entry<A: Authorization>(
        &mut self,
        auth: &A,
        caller: &Address,
        depositor: Address,
        allowed: bool,
    ) -> Result<()> {
        require_owner(auth, caller)?;
        let changed = if allowed {
            self.state.deposit_allow_list.insert(depositor)
        } else {
            self.state.deposit_allow_list.remove(&depositor)
        };
        if changed {
            log::info!("allow-list entry set to {}", allowed);
        }
        Ok(())
    }

    /// Change the active series capacity
    ///
    /// Cannot drop below the number of currently active series.
    pub fn set_max_series<A: Authorization>(&mut self, auth: &A, caller: &Address, max_series: u16) -> Result<()> {
        require_owner(auth, caller)?;
        if (max_series as usize) < self.state.series.len() {
            return Err(AmmError::InvalidParams);
        }
        self.update_params(auth, caller, "series capacity", |p| p.max_series = max_series)
    }

    pub fn set_min_trade_size<A: Authorization>(&mut self, auth: &A, caller: &Address, min_trade_size: u128) -> Result<()> {
        self.update_params(auth, caller, "minimum trade size", |p| p.min_trade_size = min_trade_size)
    }
}
