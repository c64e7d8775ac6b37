//! Fast unit tests for the options AMM engine
//! Run with: cargo test

use options_amm::*;

const POOL: Address = [1u8; 32];
const CONTROLLER: Address = [2u8; 32];
const OWNER: Address = [3u8; 32];
const LP: Address = [10u8; 32];
const LP2: Address = [11u8; 32];
const TRADER: Address = [20u8; 32];
const FEES: Address = [30u8; 32];

const NOW: u64 = 1_700_000_000;
const YEAR: u64 = 31_536_000;
const PRICE: u128 = 100_000_000; // 1.0 in feed units
const SPOT: u128 = 2_000 * PRICE;
const VOL_15: u128 = 150_000_000_000_000_000;
const SIX_PERCENT: u128 = 60_000_000_000_000_000;

fn config() -> PoolConfig {
    PoolConfig {
        pool_address: POOL,
        series_controller: CONTROLLER,
        collateral_decimals: 8,
        underlying_decimals: 8,
        price_decimals: 8,
    }
}

fn default_params() -> AmmParams {
    AmmParams { fee_destination: FEES, ..AmmParams::default() }
}

/// At-the-money, one year out: with 15% vol the bToken prices at exactly 0.06
fn atm_series(id: SeriesId, style: OptionStyle) -> Series {
    Series { id, strike_price: SPOT, expiration: NOW + YEAR, style }
}

fn setup(params: AmmParams) -> (OptionsAmm, SimHost) {
    let mut host = SimHost::new(NOW);
    host.set_underlying_price(SPOT as i128, NOW);
    host.set_default_volatility(VOL_15);
    host.add_owner(OWNER);
    (OptionsAmm::new(config(), params).unwrap(), host)
}

fn list_series(amm: &mut OptionsAmm, host: &mut SimHost, series: Series) {
    host.register_series(&series);
    amm.add_series(&*host, &CONTROLLER, series).unwrap();
}

fn deposit(amm: &mut OptionsAmm, host: &mut SimHost, who: &Address, amount: u128) -> DepositReceipt {
    host.credit(Token::Collateral, who, amount);
    amm.provide_capital(host, who, amount, 0).unwrap()
}

/// 10,000 collateral, one ATM call series (id 1)
fn funded_pool(params: AmmParams) -> (OptionsAmm, SimHost) {
    let (mut amm, mut host) = setup(params);
    deposit(&mut amm, &mut host, &LP, 10_000);
    list_series(&mut amm, &mut host, atm_series(1, OptionStyle::Call));
    host.credit(Token::Collateral, &TRADER, 1_000);
    (amm, host)
}

/// funded_pool after the trader buys 3,000 bTokens
fn pool_after_buy() -> (OptionsAmm, SimHost) {
    let (mut amm, mut host) = funded_pool(default_params());
    amm.execute_buy(&mut host, &TRADER, 1, Leg::BToken, 3_000, 243).unwrap();
    (amm, host)
}

fn collateral_of(host: &SimHost, who: &Address) -> u128 {
    host.balance_of(Token::Collateral, who)
}

// ============================================================================
// Trading
// ============================================================================

#[test]
fn test_buy_scenario() {
    let (mut amm, mut host) = funded_pool(default_params());

    let quote = amm.quote_buy(&host, 1, Leg::BToken, 3_000).unwrap();
    assert_eq!(quote.price, SIX_PERCENT);
    assert_eq!(quote.gross_collateral, 243);
    assert_eq!(quote.net_collateral, 243);

    let executed = amm.execute_buy(&mut host, &TRADER, 1, Leg::BToken, 3_000, 243).unwrap();
    assert_eq!(executed, quote);

    // 10,000 + 243 paid in - 3,000 locked to mint 3,000 pairs
    assert_eq!(amm.collateral(), 7_243);
    let residuals = amm.series(1).unwrap().residuals;
    assert_eq!(residuals.b_token, 0);
    assert_eq!(residuals.w_token, 3_000);

    // 7,243 + 3,000 * 0.94
    assert_eq!(amm.pool_value(&host, true).unwrap(), 10_063);

    assert_eq!(host.balance_of(Token::BToken(1), &TRADER), 3_000);
    assert_eq!(collateral_of(&host, &TRADER), 1_000 - 243);
    assert_eq!(collateral_of(&host, &POOL), amm.collateral());
    assert_eq!(collateral_of(&host, &CONTROLLER), 3_000);
}

#[test]
fn test_buy_slippage_leaves_state_untouched() {
    let (mut amm, mut host) = funded_pool(default_params());
    let before = amm.clone();

    let result = amm.execute_buy(&mut host, &TRADER, 1, Leg::BToken, 3_000, 242);
    assert_eq!(result, Err(AmmError::SlippageExceeded));
    assert_eq!(amm, before);
    assert_eq!(collateral_of(&host, &TRADER), 1_000);
    assert_eq!(host.balance_of(Token::BToken(1), &TRADER), 0);
}

#[test]
fn test_trade_validation() {
    let (mut amm, mut host) = funded_pool(default_params());

    assert_eq!(amm.quote_buy(&host, 1, Leg::BToken, 999), Err(AmmError::MinTradeSize));
    assert_eq!(amm.quote_buy(&host, 1, Leg::BToken, 0), Err(AmmError::InvalidAmount));
    assert_eq!(amm.quote_sell(&host, 7, Leg::BToken, 1_000), Err(AmmError::InvalidSeries));

    host.set_expired(1, true);
    let before = amm.clone();
    let result = amm.execute_buy(&mut host, &TRADER, 1, Leg::BToken, 1_000, u128::MAX);
    assert_eq!(result, Err(AmmError::SeriesNotOpen));
    assert_eq!(amm, before);
}

#[test]
fn test_buy_requires_caller_funds() {
    let (mut amm, mut host) = funded_pool(default_params());
    let before = amm.clone();
    let broke: Address = [99u8; 32];
    let result = amm.execute_buy(&mut host, &broke, 1, Leg::BToken, 3_000, u128::MAX);
    assert_eq!(result, Err(AmmError::InsufficientBalance));
    assert_eq!(amm, before);
}

#[test]
fn test_invalid_price_feed() {
    let (amm, mut host) = funded_pool(default_params());
    host.set_underlying_price(-1, NOW);
    assert_eq!(amm.quote_buy(&host, 1, Leg::BToken, 1_000), Err(AmmError::InvalidPriceFeedValue));

    host.set_underlying_price(SPOT as i128, NOW - 7_200);
    assert_eq!(amm.quote_buy(&host, 1, Leg::BToken, 1_000), Err(AmmError::InvalidPriceFeedValue));
}

#[test]
fn test_sell_back_closes_pairs_and_loses_on_round_trip() {
    let (mut amm, mut host) = pool_after_buy();

    let quote = amm.execute_sell(&mut host, &TRADER, 1, Leg::BToken, 3_000, 1).unwrap();
    assert_eq!(quote.net_collateral, 131);

    // Pool held 3,000 wTokens; the returned bTokens close all pairs
    let residuals = amm.series(1).unwrap().residuals;
    assert!(residuals.is_empty());
    assert_eq!(amm.collateral(), 7_243 + 3_000 - 131);
    assert_eq!(collateral_of(&host, &POOL), amm.collateral());

    assert!(collateral_of(&host, &TRADER) < 1_000);
    assert_eq!(host.balance_of(Token::BToken(1), &TRADER), 0);
}

#[test]
fn test_sell_slippage_and_balance() {
    let (mut amm, mut host) = pool_after_buy();
    let before = amm.clone();

    assert_eq!(
        amm.execute_sell(&mut host, &TRADER, 1, Leg::BToken, 3_000, 132),
        Err(AmmError::SlippageExceeded)
    );
    assert_eq!(
        amm.execute_sell(&mut host, &TRADER, 1, Leg::BToken, 3_001, 0),
        Err(AmmError::InsufficientBalance)
    );
    assert_eq!(amm, before);
}

#[test]
fn test_sell_externally_written_options() {
    let (mut amm, mut host) = funded_pool(default_params());
    let series = amm.series(1).unwrap().series;
    host.credit(Token::Collateral, &TRADER, 3_000);
    host.write_options(&config(), &series, &TRADER, 3_000).unwrap();

    let value_before = amm.pool_value(&host, true).unwrap();
    let quote = amm.execute_sell(&mut host, &TRADER, 1, Leg::BToken, 3_000, 1).unwrap();
    assert_eq!(quote.gross_collateral, 141);

    assert_eq!(amm.series(1).unwrap().residuals.b_token, 3_000);
    assert!(amm.pool_value(&host, true).unwrap() >= value_before);
}

#[test]
fn test_fees_routed_to_destination() {
    let params = AmmParams { trade_fee_bps: 300, max_option_fee_bps: 100, ..default_params() };
    let (mut amm, mut host) = funded_pool(params);

    let quote = amm.execute_buy(&mut host, &TRADER, 1, Leg::BToken, 3_000, 250).unwrap();
    // 3% of 243 = 7.29, under the cap of 1% of 3,000
    assert_eq!(quote.fee, 7);
    assert_eq!(quote.net_collateral, 250);
    assert_eq!(collateral_of(&host, &FEES), 7);
    // Fees never enter the pool
    assert_eq!(amm.collateral(), 7_243);
}

#[test]
fn test_fee_capped_by_notional() {
    let params = AmmParams { trade_fee_bps: 10_000, max_option_fee_bps: 10, ..default_params() };
    let (amm, host) = funded_pool(params);
    let quote = amm.quote_buy(&host, 1, Leg::BToken, 3_000).unwrap();
    assert_eq!(quote.fee, 3);
}

#[test]
fn test_put_buy_uses_strike_collateral() {
    let (mut amm, mut host) = setup(default_params());
    deposit(&mut amm, &mut host, &LP, 10_000_000);
    list_series(&mut amm, &mut host, atm_series(2, OptionStyle::Put));
    host.credit(Token::Collateral, &TRADER, 1_000_000);

    let quote = amm.execute_buy(&mut host, &TRADER, 2, Leg::BToken, 3_000, u128::MAX).unwrap();
    assert_eq!(quote.gross_collateral, 715_360);

    // Each put locks 2,000 collateral
    assert_eq!(amm.collateral(), 10_000_000 + 715_360 - 6_000_000);
    assert_eq!(amm.series(2).unwrap().residuals.w_token, 3_000);
    assert_eq!(amm.pool_value(&host, true).unwrap(), 4_715_360 + 5_640_000);
}

#[test]
fn test_fractional_put_escrow_covers_closes() {
    // Six-decimal collateral against a 1.23456789 strike: 0.0123456789 per option unit
    let strike = 123_456_789;
    let mut host = SimHost::new(NOW);
    host.set_underlying_price(strike as i128, NOW);
    host.set_default_volatility(VOL_15);
    let config = PoolConfig { collateral_decimals: 6, ..config() };
    let mut amm = OptionsAmm::new(config, default_params()).unwrap();
    deposit(&mut amm, &mut host, &LP, 10_000);
    list_series(&mut amm, &mut host, Series { id: 3, strike_price: strike, expiration: NOW + YEAR, style: OptionStyle::Put });
    host.credit(Token::Collateral, &TRADER, 1_000);

    amm.execute_buy(&mut host, &TRADER, 3, Leg::BToken, 1_050, u128::MAX).unwrap();
    amm.execute_buy(&mut host, &TRADER, 3, Leg::BToken, 1_050, u128::MAX).unwrap();
    // Each mint of 1,050 escrows 13 (12.96 rounded up)
    assert_eq!(collateral_of(&host, &CONTROLLER), 26);

    // Closing all 2,100 pairs at once releases 25 (25.93 rounded down)
    let quote = amm.quote_sell(&host, 3, Leg::BToken, 2_100).unwrap();
    let sold = amm.execute_sell(&mut host, &TRADER, 3, Leg::BToken, 2_100, 0).unwrap();
    assert_eq!(sold, quote);
    assert!(amm.series(3).unwrap().residuals.is_empty());
    assert_eq!(collateral_of(&host, &CONTROLLER), 1);
    assert_eq!(collateral_of(&host, &POOL), amm.collateral());
}

#[test]
fn test_trading_requires_liquidity() {
    let (mut amm, mut host) = setup(default_params());
    list_series(&mut amm, &mut host, atm_series(1, OptionStyle::Call));
    host.credit(Token::Collateral, &TRADER, 1_000);
    assert_eq!(amm.quote_buy(&host, 1, Leg::BToken, 1_000), Err(AmmError::NoLiquidity));

    // Also after the last LP has left
    let (mut amm, mut host) = pool_after_buy();
    amm.withdraw_capital(&mut host, &LP, 10_000, false, 0).unwrap();
    let before = amm.clone();
    assert_eq!(
        amm.execute_buy(&mut host, &TRADER, 1, Leg::WToken, 1_000, u128::MAX),
        Err(AmmError::NoLiquidity)
    );
    assert_eq!(amm, before);
}

// ============================================================================
// Liquidity
// ============================================================================

#[test]
fn test_first_deposit_mints_one_to_one() {
    let (mut amm, mut host) = setup(default_params());
    let receipt = deposit(&mut amm, &mut host, &LP, 10_000);
    assert_eq!(receipt.lp_minted, 10_000);
    assert_eq!(amm.lp_supply(), 10_000);
    assert_eq!(host.balance_of(Token::LpShare, &LP), 10_000);
}

#[test]
fn test_deposit_priced_against_marked_pool() {
    let (mut amm, mut host) = pool_after_buy();
    let receipt = deposit(&mut amm, &mut host, &LP2, 10_063);
    assert_eq!(receipt.pool_value_before, 10_063);
    assert_eq!(receipt.lp_minted, 10_000);
}

#[test]
fn test_deposit_then_full_withdraw_returns_deposit() {
    let (mut amm, mut host) = funded_pool(default_params());
    let minted = deposit(&mut amm, &mut host, &LP2, 4_321).lp_minted;

    let receipt = amm.withdraw_capital(&mut host, &LP2, minted, false, 0).unwrap();
    assert_eq!(receipt.collateral_out, 4_321);
    assert_eq!(amm.collateral(), 10_000);
}

#[test]
fn test_deposit_round_trip_with_residuals() {
    // Pool marks 3,000 wTokens at 0.94; share price is 10,063 / 10,000
    for (amount, shares, collateral_out, w_out) in [(1_003, 996, 748, 271), (7, 6, 6, 1)] {
        let (mut amm, mut host) = pool_after_buy();
        let minted = deposit(&mut amm, &mut host, &LP2, amount).lp_minted;
        assert_eq!(minted, shares);

        let receipt = amm.withdraw_capital(&mut host, &LP2, minted, false, 0).unwrap();
        assert_eq!(receipt.collateral_out, collateral_out);
        assert_eq!(receipt.tokens_out[0].leg, Leg::WToken);
        assert_eq!(receipt.tokens_out[0].amount, w_out);

        let marked = collateral_out + w_out * 94 / 100;
        assert!(marked <= amount, "deposit of {} returned {}", amount, marked);
        assert!(marked + 1 >= amount, "deposit of {} returned {}", amount, marked);
        assert_eq!(collateral_of(&host, &POOL), amm.collateral());
    }
}

#[test]
fn test_deposit_slippage() {
    let (mut amm, mut host) = pool_after_buy();
    host.credit(Token::Collateral, &LP2, 10_063);
    assert_eq!(amm.provide_capital(&mut host, &LP2, 10_063, 10_001), Err(AmmError::SlippageExceeded));
    assert_eq!(amm.provide_capital(&mut host, &LP2, 0, 0), Err(AmmError::InvalidAmount));
}

#[test]
fn test_deposit_limit() {
    let params = AmmParams { enforce_deposit_limits: true, global_deposit_limit: 15_000, ..default_params() };
    let (mut amm, mut host) = setup(params);
    deposit(&mut amm, &mut host, &LP, 10_000);

    host.credit(Token::Collateral, &LP2, 6_000);
    assert_eq!(amm.provide_capital(&mut host, &LP2, 6_000, 0), Err(AmmError::DepositLimitExceeded));
    amm.provide_capital(&mut host, &LP2, 5_000, 0).unwrap();
}

#[test]
fn test_allow_list() {
    let params = AmmParams { allow_list_enabled: true, ..default_params() };
    let (mut amm, mut host) = setup(params);
    host.credit(Token::Collateral, &LP, 1_000);
    host.credit(Token::Collateral, &LP2, 1_000);

    assert_eq!(amm.provide_capital(&mut host, &LP, 1_000, 0), Err(AmmError::NotOnAllowList));

    // Either the pool's own list or the authorization collaborator admits
    amm.set_allow_list_entry(&host, &OWNER, LP, true).unwrap();
    amm.provide_capital(&mut host, &LP, 1_000, 0).unwrap();
    host.allow_depositor(LP2);
    amm.provide_capital(&mut host, &LP2, 1_000, 0).unwrap();
}

#[test]
fn test_auto_sell_requires_minimum() {
    let (mut amm, mut host) = pool_after_buy();
    let before = amm.clone();
    let result = amm.withdraw_capital(&mut host, &LP, 5_000, true, 0);
    assert_eq!(result, Err(AmmError::WithdrawCollateralMinimumRequired));
    assert_eq!(amm, before);
}

#[test]
fn test_full_exit_pays_tokens_directly() {
    let (mut amm, mut host) = pool_after_buy();

    let receipt = amm.withdraw_capital(&mut host, &LP, 10_000, true, 1).unwrap();
    assert_eq!(receipt.collateral_out, 7_243);
    assert_eq!(receipt.tokens_out.len(), 1);
    assert_eq!(receipt.tokens_out[0].leg, Leg::WToken);
    assert_eq!(receipt.tokens_out[0].amount, 3_000);

    assert_eq!(amm.collateral(), 0);
    assert_eq!(amm.lp_supply(), 0);
    assert_eq!(amm.pool_value(&host, true).unwrap(), 0);
    assert_eq!(host.balance_of(Token::WToken(1), &LP), 3_000);
    assert_eq!(host.balance_of(Token::LpShare, &LP), 0);
}

#[test]
fn test_partial_withdraw_without_auto_sell() {
    let (mut amm, mut host) = pool_after_buy();

    let receipt = amm.withdraw_capital(&mut host, &LP, 5_000, false, 0).unwrap();
    assert_eq!(receipt.collateral_out, 3_621);
    assert_eq!(receipt.tokens_out[0].amount, 1_500);

    assert_eq!(amm.collateral(), 3_622);
    assert_eq!(amm.series(1).unwrap().residuals.w_token, 1_500);
    assert_eq!(amm.lp_supply(), 5_000);
}

#[test]
fn test_partial_withdraw_with_auto_sell() {
    let (mut amm, mut host) = pool_after_buy();
    let value_per_share_before = amm.pool_value(&host, true).unwrap() * 1_000 / amm.lp_supply();

    let receipt = amm.withdraw_capital(&mut host, &LP, 5_000, true, 1).unwrap();
    // 3,621 pro-rata collateral plus 1,500 wTokens sold into the curve
    assert_eq!(receipt.collateral_out, 3_621 + 1_360);
    assert!(receipt.tokens_out.is_empty());

    // Sold tokens stay with the pool
    assert_eq!(amm.series(1).unwrap().residuals.w_token, 3_000);
    assert_eq!(amm.collateral(), 7_243 - receipt.collateral_out);
    assert_eq!(collateral_of(&host, &POOL), amm.collateral());

    let value_per_share_after = amm.pool_value(&host, true).unwrap() * 1_000 / amm.lp_supply();
    assert!(value_per_share_after >= value_per_share_before);
}

#[test]
fn test_withdraw_minimum_enforced() {
    let (mut amm, mut host) = pool_after_buy();
    let before = amm.clone();
    let result = amm.withdraw_capital(&mut host, &LP, 5_000, true, 3_621 + 1_361);
    assert_eq!(result, Err(AmmError::SlippageExceeded));
    assert_eq!(amm, before);
}

#[test]
fn test_withdraw_more_than_held() {
    let (mut amm, mut host) = pool_after_buy();
    assert_eq!(amm.withdraw_capital(&mut host, &LP, 10_001, false, 0), Err(AmmError::InsufficientBalance));
    assert_eq!(amm.withdraw_capital(&mut host, &TRADER, 1, false, 0), Err(AmmError::InsufficientBalance));
}

// ============================================================================
// Series lifecycle
// ============================================================================

#[test]
fn test_add_series_checks() {
    let (mut amm, mut host) = setup(default_params());
    let series = atm_series(5, OptionStyle::Call);

    // Oracle does not know the series yet
    assert_eq!(amm.add_series(&host, &CONTROLLER, series), Err(AmmError::InvalidSeries));
    host.register_series(&series);

    assert_eq!(amm.add_series(&host, &TRADER, series), Err(AmmError::Unauthorized));
    amm.add_series(&host, &OWNER, series).unwrap();
    assert_eq!(amm.add_series(&host, &CONTROLLER, series), Err(AmmError::InvalidSeries));

    let far = Series { id: 7, expiration: u64::MAX, ..series };
    host.register_series(&far);
    assert_eq!(amm.add_series(&host, &CONTROLLER, far), Err(AmmError::InvalidSeries));

    let stale = Series { id: 6, expiration: NOW - 1, ..series };
    host.register_series(&stale);
    assert_eq!(amm.add_series(&host, &CONTROLLER, stale), Err(AmmError::SeriesExpired));
}

#[test]
fn test_series_capacity() {
    let (mut amm, mut host) = setup(default_params());
    for id in 0..MAX_SERIES as u64 {
        list_series(&mut amm, &mut host, atm_series(id, OptionStyle::Call));
    }
    assert_eq!(amm.active_series().len(), 100);

    let extra = atm_series(1_000, OptionStyle::Call);
    host.register_series(&extra);
    assert_eq!(amm.add_series(&host, &CONTROLLER, extra), Err(AmmError::TooManySeries));
}

#[test]
fn test_claim_expired_series() {
    let (mut amm, mut host) = pool_after_buy();
    host.set_time(NOW + YEAR);
    // Settles 25% above strike: bToken gets 0.2, wToken 0.8 of the underlying
    host.set_settlement_price(1, 2_500 * PRICE);

    assert_eq!(amm.pool_value(&host, false).unwrap(), 7_243);
    assert_eq!(amm.pool_value(&host, true).unwrap(), 7_243 + 2_400);

    let receipts = amm.claim_all_expired_tokens(&mut host).unwrap();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].w_token_redeemed, 3_000);
    assert_eq!(receipts[0].collateral, 2_400);

    assert_eq!(amm.collateral(), 9_643);
    assert!(amm.active_series().is_empty());
    assert_eq!(collateral_of(&host, &POOL), 9_643);
    assert_eq!(host.balance_of(Token::WToken(1), &POOL), 0);
}

#[test]
fn test_claim_requires_settlement_price() {
    let (mut amm, mut host) = pool_after_buy();
    host.set_expired(1, true);
    let before = amm.clone();

    assert_eq!(amm.claim_all_expired_tokens(&mut host), Err(AmmError::NoSettlementPriceYet));
    assert_eq!(amm.claim_expired_tokens(&mut host, 1), Err(AmmError::NoSettlementPriceYet));
    assert_eq!(amm.withdraw_capital(&mut host, &LP, 1_000, false, 0), Err(AmmError::NoSettlementPriceYet));
    assert_eq!(amm, before);
}

#[test]
fn test_claim_errors_and_noop() {
    let (mut amm, mut host) = pool_after_buy();
    assert_eq!(amm.claim_expired_tokens(&mut host, 1), Err(AmmError::SeriesNotExpired));
    assert_eq!(amm.claim_expired_tokens(&mut host, 42), Err(AmmError::InvalidSeries));

    let before = amm.clone();
    assert!(amm.claim_all_expired_tokens(&mut host).unwrap().is_empty());
    assert!(amm.claim_all_expired_tokens(&mut host).unwrap().is_empty());
    assert_eq!(amm, before);
}

#[test]
fn test_withdraw_claims_expired_first() {
    let (mut amm, mut host) = pool_after_buy();
    host.set_time(NOW + YEAR);
    host.set_settlement_price(1, 2_500 * PRICE);

    let receipt = amm.withdraw_capital(&mut host, &LP, 10_000, true, 1).unwrap();
    assert_eq!(receipt.claims.len(), 1);
    assert_eq!(receipt.collateral_out, 9_643);
    assert!(receipt.tokens_out.is_empty());
    assert_eq!(amm.collateral(), 0);
}
