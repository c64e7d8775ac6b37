//! Kani proofs for rounding direction and bounds
//!
//! Run with: cargo kani -p amm_model
//!
//! - **R1: Rounding Order** - Up never falls below Down, and by at most one
//! - **R2: Fee Bounds** - a fee never exceeds the gross amount or the cap
//! - **R3: Complementary Legs** - settlement payouts always sum to ONE
//! - **R4: Empty Curve** - with no reserves a buyer pays exactly the amount

use crate::curve::{buy_collateral, Side, VirtualReserves};
use crate::fees::{apply_fee, FeeSchedule};
use crate::fixed::{mul_div, Rounding};
use crate::pricing::{settlement_payout, OptionStyle};
use crate::{BPS_SCALE, ONE};

#[kani::proof]
fn r1_round_up_dominates_round_down() {
    let a: u64 = kani::any();
    let b: u64 = kani::any();
    let d: u64 = kani::any();
    kani::assume(d > 0);

    let down = mul_div(a as u128, b as u128, d as u128, Rounding::Down).unwrap();
    let up = mul_div(a as u128, b as u128, d as u128, Rounding::Up).unwrap();

    assert!(up >= down);
    assert!(up - down <= 1);
}

#[kani::proof]
fn r2_fee_bounded_by_gross_and_cap() {
    let gross: u64 = kani::any();
    let notional: u64 = kani::any();
    let trade_fee_bps: u16 = kani::any();
    let max_option_fee_bps: u16 = kani::any();
    kani::assume(trade_fee_bps as u128 <= BPS_SCALE);
    kani::assume(max_option_fee_bps as u128 <= BPS_SCALE);

    let schedule = FeeSchedule { trade_fee_bps, max_option_fee_bps };
    let quote = apply_fee(Side::Sell, gross as u128, notional as u128, &schedule).unwrap();

    assert!(quote.fee <= quote.gross);
    assert!(quote.fee <= notional as u128);
    assert!(quote.net + quote.fee == quote.gross);
}

#[kani::proof]
fn r3_settlement_legs_complementary() {
    let strike: u64 = kani::any();
    let settlement: u64 = kani::any();
    kani::assume(strike > 0 && settlement > 0);

    let style = if kani::any() { OptionStyle::Call } else { OptionStyle::Put };
    let legs = settlement_payout(style, strike as u128, settlement as u128).unwrap();

    assert!(legs.b_token <= ONE);
    assert!(legs.b_token + legs.w_token == ONE);
}

#[kani::proof]
#[kani::unwind(4)]
fn r4_empty_curve_charges_full_amount() {
    let amount: u32 = kani::any();
    kani::assume(amount > 0);

    let empty = VirtualReserves { traded: 0, opposite: 0 };
    assert!(buy_collateral(&empty, amount as u128).unwrap() == amount as u128);
}
