use {
    crate::{
        bfp,
        config::AmplificationParameter,
        join_exit::JoinExitRequest,
        swap::{SwapKind, SwapRequest},
        tests::{Harness, assert_close, fee_recipient},
    },
    ethereum_types::U256,
    maplit::hashmap,
};

fn proportional_join(bpt_out: &str) -> JoinExitRequest {
    JoinExitRequest::AllTokensInForExactBptOut {
        bpt_out: bpt_out.parse::<crate::Bfp>().unwrap().as_uint256(),
        max_amounts_in: vec![U256::MAX; 2],
    }
}

fn swap(amount: &str) -> SwapRequest {
    SwapRequest {
        kind: SwapKind::GivenIn,
        token_in: 0,
        token_out: 1,
        amount: amount.parse::<crate::Bfp>().unwrap().as_uint256(),
        limit: None,
    }
}

#[test]
fn yield_is_charged_once() {
    let mut harness = Harness::new(2, hashmap! { 0 => "1" }, &[])
        .with_protocol_fees("0.5", "0.5")
        .init("1000");
    let supply = harness.supply();

    harness.advance(60, hashmap! { 0 => "1.1" });
    let actual = harness.pool.actual_supply(&harness.ctx).unwrap();
    assert_close(actual - supply, "48.78", "0.05");
    // Observing the fee does not mint it.
    assert_eq!(harness.supply(), supply);

    let outcome = harness
        .pool
        .join_exit(&proportional_join("1"), &harness.ctx)
        .unwrap();
    assert_eq!(outcome.protocol_fee.recipient, fee_recipient());
    assert_eq!(outcome.protocol_fee.amount, actual - supply);
    assert_eq!(harness.supply(), actual + outcome.bpt_amount);

    let settled = harness.pool.actual_supply(&harness.ctx).unwrap();
    assert_eq!(settled, harness.supply());
    let outcome = harness
        .pool
        .join_exit(&proportional_join("1"), &harness.ctx)
        .unwrap();
    assert!(outcome.protocol_fee.amount.is_zero());
}

#[test]
fn exempt_tokens_accrue_no_yield_fee() {
    let mut harness = Harness::new(2, hashmap! { 0 => "1" }, &[0])
        .with_protocol_fees("0.5", "0.5")
        .init("1000");
    let supply = harness.supply();

    harness.advance(60, hashmap! { 0 => "1.1" });
    assert_eq!(harness.pool.actual_supply(&harness.ctx).unwrap(), supply);
    let outcome = harness
        .pool
        .join_exit(&proportional_join("1"), &harness.ctx)
        .unwrap();
    assert!(outcome.protocol_fee.amount.is_zero());
    // The yield still belongs to liquidity providers.
    assert!(harness.pool.rate(&harness.ctx).unwrap() > bfp!("1.04"));
}

#[test]
fn swap_fees_are_charged_on_the_next_operation() {
    let mut harness = Harness::new(2, hashmap! {}, &[])
        .with_protocol_fees("0.5", "0")
        .init("1000");
    let supply = harness.supply();

    let first = harness.pool.swap(&swap("100"), &harness.ctx).unwrap();
    assert!(first.protocol_fee.amount.is_zero());
    assert_eq!(first.fee, bfp!("0.1").as_uint256());
    assert_eq!(harness.supply(), supply);

    let actual = harness.pool.actual_supply(&harness.ctx).unwrap();
    assert!(actual > supply);
    let second = harness.pool.swap(&swap("1"), &harness.ctx).unwrap();
    assert_eq!(second.protocol_fee.amount, actual - supply);
    assert_eq!(harness.supply(), actual);
}

#[test]
fn recovered_rates_are_not_charged_twice() {
    let mut harness = Harness::new(2, hashmap! { 0 => "1" }, &[])
        .with_protocol_fees("0", "0.5")
        .init("1000");

    harness.advance(60, hashmap! { 0 => "1.1" });
    let charged = harness.pool.swap(&swap("1"), &harness.ctx).unwrap();
    assert!(!charged.protocol_fee.amount.is_zero());

    harness.advance(60, hashmap! { 0 => "1" });
    let dip = harness.pool.swap(&swap("1"), &harness.ctx).unwrap();
    assert!(dip.protocol_fee.amount.is_zero());

    harness.advance(60, hashmap! { 0 => "1.1" });
    let recovered = harness.pool.swap(&swap("1"), &harness.ctx).unwrap();
    assert!(recovered.protocol_fee.amount.is_zero());
}

#[test]
fn growth_is_measured_at_the_snapshot_amplification() {
    let mut harness = Harness::new(2, hashmap! {}, &[])
        .with_protocol_fees("0.5", "0")
        .init("1000");
    let supply = harness.supply();
    harness.pool.swap(&swap("100"), &harness.ctx).unwrap();
    let actual = harness.pool.actual_supply(&harness.ctx).unwrap();
    assert!(actual > supply);

    // A higher amplification raises the invariant of the now unbalanced
    // pool without any value being added to it.
    harness.ctx.amplification = AmplificationParameter::from_value(1_000).unwrap();
    assert_eq!(harness.pool.actual_supply(&harness.ctx).unwrap(), actual);

    let outcome = harness
        .pool
        .join_exit(&proportional_join("1"), &harness.ctx)
        .unwrap();
    assert_eq!(outcome.protocol_fee.amount, actual - supply);
    let snapshot = harness.pool.snapshot().unwrap();
    assert_eq!(snapshot.amplification, U256::from(1_000_000));
    assert_eq!(snapshot.supply, harness.supply());
    assert_eq!(
        harness.pool.actual_supply(&harness.ctx).unwrap(),
        harness.supply()
    );

    let outcome = harness
        .pool
        .join_exit(&proportional_join("1"), &harness.ctx)
        .unwrap();
    assert!(outcome.protocol_fee.amount.is_zero());
}
