use {
    crate::{
        PoolError,
        bfp,
        swap::{SwapKind, SwapRequest},
        tests::Harness,
    },
    ethereum_types::U256,
    maplit::hashmap,
};

fn given_in(token_in: usize, token_out: usize, amount: U256) -> SwapRequest {
    SwapRequest {
        kind: SwapKind::GivenIn,
        token_in,
        token_out,
        amount,
        limit: None,
    }
}

#[test]
fn round_trip_loses_to_fees() {
    let mut harness = Harness::new(2, hashmap! {}, &[]).init("1000");
    let amount = bfp!("10").as_uint256();
    let invariant = harness.pool.invariant(&harness.ctx).unwrap();

    let there = harness
        .pool
        .swap(&given_in(0, 1, amount), &harness.ctx)
        .unwrap();
    assert!(there.amount_out < amount);
    let back = harness
        .pool
        .swap(&given_in(1, 0, there.amount_out), &harness.ctx)
        .unwrap();
    assert!(back.amount_out < amount);

    assert!(harness.pool.invariant(&harness.ctx).unwrap() > invariant);
    assert_eq!(
        harness.pool.ledger().balances()[0],
        bfp!("1000").as_uint256() + amount - back.amount_out
    );
}

#[test]
fn buying_back_costs_more_than_was_received() {
    let mut harness = Harness::new(2, hashmap! {}, &[]).init("1000");
    let amount = bfp!("10").as_uint256();

    let there = harness
        .pool
        .swap(&given_in(0, 1, amount), &harness.ctx)
        .unwrap();
    let back = harness
        .pool
        .swap(
            &SwapRequest {
                kind: SwapKind::GivenOut,
                token_in: 1,
                token_out: 0,
                amount,
                limit: None,
            },
            &harness.ctx,
        )
        .unwrap();

    assert_eq!(back.amount_out, amount);
    assert!(back.amount_in > there.amount_out);
}

#[test]
fn given_out_is_consistent_with_given_in() {
    let mut harness = Harness::new(3, hashmap! {}, &[]).init("1000");
    let before = harness.pool.ledger().balances().to_vec();

    let outcome = harness
        .pool
        .swap(
            &SwapRequest {
                kind: SwapKind::GivenOut,
                token_in: 2,
                token_out: 0,
                amount: bfp!("5").as_uint256(),
                limit: Some(bfp!("6").as_uint256()),
            },
            &harness.ctx,
        )
        .unwrap();
    assert!(outcome.amount_in > bfp!("5").as_uint256());

    let balances = harness.pool.ledger().balances();
    assert_eq!(balances[0], before[0] - bfp!("5").as_uint256());
    assert_eq!(balances[1], before[1]);
    assert_eq!(balances[2], before[2] + outcome.amount_in);

    // Selling the same input back the other way yields no more than was
    // bought.
    let reverse = harness
        .pool
        .swap(&given_in(2, 0, outcome.amount_in), &harness.ctx)
        .unwrap();
    assert!(reverse.amount_out <= bfp!("5").as_uint256());
}

#[test]
fn rejected_swaps_leave_balances_untouched() {
    let mut harness = Harness::new(2, hashmap! {}, &[]).init("1000");
    let before = harness.pool.ledger().clone();

    let mut request = given_in(0, 1, bfp!("1").as_uint256());
    request.limit = Some(bfp!("1").as_uint256());
    assert!(matches!(
        harness.pool.swap(&request, &harness.ctx),
        Err(PoolError::BelowMinimum { .. })
    ));
    assert!(matches!(
        harness.pool.swap(&given_in(0, 0, U256::one()), &harness.ctx),
        Err(PoolError::InvalidSwap(_))
    ));
    assert!(matches!(
        harness.pool.swap(&given_in(0, 5, U256::one()), &harness.ctx),
        Err(PoolError::InvalidTokenIndex(_))
    ));
    assert_eq!(harness.pool.ledger(), &before);
}
