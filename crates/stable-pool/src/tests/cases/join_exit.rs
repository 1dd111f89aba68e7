use {
    crate::{
        PoolError,
        bfp,
        join_exit::JoinExitRequest,
        ledger::{Flow, MINIMUM_BPT},
        tests::{Harness, assert_close},
        user_data,
    },
    ethabi::Token,
    ethereum_types::U256,
    maplit::hashmap,
};

#[test]
fn balanced_deposit_mints_proportional_bpt() {
    let mut harness = Harness::new(3, hashmap! {}, &[]).init("1000000");
    assert_eq!(harness.supply(), bfp!("3000000").as_uint256());

    let outcome = harness
        .pool
        .join_exit(
            &JoinExitRequest::ExactTokensInForBptOut {
                amounts_in: vec![bfp!("100").as_uint256(); 3],
                min_bpt_out: U256::zero(),
            },
            &harness.ctx,
        )
        .unwrap();

    assert_eq!(outcome.flow, Flow::In);
    assert_eq!(outcome.kind, "exact_tokens_in_for_bpt_out");
    assert_close(outcome.bpt_amount, "300", "1.5");
    assert!(outcome.bpt_amount <= bfp!("300").as_uint256());
    assert!(outcome.protocol_fee.amount.is_zero());
    assert_eq!(
        harness.pool.ledger().balances(),
        &[bfp!("1000100").as_uint256(); 3]
    );
}

#[test]
fn exiting_everything_leaves_the_locked_minimum() {
    let mut harness = Harness::new(2, hashmap! {}, &[]).init("1000");
    let burnable = harness.pool.ledger().burnable_supply();

    let outcome = harness
        .pool
        .join_exit(
            &JoinExitRequest::ExactBptInForTokensOut {
                bpt_in: burnable,
                min_amounts_out: vec![U256::zero(); 2],
            },
            &harness.ctx,
        )
        .unwrap();

    assert_eq!(outcome.flow, Flow::Out);
    assert_eq!(harness.supply(), U256::from(MINIMUM_BPT));
    for (balance, paid) in harness.pool.ledger().balances().iter().zip(&outcome.amounts) {
        assert!(!balance.is_zero());
        assert_eq!(*balance + *paid, bfp!("1000").as_uint256());
    }

    let result = harness.pool.join_exit(
        &JoinExitRequest::ExactBptInForTokensOut {
            bpt_in: U256::one(),
            min_amounts_out: vec![U256::zero(); 2],
        },
        &harness.ctx,
    );
    assert!(matches!(
        result,
        Err(PoolError::InsufficientBalance("BPT supply"))
    ));
}

#[test]
fn single_token_exit_above_supply_fails_without_mutation() {
    let mut harness = Harness::new(3, hashmap! {}, &[]).init("1000");
    let before = harness.pool.ledger().clone();

    let result = harness.pool.join_exit(
        &JoinExitRequest::ExactBptInForOneTokenOut {
            bpt_in: harness.supply() + 1,
            token_index: 0,
            min_amount_out: U256::zero(),
        },
        &harness.ctx,
    );
    assert!(matches!(result, Err(PoolError::InsufficientBalance(_))));
    assert_eq!(harness.pool.ledger(), &before);
}

#[test]
fn single_token_round_trip_does_not_profit() {
    let mut harness = Harness::new(3, hashmap! {}, &[]).init("1000");
    let bpt = bfp!("10").as_uint256();

    let joined = harness
        .pool
        .join_exit(
            &JoinExitRequest::TokenInForExactBptOut {
                token_index: 1,
                bpt_out: bpt,
                max_amount_in: U256::MAX,
            },
            &harness.ctx,
        )
        .unwrap();
    let exited = harness
        .pool
        .join_exit(
            &JoinExitRequest::ExactBptInForOneTokenOut {
                bpt_in: bpt,
                token_index: 1,
                min_amount_out: U256::zero(),
            },
            &harness.ctx,
        )
        .unwrap();

    assert!(exited.amounts[1] < joined.amounts[1]);
    assert!(joined.amounts[0].is_zero() && exited.amounts[2].is_zero());
}

#[test]
fn requests_decoded_from_user_data() {
    let mut harness = Harness::new(2, hashmap! {}, &[]).init("1000");
    let data = ethabi::encode(&[
        Token::Uint(1.into()),
        Token::Array(vec![Token::Uint(bfp!("5").as_uint256()); 2]),
        Token::Uint(bfp!("9").as_uint256()),
    ]);
    let request = user_data::decode_join(&data, &[U256::MAX; 2]).unwrap();
    let joined = harness.pool.join_exit(&request, &harness.ctx).unwrap();
    assert_close(joined.bpt_amount, "10", "0.01");

    // Exit for exact amounts, token indices only count tradable tokens.
    let data = ethabi::encode(&[
        Token::Uint(1.into()),
        Token::Array(vec![
            Token::Uint(bfp!("1").as_uint256()),
            Token::Uint(U256::zero()),
        ]),
        Token::Uint(bfp!("2").as_uint256()),
    ]);
    let request = user_data::decode_exit(&data, &[U256::zero(); 2]).unwrap();
    let exited = harness.pool.join_exit(&request, &harness.ctx).unwrap();
    assert_eq!(
        exited.amounts,
        vec![bfp!("1").as_uint256(), U256::zero()]
    );
    assert!(exited.bpt_amount > bfp!("1").as_uint256());
}

#[test]
fn joins_add_value_and_exits_remove_it() {
    let mut harness = Harness::new(3, hashmap! {}, &[]).init("1000");
    let value = |harness: &Harness| -> U256 {
        harness
            .pool
            .scaled_balances(harness.ctx.timestamp)
            .unwrap()
            .iter()
            .fold(U256::zero(), |sum, balance| sum + balance.as_uint256())
    };

    let requests = [
        JoinExitRequest::ExactTokensInForBptOut {
            amounts_in: vec![
                bfp!("3").as_uint256(),
                U256::zero(),
                bfp!("1").as_uint256(),
            ],
            min_bpt_out: U256::zero(),
        },
        JoinExitRequest::AllTokensInForExactBptOut {
            bpt_out: bfp!("2").as_uint256(),
            max_amounts_in: vec![U256::MAX; 3],
        },
        JoinExitRequest::ExactBptInForOneTokenOut {
            bpt_in: bfp!("2").as_uint256(),
            token_index: 2,
            min_amount_out: U256::zero(),
        },
        JoinExitRequest::BptInForExactTokensOut {
            amounts_out: vec![U256::zero(), bfp!("1").as_uint256(), U256::zero()],
            max_bpt_in: U256::MAX,
        },
    ];
    for request in requests {
        let (supply, before) = (harness.supply(), value(&harness));
        let outcome = harness.pool.join_exit(&request, &harness.ctx).unwrap();
        assert!(!outcome.bpt_amount.is_zero());
        match outcome.flow {
            Flow::In => {
                assert_eq!(harness.supply(), supply + outcome.bpt_amount);
                assert!(value(&harness) > before);
            }
            Flow::Out => {
                assert_eq!(harness.supply(), supply - outcome.bpt_amount);
                assert!(value(&harness) < before);
            }
        }
    }
}
