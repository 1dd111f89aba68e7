use {
    crate::{
        PoolError,
        bfp,
        join_exit::JoinExitRequest,
        rates::{MockRateProvider, TokenRateCache},
        swap::{SwapKind, SwapRequest},
        tests::{CACHE_DURATION, Harness, START, provider, token_address},
    },
    ethereum_types::U256,
    maplit::hashmap,
};

fn swap() -> SwapRequest {
    SwapRequest {
        kind: SwapKind::GivenIn,
        token_in: 1,
        token_out: 0,
        amount: bfp!("1").as_uint256(),
        limit: None,
    }
}

#[test]
fn expired_rates_block_operations_until_refreshed() {
    let mut harness = Harness::new(2, hashmap! { 0 => "1.05" }, &[]).init("1000");
    harness.ctx.timestamp = START + CACHE_DURATION.as_secs() - 1;
    harness.pool.swap(&swap(), &harness.ctx).unwrap();

    harness.ctx.timestamp = START + CACHE_DURATION.as_secs();
    let before = harness.pool.ledger().clone();
    assert!(matches!(
        harness.pool.swap(&swap(), &harness.ctx),
        Err(PoolError::StaleRate { token }) if token == token_address(0)
    ));
    assert!(matches!(
        harness.pool.join_exit(
            &JoinExitRequest::ExactBptInForTokensOut {
                bpt_in: U256::one(),
                min_amounts_out: vec![U256::zero(); 2],
            },
            &harness.ctx,
        ),
        Err(PoolError::StaleRate { .. })
    ));
    assert!(harness.pool.invariant(&harness.ctx).is_err());
    assert_eq!(harness.pool.ledger(), &before);

    harness.advance(0, hashmap! { 0 => "1.05" });
    harness.pool.swap(&swap(), &harness.ctx).unwrap();
}

#[test]
fn failed_refresh_keeps_the_previous_rate() {
    let mut harness = Harness::new(2, hashmap! { 1 => "1.2" }, &[]).init("1000");
    let cached = harness.pool.rate_caches()[1];

    let mut failing = MockRateProvider::new();
    failing
        .expect_get_rate()
        .times(1)
        .returning(|| Err(anyhow::anyhow!("execution reverted")));
    let result = harness
        .pool
        .update_token_rate_cache(1, &failing, START + 10);
    assert!(matches!(
        result,
        Err(PoolError::RateProviderFailure { token, .. }) if token == token_address(1)
    ));
    assert_eq!(harness.pool.rate_caches()[1], cached);
    assert_eq!(
        harness.pool.rate_caches()[1].rate_at(START + 10),
        Some(bfp!("1.2"))
    );
}

#[test]
fn rates_scale_balances() {
    let mut harness = Harness::new(2, hashmap! { 1 => "1.2" }, &[]).init("1000");
    let scaled = harness.pool.scaled_balances(harness.ctx.timestamp).unwrap();
    assert_eq!(scaled, vec![bfp!("1000"), bfp!("1200")]);
    assert!(matches!(
        harness.pool.rate_caches()[0],
        TokenRateCache::Unit
    ));

    let refreshed = harness
        .pool
        .update_token_rate_cache(1, &provider("1.25"), START + 1)
        .unwrap();
    assert_eq!(refreshed, bfp!("1.25"));
    assert_eq!(
        harness.pool.scaled_balances(START + 1).unwrap(),
        vec![bfp!("1000"), bfp!("1250")]
    );
}
