//! End to end scenarios across gateway mapping, pricing and lending.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use stoichiometric_core::*;

fn two_step_pool() -> Pool {
    Pool::new(
        TokenAddress::from("resource_other"),
        dec!(1.1),
        0,
        dec!(1),
        dec!(2),
        vec![
            Step::new(0, dec!(0), dec!(100), dec!(1.0)),
            Step::new(1, dec!(0), dec!(50), dec!(1.1)),
        ],
    )
}

#[test]
fn test_two_step_pool_quotes() {
    let pool = two_step_pool();

    let partial = quote(&pool, Direction::StableToOther, dec!(120));
    assert!((partial.received - dec!(118.18)).abs() < dec!(0.01));
    assert!(!partial.exhausted);

    let drained = quote(&pool, Direction::StableToOther, dec!(500));
    assert_eq!(drained.received, dec!(150));
    assert!(drained.exhausted);
    // 100 * 1.0 + 50 * 1.1
    assert_eq!(drained.consumed, dec!(155));
}

#[test]
fn test_loan_accrues_over_ten_days() {
    let now = Timestamp::from_secs(1_700_000_000);
    let loan = Loan {
        collateral_token: TokenAddress::from("resource_btc"),
        collateral_amount: dec!(1),
        amount_lent: dec!(100),
        loan_time: now.add_days(-10),
        loan_to_value: dec!(0.5),
        interest_rate: dec!(0.001),
    };
    let debt = accrued_debt(&loan, now, InterestModel::default()).value().unwrap();
    assert!((debt - dec!(101.005)).abs() < dec!(0.001), "debt {debt}");
}

fn details(data: Value) -> Value {
    json!({ "details": { "state": { "data_json": data } } })
}

/// Gateway snapshot -> PoolBook -> routed quote.
#[test]
fn test_gateway_snapshot_routes() {
    let router = details(json!([
        "resource_stable",
        [["resource_btc", "component_btc_pool"], ["resource_eth", "component_eth_pool"]]
    ]));
    let pools_listed = gateway::component_list_from_state(&gateway::component_state(&router).unwrap()).unwrap();
    assert_eq!(pools_listed.len(), 2);

    let mut book = PoolBook::new();
    for (token, _address) in pools_listed {
        let state = gateway::component_state(&details(json!([
            "0.1", 1, "1", "10",  "0", "0",
            [[0, "component_s0"], [1, "component_s1"], [2, "component_s2"]]
        ])))
        .unwrap();
        let steps = gateway::step_refs(&state)
            .unwrap()
            .into_iter()
            .map(|(id, _)| match id {
                0 => gateway::step_from_state(id, &[json!("100"), json!("0"), json!("1"), json!("0"), json!("0")]),
                1 => gateway::step_from_state(id, &[json!("50"), json!("50"), json!("1.1"), json!("0"), json!("0")]),
                _ => gateway::step_from_state(id, &[json!("0"), json!("100"), json!("1.21"), json!("0"), json!("0")]),
            })
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let pool = gateway::pool_from_state(token, &state, steps).unwrap();
        assert!(pool.validate().is_ok());
        book.insert(pool);
    }

    let stable = TokenAddress::from("resource_stable");
    let btc = TokenAddress::from("resource_btc");
    let eth = TokenAddress::from("resource_eth");

    // sell 10 BTC at 1.1 = 11 stable, buy ETH with it at 1.1 = 10 ETH
    let route = route_quote(&book, &stable, &btc, &eth, dec!(10)).unwrap();
    assert_eq!(route.legs.len(), 2);
    assert_eq!(route.intermediate(), Some(dec!(11)));
    assert_eq!(route.received, dec!(10));
    assert!(!route.exhausted);

    assert!(matches!(
        route_quote(&book, &stable, &btc, &btc, dec!(1)),
        Err(RouteError::SameToken(_))
    ));
}

/// Decoder output -> Loan -> lender lookup -> evaluation.
#[test]
fn test_decoded_loan_evaluation() {
    let decoded = DecodedLoan::parse("resource_btc 2 40000 1700000000 0.6 0.0005").unwrap();
    let loan = decoded.into_loan();

    let lender_state = vec![
        json!("10"),
        json!("0.6"),
        json!("0.0005"),
        json!("0.8"),
        json!("0.05"),
        json!("component_oracle"),
    ];
    let price = gateway::oracle_price_from_state(&[json!("25000")]).unwrap();
    let lender = gateway::lender_from_state(TokenAddress::from("resource_btc"), &lender_state, price).unwrap();
    let lenders: LenderBook = vec![lender].into_iter().collect();

    // value 50,000 * 0.8 = 40,000 == debt at open: on the boundary
    let eval = evaluate_in(&lenders, &loan, loan.loan_time, InterestModel::Simple).unwrap();
    assert!(eval.liquidatable);
    assert_eq!(eval.liquidation_price, Estimate::Known(dec!(25000)));
    // min(40,000 * 1.05, 50,000)
    assert_eq!(eval.amount_to_liquidate, dec!(42000));
    assert_eq!(eval.collateral_to_seize, dec!(1.68));

    let later = evaluate_in(&lenders, &loan, loan.loan_time.add_days(30), InterestModel::Simple).unwrap();
    assert!(later.liquidation_price.value().unwrap() > dec!(25000));

    let plan = plan_liquidation(&loan, lenders.get(&loan.collateral_token).unwrap(), loan.loan_time, InterestModel::Simple).unwrap();
    assert!(matches!(plan, LiquidationPlan::Partial { .. }));
    assert!(plan.repay() < dec!(40000));
}

#[test]
fn test_unknown_estimates_render_as_question_mark() {
    let lender = Lender {
        collateral_token: TokenAddress::from("resource_btc"),
        collateral_price: Decimal::ZERO,
        oracle: "component_oracle".to_string(),
        loan_to_value: dec!(0.5),
        interest_rate: dec!(0.001),
        liquidation_threshold: dec!(0.8),
        liquidation_penalty: dec!(0.05),
    };
    let needed = collateral_needed(dec!(100), &lender);
    assert_eq!(needed, Estimate::Unknown);
    assert_eq!(format!("{needed}"), "?");

    let empty = Pool::new(TokenAddress::from("resource_btc"), dec!(1.1), 0, dec!(1), dec!(2), Vec::new());
    let q = quote(&empty, Direction::OtherToStable, dec!(5));
    assert_eq!(q.received, Decimal::ZERO);
    assert!(q.exhausted);
    assert_eq!(q.average_price().to_string(), "?");
}
