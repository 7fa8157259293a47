//! Stepped DEX and lender simulation.
//!
//! Walks through swap quotes, routing, range liquidity and the loan lifecycle
//! on hand-built snapshots.

use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde_json::json;
use std::collections::BTreeMap;
use stoichiometric_core::*;

fn main() {
    println!("Stoichiometric Core Simulation");
    println!("Stepped Liquidity Pools, Stablecoin Loans\n");

    scenario_1_swap_quotes();
    scenario_2_fees_and_routing();
    scenario_3_range_liquidity();
    scenario_4_loan_lifecycle();
    scenario_5_liquidation_plans();
    scenario_6_gateway_snapshot();
    scenario_7_twap_oracle();

    println!("\nAll simulations completed successfully.");
}

fn btc() -> TokenAddress {
    TokenAddress::from("resource_btc")
}

fn eth() -> TokenAddress {
    TokenAddress::from("resource_eth")
}

fn stable() -> TokenAddress {
    TokenAddress::from("resource_stable")
}

/// A ladder around the current step: stablecoins below the current step, tokens above it.
fn ladder(token: TokenAddress, min_rate: Decimal, rate_step: Decimal, current: StepId, depth: u16, value: Decimal) -> Pool {
    let mut pool = Pool::new(token, rate_step, current, min_rate, min_rate * dec!(100000), Vec::new());
    let mut steps = Vec::new();
    for id in current.saturating_sub(depth)..=current + depth {
        let rate = pool.rate_at(id).unwrap();
        let step = if id < current {
            Step::new(id, value, Decimal::ZERO, rate)
        } else if id > current {
            Step::new(id, Decimal::ZERO, value / rate, rate)
        } else {
            Step::new(id, value / dec!(2), value / dec!(2) / rate, rate)
        };
        steps.push(step);
    }
    pool.set_steps(steps);
    pool
}

/// Price impact of growing trades on a single pool.
fn scenario_1_swap_quotes() {
    println!("Scenario 1: Swap Quotes\n");

    let pool = ladder(btc(), dec!(100), dec!(1.01), 700, 20, dec!(50000));
    println!("  BTC pool, current step {} at rate {}", pool.current_step, pool.current_rate());

    for amount in [dec!(1000), dec!(100000), dec!(1000000), dec!(5000000)] {
        let q = quote(&pool, Direction::StableToOther, amount);
        println!(
            "  buy with {:>12}: received {:>10} BTC, avg price {}, last step {:?}, exhausted {}",
            format_amount(amount),
            format_amount(q.received),
            q.average_price(),
            q.last_step,
            q.exhausted
        );
    }

    let sell = quote(&pool, Direction::OtherToStable, dec!(10));
    println!("  sell 10 BTC: received {} stable\n", format_amount(sell.received));
}

/// Protocol and LP fees, then a token to token route through the stablecoin.
fn scenario_2_fees_and_routing() {
    println!("Scenario 2: Fees and Routing\n");

    let btc_pool = ladder(btc(), dec!(100), dec!(1.01), 700, 20, dec!(50000));
    let eth_pool = ladder(eth(), dec!(10), dec!(1.01), 500, 20, dec!(20000));
    let fees = AppConfig::default().fees;

    let q = quote_with_fees(&btc_pool, Direction::StableToOther, dec!(10000), &fees);
    println!(
        "  10,000 stable -> BTC: protocol fee {}, lp fee {}, received {}",
        format_amount(q.protocol_fee_paid),
        format_amount(q.lp_fee_paid),
        format_amount(q.quote.received)
    );

    let book: PoolBook = vec![btc_pool, eth_pool].into_iter().collect();
    let route = route_quote(&book, &stable(), &btc(), &eth(), dec!(2)).unwrap();
    println!(
        "  2 BTC -> ETH: {} stable in between, {} ETH out, exhausted {}",
        format_amount(route.intermediate().unwrap()),
        format_amount(route.received),
        route.exhausted
    );

    match route_quote(&book, &stable(), &btc(), &TokenAddress::from("resource_doge"), dec!(1)) {
        Err(e) => println!("  BTC -> DOGE rejected: {}\n", e),
        Ok(_) => println!("  BTC -> DOGE unexpectedly routed\n"),
    }
}

/// Spreading a deposit over a price range and valuing the resulting position.
fn scenario_3_range_liquidity() {
    println!("Scenario 3: Range Liquidity\n");

    let pool = ladder(btc(), dec!(100), dec!(1.01), 700, 20, dec!(50000));
    let current = pool.current_rate().unwrap_or(Decimal::ZERO);
    let low = current * dec!(0.95);
    let high = current * dec!(1.05);

    let range = step_range(&pool, low, high).unwrap();
    println!("  price range {} - {} covers steps {} to {}", format_amount(low), format_amount(high), range.min_step, range.max_step);
    println!("  current step stable ratio {}", stable_ratio(&pool));

    let plan = plan_range_liquidity(&pool, low, high, Deposit::Stable(dec!(10000))).unwrap();
    println!(
        "  depositing 10,000 stable needs {} BTC, {} stable per step",
        format_amount(plan.total_other),
        format_amount(plan.value_per_step)
    );

    // the position later owns each step's new liquidity
    let step_positions: BTreeMap<StepId, StepPosition> = plan
        .allocations
        .iter()
        .map(|a| {
            (
                a.step_id,
                StepPosition {
                    liquidity: a.stablecoin_amount + a.other_token_amount * a.rate,
                    last_stable_fees_per_liq: Decimal::ZERO,
                    last_other_fees_per_liq: Decimal::ZERO,
                },
            )
        })
        .collect();
    let position = Position { token: btc(), step_positions };

    let value = position_value(&position, &pool).unwrap();
    println!(
        "  position share of current reserves: {} stable + {} BTC, worth {}\n",
        format_amount(value.stablecoin_amount),
        format_amount(value.other_token_amount),
        value.total_in_stable(pool.current_rate())
    );
}

fn btc_lender(price: Decimal) -> Lender {
    Lender {
        collateral_token: btc(),
        collateral_price: price,
        oracle: "component_btc_oracle".to_string(),
        loan_to_value: dec!(0.6),
        interest_rate: dec!(0.0005),
        liquidation_threshold: dec!(0.8),
        liquidation_penalty: dec!(0.05),
    }
}

/// Borrowing, accrual and the liquidation trigger as the price falls.
fn scenario_4_loan_lifecycle() {
    println!("Scenario 4: Loan Lifecycle\n");

    let lender = btc_lender(dec!(30000));
    let needed = collateral_needed(dec!(18000), &lender);
    println!("  borrowing 18,000 stable needs {} BTC", needed);

    let opened = Timestamp::from_secs(1_700_000_000);
    let loan = Loan {
        collateral_token: btc(),
        collateral_amount: dec!(1),
        amount_lent: dec!(18000),
        loan_time: opened,
        loan_to_value: lender.loan_to_value,
        interest_rate: lender.interest_rate,
    };

    for days in [0, 30, 365] {
        let now = opened.add_days(days);
        let compound = accrued_debt(&loan, now, InterestModel::Compound);
        let simple = accrued_debt(&loan, now, InterestModel::Simple);
        let eval = evaluate(&loan, &lender, now);
        println!(
            "  day {:>3}: debt {} (simple {}), liquidation price {}",
            days, compound, simple, eval.liquidation_price
        );
    }

    let now = opened.add_days(30);
    for price in [dec!(30000), dec!(23000), dec!(22000)] {
        let eval = evaluate(&loan, &btc_lender(price), now);
        println!(
            "  price {}: liquidatable {}, amount to liquidate {}",
            format_amount(price),
            eval.liquidatable,
            format_amount(eval.amount_to_liquidate)
        );
    }

    // mainnet accrues simple interest like the issuer contract
    let model = AppConfig::mainnet().lending.interest_model;
    let book: LenderBook = vec![lender.clone()].into_iter().collect();
    if let Ok(today) = evaluate_in(&book, &loan, Timestamp::now(), model) {
        println!(
            "  today ({:?} interest): debt {}, liquidatable {}",
            model, today.accrued_debt, today.liquidatable
        );
    }

    let mut stray = loan.clone();
    stray.collateral_token = eth();
    match evaluate_in(&book, &stray, now, model) {
        Err(e) => println!("  ETH loan rejected: {}\n", e),
        Ok(_) => println!("  ETH loan unexpectedly evaluated\n"),
    }
}

/// Partial liquidation back to the loan-to-value, and full seizure of an underwater loan.
fn scenario_5_liquidation_plans() {
    println!("Scenario 5: Liquidation Plans\n");

    let opened = Timestamp::from_secs(1_700_000_000);
    let loan = Loan {
        collateral_token: btc(),
        collateral_amount: dec!(1),
        amount_lent: dec!(18000),
        loan_time: opened,
        loan_to_value: dec!(0.6),
        interest_rate: dec!(0.0005),
    };

    for price in [dec!(22000), dec!(17000)] {
        let lender = btc_lender(price);
        match plan_liquidation(&loan, &lender, opened, InterestModel::Compound) {
            Ok(LiquidationPlan::Partial { repay, collateral_seized, remaining_debt, remaining_collateral }) => println!(
                "  price {}: partial, repay {}, seize {} BTC, {} debt left on {} BTC",
                format_amount(price),
                format_amount(repay),
                format_amount(collateral_seized),
                format_amount(remaining_debt),
                format_amount(remaining_collateral)
            ),
            Ok(LiquidationPlan::Full { repay, collateral_seized, bad_debt }) => println!(
                "  price {}: full, repay {}, seize {} BTC, bad debt {}",
                format_amount(price),
                format_amount(repay),
                format_amount(collateral_seized),
                format_amount(bad_debt)
            ),
            Err(e) => println!("  price {}: {}", format_amount(price), e),
        }
        println!("    bad debt: {}", has_bad_debt(&loan, &lender));
    }

    match plan_liquidation(&loan, &btc_lender(dec!(40000)), opened, InterestModel::Compound) {
        Err(e) => println!("  price 40,000: {}\n", e),
        Ok(_) => println!("  price 40,000: unexpectedly liquidatable\n"),
    }
}

/// Rebuilding a pool and a lender from gateway shaped JSON.
fn scenario_6_gateway_snapshot() {
    println!("Scenario 6: Gateway Snapshot\n");

    let pool_details = json!({
        "details": { "state": { "data_json": [
            "0.01", "2", "100", "100000", "0", "0",
            [[1, "component_step1"], [2, "component_step2"]]
        ]}}
    });
    let state = gateway::component_state(&pool_details).unwrap();
    let refs = gateway::step_refs(&state).unwrap();
    let steps: Vec<Step> = refs
        .iter()
        .map(|(id, _)| {
            let rate = dec!(100) * dec!(1.01).powi(i64::from(*id));
            let step_state = vec![json!("5000"), json!("20"), json!(rate.to_string()), json!("0"), json!("0")];
            gateway::step_from_state(*id, &step_state).unwrap()
        })
        .collect();
    let pool = gateway::pool_from_state(btc(), &state, steps).unwrap();
    println!("  pool: rate step {}, {} steps, reserves {:?}", pool.rate_step, pool.steps().len(), pool.reserves());

    let lender_state = vec![json!("0"), json!("0.6"), json!("0.0005"), json!("0.8"), json!("0.05"), json!("component_oracle")];
    let price = gateway::oracle_price_from_state(&[json!("30150.5")]).unwrap();
    let lender = gateway::lender_from_state(btc(), &lender_state, price).unwrap();
    println!("  lender: ltv {}, price {}, valid {}", lender.loan_to_value, lender.collateral_price, lender.validate().is_ok());

    match gateway::pool_from_state(eth(), &state[..2], Vec::new()) {
        Err(e) => println!("  truncated pool state rejected: {}", e),
        Ok(_) => println!("  truncated pool state unexpectedly accepted"),
    }
}

/// Collateral priced from the time weighted step instead of the spot step.
fn scenario_7_twap_oracle() {
    println!("\nScenario 7: TWAP Oracle\n");

    let mut pool = ladder(btc(), dec!(100), dec!(1.001), 5_500, 50, dec!(10000));
    let mut observations = ObservationArray::new();
    let start = Timestamp::from_secs(1_700_000_000);

    // a short spike to 5,540 barely moves the hour average
    for (minutes, step) in [(0, 5_500), (20, 5_510), (40, 5_540), (45, 5_505)] {
        pool.current_step = step;
        observations.record(&pool, Timestamp::from_secs(start.as_secs() + minutes * 60)).unwrap();
    }
    let now = Timestamp::from_secs(start.as_secs() + 3600);

    let spot = pool.current_rate();
    let twap_step = observations.twap_step_since(Timestamp::from_secs(0), now).unwrap();
    let twap = observations.twap_price_since(&pool, Timestamp::from_secs(0), now).unwrap();
    println!("  spot rate {} at step {}", spot, pool.current_step);
    println!("  hour TWAP {} at step {}", twap, twap_step);

    let lender = btc_lender(twap.unwrap_or(Decimal::ZERO));
    println!("  lender prices BTC at {}", format_amount(lender.collateral_price));
}
