use procura_scenario::{Scenario, ensure_success, run};

const DEMO: &str = include_str!("../../../demos/purchase_payment_type.json");

#[test]
fn demo_scenario_meets_every_expectation() {
    let scenario = Scenario::from_json(DEMO).unwrap();
    let report = run(&scenario).unwrap();

    assert!(report.checks.len() > 20);
    ensure_success(&report).unwrap();
}

#[test]
fn demo_scenario_replays_identically_twice() {
    let scenario = Scenario::from_json(DEMO).unwrap();
    let first = run(&scenario).unwrap();
    let second = run(&scenario).unwrap();
    assert_eq!(first.checks, second.checks);
}
