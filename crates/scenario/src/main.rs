use anyhow::Context;

use procura_scenario::{ScenarioConfig, ensure_success, run};

fn main() -> anyhow::Result<()> {
    procura_observability::init();

    let config = ScenarioConfig::from_env(std::env::args().skip(1))?;
    let path = config.scenario_path.display().to_string();
    let json = std::fs::read_to_string(&config.scenario_path)
        .with_context(|| format!("reading scenario {path}"))?;
    let scenario: procura_scenario::Scenario =
        serde_json::from_str(&json).with_context(|| format!("parsing scenario {path}"))?;

    let report = run(&scenario)?;
    for check in &report.checks {
        tracing::info!(passed = check.passed(), "{check}");
    }
    ensure_success(&report)
}
