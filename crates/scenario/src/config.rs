use std::path::PathBuf;

use anyhow::bail;

/// Fallback scenario path when none is given on the command line.
pub const SCENARIO_ENV: &str = "PROCURA_SCENARIO";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioConfig {
    pub scenario_path: PathBuf,
}

impl ScenarioConfig {
    pub fn from_env(args: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        Self::from_args_and_env(args, std::env::var(SCENARIO_ENV).ok())
    }

    /// The first argument wins over the environment value.
    pub fn from_args_and_env(
        args: impl IntoIterator<Item = String>,
        env_value: Option<String>,
    ) -> anyhow::Result<Self> {
        let mut args = args.into_iter();
        let path = match (args.next(), env_value) {
            (Some(arg), _) => arg,
            (None, Some(value)) if !value.trim().is_empty() => value,
            _ => bail!("usage: procura-scenario <scenario.json> (or set {SCENARIO_ENV})"),
        };
        if let Some(extra) = args.next() {
            bail!("unexpected argument '{extra}'");
        }
        Ok(Self {
            scenario_path: PathBuf::from(path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn argument_wins_over_environment() {
        let config =
            ScenarioConfig::from_args_and_env(args(&["a.json"]), Some("b.json".to_string())).unwrap();
        assert_eq!(config.scenario_path, PathBuf::from("a.json"));

        let config = ScenarioConfig::from_args_and_env(args(&[]), Some("b.json".to_string())).unwrap();
        assert_eq!(config.scenario_path, PathBuf::from("b.json"));
    }

    #[test]
    fn missing_or_extra_paths_are_rejected() {
        assert!(ScenarioConfig::from_args_and_env(args(&[]), None).is_err());
        assert!(ScenarioConfig::from_args_and_env(args(&[]), Some("  ".to_string())).is_err());
        assert!(ScenarioConfig::from_args_and_env(args(&["a.json", "b.json"]), None).is_err());
    }
}
