use std::str::FromStr;

use anyhow::{Context, bail};

pub const FILTER_VAR: &str = "ROLEGRAPH_LOG";
pub const FORMAT_VAR: &str = "ROLEGRAPH_LOG_FORMAT";

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => bail!("unknown log format {other:?} (expected \"json\" or \"pretty\")"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` directives, e.g. `info,rolegraph_infra=debug`.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::default(),
        }
    }
}

impl LogConfig {
    /// Read `ROLEGRAPH_LOG` (then `RUST_LOG`) and `ROLEGRAPH_LOG_FORMAT`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let filter = present(FILTER_VAR)
            .or_else(|| present("RUST_LOG"))
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());

        let format = match present(FORMAT_VAR) {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid {FORMAT_VAR}"))?,
            None => LogFormat::default(),
        };

        Ok(Self { filter, format })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = LogConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LogConfig::default());
        assert_eq!(config.filter, "info");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn own_variable_wins_over_rust_log() {
        let config = LogConfig::from_lookup(lookup(&[
            ("RUST_LOG", "warn"),
            (FILTER_VAR, "rolegraph_infra=debug"),
        ]))
        .unwrap();
        assert_eq!(config.filter, "rolegraph_infra=debug");

        let fallback =
            LogConfig::from_lookup(lookup(&[("RUST_LOG", "warn"), (FILTER_VAR, "  ")])).unwrap();
        assert_eq!(fallback.filter, "warn");
    }

    #[test]
    fn format_is_case_insensitive() {
        let config = LogConfig::from_lookup(lookup(&[(FORMAT_VAR, "Pretty")])).unwrap();
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn unknown_format_is_rejected() {
        let err = LogConfig::from_lookup(lookup(&[(FORMAT_VAR, "xml")])).unwrap_err();
        assert!(format!("{err:#}").contains("xml"));
    }
}
