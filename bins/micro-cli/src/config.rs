//! CLI configuration loaded from environment variables.
//!
//! Command-line flags take precedence over everything read here.

use std::path::PathBuf;
use std::time::Duration;

use micro_core::constants::DEFAULT_INDEXER_TIMEOUT_SECS;
use micro_core::error::ConfigError;

#[derive(Clone, Debug)]
pub struct CliConfig {
    /// Blockbook base URL.
    pub blockbook_url: Option<String>,
    /// Per-request indexer timeout.
    pub timeout: Duration,
    /// External signer program for `send`.
    pub signer: Option<PathBuf>,
}

impl CliConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from `lookup`, which maps a variable name to its value.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|s| !s.is_empty());

        let timeout_secs = match var("MICROWALLET_TIMEOUT_SECS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|&secs| secs > 0)
                .ok_or_else(|| {
                    ConfigError::Invalid(format!(
                        "MICROWALLET_TIMEOUT_SECS must be a positive integer, got {v:?}"
                    ))
                })?,
            None => DEFAULT_INDEXER_TIMEOUT_SECS,
        };

        Ok(CliConfig {
            blockbook_url: var("BLOCKBOOK_URL"),
            timeout: Duration::from_secs(timeout_secs),
            signer: var("MICROWALLET_SIGNER").map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<CliConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CliConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.blockbook_url, None);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_INDEXER_TIMEOUT_SECS));
        assert_eq!(config.signer, None);
    }

    #[test]
    fn reads_every_variable() {
        let config = load(&[
            ("BLOCKBOOK_URL", "https://btc1.trezor.io"),
            ("MICROWALLET_TIMEOUT_SECS", "40"),
            ("MICROWALLET_SIGNER", "/usr/local/bin/sign"),
        ])
        .unwrap();
        assert_eq!(config.blockbook_url.as_deref(), Some("https://btc1.trezor.io"));
        assert_eq!(config.timeout, Duration::from_secs(40));
        assert_eq!(config.signer, Some(PathBuf::from("/usr/local/bin/sign")));
    }

    #[test]
    fn bad_timeout_is_a_config_error() {
        for bad in ["abc", "0", "-5", "1.5"] {
            let err = load(&[("MICROWALLET_TIMEOUT_SECS", bad)]).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{bad}");
        }
    }
}
