//! Ingestion configuration
//!
//! Values come from the environment (optionally seeded from a `.env` file)
//! and may be overridden by command-line flags.

use std::path::PathBuf;
use std::time::Duration;

use flowatom_common::{FlowError, Result};
use serde::{Deserialize, Serialize};

use crate::flow::AddressPolicy;

/// Default name of the trip-file decoder executable
pub const DEFAULT_TRIPDUMP_BIN: &str = "tripdump";

/// Default delay between directory polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Main ingestion configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Executable that decodes trip files to pipe-delimited text
    pub tripdump_bin: PathBuf,
    /// Address rendering for flow tuples
    pub address_policy: AddressPolicy,
    /// Delay between directory polls in watch mode
    pub poll_interval: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            tripdump_bin: PathBuf::from(DEFAULT_TRIPDUMP_BIN),
            address_policy: AddressPolicy::Native,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl IngestConfig {
    /// Load configuration from environment variables
    ///
    /// - `FLOWATOM_TRIPDUMP_BIN`: decoder executable (default `tripdump`)
    /// - `FLOWATOM_ADDRESS_POLICY`: `native` or `ipv6` (default `native`)
    /// - `FLOWATOM_POLL_INTERVAL_SECS`: seconds between polls (default 1)
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(bin) = lookup("FLOWATOM_TRIPDUMP_BIN").filter(|v| !v.trim().is_empty()) {
            config.tripdump_bin = PathBuf::from(bin);
        }

        if let Some(policy) = lookup("FLOWATOM_ADDRESS_POLICY") {
            config.address_policy = policy.parse()?;
        }

        if let Some(secs) = lookup("FLOWATOM_POLL_INTERVAL_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                FlowError::Config(format!(
                    "FLOWATOM_POLL_INTERVAL_SECS must be an integer, got `{}`",
                    secs
                ))
            })?;
            if secs == 0 {
                return Err(FlowError::Config(
                    "FLOWATOM_POLL_INTERVAL_SECS must be at least 1".to_string(),
                ));
            }
            config.poll_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = IngestConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, IngestConfig::default());
        assert_eq!(config.tripdump_bin, PathBuf::from("tripdump"));
    }

    #[test]
    fn test_overrides() {
        let config = IngestConfig::from_lookup(lookup(&[
            ("FLOWATOM_TRIPDUMP_BIN", "/opt/trip/bin/tripdump"),
            ("FLOWATOM_ADDRESS_POLICY", "ipv6"),
            ("FLOWATOM_POLL_INTERVAL_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.tripdump_bin, PathBuf::from("/opt/trip/bin/tripdump"));
        assert_eq!(config.address_policy, AddressPolicy::Ipv6);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            IngestConfig::from_lookup(lookup(&[("FLOWATOM_POLL_INTERVAL_SECS", "soon")])),
            Err(FlowError::Config(_))
        ));
        assert!(IngestConfig::from_lookup(lookup(&[("FLOWATOM_POLL_INTERVAL_SECS", "0")])).is_err());
        assert!(IngestConfig::from_lookup(lookup(&[("FLOWATOM_ADDRESS_POLICY", "v5")])).is_err());
    }
}
