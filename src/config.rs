use std::str::FromStr;
use std::time::Duration;

use log::warn;

/// Whether admission checks the sender's confirmed balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BalancePolicy {
    /// Any signed transfer is admitted, whatever the sender holds
    #[default]
    Unchecked,
    /// Transfers above the sender's confirmed balance are rejected
    RequireSufficientFunds,
}

/// Node configuration
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,

    /// Leading zero hex digits required of a block hash
    pub difficulty: usize,
    pub mining_reward: f64,
    pub mining_interval: Duration,
    pub sync_interval: Duration,
    pub neighbor_refresh_interval: Duration,

    /// Upper bound on any single request to a neighbor
    pub peer_timeout: Duration,
    pub balance_policy: BalancePolicy,
    pub neighbors: Vec<String>,
    pub miner_address: Option<String>,
    pub auto_mine: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            host: "0.0.0.0".to_string(),
            port: 5000,
            difficulty: 3,
            mining_reward: 1.0,
            mining_interval: Duration::from_secs(20),
            sync_interval: Duration::from_secs(20),
            neighbor_refresh_interval: Duration::from_secs(20),
            peer_timeout: Duration::from_secs(5),
            balance_policy: BalancePolicy::Unchecked,
            neighbors: Vec::new(),
            miner_address: None,
            auto_mine: false,
        }
    }
}

impl NodeConfig {
    /// Reads `LEDGER_*` environment variables over the defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// Unparsable values are logged and the default is kept.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = NodeConfig::default();
        let secs = |key: &str, default: Duration| {
            Duration::from_secs(parse_or(&lookup, key, default.as_secs()))
        };

        NodeConfig {
            host: lookup("LEDGER_HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "LEDGER_PORT", defaults.port),
            // 64 hex digits is the whole digest
            difficulty: parse_or(&lookup, "LEDGER_DIFFICULTY", defaults.difficulty).min(64),
            mining_reward: parse_or(&lookup, "LEDGER_MINING_REWARD", defaults.mining_reward),
            mining_interval: secs("LEDGER_MINING_INTERVAL_SECS", defaults.mining_interval),
            sync_interval: secs("LEDGER_SYNC_INTERVAL_SECS", defaults.sync_interval),
            neighbor_refresh_interval: secs(
                "LEDGER_NEIGHBOR_REFRESH_SECS",
                defaults.neighbor_refresh_interval,
            ),
            peer_timeout: secs("LEDGER_PEER_TIMEOUT_SECS", defaults.peer_timeout),
            balance_policy: if parse_or(&lookup, "LEDGER_REQUIRE_FUNDS", false) {
                BalancePolicy::RequireSufficientFunds
            } else {
                BalancePolicy::Unchecked
            },
            neighbors: lookup("LEDGER_NEIGHBORS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or(defaults.neighbors),
            miner_address: lookup("LEDGER_MINER_ADDRESS").filter(|s| !s.is_empty()),
            auto_mine: parse_or(&lookup, "LEDGER_AUTO_MINE", defaults.auto_mine),
        }
    }

    /// The endpoint neighbors use to reach this node
    pub fn advertised_endpoint(&self) -> String {
        let host = if self.host == "0.0.0.0" { "127.0.0.1" } else { &self.host };
        format!("{}:{}", host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring unparsable {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
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
        let config = NodeConfig::from_lookup(lookup(&[]));

        assert_eq!(config.difficulty, 3);
        assert_eq!(config.mining_reward, 1.0);
        assert_eq!(config.mining_interval, Duration::from_secs(20));
        assert_eq!(config.balance_policy, BalancePolicy::Unchecked);
        assert!(config.neighbors.is_empty());
        assert_eq!(config.advertised_endpoint(), "127.0.0.1:5000");
    }

    #[test]
    fn test_overrides() {
        let config = NodeConfig::from_lookup(lookup(&[
            ("LEDGER_PORT", "5001"),
            ("LEDGER_DIFFICULTY", "2"),
            ("LEDGER_NEIGHBORS", "127.0.0.1:5002, 127.0.0.1:5003,"),
            ("LEDGER_REQUIRE_FUNDS", "true"),
            ("LEDGER_PEER_TIMEOUT_SECS", "1"),
        ]));

        assert_eq!(config.port, 5001);
        assert_eq!(config.difficulty, 2);
        assert_eq!(config.neighbors, vec!["127.0.0.1:5002", "127.0.0.1:5003"]);
        assert_eq!(config.balance_policy, BalancePolicy::RequireSufficientFunds);
        assert_eq!(config.peer_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_unparsable_values_keep_defaults() {
        let config = NodeConfig::from_lookup(lookup(&[
            ("LEDGER_PORT", "not-a-port"),
            ("LEDGER_DIFFICULTY", "999"),
        ]));

        assert_eq!(config.port, 5000);
        assert_eq!(config.difficulty, 64);
    }
}
