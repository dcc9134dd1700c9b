//! Observer configuration from environment variables.

use std::time::Duration;

use switchyard_core::ConnectionTemplate;
use switchyard_storage::DEFAULT_SERVICE_NAME;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 20;
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PUSH_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverConfig {
    /// Time between cycles (default: 20 seconds)
    pub poll_interval: Duration,

    /// Cluster manager command and arguments (default: `pg_autoctl show state`)
    pub autoctl_command: Vec<String>,

    /// Upper bound on one cluster manager invocation
    pub command_timeout: Duration,

    /// Redis holding the service registry
    pub registry_url: String,

    /// Registry list key (default: `train_booking_service`)
    pub registry_key: String,

    /// User placed in pushed connection strings
    pub db_user: String,

    /// Database placed in pushed connection strings
    pub db_name: String,

    /// Upper bound on one push to one replica
    pub push_timeout: Duration,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            autoctl_command: vec![
                "pg_autoctl".to_string(),
                "show".to_string(),
                "state".to_string(),
            ],
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
            registry_url: "redis://127.0.0.1:6379".to_string(),
            registry_key: DEFAULT_SERVICE_NAME.to_string(),
            db_user: "postgres".to_string(),
            db_name: "trains".to_string(),
            push_timeout: Duration::from_secs(DEFAULT_PUSH_TIMEOUT_SECS),
        }
    }
}

impl ObserverConfig {
    /// Create ObserverConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `SWITCHYARD_OBSERVER_POLL_INTERVAL_SECS` (default: 20)
    /// - `SWITCHYARD_AUTOCTL_COMMAND`: whitespace-separated command line
    /// - `SWITCHYARD_AUTOCTL_TIMEOUT_SECS` (default: 10)
    /// - `SWITCHYARD_REGISTRY_URL` (default: `redis://127.0.0.1:6379`)
    /// - `SWITCHYARD_REGISTRY_KEY` (default: `train_booking_service`)
    /// - `SWITCHYARD_DB_USER`, `SWITCHYARD_DB_NAME`
    /// - `SWITCHYARD_OBSERVER_PUSH_TIMEOUT_SECS` (default: 5)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let autoctl_command = std::env::var("SWITCHYARD_AUTOCTL_COMMAND")
            .ok()
            .map(|s| s.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .filter(|parts| !parts.is_empty())
            .unwrap_or(defaults.autoctl_command);

        Self {
            poll_interval: env_secs("SWITCHYARD_OBSERVER_POLL_INTERVAL_SECS")
                .unwrap_or(defaults.poll_interval),
            autoctl_command,
            command_timeout: env_secs("SWITCHYARD_AUTOCTL_TIMEOUT_SECS")
                .unwrap_or(defaults.command_timeout),
            registry_url: std::env::var("SWITCHYARD_REGISTRY_URL").unwrap_or(defaults.registry_url),
            registry_key: std::env::var("SWITCHYARD_REGISTRY_KEY").unwrap_or(defaults.registry_key),
            db_user: std::env::var("SWITCHYARD_DB_USER").unwrap_or(defaults.db_user),
            db_name: std::env::var("SWITCHYARD_DB_NAME").unwrap_or(defaults.db_name),
            push_timeout: env_secs("SWITCHYARD_OBSERVER_PUSH_TIMEOUT_SECS")
                .unwrap_or(defaults.push_timeout),
        }
    }

    pub fn template(&self) -> ConnectionTemplate {
        ConnectionTemplate::new(self.db_user.clone(), self.db_name.clone())
    }
}

/// Zero is not a usable interval or timeout and falls back to the default.
fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_monitor_setup() {
        let config = ObserverConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(20));
        assert_eq!(config.autoctl_command.join(" "), "pg_autoctl show state");
        assert_eq!(config.registry_key, "train_booking_service");
    }

    #[test]
    fn test_template_uses_db_settings() {
        let config = ObserverConfig {
            db_user: "booking".to_string(),
            db_name: "rail".to_string(),
            ..ObserverConfig::default()
        };
        let rendered = config
            .template()
            .render(&switchyard_core::Endpoint::new("pg-node1", 5432));
        assert_eq!(rendered.as_str(), "postgresql://booking:@pg-node1:5432/rail");
    }
}
