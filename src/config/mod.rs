use serde::Deserialize;
use std::env;
use std::path::Path;

fn default_server_port() -> u16 {
    8080
}
fn default_read_timeout() -> u64 {
    5
}
fn default_write_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    120
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub idle_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: default_server_port(),
            read_timeout: default_read_timeout(),
            write_timeout: default_write_timeout(),
            idle_timeout: default_idle_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HotIndexConfig {
    pub addr: String,
    pub password: Option<String>,
    pub db: i64,
    pub pool_size: u64,
    pub min_idle_conns: u64,
    pub dial_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

impl Default for HotIndexConfig {
    fn default() -> Self {
        HotIndexConfig {
            addr: "redis://127.0.0.1:6379".to_string(),
            password: None,
            db: 0,
            pool_size: 100,
            min_idle_conns: 10,
            dial_timeout_ms: 5_000,
            read_timeout_ms: 3_000,
            write_timeout_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColdStoreConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: String,
    pub max_connections: usize,
    pub min_connections: usize,
    pub max_conn_lifetime_secs: u64,
    pub max_conn_idle_time_secs: u64,
}

impl Default for ColdStoreConfig {
    fn default() -> Self {
        ColdStoreConfig {
            host: "127.0.0.1".to_string(),
            port: 5432,
            user: "leaderboard".to_string(),
            password: String::new(),
            database: "leaderboard".to_string(),
            ssl_mode: "disable".to_string(),
            max_connections: 50,
            min_connections: 5,
            max_conn_lifetime_secs: 3600,
            max_conn_idle_time_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
    pub enabled: bool,
    pub batch_size: usize,
    pub batch_timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            brokers: "127.0.0.1:9092".to_string(),
            topic: "leaderboard-scores".to_string(),
            group_id: "leaderboard-consumer".to_string(),
            enabled: true,
            batch_size: 100,
            batch_timeout_ms: 1_000,
            retry_attempts: 3,
            retry_delay_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub interval_secs: u64,
    pub batch_size: usize,
    pub enabled: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            interval_secs: 30 * 60,
            batch_size: 1000,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LeaderboardQueryConfig {
    pub default_limit: u64,
    pub max_limit: u64,
}

impl Default for LeaderboardQueryConfig {
    fn default() -> Self {
        LeaderboardQueryConfig {
            default_limit: 100,
            max_limit: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub hotindex: HotIndexConfig,
    pub coldstore: ColdStoreConfig,
    pub queue: QueueConfig,
    pub sync: SyncConfig,
    pub leaderboard: LeaderboardQueryConfig,
}

impl ServiceConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let expanded = expand_env_placeholders(&raw);
        let config: ServiceConfig = serde_yaml::from_str(&expanded)?;
        Ok(config)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Could not load config from {}: {}. Falling back to defaults.",
                    path.as_ref().display(),
                    e
                );
                ServiceConfig::default()
            }
        }
    }
}

/// Expands `${VAR:default}` placeholders against the process environment.
/// A bare `${VAR}` with no match and no default expands to an empty string.
pub fn expand_env_placeholders(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            if let Some(end) = input[i + 2..].find('}') {
                let inner = &input[i + 2..i + 2 + end];
                let (var_name, default) = match inner.split_once(':') {
                    Some((name, default)) => (name, Some(default)),
                    None => (inner, None),
                };
                let resolved = env::var(var_name).ok().or_else(|| default.map(String::from));
                output.push_str(&resolved.unwrap_or_default());
                i += 2 + end + 1;
                continue;
            }
        }
        output.push(bytes[i] as char);
        i += 1;
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_var_with_default_when_unset() {
        std::env::remove_var("LB_TEST_PLACEHOLDER_UNSET");
        let out = expand_env_placeholders("port: ${LB_TEST_PLACEHOLDER_UNSET:8080}");
        assert_eq!(out, "port: 8080");
    }

    #[test]
    fn prefers_set_env_var_over_default() {
        std::env::set_var("LB_TEST_PLACEHOLDER_SET", "9090");
        let out = expand_env_placeholders("port: ${LB_TEST_PLACEHOLDER_SET:8080}");
        assert_eq!(out, "port: 9090");
        std::env::remove_var("LB_TEST_PLACEHOLDER_SET");
    }

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.hotindex.pool_size, 100);
        assert_eq!(config.coldstore.port, 5432);
        assert_eq!(config.sync.interval_secs, 1800);
        assert_eq!(config.leaderboard.default_limit, 100);
        assert_eq!(config.leaderboard.max_limit, 1000);
    }
}
