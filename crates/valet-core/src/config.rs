//! valet.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValetConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// Which data-access backend carries requests and results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Replicated REST store shared with the placement engine.
    Music,
    /// Embedded redb database (standalone and development).
    #[default]
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_keyspace")]
    pub keyspace: String,
    /// Replica base URLs, tried in order.
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            keyspace: default_keyspace(),
            endpoints: Vec::new(),
            namespace: None,
            user_id: None,
            password: None,
            request_timeout: default_request_timeout(),
            data_dir: default_data_dir(),
        }
    }
}

impl StoreConfig {
    pub fn request_timeout(&self) -> Duration {
        parse_duration(&self.request_timeout).unwrap_or(Duration::from_secs(10))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Total wait window for a result row (e.g. "300s").
    #[serde(default = "default_wait_until")]
    pub wait_until: String,
    /// Delay between two result queries (e.g. "5s").
    #[serde(default = "default_poll_every")]
    pub poll_every: String,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            wait_until: default_wait_until(),
            poll_every: default_poll_every(),
        }
    }
}

impl PollingConfig {
    pub fn wait_until(&self) -> Duration {
        parse_duration(&self.wait_until).unwrap_or(Duration::from_secs(300))
    }

    pub fn poll_every(&self) -> Duration {
        parse_duration(&self.poll_every).unwrap_or(Duration::from_secs(5))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
    /// Log `/ping` probes and their store lookups.
    #[serde(default)]
    pub ping: bool,
}

fn default_port() -> u16 {
    8080
}

fn default_keyspace() -> String {
    "valet".to_string()
}

fn default_request_timeout() -> String {
    "10s".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/valet")
}

fn default_wait_until() -> String {
    "300s".to_string()
}

fn default_poll_every() -> String {
    "5s".to_string()
}

impl ValetConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ValetConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Parse a duration string like "5s", "500ms", "2m", or bare seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: ValetConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.store.backend, StoreBackend::Local);
        assert_eq!(config.polling.wait_until(), Duration::from_secs(300));
        assert_eq!(config.polling.poll_every(), Duration::from_secs(5));
        assert!(!config.logging.json);
    }

    #[test]
    fn parse_music_store() {
        let toml_str = r#"
[server]
port = 9090

[store]
backend = "music"
keyspace = "pn2"
endpoints = ["http://db1:8080/MUSIC/rest/v2", "http://db2:8080/MUSIC/rest/v2"]
namespace = "org.onap.fgps"
user_id = "valet"
password = "secret"
request_timeout = "1500ms"

[polling]
wait_until = "2m"
poll_every = "1"
"#;
        let config: ValetConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.store.backend, StoreBackend::Music);
        assert_eq!(config.store.endpoints.len(), 2);
        assert_eq!(config.store.request_timeout(), Duration::from_millis(1500));
        assert_eq!(config.polling.wait_until(), Duration::from_secs(120));
        assert_eq!(config.polling.poll_every(), Duration::from_secs(1));
    }

    #[test]
    fn bad_duration_falls_back() {
        let polling = PollingConfig {
            wait_until: "soon".to_string(),
            poll_every: "".to_string(),
        };
        assert_eq!(polling.wait_until(), Duration::from_secs(300));
        assert_eq!(polling.poll_every(), Duration::from_secs(5));
    }

    #[test]
    fn from_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("valet.toml");
        let mut config = ValetConfig::default();
        config.store.keyspace = "test_ks".to_string();
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let loaded = ValetConfig::from_file(&path).unwrap();
        assert_eq!(loaded.store.keyspace, "test_ks");
    }
}
