use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bind address
    pub bind_addr: String,

    /// Port to listen on (0 picks an ephemeral port)
    pub port: u16,

    /// Maximum number of concurrent client connections
    pub max_clients: usize,

    /// Largest accepted request payload, in bytes
    pub max_message_size: usize,

    /// Initial bucket count of the top-level key table (rounded up to a power of two)
    pub initial_table_capacity: usize,

    /// Log every successful write to the append-only file
    pub aof_enabled: bool,

    /// Path to the append-only file
    pub aof_path: String,

    /// How often the AOF is flushed to stable storage
    pub aof_flush_interval_ms: u64,

    /// Upper bound on a single readiness wait
    pub poll_timeout_ms: u64,

    /// TCP nodelay
    pub tcp_nodelay: bool,

    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 9000,
            max_clients: 2047,
            max_message_size: 4096,
            initial_table_capacity: 1024,
            aof_enabled: true,
            aof_path: "AOF.aof".to_string(),
            aof_flush_interval_ms: 1000,
            poll_timeout_ms: 100,
            tcp_nodelay: true,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields fall back to their defaults.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use litedb::Config;
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = Config::from_file("litedb.toml")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_clients == 0 {
            return Err(Error::Config("max_clients must be > 0".to_string()));
        }

        if self.max_message_size == 0 || self.max_message_size > u32::MAX as usize {
            return Err(Error::Config(format!(
                "max_message_size must be between 1 and {}",
                u32::MAX
            )));
        }

        if self.initial_table_capacity == 0 {
            return Err(Error::Config("initial_table_capacity must be > 0".to_string()));
        }

        if self.aof_enabled && self.aof_path.is_empty() {
            return Err(Error::Config(
                "aof_path must not be empty when the AOF is enabled".to_string(),
            ));
        }

        if self.aof_enabled && self.aof_flush_interval_ms == 0 {
            return Err(Error::Config(
                "aof_flush_interval_ms must be > 0 when the AOF is enabled".to_string(),
            ));
        }

        Ok(())
    }

    pub fn aof_flush_interval(&self) -> Duration {
        Duration::from_millis(self.aof_flush_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 9000);
        assert_eq!(config.max_clients, 2047);
        assert!(config.aof_enabled);
        assert_eq!(config.aof_path, "AOF.aof");
    }

    #[test]
    fn rejects_zero_clients() {
        let config = Config {
            max_clients: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_failures_are_config_errors() {
        let config = Config {
            aof_path: String::new(),
            ..Default::default()
        };
        match config.validate() {
            Err(Error::Config(msg)) => assert!(msg.contains("aof_path"), "{}", msg),
            other => panic!("expected a config error, got {:?}", other),
        }

        let memory_only = Config {
            aof_enabled: false,
            ..config
        };
        assert!(memory_only.validate().is_ok());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: Config = toml::from_str("port = 7000\nmax_clients = 8\n").unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.max_clients, 8);
        assert_eq!(config.max_message_size, 4096);
    }

    #[test]
    fn toml_roundtrip_through_file() {
        let path = std::env::temp_dir().join(format!("litedb_config_{}.toml", std::process::id()));
        let config = Config {
            port: 7777,
            aof_enabled: false,
            ..Default::default()
        };
        config.to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded.port, 7777);
        assert!(!loaded.aof_enabled);
    }
}
