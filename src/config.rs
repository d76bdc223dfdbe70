//! Engine configuration
use crate::error::OrderError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_db_path() -> PathBuf {
    PathBuf::from("service_orders.db")
}
fn default_cache_capacity() -> u64 {
    64 * 1024 * 1024
}
fn default_max_attempts() -> u32 {
    16
}
fn default_flush_every_ms() -> Option<u64> {
    Some(500)
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub db_path: PathBuf,
    /// Delete the database when it is dropped. Used by tests and demos.
    pub temporary: bool,
    pub cache_capacity_bytes: u64,
    /// Upper bound on how often one operation's transaction is re-run after
    /// sled reports a conflict. Past this the caller gets `Conflict`.
    pub max_transaction_attempts: u32,
    pub flush_every_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            temporary: false,
            cache_capacity_bytes: default_cache_capacity(),
            max_transaction_attempts: default_max_attempts(),
            flush_every_ms: default_flush_every_ms(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temporary() -> Self {
        Self {
            temporary: true,
            ..Self::default()
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn set_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }
    pub fn set_max_transaction_attempts(mut self, attempts: u32) -> Self {
        self.max_transaction_attempts = attempts;
        self
    }
    pub fn set_cache_capacity_bytes(mut self, bytes: u64) -> Self {
        self.cache_capacity_bytes = bytes;
        self
    }

    pub fn validate(&self) -> Result<(), OrderError> {
        if self.max_transaction_attempts == 0 {
            return Err(OrderError::ValidationError(
                "max_transaction_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn open_db(&self) -> Result<sled::Db, OrderError> {
        self.validate()?;
        let mut config = sled::Config::new()
            .cache_capacity(self.cache_capacity_bytes)
            .flush_every_ms(self.flush_every_ms);
        config = if self.temporary {
            config.temporary(true)
        } else {
            config.path(&self.db_path)
        };
        Ok(config.open()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{ "db_path": "/tmp/orders" }"#).unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/orders"));
        assert_eq!(config.max_transaction_attempts, 16);
        assert!(!config.temporary);
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let config = EngineConfig::temporary().set_max_transaction_attempts(0);
        assert!(matches!(config.open_db(), Err(OrderError::ValidationError(_))));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "temporary": true, "max_transaction_attempts": 4 }"#).unwrap();

        let config = EngineConfig::from_json_file(&path).unwrap();
        assert!(config.temporary);
        assert_eq!(config.max_transaction_attempts, 4);
    }

    #[test]
    fn temporary_config_opens() {
        let db = EngineConfig::temporary().open_db().unwrap();
        assert!(!db.was_recovered());
    }
}
