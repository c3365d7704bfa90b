use machinist_store::{FileStore, MachineStore, MemoryStore, StoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Server settings. Every key is optional in the TOML file:
///
/// ```toml
/// bind = "127.0.0.1"
/// port = 8080
/// data_dir = "/var/lib/machinist"   # omit for an in-memory store
/// workers = 4
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub data_dir: Option<PathBuf>,
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_owned(),
            port: 8080,
            data_dir: None,
            workers: 4,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_owned()));
        }
        if self.bind.is_empty() {
            return Err(ConfigError::Invalid("bind address must not be empty".to_owned()));
        }
        Ok(())
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn addr(&self) -> String {
        if self.bind.contains(':') && !self.bind.starts_with('[') {
            format!("[{}]:{}", self.bind, self.port)
        } else {
            format!("{}:{}", self.bind, self.port)
        }
    }

    /// File-backed store when `data_dir` is set, in-memory otherwise.
    pub fn open_store(&self) -> Result<Arc<dyn MachineStore>, StoreError> {
        Ok(match &self.data_dir {
            Some(dir) => Arc::new(FileStore::open(dir.clone())?),
            None => Arc::new(MemoryStore::new()),
        })
    }
}
