use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;

const DEFAULT_CONFIG_PATH: &str = "config/server.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub name: String,
    pub user: String,
    pub password: String,
    pub port: u16,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub weights_path: PathBuf,
    pub device: ModelDevice,
}

/// Where inference runs. `cuda` uses the first GPU when one is present and
/// falls back to the CPU otherwise.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelDevice {
    #[default]
    Cpu,
    Cuda,
}

impl std::str::FromStr for ModelDevice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            other => Err(format!("unknown device '{}'", other)),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            name: "postgres".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            port: 5432,
            max_connections: 5,
            acquire_timeout_secs: 10,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            weights_path: PathBuf::from("modelo_ML_classificacao_residuos.safetensors"),
            device: ModelDevice::Cpu,
        }
    }
}

impl AppConfig {
    /// Reads the optional YAML file, then applies process environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("ECOSORT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let base = if path.exists() {
            log::info!("Loading configuration from {}", path.display());
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        base.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(config_str)?)
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_value("PORT", port)?;
        }

        if let Some(path) = lookup("MODEL_PATH") {
            self.model.weights_path = PathBuf::from(path);
        }
        if let Some(device) = lookup("MODEL_DEVICE") {
            self.model.device = parse_value("MODEL_DEVICE", device)?;
        }

        let db = &mut self.database;
        if let Some(host) = lookup("SUPABASE_HOST") {
            db.host = host;
        }
        if let Some(name) = lookup("SUPABASE_DB") {
            db.name = name;
        }
        if let Some(user) = lookup("SUPABASE_USER") {
            db.user = user;
        }
        if let Some(password) = lookup("SUPABASE_PASSWORD") {
            db.password = password;
        }
        if let Some(port) = lookup("SUPABASE_PORT") {
            db.port = parse_value("SUPABASE_PORT", port)?;
        }
        if let Some(max) = lookup("DB_MAX_CONNECTIONS") {
            db.max_connections = parse_value("DB_MAX_CONNECTIONS", max)?;
        }
        if let Some(secs) = lookup("DB_ACQUIRE_TIMEOUT_SECS") {
            db.acquire_timeout_secs = parse_value("DB_ACQUIRE_TIMEOUT_SECS", secs)?;
        }

        Ok(self)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.name)
            .username(&self.user)
            .password(&self.password)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}
