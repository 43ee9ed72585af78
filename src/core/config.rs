use anyhow::{Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Root data directory. `$AGENTDECK_DATA_DIR` wins over `~/.agentdeck`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AGENTDECK_DATA_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".agentdeck")
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub ingestion: IngestionConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub seed_demo: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// User that unauthenticated loopback requests act as. Unset disables it.
    #[serde(default)]
    pub dev_user: Option<String>,

    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    /// Defaults to `<data_dir>/agentdeck.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_exec_min_delay")]
    pub min_delay_ms: u64,

    #[serde(default = "default_exec_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_success_rate")]
    pub success_rate: f64,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestionProfile {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub min_chunks: u32,
    pub max_chunks: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestionConfig {
    #[serde(default = "default_register_profile")]
    pub register: IngestionProfile,

    #[serde(default = "default_upload_profile")]
    pub upload: IngestionProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8470
}
fn default_cors_origins() -> Vec<String> {
    vec![
        "http://127.0.0.1:3000".to_string(),
        "http://localhost:3000".to_string(),
    ]
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_exec_min_delay() -> u64 {
    2000
}
fn default_exec_max_delay() -> u64 {
    7000
}
fn default_success_rate() -> f64 {
    0.9
}
fn default_max_concurrent() -> usize {
    16
}
fn default_register_profile() -> IngestionProfile {
    IngestionProfile {
        min_delay_ms: 2000,
        max_delay_ms: 5000,
        min_chunks: 10,
        max_chunks: 59,
    }
}
fn default_upload_profile() -> IngestionProfile {
    IngestionProfile {
        min_delay_ms: 3000,
        max_delay_ms: 7000,
        min_chunks: 20,
        max_chunks: 119,
    }
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dev_user: None,
            cors_origins: default_cors_origins(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_exec_min_delay(),
            max_delay_ms: default_exec_max_delay(),
            success_rate: default_success_rate(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            register: default_register_profile(),
            upload: default_upload_profile(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl ExecutionConfig {
    pub fn delay_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.min_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

impl AppConfig {
    /// Load `path`, or `<data_dir>/config.toml` when no path is given.
    /// A missing file yields the defaults.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => data_dir().join("config.toml"),
        };
        if !config_path.exists() {
            if path.is_some() {
                bail!("config file {} does not exist", config_path.display());
            }
            info!("No config.toml found, using defaults.");
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(&config_path).await?;
        let config = Self::from_toml(&content)?;
        info!("Loaded configuration from {}", config_path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let exec = &self.execution;
        if exec.min_delay_ms > exec.max_delay_ms {
            bail!("execution.min_delay_ms must not exceed execution.max_delay_ms");
        }
        if !(0.0..=1.0).contains(&exec.success_rate) {
            bail!("execution.success_rate must be between 0 and 1");
        }
        if exec.max_concurrent == 0 {
            bail!("execution.max_concurrent must be at least 1");
        }
        for (name, profile) in [
            ("ingestion.register", &self.ingestion.register),
            ("ingestion.upload", &self.ingestion.upload),
        ] {
            if profile.min_delay_ms > profile.max_delay_ms {
                bail!("{}.min_delay_ms must not exceed max_delay_ms", name);
            }
            if profile.min_chunks > profile.max_chunks {
                bail!("{}.min_chunks must not exceed max_chunks", name);
            }
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| data_dir().join("agentdeck.db"))
    }

    pub fn is_loopback(&self) -> bool {
        matches!(self.server.host.as_str(), "127.0.0.1" | "::1" | "localhost")
    }
}
