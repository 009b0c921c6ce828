use crate::bus::{AckMode, QueueNames};
use crate::global;
use crate::ledger::DEFAULT_SCAN_BATCH;
use crate::storage::STAGE_COLLECTIONS;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ledger: LedgerConfig,
    pub bus: BusConfig,
    pub storage: StorageConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// SQLite file backing the ledger. Defaults to the data directory.
    pub path: Option<PathBuf>,
    /// Keys examined per page when deleting a meeting's entries
    pub scan_batch_size: usize,
    /// Deadline for every ledger and document call
    pub request_timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: None,
            scan_batch_size: DEFAULT_SCAN_BATCH,
            request_timeout_ms: 5000,
        }
    }
}

impl LedgerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }

    pub fn resolved_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => global::ledger_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// `manual` (at-least-once) or `auto` (at-most-once)
    pub ack_mode: AckMode,
    /// Concurrent ack consumer loops
    pub consumers: usize,
    /// Capacity of the inbound ack channel
    pub ack_buffer: usize,
    pub publish_timeout_seconds: u64,
    pub queues: QueueNames,
    /// Worker endpoint per queue name, e.g. `summary_queue = "http://summary:9000/tasks"`
    pub endpoints: HashMap<String, String>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            ack_mode: AckMode::Manual,
            consumers: 1,
            ack_buffer: 64,
            publish_timeout_seconds: 10,
            queues: QueueNames::default(),
            endpoints: HashMap::new(),
        }
    }
}

impl BusConfig {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_seconds.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Shared volumes holding per-meeting directories
    pub volumes: Vec<PathBuf>,
    /// Volume the report worker renders into
    pub report_volume: PathBuf,
    /// SQLite file with stage-output documents. Defaults to the data directory.
    pub documents_path: Option<PathBuf>,
    pub collections: Vec<String>,
    /// Check the rendered report exists before notifying
    pub verify_report_artifact: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            volumes: vec![
                PathBuf::from("/shared-transcription"),
                PathBuf::from("/shared-ocr"),
                PathBuf::from("/shared-report"),
            ],
            report_volume: PathBuf::from("/shared-report"),
            documents_path: None,
            collections: STAGE_COLLECTIONS.iter().map(|c| c.to_string()).collect(),
            verify_report_artifact: false,
        }
    }
}

impl StorageConfig {
    pub fn resolved_documents_path(&self) -> Result<PathBuf> {
        match &self.documents_path {
            Some(path) => Ok(path.clone()),
            None => global::documents_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}
