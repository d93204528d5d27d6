//! Configuration loading from TOML and environment variables.
//!
//! The node reads its configuration from:
//! 1. A TOML config file passed with `--config`
//! 2. Environment variables (override TOML values)
//!
//! Environment variable prefix: EVEES_

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use evees_cas::IpfsConfig;
use evees_cid::CidConfig;
use evees_pinner::cache::MIN_FLUSH_INTERVAL;
use evees_pinner::PinnerConfig;
use serde::{Deserialize, Serialize};

/// Top-level node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Hashing pipeline shared by every backend.
    #[serde(default)]
    pub cid: CidConfig,
    /// IPFS HTTP API backend.
    #[serde(default)]
    pub ipfs: IpfsSection,
    /// Remote pinning service and flush loop.
    #[serde(default)]
    pub pinner: PinnerSection,
    #[serde(default)]
    pub resolver: ResolverSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// IPFS backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpfsSection {
    /// Whether the IPFS backend is registered.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_ipfs_host")]
    pub host: String,
    #[serde(default = "default_ipfs_port")]
    pub port: u16,
    #[serde(default = "default_ipfs_protocol")]
    pub protocol: String,
    /// Extra headers sent with every request (e.g. authorization).
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub timeout_ms: u64,
}

/// Pinning configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinnerSection {
    /// Base URL of the pinning service. Pinning is disabled when unset.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Interval between flushes in milliseconds.
    #[serde(default = "default_flush_interval")]
    pub flush_interval_ms: u64,
    /// Path of the pin ledger. An in-memory ledger is used when unset.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default = "default_request_timeout")]
    pub timeout_ms: u64,
}

/// Multi-source resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSection {
    /// Upper bound on one backend's answer for one hash, in milliseconds.
    /// Keep it above the backends' own request timeouts.
    #[serde(default = "default_source_timeout")]
    pub source_timeout_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "evees_cas=debug,evees_pinner=info").
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to output JSON-formatted logs.
    #[serde(default)]
    pub json_format: bool,
}

// -- Defaults --

fn default_ipfs_host() -> String {
    "127.0.0.1".to_string()
}
fn default_ipfs_port() -> u16 {
    5001
}
fn default_ipfs_protocol() -> String {
    "http".to_string()
}
fn default_request_timeout() -> u64 {
    evees_cas::DEFAULT_REQUEST_TIMEOUT_MS
}
fn default_source_timeout() -> u64 {
    evees_cas::DEFAULT_SOURCE_TIMEOUT_MS
}
fn default_flush_interval() -> u64 {
    5_000
}
fn default_log_level() -> String {
    "info".to_string()
}

// -- Trait impls --

impl Default for IpfsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_ipfs_host(),
            port: default_ipfs_port(),
            protocol: default_ipfs_protocol(),
            headers: HashMap::new(),
            timeout_ms: default_request_timeout(),
        }
    }
}

impl Default for PinnerSection {
    fn default() -> Self {
        Self {
            url: None,
            headers: HashMap::new(),
            flush_interval_ms: default_flush_interval(),
            db_path: None,
            timeout_ms: default_request_timeout(),
        }
    }
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            source_timeout_ms: default_source_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl IpfsSection {
    pub fn store_config(&self) -> IpfsConfig {
        IpfsConfig {
            host: self.host.clone(),
            port: self.port,
            protocol: self.protocol.clone(),
            headers: self.headers.clone(),
            timeout_ms: self.timeout_ms,
        }
    }
}

impl PinnerSection {
    /// Client settings for the pinning service, if one is configured.
    pub fn service_config(&self) -> Option<PinnerConfig> {
        self.url.as_ref().map(|url| PinnerConfig {
            url: url.clone(),
            headers: self.headers.clone(),
            timeout_ms: self.timeout_ms,
        })
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: NodeConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, with environment variable overrides,
    /// and validate the result.
    pub fn load(path: Option<&Path>) -> Result<Self, anyhow::Error> {
        let mut config = if let Some(path) = path {
            if path.exists() {
                Self::from_file(path)?
            } else {
                tracing::warn!(
                    path = %path.display(),
                    "Config file not found, using defaults"
                );
                Self::default()
            }
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any `EVEES_*` lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("EVEES_IPFS_HOST") {
            self.ipfs.host = val;
            self.ipfs.enabled = true;
        }
        if let Some(val) = lookup("EVEES_IPFS_PORT") {
            if let Ok(port) = val.parse() {
                self.ipfs.port = port;
            }
        }
        if let Some(val) = lookup("EVEES_IPFS_PROTOCOL") {
            self.ipfs.protocol = val;
        }
        if let Some(val) = lookup("EVEES_IPFS_ENABLED") {
            self.ipfs.enabled = val == "true" || val == "1";
        }
        if let Some(val) = lookup("EVEES_PINNER_URL") {
            self.pinner.url = Some(val);
        }
        if let Some(val) = lookup("EVEES_FLUSH_INTERVAL_MS") {
            if let Ok(ms) = val.parse() {
                self.pinner.flush_interval_ms = ms;
            }
        }
        if let Some(val) = lookup("EVEES_PIN_DB") {
            self.pinner.db_path = Some(PathBuf::from(val));
        }
        if let Some(val) = lookup("EVEES_SOURCE_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.resolver.source_timeout_ms = ms;
            }
        }
        if let Some(val) = lookup("EVEES_CID_BASE") {
            self.cid.base = val;
        }
        if let Some(val) = lookup("EVEES_CID_HASH") {
            self.cid.hash_type = val;
        }
        if let Some(val) = lookup("EVEES_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Reject configurations that cannot work before anything is started.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.cid.validate()?;
        if self.ipfs.enabled && !matches!(self.ipfs.protocol.as_str(), "http" | "https") {
            anyhow::bail!("Unsupported IPFS protocol: {}", self.ipfs.protocol);
        }
        if self.pinner.url.is_some() && self.pinner.flush_interval() < MIN_FLUSH_INTERVAL {
            anyhow::bail!(
                "Flush interval must be at least {}ms, got {}ms",
                MIN_FLUSH_INTERVAL.as_millis(),
                self.pinner.flush_interval_ms
            );
        }
        Ok(())
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.resolver.source_timeout_ms)
    }
}
