use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::{validate_api_base, DEFAULT_API_BASE};
use crate::engine::{UploadOptions, DEFAULT_CHUNK_SIZE, DEFAULT_SINGLE_UPLOAD_THRESHOLD};
use crate::range::validate_chunk_size;
use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Cap on any single delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            initial_delay_ms: policy.initial_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Global configuration loaded from `~/.config/odup/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OdupConfig {
    /// Drive API root, e.g. `https://graph.microsoft.com/v1.0`.
    pub api_base: String,
    /// Bytes per chunk PUT; multiple of 327680, at most 52428800.
    pub chunk_size: u64,
    /// Files smaller than this are uploaded with a single PUT.
    pub single_upload_threshold: u64,
    /// Files uploaded at once by `upload-dir`.
    pub max_concurrency: usize,
    /// File holding an access token; re-read when the cached copy ages out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

impl Default for OdupConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            single_upload_threshold: DEFAULT_SINGLE_UPLOAD_THRESHOLD,
            max_concurrency: 4,
            token_file: None,
            retry: None,
        }
    }
}

impl OdupConfig {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        validate_api_base(&self.api_base)?;
        validate_chunk_size(self.chunk_size)?;
        if self.max_concurrency == 0 {
            anyhow::bail!("max_concurrency must be at least 1");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_default().to_policy()
    }

    pub fn upload_options(&self) -> UploadOptions {
        UploadOptions {
            chunk_size: self.chunk_size,
            single_upload_threshold: self.single_upload_threshold,
            retry: self.retry_policy(),
        }
    }

    /// Parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: OdupConfig =
            toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(cfg)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("odup")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<OdupConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = OdupConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    OdupConfig::load(&path)
}
