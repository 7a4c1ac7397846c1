//! CLI command handlers, one file per command, plus the shared client setup.

mod config;
mod upload;
mod upload_dir;

pub use config::run_config;
pub use upload::run_upload;
pub use upload_dir::run_upload_dir;

#[cfg(test)]
pub(crate) use upload::progress_line;
#[cfg(test)]
pub(crate) use upload_dir::summary;

use anyhow::{Context, Result};
use odup_core::api::DriveApi;
use odup_core::auth::{
    AuthProvider, CachedTokenProvider, FileTokenSource, StaticTokenSource, TOKEN_ENV,
};
use odup_core::config::OdupConfig;
use odup_core::engine::Uploader;
use odup_core::transport::{CurlOptions, CurlTransport};
use std::sync::Arc;
use std::time::Duration;

/// How long a token read from `token_file` is trusted before re-reading.
const TOKEN_FILE_LIFETIME: Duration = Duration::from_secs(50 * 60);

/// `ODUP_ACCESS_TOKEN` wins over `token_file`.
fn auth_provider(cfg: &OdupConfig) -> Result<Arc<dyn AuthProvider>> {
    if let Some(source) = StaticTokenSource::from_env() {
        tracing::debug!("using access token from {}", TOKEN_ENV);
        return Ok(Arc::new(CachedTokenProvider::new(source)));
    }
    if let Some(path) = &cfg.token_file {
        tracing::debug!("using token file {}", path.display());
        return Ok(Arc::new(CachedTokenProvider::new(FileTokenSource::new(
            path.clone(),
            TOKEN_FILE_LIFETIME,
        ))));
    }
    anyhow::bail!(
        "no access token: set {} or token_file in the config",
        TOKEN_ENV
    )
}

pub(crate) fn build_uploader(cfg: &OdupConfig) -> Result<Uploader> {
    let auth = auth_provider(cfg)?;
    let transport = Arc::new(CurlTransport::new(CurlOptions::default()));
    let api = DriveApi::new(&cfg.api_base, transport, auth);
    Uploader::new(api, cfg.upload_options()).context("invalid upload settings")
}
