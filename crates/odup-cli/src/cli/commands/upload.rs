//! `odup upload <local> <remote>` – upload one file.

use anyhow::{Context, Result};
use odup_core::config::OdupConfig;
use odup_core::engine::TransferProgress;
use std::path::Path;
use std::sync::Arc;

use super::build_uploader;

pub async fn run_upload(cfg: &OdupConfig, local: &Path, remote: &str) -> Result<()> {
    let uploader = build_uploader(cfg)?.with_progress(Arc::new(|p: &TransferProgress| {
        println!("{}", progress_line(p));
    }));

    let item = uploader
        .upload_file(local, remote)
        .await
        .with_context(|| format!("uploading {} to {}", local.display(), remote))?;

    match item.id {
        Some(id) => println!("Uploaded {} -> {} (id {})", local.display(), remote, id),
        None => println!("Uploaded {} -> {}", local.display(), remote),
    }
    Ok(())
}

/// `  41.67%  5242880/12582912 bytes  3.20 MiB/s  ETA 2s`
pub(crate) fn progress_line(p: &TransferProgress) -> String {
    let speed = if p.speed.is_finite() {
        format!("{:.2} MiB/s", p.speed / (1024.0 * 1024.0))
    } else {
        "-".to_string()
    };
    let eta = if p.eta.is_finite() {
        format!("{:.0}s", p.eta)
    } else {
        "-".to_string()
    };
    format!(
        "{:>7}%  {}/{} bytes  {}  ETA {}",
        p.percentage, p.uploaded, p.total, speed, eta
    )
}
