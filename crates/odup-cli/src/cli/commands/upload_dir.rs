//! `odup upload-dir <dir> <remote-dir> [--jobs N]` – upload a tree.

use anyhow::Result;
use odup_core::batch::upload_tree;
use odup_core::config::OdupConfig;
use odup_core::queue::QueueStats;
use std::path::Path;

use super::build_uploader;

pub async fn run_upload_dir(
    cfg: &OdupConfig,
    local_dir: &Path,
    remote_dir: &str,
    jobs: Option<usize>,
) -> Result<()> {
    let uploader = build_uploader(cfg)?;
    let jobs = jobs.unwrap_or(cfg.max_concurrency).max(1);
    let stats = upload_tree(&uploader, local_dir, remote_dir, jobs).await?;
    println!("{}", summary(&stats));
    if stats.failed > 0 {
        anyhow::bail!("{} of {} uploads failed", stats.failed, stats.total);
    }
    Ok(())
}

pub(crate) fn summary(stats: &QueueStats) -> String {
    format!(
        "{} succeeded, {} failed of {}",
        stats.success, stats.failed, stats.total
    )
}
