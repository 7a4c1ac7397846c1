//! CLI for the odup uploader.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use odup_core::config;
use std::path::PathBuf;

use commands::{run_config, run_upload, run_upload_dir};

/// Top-level CLI for the odup uploader.
#[derive(Debug, Parser)]
#[command(name = "odup")]
#[command(about = "odup: resumable chunked uploader for drive storage", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Upload one file, replacing any existing item at the remote path.
    Upload {
        /// Local file to upload.
        local: PathBuf,
        /// Remote path, e.g. `Backups/disk.img`.
        remote: String,
    },

    /// Upload every regular file under a directory (recursive).
    UploadDir {
        /// Local directory.
        local_dir: PathBuf,
        /// Remote folder the tree is mirrored into.
        remote_dir: String,
        /// Upload up to N files at once (default: max_concurrency from config).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
    },

    /// Show the config file path and effective settings.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Upload { local, remote } => run_upload(&cfg, &local, &remote).await?,
            CliCommand::UploadDir {
                local_dir,
                remote_dir,
                jobs,
            } => run_upload_dir(&cfg, &local_dir, &remote_dir, jobs).await?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
