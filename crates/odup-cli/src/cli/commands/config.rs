//! `odup config` – show config path and effective values.

use anyhow::Result;
use odup_core::config::{config_path, OdupConfig};

pub fn run_config(cfg: &OdupConfig) -> Result<()> {
    println!("config file: {}", config_path()?.display());
    println!("api_base = {}", cfg.api_base);
    println!("chunk_size = {}", cfg.chunk_size);
    println!("single_upload_threshold = {}", cfg.single_upload_threshold);
    println!("max_concurrency = {}", cfg.max_concurrency);
    match &cfg.token_file {
        Some(p) => println!("token_file = {}", p.display()),
        None => println!("token_file = (unset)"),
    }
    let retry = cfg.retry_policy();
    println!(
        "retry: max_retries = {}, initial_delay = {:?}, max_delay = {:?}",
        retry.max_retries, retry.initial_delay, retry.max_delay
    );
    Ok(())
}
