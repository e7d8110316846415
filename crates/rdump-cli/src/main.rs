//! 🚀 rdump-cli: the front door, the bouncer, the maitre d' of rdump.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 Sets up logging, loads config, hands the file list to the library, prints
//! the receipt. Like a manager. 🦆

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 🔧 Steps:
/// 1. Init tracing (RUST_LOG wins, `info` otherwise)
/// 2. No files? Print usage and leave politely.
/// 3. Load config: `RDUMP_CONFIG`, else `./rdump.toml` if it exists, plus `RDUMP_*` env
/// 4. Run the load, print the summary table
/// 5. Any failure: print the whole error chain, exit 1
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let files: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if files.is_empty() {
        println!("usage: rdump-cli file1 [file2..]");
        return Ok(());
    }

    if let Err(err) = run(files).await {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion, one layer at a time
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
        }
        if err.chain().any(|cause| {
            let cause = cause.to_string();
            cause.contains("could not reach the store") || cause.contains("error sending request")
        }) {
            error!(
                "🔧 hint: the document store isn't answering. Check `store.uri` (or RDUMP_STORE__URI) \
                 and that the store is actually running. Even servers need a nudge sometimes. ☕"
            );
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(files: Vec<PathBuf>) -> Result<()> {
    let config_path = match std::env::var_os("RDUMP_CONFIG") {
        Some(path) => {
            let path = PathBuf::from(path);
            anyhow::ensure!(
                path.is_file(),
                "💀 RDUMP_CONFIG points at '{}', which is not a file. Use an absolute path to be absolutely certain.",
                path.display()
            );
            Some(path)
        }
        None => {
            let default_path = Path::new("rdump.toml");
            default_path
                .try_exists()
                .with_context(|| format!("💀 Couldn't even check whether '{}' exists", default_path.display()))?
                .then(|| default_path.to_path_buf())
        }
    };

    let app_config = rdump::app_config::load_config(config_path.as_deref())
        .context("💀 In rdump-cli, we couldn't load the configuration. Check the file and any RDUMP_* variables.")?;

    let summary = rdump::run(app_config, files).await?;
    info!("📊 load summary:\n{}", summary.to_table());
    summary.into_result()?;
    Ok(())
}
