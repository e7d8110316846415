//! 📦 rdump: bulk-load gzipped, line-oriented record dumps into a document store.
//!
//! 🎬 *[narrator voice]* "Millions of lines. Dozens of files. One store. No mercy."
//!
//! Every input line becomes one document. Its destination key comes from the first
//! matching link on the line (or a process-wide counter when there isn't one), its
//! collection is that key up to the first underscore, and its content is the line itself.
//! Files are read in parallel, batched, queued behind a bounded dispatcher, and written
//! by a fixed pool of store sessions.

use std::path::PathBuf;

use anyhow::{Context, Result};

pub mod app_config;
mod backends;
mod common;
mod dispatcher;
pub mod extract;
mod progress;
mod supervisors;

pub use backends::StoreConfig;
pub use common::DocumentFormat;
pub use progress::LoadSummary;

use crate::app_config::AppConfig;
use crate::supervisors::Supervisor;

/// 🚀 Load `files` into the configured store and report how it went.
///
/// Bad config (zero-sized pools, an unusable link pattern, an unknown store
/// scheme) fails here before any file is opened. After that, per-file and
/// per-batch failures land in the returned [`LoadSummary`] rather than in `Err`.
pub async fn run(app_config: AppConfig, files: Vec<PathBuf>) -> Result<LoadSummary> {
    let supervisor = Supervisor::from_config(&app_config)
        .context("💀 rdump could not start. Nothing was read, nothing was written.")?;
    Ok(supervisor.load(&files).await)
}
