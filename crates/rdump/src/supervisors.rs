//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 "In a world where gzip files outnumber the threads that read them..."
//! 🎬 "One supervisor dared to wait for them all."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor runs one load: N input files in, one document store out.
//!
//! ```text
//!   file_1.gz ─┐                              ┌─ writer 0 ─┐
//!   file_2.gz ─┼─ readers (≤ reader_parallelism) ─▶ dispatcher ─┼─ writer 1 ─┼─▶ store
//!   file_N.gz ─┘           bounded, blocking      └─ writer W ─┘
//! ```
//!
//! 🧠 Knowledge graph:
//! - Writers start first and sit on `recv()`. Readers start second.
//! - Shutdown is two phases, and the order matters:
//!   1. wait for every reader to finish (or fail),
//!   2. close the dispatcher, then wait for the writers to drain what's left.
//!   Closing earlier drops batches on the floor. Closing never: writers wait forever.
//! - A failed reader or batch is logged where it happened and collected into the
//!   [`LoadSummary`]. It never cancels anything else.
//!
//! ⚠️ DO NOT MAKE THE WORKERS PUB. They are the Supervisor's private little minions.

mod workers;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{debug, error, info};

use crate::app_config::{AppConfig, RuntimeConfig};
use crate::backends::ContentSource;
use crate::common::DocumentFormat;
use crate::dispatcher::BatchDispatcher;
use crate::extract::Extractor;
use crate::progress::{LoadSummary, ProgressReporter};
use workers::{ReaderWorker, Worker, WriterWorker};

/// 📦 The Supervisor: hands out files, hires writers, waits for everyone, counts the bodies.
pub(crate) struct Supervisor {
    runtime: RuntimeConfig,
    extractor: Arc<Extractor>,
    content_source: ContentSource,
    format: DocumentFormat,
}

impl Supervisor {
    pub(crate) fn new(
        runtime: RuntimeConfig,
        extractor: Arc<Extractor>,
        content_source: ContentSource,
        format: DocumentFormat,
    ) -> Self {
        Self {
            runtime,
            extractor,
            content_source,
            format,
        }
    }

    /// 🔧 Everything that can be wrong before a single file is opened: knobs,
    /// link pattern, store URI. Any of them failing ends the run right here.
    pub(crate) fn from_config(app_config: &AppConfig) -> Result<Self> {
        app_config.runtime.validate()?;
        let extractor = Extractor::with_pattern(&app_config.extractor.link_pattern)
            .context("💀 The configured link pattern is unusable")?;
        let content_source = ContentSource::from_config(&app_config.store)
            .context("💀 Could not set up the document store")?;
        Ok(Self::new(
            app_config.runtime.clone(),
            Arc::new(extractor),
            content_source,
            app_config.store.document_format,
        ))
    }

    /// 🚀 Load every file in `paths` and wait until it's all written (or failed).
    pub(crate) async fn load(&self, paths: &[PathBuf]) -> LoadSummary {
        let progress = Arc::new(ProgressReporter::new(self.runtime.target_total_records));
        let (dispatcher, rx) = BatchDispatcher::bounded(self.runtime.queue_capacity);

        let writers: Vec<_> = (0..self.runtime.writer_parallelism)
            .map(|worker_id| {
                WriterWorker::new(
                    worker_id,
                    rx.clone(),
                    self.content_source.clone(),
                    Arc::clone(&progress),
                    self.format,
                )
                .start()
            })
            .collect();
        // -- 📭 only the writers hold receivers now. If they all die, readers stop blocking.
        drop(rx);

        let permits = Arc::new(Semaphore::new(self.runtime.reader_parallelism));
        let readers: Vec<_> = paths
            .iter()
            .map(|path| {
                ReaderWorker::new(
                    path.clone(),
                    Arc::clone(&self.extractor),
                    dispatcher.clone(),
                    self.runtime.batch_capacity,
                    Arc::clone(&permits),
                )
                .start()
            })
            .collect();
        info!(
            "🚀 {} files queued for {} readers, {} writers standing by",
            paths.len(),
            self.runtime.reader_parallelism,
            self.runtime.writer_parallelism
        );

        let mut summary = LoadSummary::default();

        // -- 1️⃣ every reader finishes before the door closes
        for (path, joined) in paths.iter().zip(join_all(readers).await) {
            match flatten(joined, || format!("reader for '{}'", path.display())) {
                Ok(report) => {
                    summary.files_loaded += 1;
                    summary.records_read += report.records;
                    summary.batches_dispatched += report.batches;
                }
                Err(err) => {
                    summary.files_failed += 1;
                    summary.failures.push(err);
                }
            }
        }

        // -- 2️⃣ no more batches are coming. Writers drain what's queued, then exit.
        debug!("🚪 readers done, {} batches still queued", dispatcher.pending());
        dispatcher.close();
        for joined in join_all(writers).await {
            match flatten(joined, || "writer".to_string()) {
                Ok(report) => {
                    summary.batches_written += report.batches_written;
                    summary.batches_failed += report.batches_failed;
                    summary.failures.extend(report.first_failure);
                }
                Err(err) => summary.failures.push(err),
            }
        }

        summary.records_written = progress.written();
        summary.elapsed = progress.elapsed();
        info!(
            "🏁 load finished: {} of {} files read, {} records written over {} progress reports",
            summary.files_loaded,
            paths.len(),
            summary.records_written,
            progress.reports()
        );
        summary
    }
}

// -- 💀 a panicked task never got to log itself, so it gets logged here
fn flatten<T>(
    joined: std::result::Result<Result<T>, JoinError>,
    what: impl FnOnce() -> String,
) -> Result<T> {
    match joined {
        Ok(outcome) => outcome,
        Err(join_err) => {
            let what = what();
            error!("💀 {what} panicked: {join_err}");
            Err(anyhow::Error::new(join_err).context(format!("💀 {what} panicked")))
        }
    }
}
