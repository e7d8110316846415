//! 🚰 The WriterWorker: drains batches from the dispatcher into the store.
//!
//! 🎬 *[the dispatcher hums. a batch arrives. a writer, who has been awaiting
//! this moment for 40ms which is forever in async time, picks it up.]*
//!
//! Each writer owns at most one session, opened lazily on its first batch and
//! reused until the channel closes. A batch that fails to write is logged,
//! counted, and remembered; the writer then goes back for the next one.
//! Nothing is retried.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error, trace, warn};

use super::Worker;
use crate::backends::{ContentSource, Session, SessionBackend, WriteError};
use crate::common::{DocumentFormat, RecordBatch};
use crate::dispatcher::BatchReceiver;
use crate::progress::ProgressReporter;

/// 📊 What one writer got through before the channel closed.
#[derive(Debug, Default)]
pub(crate) struct WriteReport {
    pub batches_written: u64,
    pub batches_failed: u64,
    pub records_written: u64,
    pub first_failure: Option<anyhow::Error>,
}

pub(crate) struct WriterWorker {
    worker_id: usize,
    rx: BatchReceiver,
    content_source: ContentSource,
    session: Option<SessionBackend>,
    progress: Arc<ProgressReporter>,
    format: DocumentFormat,
}

impl WriterWorker {
    pub(crate) fn new(
        worker_id: usize,
        rx: BatchReceiver,
        content_source: ContentSource,
        progress: Arc<ProgressReporter>,
        format: DocumentFormat,
    ) -> Self {
        Self {
            worker_id,
            rx,
            content_source,
            session: None,
            progress,
            format,
        }
    }

    async fn write_batch(&mut self, batch: RecordBatch) -> Result<()> {
        let batch_size = batch.len();
        let contents = batch.into_contents(self.format);

        // -- 🤝 take the session out, put it back after. A failed open leaves None, so the next batch tries again.
        let mut session = match self.session.take() {
            Some(session) => session,
            None => self.content_source.new_session().await.with_context(|| {
                format!("💀 Writer {} could not open a store session", self.worker_id)
            })?,
        };
        let outcome = session.insert_content(&contents).await;
        self.session = Some(session);

        match outcome {
            Ok(()) => {
                let written = self.progress.record_written(batch_size);
                self.progress.report(written);
                trace!("✅ writer {} stored {} records", self.worker_id, batch_size);
                Ok(())
            }
            Err(err @ WriteError::NullReference(_)) => {
                // -- 🔍 no idea which one did it, so name them all
                for content in &contents {
                    warn!("NPE: {}", content.uri);
                }
                Err(anyhow::Error::new(err).context(format!(
                    "💀 Writer {} lost a batch of {} records to a null reference in the store client",
                    self.worker_id, batch_size
                )))
            }
            Err(err) => Err(anyhow::Error::new(err).context(format!(
                "💀 Writer {} failed to insert a batch of {} records",
                self.worker_id, batch_size
            ))),
        }
    }
}

impl Worker for WriterWorker {
    type Output = WriteReport;

    fn name(&self) -> String {
        format!("writer {}", self.worker_id)
    }

    async fn run(mut self) -> Result<WriteReport> {
        debug!("📥 writer {} waiting for batches", self.worker_id);
        let mut report = WriteReport::default();

        // -- 🔁 recv() errors only once the dispatcher is closed AND drained
        while let Ok(batch) = self.rx.recv().await {
            let batch_size = batch.len() as u64;
            match self.write_batch(batch).await {
                Ok(()) => {
                    report.batches_written += 1;
                    report.records_written += batch_size;
                }
                Err(err) => {
                    error!("{err:?}");
                    report.batches_failed += 1;
                    if report.first_failure.is_none() {
                        report.first_failure = Some(err);
                    }
                }
            }
        }

        debug!(
            "🏁 writer {} done: {} batches written, {} failed",
            self.worker_id, report.batches_written, report.batches_failed
        );
        Ok(report)
    }
}
