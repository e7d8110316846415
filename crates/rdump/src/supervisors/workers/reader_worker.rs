//! 📖 The ReaderWorker: one gzip file, start to finish.
//!
//! 🎬 *[a .gz file sits on disk. it has been waiting for this moment.]*
//!
//! Open the file, wrap it in a multi-member gzip decoder, read it line by line,
//! extract a destination key per line, and pack records into batches. Full
//! batches go to the dispatcher immediately; the leftover partial batch goes at
//! EOF (and an empty one goes nowhere).
//!
//! 🧠 Knowledge graph:
//! - The gzip + line loop is synchronous and runs on a `spawn_blocking` thread,
//!   so a full dispatcher parks a real thread, not a runtime worker.
//! - Concurrency is capped by the supervisor's semaphore: a reader holds a
//!   permit for its whole file.
//! - A line ends at `\n`, `\r\n`, or a lone `\r`.
//! - File handle, decoder, and line reader are all owned by `read_file`'s stack,
//!   so they close on every exit path, including `?`.
//! - Any open/read/decode error ends THIS file only. Batches already dispatched
//!   still get written.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::Worker;
use crate::common::{Record, RecordBatch};
use crate::dispatcher::BatchDispatcher;
use crate::extract::{Extracted, Extractor};

/// 📊 What one file produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReadReport {
    pub path: PathBuf,
    pub records: u64,
    pub batches: u64,
}

pub(crate) struct ReaderWorker {
    path: PathBuf,
    extractor: Arc<Extractor>,
    dispatcher: BatchDispatcher,
    batch_capacity: usize,
    permits: Arc<Semaphore>,
}

impl ReaderWorker {
    pub(crate) fn new(
        path: PathBuf,
        extractor: Arc<Extractor>,
        dispatcher: BatchDispatcher,
        batch_capacity: usize,
        permits: Arc<Semaphore>,
    ) -> Self {
        Self {
            path,
            extractor,
            dispatcher,
            batch_capacity,
            permits,
        }
    }

    /// 🔄 The grind. Blocking. Call it from a blocking thread or a plain test.
    fn read_file(&self) -> Result<ReadReport> {
        info!("loading {}", self.path.display());
        let file = File::open(&self.path).with_context(|| {
            format!(
                "💀 The door to '{}' would not budge. Missing file, wrong permissions, or a typo. We remain outside.",
                self.path.display()
            )
        })?;
        let lines = RecordLines::new(BufReader::new(MultiGzDecoder::new(file)));

        let mut report = ReadReport {
            path: self.path.clone(),
            records: 0,
            batches: 0,
        };
        let mut batch = RecordBatch::with_capacity(self.batch_capacity);

        for (line_idx, line) in lines.enumerate() {
            let payload = line.with_context(|| {
                format!(
                    "💀 Reading line {} of '{}' went sideways (bad gzip, bad UTF-8, or a truncated file).",
                    line_idx + 1,
                    self.path.display()
                )
            })?;
            let Extracted {
                destination_key,
                grouping_tag,
            } = self.extractor.extract(&payload);
            batch.push(Record {
                destination_key,
                grouping_tag,
                payload,
            });
            report.records += 1;

            if batch.is_full() {
                let full = std::mem::replace(
                    &mut batch,
                    RecordBatch::with_capacity(self.batch_capacity),
                );
                self.dispatch(full, &mut report)?;
            }
        }

        // -- 🏁 EOF: flush the stragglers. An empty batch is a no-op.
        self.dispatch(batch, &mut report)?;

        debug!(
            "✅ {} done: {} records in {} batches",
            self.path.display(),
            report.records,
            report.batches
        );
        Ok(report)
    }

    fn dispatch(&self, batch: RecordBatch, report: &mut ReadReport) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.dispatcher
            .dispatch_blocking(batch)
            .with_context(|| format!("💀 Could not hand off a batch from '{}'", self.path.display()))?;
        report.batches += 1;
        Ok(())
    }
}

/// ✂️ Line splitter for record dumps: `\n`, `\r\n` and a lone `\r` all end a line.
///
/// Bytes are only decoded as UTF-8 once a line is cut, so a bad byte fails
/// exactly the line it lives in.
struct RecordLines<R> {
    reader: R,
    buf: Vec<u8>,
    pending: VecDeque<String>,
}

impl<R: BufRead> RecordLines<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            pending: VecDeque::new(),
        }
    }
}

impl<R: BufRead> Iterator for RecordLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Some(Ok(line));
            }

            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => return Some(Err(err)),
            }
            if self.buf.last() == Some(&b'\n') {
                self.buf.pop();
            }

            // -- a trailing \r closes the last piece rather than opening an empty one
            let ends_with_cr = self.buf.last() == Some(&b'\r');
            let mut pieces: Vec<&[u8]> = self.buf.split(|byte| *byte == b'\r').collect();
            if ends_with_cr {
                pieces.pop();
            }
            for piece in pieces {
                match String::from_utf8(piece.to_vec()) {
                    Ok(line) => self.pending.push_back(line),
                    Err(err) => return Some(Err(io::Error::new(io::ErrorKind::InvalidData, err))),
                }
            }
        }
    }
}

impl Worker for ReaderWorker {
    type Output = ReadReport;

    fn name(&self) -> String {
        format!("reader for '{}'", self.path.display())
    }

    async fn run(self) -> Result<ReadReport> {
        // -- 🎟️ hold a reader-pool slot for the whole file
        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .context("💀 The reader pool closed before this file got a turn")?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || self.read_file())
            .await
            .with_context(|| format!("💀 The reader thread for '{}' panicked", path.display()))?
    }
}
