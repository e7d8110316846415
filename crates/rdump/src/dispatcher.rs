//! 🚦 The Batch Dispatcher: a bounded waiting room between readers and writers.
//!
//! Readers drop full batches in, writers pull them out. When the room is full
//! (default 100 batches) the next reader to arrive simply waits at the door.
//! No error, no dropped batch, no unbounded queue quietly eating the heap.
//! That wait IS the backpressure.
//!
//! 🧠 Knowledge graph:
//! - Backed by an `async_channel` bounded MPMC channel.
//! - Readers live on blocking threads and use [`BatchDispatcher::dispatch_blocking`].
//! - Writer workers hold a [`BatchReceiver`] clone each and `recv().await` until
//!   the channel is closed AND empty, so closing never strands a queued batch.
//! - Memory ceiling: (queue capacity + writer count) × batch capacity records.

use anyhow::Result;
use async_channel::{Receiver, Sender};
use tracing::trace;

use crate::common::RecordBatch;

/// 📥 The consumer end. Writers clone it; the channel hands each batch to exactly one of them.
pub(crate) type BatchReceiver = Receiver<RecordBatch>;

/// 🚦 The producer end, cloned into every reader task.
#[derive(Debug, Clone)]
pub(crate) struct BatchDispatcher {
    tx: Sender<RecordBatch>,
}

impl BatchDispatcher {
    /// 🏗️ A dispatcher holding at most `capacity` pending batches, plus the receiver writers drain.
    ///
    /// `capacity` must be at least 1; `RuntimeConfig::validate` sees to that before we get here.
    pub(crate) fn bounded(capacity: usize) -> (Self, BatchReceiver) {
        let (tx, rx) = async_channel::bounded(capacity);
        (Self { tx }, rx)
    }

    /// 📦 Hand a batch to the writers, parking this thread until there's room.
    ///
    /// Empty batches are a no-op (an empty file flushes nothing). Must not be
    /// called from inside an async task: it blocks the thread for real.
    pub(crate) fn dispatch_blocking(&self, batch: RecordBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        trace!("🚦 dispatching batch of {} records", batch.len());
        self.tx.send_blocking(batch).map_err(|_| {
            anyhow::anyhow!(
                "💀 The dispatcher is closed. The writers packed up and left while a reader still had a batch in hand."
            )
        })
    }

    /// 🔒 Stop accepting batches. Writers still drain whatever is already queued.
    pub(crate) fn close(&self) {
        self.tx.close();
    }

    /// 📊 Batches currently waiting for a writer.
    pub(crate) fn pending(&self) -> usize {
        self.tx.len()
    }
}
