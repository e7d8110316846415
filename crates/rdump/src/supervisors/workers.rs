//! 🧵 Workers: the ones who actually do the work while the Supervisor takes
//! all the credit in the sprint retro.
//!
//! Two kinds:
//! - [`ReaderWorker`]: one per input file. Gunzips, extracts, batches, dispatches.
//! - [`WriterWorker`]: a fixed crew draining the dispatcher into store sessions.
//!
//! ⚠️ "If you're reading this, the code review went poorly."

use std::future::Future;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::error;

mod reader_worker;
mod writer_worker;

pub(crate) use reader_worker::ReaderWorker;
pub(crate) use writer_worker::WriterWorker;

/// 🏗️ A background worker, that does work. duh.
///
/// `run` is the work; `start` spawns it with a diagnostic wrapper that logs
/// any failure (full context chain) before handing it back through the JoinHandle.
/// The wrapper reports. It does not recover.
pub(crate) trait Worker: Sized + Send + 'static {
    type Output: Send + 'static;

    /// 🏷️ What the logs should call this worker.
    fn name(&self) -> String;

    fn run(self) -> impl Future<Output = Result<Self::Output>> + Send;

    /// 🚀 Spawn the worker. Returns a JoinHandle because we trust but verify. Mostly verify.
    fn start(self) -> JoinHandle<Result<Self::Output>> {
        let name = self.name();
        tokio::spawn(async move {
            self.run()
                .await
                .inspect_err(|err| error!("💀 {name} failed: {err:?}"))
        })
    }
}
