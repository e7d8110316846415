//! # Previously, on rdump...
//!
//! 🎬 The records needed somewhere to land that wasn't a real database. Somewhere
//! quiet. Somewhere that forgets everything the moment the process exits.
//!
//! `in_mem` is that somewhere. [`InMemoryStore`] hands out sessions that push
//! every inserted batch into one shared `Arc<Mutex<Vec<..>>>`, so tests can read
//! back exactly what the writers sent, batch by batch, in the order they landed.
//!
//! ⚠️ This is NOT for production. Point `memory://` at 24 million records and
//! you will learn things about your RAM.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore};

use crate::backends::{Session, WriteError};
use crate::common::Content;

/// 📦 A store that never forgets (until drop).
///
/// Clone-able because tests keep a handle while the pipeline owns another.
/// The `Arc`s mean everyone shares the same vault.
#[derive(Debug, Clone, Default)]
pub(crate) struct InMemoryStore {
    batches: Arc<Mutex<Vec<Vec<Content>>>>,
    sessions_opened: Arc<AtomicUsize>,
    // -- 🧪 any batch containing this uri fails with the null-reference defect mode
    poisoned_uri: Option<String>,
    // -- 🧪 when set, every insert waits for a permit. Lets tests stall the writers.
    gate: Option<Arc<Semaphore>>,
}

impl InMemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn new_session(&self) -> InMemorySession {
        let session_id = self.sessions_opened.fetch_add(1, Ordering::AcqRel);
        InMemorySession {
            session_id,
            store: self.clone(),
        }
    }
}

#[cfg(test)]
impl InMemoryStore {
    /// 📜 Everything written so far, one inner Vec per successful insert.
    pub(crate) async fn batches(&self) -> Vec<Vec<Content>> {
        self.batches.lock().await.clone()
    }

    pub(crate) fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::Acquire)
    }

    pub(crate) fn with_poisoned_uri(mut self, uri: &str) -> Self {
        self.poisoned_uri = Some(uri.to_string());
        self
    }

    pub(crate) fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }
}

/// 🗃️ One writer's window into the shared vault.
#[derive(Debug)]
pub(crate) struct InMemorySession {
    session_id: usize,
    store: InMemoryStore,
}

#[async_trait]
impl Session for InMemorySession {
    async fn insert_content(&mut self, contents: &[Content]) -> Result<(), WriteError> {
        if let Some(gate) = &self.store.gate {
            // -- ⏳ a closed gate means "stalled writer", which is exactly what the test asked for
            let permit = gate.acquire().await.map_err(|_| {
                WriteError::Io(std::io::Error::other("in-memory gate was closed"))
            })?;
            permit.forget();
        }

        if let Some(poisoned) = &self.store.poisoned_uri {
            if contents.iter().any(|c| &c.uri == poisoned) {
                return Err(WriteError::NullReference(format!(
                    "session {} tripped over '{poisoned}'",
                    self.session_id
                )));
            }
        }

        self.store.batches.lock().await.push(contents.to_vec());
        Ok(())
    }
}
