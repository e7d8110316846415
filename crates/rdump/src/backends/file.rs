//! 📂 The file store: `file:///some/dir` turns into a pile of NDJSON files.
//!
//! Each session gets its own `session-NNN.ndjson` under the directory, so
//! writer workers never share a file handle. One JSON line per Content, and a
//! flush after every batch, because sessions are never explicitly closed and
//! async Drop is still a dream.
//!
//! 🚰 batch → serde_json lines → BufWriter → flush → disk
//! 💀 Disk full → your problem now

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use tokio::{
    fs::{File, OpenOptions},
    io::{self, AsyncWriteExt},
};
use tracing::{debug, trace};

use crate::backends::{Session, WriteError};
use crate::common::Content;

/// 🗂️ The directory sessions write into, plus a counter for naming their files.
#[derive(Debug, Clone)]
pub(crate) struct FileStore {
    directory: PathBuf,
    sessions_opened: Arc<AtomicUsize>,
}

impl FileStore {
    pub(crate) fn new(uri: &Url) -> Result<Self> {
        let directory = uri.to_file_path().map_err(|_| {
            anyhow::anyhow!(
                "💀 '{uri}' doesn't point at a local directory. file:// URIs need an absolute path, like file:///var/lib/rdump/out."
            )
        })?;
        Ok(Self {
            directory,
            sessions_opened: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// 🚀 Create the directory if needed and open this session's own file for appending.
    pub(crate) async fn new_session(&self) -> Result<FileSession> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .with_context(|| {
                format!(
                    "💀 Could not create the output directory '{}'. The path stared back, unimpressed.",
                    self.directory.display()
                )
            })?;

        let session_id = self.sessions_opened.fetch_add(1, Ordering::AcqRel);
        let path = self.directory.join(format!("session-{session_id:03}.ndjson"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("💀 Could not open session file '{}'", path.display()))?;
        debug!("📂 file session {} writing to {}", session_id, path.display());

        Ok(FileSession {
            path,
            file_buf: io::BufWriter::new(file),
        })
    }
}

/// 🚰 One writer's NDJSON file.
#[derive(Debug)]
pub(crate) struct FileSession {
    path: PathBuf,
    file_buf: io::BufWriter<File>,
}

#[async_trait]
impl Session for FileSession {
    async fn insert_content(&mut self, contents: &[Content]) -> Result<(), WriteError> {
        let mut payload = Vec::with_capacity(contents.iter().map(|c| c.content.len() + 64).sum());
        for content in contents {
            serde_json::to_writer(&mut payload, content)?;
            payload.push(b'\n');
        }
        trace!(
            "📬 {} bytes walked into {}",
            payload.len(),
            self.path.display()
        );
        self.file_buf.write_all(&payload).await?;
        self.file_buf.flush().await?;
        Ok(())
    }
}
