//! File-backed windowed memory — JSON Lines, one message per line.
//!
//! Messages are loaded on open and appended to the file as they arrive, so a
//! restarted session picks up where the last one stopped.

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use vicagent_core::error::MemoryError;
use vicagent_core::memory::ConversationMemory;
use vicagent_core::message::Message;

use crate::{GREETING, tail};

pub struct FileMemory {
    path: PathBuf,
    window: usize,
    messages: Arc<RwLock<Vec<Message>>>,
}

impl FileMemory {
    /// Open (or create) the history file at `path`.
    ///
    /// An empty or missing file is seeded with the assistant greeting.
    pub fn open(path: impl Into<PathBuf>, window: usize) -> Result<Self, MemoryError> {
        let path = path.into();
        let mut messages = load_from_disk(&path)?;

        if messages.is_empty() {
            let greeting = Message::assistant(GREETING);
            write_lines(&path, std::slice::from_ref(&greeting), false)?;
            messages.push(greeting);
        }

        debug!(path = %path.display(), count = messages.len(), "File memory loaded");
        Ok(Self {
            path,
            window,
            messages: Arc::new(RwLock::new(messages)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load_from_disk(path: &Path) -> Result<Vec<Message>, MemoryError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(MemoryError::Storage(format!(
                "Failed to read {}: {e}",
                path.display()
            )));
        }
    };

    Ok(content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(n, line)| match serde_json::from_str::<Message>(line) {
            Ok(msg) => Some(msg),
            Err(e) => {
                warn!(line = n + 1, error = %e, "Skipping corrupt history line");
                None
            }
        })
        .collect())
}

/// Write `messages` as JSONL, appending or truncating.
fn write_lines(path: &Path, messages: &[Message], append: bool) -> Result<(), MemoryError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| MemoryError::Storage(format!("Failed to create history directory: {e}")))?;
    }

    let mut content = String::new();
    for msg in messages {
        let line = serde_json::to_string(msg)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize message: {e}")))?;
        content.push_str(&line);
        content.push('\n');
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .map_err(|e| MemoryError::Storage(format!("Failed to open {}: {e}", path.display())))?;
    file.write_all(content.as_bytes())
        .map_err(|e| MemoryError::Storage(format!("Failed to write history: {e}")))
}

#[async_trait]
impl ConversationMemory for FileMemory {
    fn name(&self) -> &str {
        "file"
    }

    async fn append(&self, message: Message) -> Result<(), MemoryError> {
        let mut messages = self.messages.write().await;
        write_lines(&self.path, std::slice::from_ref(&message), true)?;
        messages.push(message);
        Ok(())
    }

    async fn history(&self) -> Result<Vec<Message>, MemoryError> {
        Ok(tail(&self.messages.read().await, self.window))
    }

    async fn len(&self) -> Result<usize, MemoryError> {
        Ok(self.messages.read().await.len())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        let mut messages = self.messages.write().await;
        write_lines(&self.path, &[], false)?;
        messages.clear();
        Ok(())
    }
}
