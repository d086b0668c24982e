//! In-process windowed memory, for single sessions and tests.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use vicagent_core::error::MemoryError;
use vicagent_core::memory::ConversationMemory;
use vicagent_core::message::Message;

use crate::{GREETING, tail};

/// Keeps messages in a Vec; replays the last `window` exchanges.
pub struct WindowMemory {
    window: usize,
    messages: Arc<RwLock<Vec<Message>>>,
}

impl WindowMemory {
    /// A memory seeded with the assistant greeting.
    pub fn new(window: usize) -> Self {
        Self::with_messages(window, vec![Message::assistant(GREETING)])
    }

    /// A memory holding exactly `messages`.
    pub fn with_messages(window: usize, messages: Vec<Message>) -> Self {
        Self {
            window,
            messages: Arc::new(RwLock::new(messages)),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

#[async_trait]
impl ConversationMemory for WindowMemory {
    fn name(&self) -> &str {
        "window"
    }

    async fn append(&self, message: Message) -> Result<(), MemoryError> {
        self.messages.write().await.push(message);
        Ok(())
    }

    async fn history(&self) -> Result<Vec<Message>, MemoryError> {
        Ok(tail(&self.messages.read().await, self.window))
    }

    async fn len(&self) -> Result<usize, MemoryError> {
        Ok(self.messages.read().await.len())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.messages.write().await.clear();
        Ok(())
    }
}
