//! Conversation memory — the window of prior turns replayed into every
//! request.
//!
//! Only user and assistant messages are kept; tool traffic stays inside the
//! turn that produced it.

use async_trait::async_trait;

use crate::error::MemoryError;
use crate::message::Message;

#[async_trait]
pub trait ConversationMemory: Send + Sync {
    /// The backend name (e.g. "window", "file").
    fn name(&self) -> &str;

    /// Append one message.
    async fn append(&self, message: Message) -> Result<(), MemoryError>;

    /// The retained window of messages, oldest first.
    async fn history(&self) -> Result<Vec<Message>, MemoryError>;

    /// Number of messages currently retained.
    async fn len(&self) -> Result<usize, MemoryError>;

    /// Drop everything, including any persisted copy.
    async fn clear(&self) -> Result<(), MemoryError>;

    /// Record a completed turn: the user input followed by the final answer.
    async fn save_turn(&self, input: &str, output: &str) -> Result<(), MemoryError> {
        self.append(Message::user(input)).await?;
        self.append(Message::assistant(output)).await
    }

    async fn is_empty(&self) -> Result<bool, MemoryError> {
        Ok(self.len().await? == 0)
    }
}
