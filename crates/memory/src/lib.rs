//! Conversation memory implementations for VicAgent.
//!
//! Both backends keep every message and replay only the last `window`
//! exchanges (user + assistant pairs) through `history()`.

pub mod file;
pub mod window;

pub use file::FileMemory;
pub use window::WindowMemory;

use vicagent_core::message::Message;

/// The assistant line a fresh conversation starts with.
pub const GREETING: &str = "How can I help you?";

/// The last `window` exchanges of `messages`, oldest first.
pub(crate) fn tail(messages: &[Message], window: usize) -> Vec<Message> {
    let keep = window.saturating_mul(2);
    let start = messages.len().saturating_sub(keep);
    messages[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_whole_exchanges() {
        let messages: Vec<Message> = (0..7)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("q{i}"))
                } else {
                    Message::assistant(format!("a{i}"))
                }
            })
            .collect();

        let last_two = tail(&messages, 2);
        assert_eq!(last_two.len(), 4);
        assert_eq!(last_two[0].content, "a3");
        assert_eq!(last_two[3].content, "q6");

        assert_eq!(tail(&messages, 500).len(), 7);
        assert!(tail(&messages, 0).is_empty());
    }
}
