//! # VicAgent Core
//!
//! Domain types, traits, and error definitions for the VicAgent runtime.
//! This crate has no framework dependencies: it defines the model that the
//! provider, memory, tool, and agent crates implement against.
//!
//! The central value type is [`Fragment`], one piece of streamed model
//! output. Everything upstream produces fragments, everything downstream
//! consumes them.

pub mod error;
pub mod fragment;
pub mod memory;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use fragment::{Fragment, ReasoningDelta};
pub use memory::ConversationMemory;
pub use message::{Message, MessageToolCall, ReasoningBlock, Role};
pub use provider::{
    Provider, ProviderRequest, ProviderResponse, StreamChunk, ThinkingConfig, ToolDefinition, Usage,
};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
