//! The conversational core of VicAgent.
//!
//! A turn flows through three pieces:
//!
//! 1. [`Session`] holds the selected model, the memory and the agent
//! 2. [`AgentLoop`] calls the model, runs the tools it asks for, and loops
//! 3. [`TurnAccumulator`] routes every streamed fragment into the visible
//!    answer or the thinking trace, and exposes both after each fragment
//!
//! Front-ends consume the [`AgentStreamEvent`]s and hand the final outcome
//! back to the session, which is the only writer of memory.

pub mod accumulator;
pub mod loop_runner;
pub mod prompt;
pub mod session;
pub mod stream_event;

pub use accumulator::{THINKING_CLOSE, THINKING_OPEN, TurnAccumulator, TurnView};
pub use loop_runner::{AgentLoop, ITERATION_LIMIT_NOTICE, TurnOutcome};
pub use prompt::SystemPrompt;
pub use session::{Session, build_memory};
pub use stream_event::AgentStreamEvent;
