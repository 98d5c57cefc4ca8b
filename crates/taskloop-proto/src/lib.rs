//! # taskloop-proto
//!
//! Wire types for the line-delimited JSON protocol spoken between taskloop and
//! the coding agent process.
//!
//! - [`ParsedEvent`]: what the agent writes to stdout, decoded without ever failing.
//! - [`AgentCommand`]: what taskloop writes to the agent's stdin.

mod command;
mod event;

pub use command::{AgentCommand, PromptOptions};
pub use event::{ContentItem, ParsedEvent, StreamPayload, flatten_text};
