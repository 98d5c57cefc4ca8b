//! # taskloop-adapters
//!
//! Concrete session and display implementations for taskloop.
//!
//! - [`ProcessSession`] drives an agent child process over line-delimited
//!   JSON on stdio, with graceful then forced shutdown of its process group.
//! - [`ConsoleStreamHandler`] renders decoded agent output to a terminal.

mod console;
mod process_session;

pub use console::ConsoleStreamHandler;
pub use process_session::{ProcessLauncher, ProcessSession};
