//! The seam between the engine and an agent process.
//!
//! The engine only talks to [`AgentSession`]; the process-backed
//! implementation lives in `taskloop-adapters`, and `testing` provides a
//! scripted one.

use crate::config::Config;
use async_trait::async_trait;
use std::time::Duration;
use taskloop_proto::{ParsedEvent, PromptOptions};

/// Failures while bringing a session up.
#[derive(Debug, thiserror::Error)]
pub enum SessionStartError {
    #[error("Failed to spawn agent '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Agent process is missing its {0} pipe")]
    MissingStdio(&'static str),

    #[error("Agent did not signal ready within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("Agent exited before signalling ready (status: {status})")]
    ExitedBeforeReady { status: String },
}

/// Failures while talking to a running session.
#[derive(Debug, thiserror::Error)]
pub enum CommunicationError {
    #[error("Session is not running")]
    NotRunning,

    #[error("Failed to write to agent stdin: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One agent process, started once and shut down once.
#[async_trait]
pub trait AgentSession: Send {
    /// Spawns the agent and waits for its `ready` event.
    async fn start(&mut self) -> Result<(), SessionStartError>;

    /// Sends one prompt. `options` are layered over the session defaults.
    async fn send_prompt(
        &mut self,
        prompt: &str,
        options: &PromptOptions,
    ) -> Result<(), CommunicationError>;

    /// Next buffered output line, or `None` right away if there is none.
    async fn read_line(&mut self) -> Option<String>;

    /// True while the process runs or its output is not fully drained.
    async fn is_alive(&mut self) -> bool;

    /// Stops the agent, escalating as needed. Idempotent and infallible.
    async fn shutdown(&mut self);

    /// Lets the session see every decoded event (e.g. to track the run id).
    fn observe(&mut self, _event: &ParsedEvent) {}
}

/// Creates a fresh, not-yet-started session for each cycle.
pub trait SessionLauncher: Send + Sync {
    fn launch(&self, config: &Config) -> Box<dyn AgentSession>;
}
