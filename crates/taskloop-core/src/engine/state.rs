//! Execution state tracking for the engine.

use std::fmt;
use std::time::{Duration, Instant};

/// Where the engine is within the cycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Starting,
    PromptSent,
    Monitoring,
    Ending,
    /// Between cycles, waiting out the backoff.
    Cycling,
    /// Terminal: completion detected.
    Completed,
    /// Terminal: stopped without completion.
    Aborted,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Starting => "starting",
            Phase::PromptSent => "prompt_sent",
            Phase::Monitoring => "monitoring",
            Phase::Ending => "ending",
            Phase::Cycling => "cycling",
            Phase::Completed => "completed",
            Phase::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Aborted)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state of one execution.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    /// Current cycle number (1-indexed; 0 before the first cycle starts).
    pub cycle: u32,
    pub phase: Phase,
    /// When the execution started.
    pub started_at: Instant,
    /// Run id reported by the agent in the current cycle, if any.
    pub run_id: Option<String>,
    /// Output lines seen across all cycles.
    pub total_lines: u64,
    /// Undecodable lines seen across all cycles.
    pub total_parse_errors: u64,
    /// Set once cancellation has been observed; never cleared.
    pub shutdown_requested: bool,
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self {
            cycle: 0,
            phase: Phase::Idle,
            started_at: Instant::now(),
            run_id: None,
            total_lines: 0,
            total_parse_errors: 0,
            shutdown_requested: false,
        }
    }
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the elapsed time since the execution started.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
