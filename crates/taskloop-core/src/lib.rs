//! # taskloop-core
//!
//! Execution engine for driving a coding agent through repeated sessions
//! until a task is done.
//!
//! This crate provides:
//! - Validated configuration with per-project command detection
//! - Completion detectors and the per-line output processor
//! - The session abstraction the engine drives
//! - The cycle state machine with cooperative cancellation
//! - A JSONL transcript of every decoded agent event

pub mod cancel;
mod config;
pub mod detector;
mod engine;
pub mod patterns;
pub mod processor;
pub mod project_detect;
mod session;
mod stream;
pub mod testing;
pub mod transcript;
mod workflow;

pub use cancel::{CancelHandle, CancelToken, cancel_pair};
pub use config::{
    Config, ConfigError, ConfigOptions, DEFAULT_AGENT_PROGRAM, DEFAULT_PERMISSION_MODE,
    DebugOptions, ProjectCommands, TimingConfig, WorkflowKind,
};
pub use detector::{
    CommandPatternDetector, CompletionDetector, DetectionContext, SpecWorkflowDetector,
    TextPatternDetector, ToolResultDetector,
};
pub use engine::{Engine, ExecutionResult, ExecutionState, MonitorExit, Phase, TerminationReason};
pub use processor::{CycleStats, DetectorError, OutputProcessor, ProcessedLine};
pub use session::{AgentSession, CommunicationError, SessionLauncher, SessionStartError};
pub use stream::{QuietStreamHandler, StreamHandler, format_tool_summary, truncate};
pub use transcript::{TranscriptRecord, TranscriptWriter, read_transcript};
pub use workflow::{StandardWorkflow, Workflow};
