//! Cycle orchestration.
//!
//! The engine runs strictly sequential cycles. Each cycle launches a fresh
//! agent session, sends the workflow prompt, monitors output until the cycle
//! ends and always shuts the session down before deciding what comes next.

mod state;

pub use state::{ExecutionState, Phase};

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::processor::OutputProcessor;
use crate::session::{AgentSession, SessionLauncher};
use crate::stream::StreamHandler;
use crate::workflow::{StandardWorkflow, Workflow};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::time::{Duration, Instant};
use taskloop_proto::ParsedEvent;
use tracing::{debug, info, warn};

/// Reason an execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// A completion detector matched.
    Completed,
    /// Every allowed cycle ran without completion.
    MaxCycles,
    /// Cancellation was requested.
    Cancelled,
    /// The agent could not be spawned or never became ready.
    SessionStartFailed,
    /// The prompt could not be written to the agent.
    PromptSendFailed,
}

impl TerminationReason {
    /// Process exit code for this reason.
    pub fn exit_code(&self) -> i32 {
        match self {
            TerminationReason::Completed => 0,
            TerminationReason::SessionStartFailed | TerminationReason::PromptSendFailed => 1,
            TerminationReason::MaxCycles => 2,
            TerminationReason::Cancelled => 130,
        }
    }

    /// Stable human-readable reason string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Completed => "completed",
            TerminationReason::MaxCycles => "max cycles reached",
            TerminationReason::Cancelled => "cancelled",
            TerminationReason::SessionStartFailed => "session start failed",
            TerminationReason::PromptSendFailed => "prompt send failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TerminationReason::Completed)
    }
}

impl Serialize for TerminationReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Why monitoring of one cycle stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    ProcessExited,
    Terminal,
    CompletionDetected,
    Timeout,
    Cancelled,
}

/// Final report of an execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub completed: bool,
    /// Last cycle that ran (0 if none did).
    pub cycle: u32,
    pub reason: TerminationReason,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

enum CycleOutcome {
    Completed,
    Incomplete(MonitorExit),
    Cancelled,
    StartFailed,
    PromptFailed,
}

/// Runs cycles of one workflow until completion, cancellation, failure or
/// the cycle limit.
pub struct Engine {
    config: Arc<Config>,
    workflow: Box<dyn Workflow>,
    launcher: Box<dyn SessionLauncher>,
    processor: OutputProcessor,
    cancel: CancelToken,
    state: ExecutionState,
}

impl Engine {
    /// Creates an engine for the config's built-in workflow.
    pub fn new(config: Config, launcher: Box<dyn SessionLauncher>) -> Self {
        let workflow = Box::new(StandardWorkflow::for_kind(config.kind()));
        Self::with_workflow(config, workflow, launcher)
    }

    pub fn with_workflow(
        config: Config,
        workflow: Box<dyn Workflow>,
        launcher: Box<dyn SessionLauncher>,
    ) -> Self {
        let processor = OutputProcessor::new(&config, workflow.detectors(&config));
        Self {
            config: Arc::new(config),
            workflow,
            launcher,
            processor,
            cancel: CancelToken::never(),
            state: ExecutionState::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_stream_handler(mut self, handler: Box<dyn StreamHandler>) -> Self {
        self.processor = self.processor.with_stream_handler(handler);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    /// Runs the execution to its end. Never fails: every error becomes a
    /// termination reason, and no agent process outlives this call.
    pub async fn execute(&mut self) -> ExecutionResult {
        self.state = ExecutionState::new();
        let max_cycles = self.config.max_cycles();
        info!(
            kind = %self.config.kind(),
            target_dir = %self.config.target_dir().display(),
            max_cycles,
            detectors = ?self.processor.detector_names(),
            "Starting execution"
        );

        let reason = loop {
            if self.cancel.is_cancelled() {
                break TerminationReason::Cancelled;
            }
            if self.state.cycle >= max_cycles {
                break TerminationReason::MaxCycles;
            }

            let cycle = self.state.cycle + 1;
            match self.run_cycle(cycle).await {
                CycleOutcome::Completed => break TerminationReason::Completed,
                CycleOutcome::Cancelled => break TerminationReason::Cancelled,
                CycleOutcome::StartFailed => break TerminationReason::SessionStartFailed,
                CycleOutcome::PromptFailed => break TerminationReason::PromptSendFailed,
                CycleOutcome::Incomplete(exit) => {
                    self.enter(Phase::Cycling);
                    info!(cycle, max_cycles, exit = ?exit, "Cycle ended without completion");
                    if cycle >= max_cycles {
                        break TerminationReason::MaxCycles;
                    }
                    if !self.backoff().await {
                        break TerminationReason::Cancelled;
                    }
                }
            }
        };

        self.finish(reason)
    }

    async fn run_cycle(&mut self, cycle: u32) -> CycleOutcome {
        self.state.cycle = cycle;
        self.state.run_id = None;
        self.processor.begin_cycle(cycle);
        info!(cycle, max_cycles = self.config.max_cycles(), "Starting cycle");

        self.enter(Phase::Starting);
        let mut session = self.launcher.launch(&self.config);
        let started = tokio::select! {
            result = session.start() => Some(result),
            () = self.cancel.cancelled() => None,
        };
        match started {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                warn!(cycle, error = %e, "Failed to start agent session");
                self.enter(Phase::Ending);
                session.shutdown().await;
                return CycleOutcome::StartFailed;
            }
            None => {
                info!(cycle, "Cancelled while starting agent session");
                self.enter(Phase::Ending);
                session.shutdown().await;
                return CycleOutcome::Cancelled;
            }
        }

        self.enter(Phase::PromptSent);
        let prompt = self.workflow.prompt(&self.config, cycle);
        let options = self.workflow.options(&self.config);
        if let Err(e) = session.send_prompt(&prompt, &options).await {
            warn!(cycle, error = %e, "Failed to send prompt");
            self.enter(Phase::Ending);
            session.shutdown().await;
            return CycleOutcome::PromptFailed;
        }
        debug!(cycle, prompt_len = prompt.len(), "Prompt sent");

        self.enter(Phase::Monitoring);
        let exit = self.monitor(session.as_mut()).await;

        self.enter(Phase::Ending);
        session.shutdown().await;

        let stats = self.processor.stats();
        self.state.total_lines += stats.lines;
        self.state.total_parse_errors += stats.parse_errors;
        debug!(
            cycle,
            exit = ?exit,
            lines = stats.lines,
            parse_errors = stats.parse_errors,
            detector_failures = stats.detector_failures,
            "Cycle monitoring finished"
        );

        if self.processor.completion_detected() {
            CycleOutcome::Completed
        } else if exit == MonitorExit::Cancelled || self.cancel.is_cancelled() {
            CycleOutcome::Cancelled
        } else {
            CycleOutcome::Incomplete(exit)
        }
    }

    async fn monitor(&mut self, session: &mut dyn AgentSession) -> MonitorExit {
        let started = Instant::now();
        let timeout = self.config.session_timeout();
        let poll_interval = self.config.timing().poll_interval();

        loop {
            if self.cancel.is_cancelled() {
                return MonitorExit::Cancelled;
            }
            if started.elapsed() >= timeout {
                warn!(
                    cycle = self.state.cycle,
                    timeout_secs = timeout.as_secs(),
                    "Session timeout reached"
                );
                return MonitorExit::Timeout;
            }

            if let Some(line) = session.read_line().await {
                let processed = self.processor.process_line(&line);
                session.observe(&processed.event);
                if let ParsedEvent::RunStarted {
                    run_id: Some(run_id),
                } = &processed.event
                {
                    self.state.run_id = Some(run_id.clone());
                }

                if processed.completion_detected {
                    return MonitorExit::CompletionDetected;
                }
                if processed.event.is_terminal() {
                    debug!(
                        cycle = self.state.cycle,
                        event = processed.event.name(),
                        "Terminal event"
                    );
                    return MonitorExit::Terminal;
                }
                continue;
            }

            if !session.is_alive().await {
                debug!(cycle = self.state.cycle, "Agent process exited");
                return MonitorExit::ProcessExited;
            }

            tokio::select! {
                () = tokio::time::sleep(poll_interval) => {}
                () = self.cancel.cancelled() => return MonitorExit::Cancelled,
            }
        }
    }

    /// Sleeps the inter-cycle backoff. Returns false if cancelled meanwhile.
    async fn backoff(&mut self) -> bool {
        let backoff = self.config.timing().cycle_backoff();
        if backoff.is_zero() {
            return !self.cancel.is_cancelled();
        }
        debug!(backoff_ms = backoff.as_millis() as u64, "Waiting before next cycle");
        tokio::select! {
            () = tokio::time::sleep(backoff) => !self.cancel.is_cancelled(),
            () = self.cancel.cancelled() => false,
        }
    }

    fn enter(&mut self, phase: Phase) {
        debug!(cycle = self.state.cycle, from = %self.state.phase, to = %phase, "Phase transition");
        self.state.phase = phase;
    }

    fn finish(&mut self, reason: TerminationReason) -> ExecutionResult {
        if reason == TerminationReason::Cancelled {
            self.state.shutdown_requested = true;
        }
        let phase = if reason.is_success() {
            Phase::Completed
        } else {
            Phase::Aborted
        };
        self.enter(phase);

        let result = ExecutionResult {
            success: reason.is_success(),
            completed: reason == TerminationReason::Completed,
            cycle: self.state.cycle,
            reason,
            elapsed: self.state.elapsed(),
        };

        if result.success {
            info!(
                cycle = result.cycle,
                elapsed_ms = result.elapsed.as_millis() as u64,
                "Execution completed"
            );
        } else {
            warn!(
                cycle = result.cycle,
                reason = reason.as_str(),
                elapsed_ms = result.elapsed.as_millis() as u64,
                "Execution ended without completion"
            );
        }
        result
    }
}
