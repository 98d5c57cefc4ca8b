//! Agent sessions backed by a child process speaking line-delimited JSON.
//!
//! The child runs in its own process group with piped stdio. A reader task
//! forwards stdout lines into an unbounded channel so [`AgentSession::read_line`]
//! never blocks; stderr is drained into debug logs.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use taskloop_core::{
    AgentSession, CommunicationError, Config, DEFAULT_AGENT_PROGRAM, SessionLauncher,
    SessionStartError, TimingConfig,
};
use taskloop_proto::{AgentCommand, ParsedEvent, PromptOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Created,
    Running,
    Stopped,
}

/// One agent child process.
pub struct ProcessSession {
    program: String,
    args: Vec<String>,
    target_dir: PathBuf,
    env: BTreeMap<String, String>,
    timing: TimingConfig,
    default_options: PromptOptions,

    state: SessionState,
    child: Option<Child>,
    pid: Option<u32>,
    stdin: Option<ChildStdin>,
    lines: Option<mpsc::UnboundedReceiver<String>>,
    /// A line pulled off the channel by `is_alive`, handed out next.
    peeked: Option<String>,
    reader: Option<JoinHandle<()>>,
    stderr_drain: Option<JoinHandle<()>>,
    run_id: Option<String>,
}

impl ProcessSession {
    /// Creates a not-yet-started session for `config`.
    pub fn from_config(config: &Config) -> Self {
        let (program, args) = match config.agent_command().split_first() {
            Some((program, args)) => (program.clone(), args.to_vec()),
            None => (DEFAULT_AGENT_PROGRAM.to_string(), Vec::new()),
        };

        let default_options = PromptOptions::new()
            .with(PromptOptions::CWD, config.target_dir().display().to_string())
            .with(PromptOptions::EXIT_ON_COMPLETE, true)
            .with(PromptOptions::PERMISSION_MODE, config.permission_mode());

        Self {
            program,
            args,
            target_dir: config.target_dir().to_path_buf(),
            env: config.env().clone(),
            timing: config.timing().clone(),
            default_options,
            state: SessionState::Created,
            child: None,
            pid: None,
            stdin: None,
            lines: None,
            peeked: None,
            reader: None,
            stderr_drain: None,
            run_id: None,
        }
    }

    /// OS process id (and process group id) of the running agent.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Run id last reported by the agent.
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    fn spawn(&mut self) -> Result<(), SessionStartError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.target_dir)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| SessionStartError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        self.pid = child.id();

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        // Keep the child even on error so shutdown can reap it.
        self.child = Some(child);
        self.state = SessionState::Running;

        let stdin = stdin.ok_or(SessionStartError::MissingStdio("stdin"))?;
        let stdout = stdout.ok_or(SessionStartError::MissingStdio("stdout"))?;
        let stderr = stderr.ok_or(SessionStartError::MissingStdio("stderr"))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let pid = self.pid;
        self.reader = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        debug!(pid = ?pid, error = %e, "Agent stdout read failed");
                        break;
                    }
                }
            }
        }));

        self.stderr_drain = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(pid = ?pid, "agent stderr: {line}");
            }
        }));

        self.stdin = Some(stdin);
        self.lines = Some(rx);
        info!(
            program = %self.program,
            pid = ?self.pid,
            dir = %self.target_dir.display(),
            "Agent process spawned"
        );
        Ok(())
    }

    async fn handshake(&mut self) -> Result<(), SessionStartError> {
        let limit = self.timing.handshake_timeout();
        let deadline = Instant::now() + limit;
        let poll = self.timing.poll_interval();

        loop {
            if let Some(line) = self.read_line().await {
                match ParsedEvent::decode(&line) {
                    ParsedEvent::Ready => {
                        debug!(pid = ?self.pid, "Agent ready");
                        return Ok(());
                    }
                    other => {
                        debug!(event = other.name(), "Discarding output received before ready");
                    }
                }
                continue;
            }

            if !self.is_alive().await {
                return Err(SessionStartError::ExitedBeforeReady {
                    status: self.exit_status(),
                });
            }
            if Instant::now() >= deadline {
                return Err(SessionStartError::HandshakeTimeout(limit));
            }
            sleep(poll).await;
        }
    }

    fn exit_status(&mut self) -> String {
        match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(Some(status))) => status.to_string(),
            Some(Ok(None)) => "still running".to_string(),
            Some(Err(e)) => format!("unknown ({e})"),
            None => "not spawned".to_string(),
        }
    }

    fn child_running(&mut self) -> bool {
        matches!(self.child.as_mut().map(Child::try_wait), Some(Ok(None)))
    }

    /// Asks the agent to exit, then escalates to SIGTERM and SIGKILL on the
    /// process group. Whatever the agent left running in its group is reaped
    /// afterwards, however the agent itself ended.
    async fn stop_child(&mut self, mut child: Child) {
        if let Some(mut stdin) = self.stdin.take() {
            match AgentCommand::Shutdown.to_line() {
                Ok(line) => {
                    if let Err(e) = stdin.write_all(line.as_bytes()).await {
                        debug!(error = %e, "Could not send shutdown command");
                    }
                    let _ = stdin.flush().await;
                }
                Err(e) => debug!(error = %e, "Could not encode shutdown command"),
            }
            // Dropping stdin closes the pipe.
        }

        let mut exited = self
            .wait_exit(&mut child, self.timing.shutdown_grace(), "shutdown")
            .await;
        if !exited {
            if let Some(pid) = self.pid {
                signal_group(pid, GroupSignal::Terminate);
            }
            exited = self
                .wait_exit(&mut child, self.timing.terminate_grace(), "SIGTERM")
                .await;
        }
        if !exited {
            warn!(pid = ?self.pid, "Agent ignored SIGTERM, killing process group");
            if let Some(pid) = self.pid {
                signal_group(pid, GroupSignal::Kill);
            }
            if let Err(e) = child.kill().await {
                debug!(pid = ?self.pid, error = %e, "Kill after SIGKILL reported an error");
            }
        }

        if let Some(pid) = self.pid {
            self.reap_group(pid).await;
        }
    }

    async fn wait_exit(&self, child: &mut Child, grace: Duration, after: &str) -> bool {
        match timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(pid = ?self.pid, %status, after, "Agent exited");
                true
            }
            Ok(Err(e)) => {
                warn!(pid = ?self.pid, error = %e, "Failed to wait for agent");
                false
            }
            Err(_) => {
                debug!(pid = ?self.pid, after, "Agent still running");
                false
            }
        }
    }

    /// Terminates processes the agent left behind in its group.
    async fn reap_group(&self, pid: u32) {
        if !group_exists(pid) {
            return;
        }
        debug!(pgid = pid, "Terminating leftover processes in agent group");
        signal_group(pid, GroupSignal::Terminate);

        let deadline = Instant::now() + self.timing.terminate_grace();
        while group_exists(pid) && Instant::now() < deadline {
            sleep(self.timing.poll_interval()).await;
        }
        if group_exists(pid) {
            warn!(pgid = pid, "Leftover agent processes ignored SIGTERM, sending SIGKILL");
            signal_group(pid, GroupSignal::Kill);
        }
    }
}

#[async_trait]
impl AgentSession for ProcessSession {
    async fn start(&mut self) -> Result<(), SessionStartError> {
        match self.state {
            SessionState::Running => return Ok(()),
            SessionState::Stopped => {
                return Err(SessionStartError::ExitedBeforeReady {
                    status: "session already stopped".to_string(),
                });
            }
            SessionState::Created => {}
        }
        self.spawn()?;
        self.handshake().await
    }

    async fn send_prompt(
        &mut self,
        prompt: &str,
        options: &PromptOptions,
    ) -> Result<(), CommunicationError> {
        if self.state != SessionState::Running {
            return Err(CommunicationError::NotRunning);
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(CommunicationError::NotRunning);
        };

        let command = AgentCommand::Prompt {
            prompt: prompt.to_string(),
            options: options.merged_over(&self.default_options),
        };
        let line = command.to_line()?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        debug!(pid = ?self.pid, bytes = line.len(), "Prompt written");
        Ok(())
    }

    async fn read_line(&mut self) -> Option<String> {
        if let Some(line) = self.peeked.take() {
            return Some(line);
        }
        self.lines.as_mut()?.try_recv().ok()
    }

    async fn is_alive(&mut self) -> bool {
        if self.state != SessionState::Running {
            return false;
        }
        if self.peeked.is_some() || self.child_running() {
            return true;
        }
        if self.reader.as_ref().is_some_and(|r| !r.is_finished()) {
            return true;
        }
        // The reader is done; anything it sent is already queued.
        if let Some(line) = self.lines.as_mut().and_then(|rx| rx.try_recv().ok()) {
            self.peeked = Some(line);
            return true;
        }
        false
    }

    async fn shutdown(&mut self) {
        let was_running = self.state == SessionState::Running;
        self.state = SessionState::Stopped;
        if !was_running {
            return;
        }

        if let Some(child) = self.child.take() {
            self.stop_child(child).await;
        }
        self.stdin = None;
        self.lines = None;
        self.peeked = None;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(drain) = self.stderr_drain.take() {
            drain.abort();
        }
        info!(pid = ?self.pid, run_id = ?self.run_id.take(), "Agent session shut down");
    }

    fn observe(&mut self, event: &ParsedEvent) {
        match event {
            ParsedEvent::RunStarted { run_id: Some(id) } => {
                debug!(run_id = %id, "Agent run started");
                self.run_id = Some(id.clone());
            }
            ParsedEvent::RunCompleted { run_id, .. }
            | ParsedEvent::RunFailed { run_id, .. }
            | ParsedEvent::RunCancelled { run_id, .. } => {
                let id = run_id.as_deref().or(self.run_id.as_deref());
                debug!(run_id = ?id, event = event.name(), "Agent run ended");
            }
            _ => {}
        }
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        // kill_on_drop only reaches the direct child.
        if self.state != SessionState::Running {
            return;
        }
        if let Some(pid) = self.pid {
            signal_group(pid, GroupSignal::Kill);
        }
    }
}

/// Launches a [`ProcessSession`] per cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl SessionLauncher for ProcessLauncher {
    fn launch(&self, config: &Config) -> Box<dyn AgentSession> {
        Box::new(ProcessSession::from_config(config))
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: GroupSignal) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let signal = match signal {
        GroupSignal::Terminate => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };
    let pgid = Pid::from_raw(pid as i32);
    if let Err(e) = killpg(pgid, signal) {
        debug!(pgid = pid, ?signal, error = %e, "Signal to agent process group failed");
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: u32, _signal: GroupSignal) {}

/// Whether any process (zombies included) is still in the group.
#[cfg(unix)]
fn group_exists(pid: u32) -> bool {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    killpg(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
fn group_exists(_pid: u32) -> bool {
    false
}
