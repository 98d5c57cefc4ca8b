//! Scripted sessions for exercising the engine without an agent process.
//!
//! A [`ScriptedLauncher`] hands out one [`ScriptedSession`] per cycle, each
//! following a [`SessionScript`]. All sessions from one launcher share a
//! [`CallLog`] so tests can assert how often each operation ran.

use crate::config::Config;
use crate::session::{AgentSession, CommunicationError, SessionLauncher, SessionStartError};
use crate::stream::StreamHandler;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use taskloop_proto::{ParsedEvent, PromptOptions};

/// What one scripted session does.
#[derive(Debug, Clone, Default)]
pub struct SessionScript {
    /// `start()` fails with a handshake timeout.
    pub fail_start: bool,
    /// `send_prompt()` fails with `NotRunning`.
    pub fail_prompt: bool,
    /// Output lines, delivered one per `read_line()` after the prompt.
    pub lines: Vec<String>,
    /// Keep reporting alive after the lines run out.
    pub stay_alive: bool,
}

impl SessionScript {
    /// A session that prints `lines` and exits.
    pub fn lines(lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// A session that prints nothing and never exits on its own.
    pub fn hanging() -> Self {
        Self {
            stay_alive: true,
            ..Self::default()
        }
    }

    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub fn failing_prompt() -> Self {
        Self {
            fail_prompt: true,
            ..Self::default()
        }
    }
}

/// Counts of session operations across every session of a launcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Calls {
    pub launches: usize,
    pub starts: usize,
    pub shutdowns: usize,
    pub prompts: Vec<String>,
    pub options: Vec<PromptOptions>,
    pub observed: Vec<String>,
}

/// Shared, cloneable call log.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Calls>>);

impl CallLog {
    fn lock(&self) -> MutexGuard<'_, Calls> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the counters.
    pub fn calls(&self) -> Calls {
        self.lock().clone()
    }

    pub fn launches(&self) -> usize {
        self.lock().launches
    }

    pub fn starts(&self) -> usize {
        self.lock().starts
    }

    pub fn shutdowns(&self) -> usize {
        self.lock().shutdowns
    }

    pub fn prompts(&self) -> Vec<String> {
        self.lock().prompts.clone()
    }
}

/// Launches scripted sessions: queued scripts first, then the fallback.
pub struct ScriptedLauncher {
    scripts: Mutex<VecDeque<SessionScript>>,
    fallback: SessionScript,
    log: CallLog,
}

impl ScriptedLauncher {
    /// Every session follows `script`.
    pub fn repeating(script: SessionScript) -> Self {
        Self::new(Vec::new(), script)
    }

    pub fn new(scripts: Vec<SessionScript>, fallback: SessionScript) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            fallback,
            log: CallLog::default(),
        }
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl SessionLauncher for ScriptedLauncher {
    fn launch(&self, _config: &Config) -> Box<dyn AgentSession> {
        self.log.lock().launches += 1;
        let script = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        Box::new(ScriptedSession::new(script, self.log.clone()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptedState {
    Created,
    Running,
    Stopped,
}

/// An in-memory [`AgentSession`].
pub struct ScriptedSession {
    script: SessionScript,
    pending: VecDeque<String>,
    state: ScriptedState,
    prompted: bool,
    log: CallLog,
}

impl ScriptedSession {
    pub fn new(script: SessionScript, log: CallLog) -> Self {
        Self {
            pending: script.lines.iter().cloned().collect(),
            script,
            state: ScriptedState::Created,
            prompted: false,
            log,
        }
    }
}

#[async_trait]
impl AgentSession for ScriptedSession {
    async fn start(&mut self) -> Result<(), SessionStartError> {
        self.log.lock().starts += 1;
        if self.script.fail_start {
            return Err(SessionStartError::HandshakeTimeout(Duration::from_millis(1)));
        }
        self.state = ScriptedState::Running;
        Ok(())
    }

    async fn send_prompt(
        &mut self,
        prompt: &str,
        options: &PromptOptions,
    ) -> Result<(), CommunicationError> {
        if self.state != ScriptedState::Running || self.script.fail_prompt {
            return Err(CommunicationError::NotRunning);
        }
        let mut log = self.log.lock();
        log.prompts.push(prompt.to_string());
        log.options.push(options.clone());
        self.prompted = true;
        Ok(())
    }

    async fn read_line(&mut self) -> Option<String> {
        if self.state != ScriptedState::Running || !self.prompted {
            return None;
        }
        self.pending.pop_front()
    }

    async fn is_alive(&mut self) -> bool {
        self.state == ScriptedState::Running && (self.script.stay_alive || !self.pending.is_empty())
    }

    async fn shutdown(&mut self) {
        self.log.lock().shutdowns += 1;
        self.state = ScriptedState::Stopped;
    }

    fn observe(&mut self, event: &ParsedEvent) {
        self.log.lock().observed.push(event.name().to_string());
    }
}

/// Records stream handler calls as `kind:detail` strings.
#[derive(Debug, Clone, Default)]
pub struct RecordingStreamHandler(Arc<Mutex<Vec<String>>>);

impl RecordingStreamHandler {
    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn push(&self, entry: String) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

impl StreamHandler for RecordingStreamHandler {
    fn on_text(&mut self, text: &str) {
        self.push(format!("text:{text}"));
    }

    fn on_tool_call(&mut self, name: &str, _id: &str, _input: &serde_json::Value) {
        self.push(format!("tool_call:{name}"));
    }

    fn on_tool_result(&mut self, _id: &str, output: &str) {
        self.push(format!("tool_result:{output}"));
    }

    fn on_error(&mut self, error: &str) {
        self.push(format!("error:{error}"));
    }

    fn on_lifecycle(&mut self, event: &str, detail: &str) {
        self.push(format!("lifecycle:{event}:{detail}"));
    }
}

/// A `stream` event line carrying one text item.
pub fn text_line(text: &str) -> String {
    serde_json::json!({
        "event": "stream",
        "payload": {"content": [{"type": "text", "text": text}]}
    })
    .to_string()
}
