//! Per-line processing of agent output.
//!
//! Every stdout line goes through [`OutputProcessor::process_line`], which
//! decodes it, runs the completion detectors until one matches, renders a
//! human-readable summary for the stream handler and appends the event to the
//! transcript.

use crate::config::{Config, DebugOptions, WorkflowKind};
use crate::detector::{CompletionDetector, DetectionContext};
use crate::stream::{QuietStreamHandler, StreamHandler, format_tool_summary, truncate};
use crate::transcript::TranscriptWriter;
use std::panic::{AssertUnwindSafe, catch_unwind};
use taskloop_proto::{ContentItem, ParsedEvent, flatten_text};
use tracing::{debug, info, warn};

/// Outcome of processing one line.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedLine {
    pub event: ParsedEvent,
    /// Sticky: true from the first matching event until the next cycle.
    pub completion_detected: bool,
    /// Human-readable rendering, if the event had anything to show.
    pub summary: Option<String>,
}

/// Counters for the current cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub lines: u64,
    pub parse_errors: u64,
    pub detector_failures: u64,
}

/// A detector panicked while classifying an event.
#[derive(Debug, thiserror::Error)]
#[error("detector '{detector}' panicked: {message}")]
pub struct DetectorError {
    pub detector: String,
    pub message: String,
}

pub struct OutputProcessor {
    kind: WorkflowKind,
    detectors: Vec<Box<dyn CompletionDetector>>,
    debug: DebugOptions,
    handler: Box<dyn StreamHandler>,
    transcript: Option<TranscriptWriter>,
    cycle: u32,
    completion_detected: bool,
    stats: CycleStats,
}

impl OutputProcessor {
    /// Creates a processor with a quiet stream handler. A transcript writer
    /// is attached when the config names a transcript path.
    pub fn new(config: &Config, detectors: Vec<Box<dyn CompletionDetector>>) -> Self {
        Self {
            kind: config.kind(),
            detectors,
            debug: config.debug().clone(),
            handler: Box::new(QuietStreamHandler),
            transcript: config.transcript_path().map(TranscriptWriter::new),
            cycle: 1,
            completion_detected: false,
            stats: CycleStats::default(),
        }
    }

    /// Replaces the stream handler.
    pub fn with_stream_handler(mut self, handler: Box<dyn StreamHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Resets per-cycle state.
    pub fn begin_cycle(&mut self, cycle: u32) {
        self.cycle = cycle;
        self.completion_detected = false;
        self.stats = CycleStats::default();
    }

    pub fn completion_detected(&self) -> bool {
        self.completion_detected
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn detector_names(&self) -> Vec<&str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    pub fn process_line(&mut self, line: &str) -> ProcessedLine {
        if self.debug.raw_dump {
            debug!(cycle = self.cycle, line, "Raw agent output");
        }

        let event = ParsedEvent::decode(line);
        self.stats.lines += 1;

        if event.is_parse_error() {
            self.stats.parse_errors += 1;
            debug!(
                cycle = self.cycle,
                parse_errors = self.stats.parse_errors,
                "Ignoring undecodable agent output line"
            );
        } else if !self.completion_detected {
            if let Some(detector) = self.run_detectors(&event) {
                info!(
                    cycle = self.cycle,
                    detector = %detector,
                    event = event.name(),
                    "Completion detected"
                );
                self.completion_detected = true;
            }
        }

        let summary = self.render(&event);
        if let Some(summary) = &summary {
            debug!(cycle = self.cycle, event = event.name(), "{summary}");
        }

        if let Some(transcript) = &mut self.transcript {
            transcript.record(self.cycle, &event);
        }

        ProcessedLine {
            event,
            completion_detected: self.completion_detected,
            summary,
        }
    }

    /// Runs detectors in order; returns the name of the first that matched.
    fn run_detectors(&mut self, event: &ParsedEvent) -> Option<String> {
        let ctx = DetectionContext {
            cycle: self.cycle,
            kind: self.kind,
        };

        for detector in &self.detectors {
            match catch_unwind(AssertUnwindSafe(|| detector.detect(event, &ctx))) {
                Ok(true) => return Some(detector.name().to_string()),
                Ok(false) => {}
                Err(payload) => {
                    self.stats.detector_failures += 1;
                    let err = DetectorError {
                        detector: detector.name().to_string(),
                        message: panic_message(payload.as_ref()),
                    };
                    warn!(
                        cycle = self.cycle,
                        error = %err,
                        "Detector failed; treating as no match"
                    );
                }
            }
        }
        None
    }

    fn clip(&self, text: &str) -> String {
        if self.debug.truncate {
            truncate(text, self.debug.truncate_length)
        } else {
            text.to_string()
        }
    }

    /// Forwards displayable fragments to the stream handler and returns them
    /// joined as one summary.
    fn render(&mut self, event: &ParsedEvent) -> Option<String> {
        let mut fragments = Vec::new();

        match event {
            ParsedEvent::Stream { payload } => {
                for item in &payload.content {
                    self.render_item(item, &mut fragments);
                }
            }
            ParsedEvent::RunFailed { error, .. } => {
                let error = self.clip(error.as_deref().unwrap_or("unknown error"));
                self.handler.on_error(&error);
                fragments.push(format!("run failed: {error}"));
            }
            ParsedEvent::ParseError { .. } | ParsedEvent::Unknown { .. } => {}
            lifecycle => {
                if self.debug.show_lifecycle {
                    let detail = lifecycle_detail(lifecycle);
                    self.handler.on_lifecycle(lifecycle.name(), &detail);
                    if detail.is_empty() {
                        fragments.push(format!("[{}]", lifecycle.name()));
                    } else {
                        fragments.push(format!("[{}] {detail}", lifecycle.name()));
                    }
                }
            }
        }

        if fragments.is_empty() {
            None
        } else {
            Some(fragments.join("\n"))
        }
    }

    fn render_item(&mut self, item: &ContentItem, fragments: &mut Vec<String>) {
        match item {
            ContentItem::Text { text } => {
                let text = self.clip(text);
                self.handler.on_text(&text);
                fragments.push(text);
            }
            ContentItem::ToolUse { id, name, input } if self.debug.show_tool_detail => {
                self.handler
                    .on_tool_call(name, id.as_deref().unwrap_or(""), input);
                match format_tool_summary(name, input) {
                    Some(summary) => {
                        fragments.push(format!("[tool] {name}: {}", self.clip(&summary)));
                    }
                    None => fragments.push(format!("[tool] {name}")),
                }
            }
            ContentItem::ToolResult {
                tool_use_id,
                content,
                is_error,
            } if self.debug.show_tool_detail => {
                let output = self.clip(&flatten_text(content));
                if *is_error {
                    self.handler.on_error(&output);
                    fragments.push(format!("[tool error] {output}"));
                } else {
                    self.handler
                        .on_tool_result(tool_use_id.as_deref().unwrap_or(""), &output);
                    fragments.push(format!("[result] {output}"));
                }
            }
            ContentItem::Message {
                text,
                result,
                is_error,
                ..
            } => {
                let Some(body) = result.as_deref().or(text.as_deref()) else {
                    return;
                };
                let body = self.clip(body);
                if *is_error {
                    self.handler.on_error(&body);
                    fragments.push(format!("[error] {body}"));
                } else {
                    self.handler.on_text(&body);
                    fragments.push(body);
                }
            }
            _ => {}
        }
    }
}

fn lifecycle_detail(event: &ParsedEvent) -> String {
    let parts: Vec<&str> = match event {
        ParsedEvent::RunStarted { run_id } => vec![run_id.as_deref().unwrap_or_default()],
        ParsedEvent::RunCompleted {
            outcome, reason, ..
        } => vec![
            outcome.as_deref().unwrap_or_default(),
            reason.as_deref().unwrap_or_default(),
        ],
        ParsedEvent::RunCancelled { reason, .. } | ParsedEvent::AutoShutdown { reason } => {
            vec![reason.as_deref().unwrap_or_default()]
        }
        ParsedEvent::State { state } => vec![state.as_str()],
        _ => Vec::new(),
    };
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
