//! Completion detection for spec runs.
//!
//! Three signals, strongest first:
//!
//! 1. Structured tool results from the spec-workflow tools. Only objects that
//!    carry a spec field (`taskProgress`, `overallStatus`, `specName`) count;
//!    when present they are authoritative.
//! 2. Curated phrases and `N/N tasks completed` counts in agent text and
//!    result messages.
//! 3. A markdown checklist in raw tool output with every visible item checked.
//!    Long task files get clipped by the tools, so this one is low confidence
//!    and logged as such.

use super::tool_result::as_json_object;
use super::{CompletionDetector, DetectionContext, contains_phrase};
use crate::patterns::SPEC_PROGRESS_PHRASES;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use taskloop_proto::{ParsedEvent, flatten_text};
use tracing::{debug, warn};

/// Minimum number of visible checklist items before an all-checked list is
/// taken as completion.
pub const CHECKLIST_MIN_VISIBLE_ITEMS: usize = 10;

/// Maximum number of unchecked items an all-checked list may show.
const CHECKLIST_MAX_UNCHECKED: usize = 0;

static TASK_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*(?:/|of)\s*(\d+)\s+tasks?\s+(?:are\s+)?(?:completed?|done)").unwrap()
});

static CHECKLIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*[-*]\s+\[([ xX])\]").unwrap());

const SPEC_FIELDS: [&str; 6] = [
    "taskProgress",
    "task_progress",
    "overallStatus",
    "overall_status",
    "specName",
    "spec_name",
];

#[derive(Debug, Clone)]
pub struct SpecWorkflowDetector {
    phrases: Vec<String>,
}

impl SpecWorkflowDetector {
    pub fn new() -> Self {
        Self::with_phrases(SPEC_PROGRESS_PHRASES.iter().copied())
    }

    /// Detector with a custom phrase table. The structured and checklist
    /// signals are unaffected.
    pub fn with_phrases(phrases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let phrases = phrases
            .into_iter()
            .map(Into::<String>::into)
            .filter(|p| !p.is_empty())
            .map(|p| p.to_lowercase())
            .collect();
        Self { phrases }
    }

    fn text_signals_done(&self, text: &str) -> bool {
        let folded = text.to_lowercase();
        if let Some(phrase) = self.phrases.iter().find(|p| contains_phrase(&folded, p)) {
            debug!(phrase = %phrase, "Spec progress phrase matched");
            return true;
        }
        all_tasks_counted(&folded)
    }
}

impl Default for SpecWorkflowDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionDetector for SpecWorkflowDetector {
    fn name(&self) -> &str {
        "spec_workflow"
    }

    fn detect(&self, event: &ParsedEvent, ctx: &DetectionContext) -> bool {
        for content in event.tool_results() {
            match spec_status(content) {
                Some(obj) => {
                    if spec_object_done(&obj) {
                        debug!(cycle = ctx.cycle, "Spec status reports all tasks completed");
                        return true;
                    }
                }
                None => {
                    if checklist_done(&flatten_text(content)) {
                        warn!(
                            cycle = ctx.cycle,
                            "Treating fully checked task list as completion; \
                             tool output may be truncated"
                        );
                        return true;
                    }
                }
            }
        }

        event
            .texts()
            .chain(event.message_results())
            .any(|text| self.text_signals_done(text))
    }
}

/// Returns the spec status object inside a tool result, if it has one.
fn spec_status(content: &Value) -> Option<Map<String, Value>> {
    let obj = as_json_object(content)?;
    if has_spec_field(&obj) {
        return Some(obj);
    }
    match obj.get("data") {
        Some(Value::Object(data)) if has_spec_field(data) => Some(data.clone()),
        _ => None,
    }
}

fn has_spec_field(obj: &Map<String, Value>) -> bool {
    SPEC_FIELDS.iter().any(|field| obj.contains_key(*field))
}

fn field<'a>(obj: &'a Map<String, Value>, camel: &str, snake: &str) -> Option<&'a Value> {
    obj.get(camel).or_else(|| obj.get(snake))
}

fn spec_object_done(obj: &Map<String, Value>) -> bool {
    if let Some(Value::Object(progress)) = field(obj, "taskProgress", "task_progress") {
        let total = progress.get("total").and_then(Value::as_u64).unwrap_or(0);
        let completed = progress.get("completed").and_then(Value::as_u64).unwrap_or(0);
        let pending = progress
            .get("pending")
            .and_then(Value::as_u64)
            .unwrap_or_else(|| total.saturating_sub(completed));
        if total > 0 && completed == total && pending == 0 {
            return true;
        }
    }

    field(obj, "overallStatus", "overall_status")
        .and_then(Value::as_str)
        .is_some_and(|status| status.eq_ignore_ascii_case("completed"))
}

fn all_tasks_counted(folded: &str) -> bool {
    TASK_COUNT_RE.captures_iter(folded).any(|caps| {
        let done = caps[1].parse::<u64>().ok();
        let total = caps[2].parse::<u64>().ok();
        matches!((done, total), (Some(d), Some(t)) if t > 0 && d == t)
    })
}

fn checklist_done(text: &str) -> bool {
    let mut checked = 0usize;
    let mut unchecked = 0usize;
    for caps in CHECKLIST_RE.captures_iter(text) {
        if &caps[1] == " " {
            unchecked += 1;
        } else {
            checked += 1;
        }
    }
    let visible = checked + unchecked;
    visible >= CHECKLIST_MIN_VISIBLE_ITEMS && unchecked <= CHECKLIST_MAX_UNCHECKED
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkflowKind;
    use serde_json::json;

    fn ctx() -> DetectionContext {
        DetectionContext {
            cycle: 1,
            kind: WorkflowKind::Spec,
        }
    }

    fn tool_result(content: Value) -> ParsedEvent {
        let line = json!({
            "event": "stream",
            "payload": {"content": [{"type": "tool_result", "content": content}]}
        });
        ParsedEvent::decode(&line.to_string())
    }

    fn text(text: &str) -> ParsedEvent {
        let line = json!({
            "event": "stream",
            "payload": {"content": [{"type": "text", "text": text}]}
        });
        ParsedEvent::decode(&line.to_string())
    }

    fn checklist(checked: usize, unchecked: usize) -> String {
        let mut out = String::from("# Tasks\n\n");
        for i in 0..checked {
            out.push_str(&format!("- [x] {}. done task\n", i + 1));
        }
        for i in 0..unchecked {
            out.push_str(&format!("- [ ] {}. open task\n", checked + i + 1));
        }
        out
    }

    #[test]
    fn test_structured_progress_complete() {
        let detector = SpecWorkflowDetector::new();
        let status = json!({
            "taskProgress": {"total": 5, "completed": 5, "pending": 0},
            "overallStatus": "completed",
            "specName": "x"
        });
        assert!(detector.detect(&tool_result(status.clone()), &ctx()));
        assert!(detector.detect(&tool_result(json!(status.to_string())), &ctx()));
    }

    #[test]
    fn test_structured_progress_nested_under_data() {
        let detector = SpecWorkflowDetector::new();
        let status = json!({
            "success": true,
            "data": {"spec_name": "x", "task_progress": {"total": 3, "completed": 3}}
        });
        assert!(detector.detect(&tool_result(status), &ctx()));
    }

    #[test]
    fn test_structured_progress_incomplete() {
        let detector = SpecWorkflowDetector::new();
        let status = json!({
            "specName": "x",
            "taskProgress": {"total": 5, "completed": 4, "pending": 1},
            "overallStatus": "in-progress"
        });
        assert!(!detector.detect(&tool_result(status), &ctx()));

        let empty = json!({"specName": "x", "taskProgress": {"total": 0, "completed": 0}});
        assert!(!detector.detect(&tool_result(empty), &ctx()));
    }

    #[test]
    fn test_overall_status_alone_is_enough() {
        let detector = SpecWorkflowDetector::new();
        assert!(detector.detect(&tool_result(json!({"overallStatus": "completed"})), &ctx()));
    }

    #[test]
    fn test_bare_counters_without_spec_field_are_ignored() {
        let detector = SpecWorkflowDetector::new();
        let counters = json!({"total": 5, "completed": 5, "pending": 0});
        assert!(!detector.detect(&tool_result(counters), &ctx()));
        let nested = json!({"data": {"total": 5, "completed": 5, "pending": 0}});
        assert!(!detector.detect(&tool_result(nested), &ctx()));
    }

    #[test]
    fn test_spec_object_blocks_checklist_fallback() {
        let detector = SpecWorkflowDetector::new();
        let status = json!({
            "specName": "x",
            "overallStatus": "in-progress",
            "tasks": checklist(12, 0)
        });
        assert!(!detector.detect(&tool_result(status), &ctx()));
    }

    #[test]
    fn test_phrases_in_text() {
        let detector = SpecWorkflowDetector::new();
        assert!(detector.detect(&text("All tasks are now complete for user-auth."), &ctx()));
        assert!(detector.detect(&text("Progress: 0 pending, 7 completed"), &ctx()));
        assert!(!detector.detect(&text("Progress: 10 pending, 7 completed"), &ctx()));
        assert!(!detector.detect(&text("Starting task 3 of the spec"), &ctx()));
    }

    #[test]
    fn test_phrases_in_result_message() {
        let detector = SpecWorkflowDetector::new();
        let event = ParsedEvent::decode(
            r#"{"event":"stream","payload":{"content":[
                {"type":"result","result":"Spec implementation complete."}
            ]}}"#,
        );
        assert!(detector.detect(&event, &ctx()));
    }

    #[test]
    fn test_numeric_task_counts() {
        let detector = SpecWorkflowDetector::new();
        assert!(detector.detect(&text("12/12 tasks completed"), &ctx()));
        assert!(detector.detect(&text("Now 8 of 8 tasks complete."), &ctx()));
        assert!(!detector.detect(&text("7/12 tasks completed"), &ctx()));
        assert!(!detector.detect(&text("0/0 tasks completed"), &ctx()));
        assert!(!detector.detect(&text("2 of 12 tasks done"), &ctx()));
    }

    #[test]
    fn test_checklist_fallback_threshold() {
        let detector = SpecWorkflowDetector::new();
        let enough = tool_result(json!(checklist(CHECKLIST_MIN_VISIBLE_ITEMS, 0)));
        let too_few = tool_result(json!(checklist(CHECKLIST_MIN_VISIBLE_ITEMS - 1, 0)));
        assert!(detector.detect(&enough, &ctx()));
        assert!(!detector.detect(&too_few, &ctx()));
        assert!(!detector.detect(&tool_result(json!(checklist(14, 1))), &ctx()));
    }

    #[test]
    fn test_checklist_in_plain_text_is_ignored() {
        let detector = SpecWorkflowDetector::new();
        assert!(!detector.detect(&text(&checklist(12, 0)), &ctx()));
    }
}
