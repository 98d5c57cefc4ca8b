//! Completion detectors.
//!
//! A detector classifies a single decoded event as "the objective is done" or
//! not. Detectors are pure: the same event and context always give the same
//! answer, and nothing is remembered between calls. The processor runs them in
//! order and stops at the first match.

mod command;
mod spec_workflow;
mod text;
mod tool_result;

pub use command::CommandPatternDetector;
pub use spec_workflow::{CHECKLIST_MIN_VISIBLE_ITEMS, SpecWorkflowDetector};
pub use text::TextPatternDetector;
pub use tool_result::ToolResultDetector;

use crate::config::WorkflowKind;
use taskloop_proto::ParsedEvent;

/// What a detector knows about the cycle an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionContext {
    /// 1-based cycle number.
    pub cycle: u32,
    pub kind: WorkflowKind,
}

/// Classifies one event as signaling completion.
pub trait CompletionDetector: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Returns true when `event` shows the objective has been reached.
    ///
    /// Must not fail: undecodable input is a non-match.
    fn detect(&self, event: &ParsedEvent, ctx: &DetectionContext) -> bool;
}

/// Case-sensitive substring search with a numeric boundary rule.
///
/// Callers fold case beforehand. A phrase that starts with a digit only
/// matches where the preceding character is not a digit, so "0 failed" is
/// found in "0 failed" and "passed, 0 failed" but not in "10 failed".
pub(crate) fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    let starts_with_digit = phrase.starts_with(|c: char| c.is_ascii_digit());
    if !starts_with_digit {
        return haystack.contains(phrase);
    }
    haystack.match_indices(phrase).any(|(idx, _)| {
        !haystack[..idx]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_digit())
    })
}
