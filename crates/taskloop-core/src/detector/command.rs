use super::{CompletionDetector, DetectionContext, contains_phrase};
use crate::config::WorkflowKind;
use crate::patterns::{COMMAND_FAILURE_MARKERS, command_category, default_command_categories};
use std::collections::BTreeMap;
use taskloop_proto::{ParsedEvent, flatten_text};
use tracing::debug;

/// Recognizes success output of test, build and type-check tools.
///
/// Scans tool-result contents and `message` results. When the workflow kind
/// has its own category only that category is checked; otherwise categories
/// are checked in key order and the first matching phrase wins. Output that
/// also carries a failure marker never matches.
#[derive(Debug, Clone)]
pub struct CommandPatternDetector {
    categories: Vec<(String, Vec<String>)>,
    failure_markers: Vec<String>,
}

impl CommandPatternDetector {
    pub fn new(categories: BTreeMap<String, Vec<String>>) -> Self {
        let categories = categories
            .into_iter()
            .map(|(category, phrases)| {
                let phrases = phrases
                    .into_iter()
                    .filter(|p| !p.is_empty())
                    .map(|p| p.to_lowercase())
                    .collect();
                (category, phrases)
            })
            .collect();
        Self {
            categories,
            failure_markers: COMMAND_FAILURE_MARKERS
                .iter()
                .map(|m| (*m).to_string())
                .collect(),
        }
    }

    /// Detector over the built-in `test`, `build` and `typecheck` tables.
    pub fn with_defaults() -> Self {
        Self::new(default_command_categories())
    }

    fn categories_for(
        &self,
        kind: WorkflowKind,
    ) -> impl Iterator<Item = &(String, Vec<String>)> {
        let own = command_category(kind)
            .filter(|own| self.categories.iter().any(|(category, _)| category == own));
        self.categories
            .iter()
            .filter(move |(category, _)| own.is_none_or(|own| category == own))
    }

    fn matching_category(&self, text: &str, kind: WorkflowKind) -> Option<(&str, &str)> {
        let folded = text.to_lowercase();
        let matched = self.categories_for(kind).find_map(|(category, phrases)| {
            phrases
                .iter()
                .find(|phrase| contains_phrase(&folded, phrase))
                .map(|phrase| (category.as_str(), phrase.as_str()))
        })?;

        let failure = self
            .failure_markers
            .iter()
            .find(|m| folded.contains(m.as_str()));
        if let Some(marker) = failure {
            debug!(phrase = matched.1, %marker, "Success phrase vetoed by failure output");
            return None;
        }
        Some(matched)
    }
}

impl Default for CommandPatternDetector {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl CompletionDetector for CommandPatternDetector {
    fn name(&self) -> &str {
        "command_pattern"
    }

    fn detect(&self, event: &ParsedEvent, ctx: &DetectionContext) -> bool {
        let tool_outputs = event.tool_results().map(flatten_text);
        let results = event.message_results().map(ToString::to_string);

        for text in tool_outputs.chain(results) {
            if let Some((category, phrase)) = self.matching_category(&text, ctx.kind) {
                debug!(cycle = ctx.cycle, category, phrase, "Command success output matched");
                return true;
            }
        }
        false
    }
}
