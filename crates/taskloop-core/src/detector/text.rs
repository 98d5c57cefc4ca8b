use super::{CompletionDetector, DetectionContext};
use taskloop_proto::ParsedEvent;

/// Matches literal phrases in the agent's streamed text.
///
/// Only `text` items of `stream` events are scanned. Tool output is left to
/// the command and tool-result detectors.
#[derive(Debug, Clone)]
pub struct TextPatternDetector {
    patterns: Vec<String>,
    case_sensitive: bool,
}

impl TextPatternDetector {
    /// Creates a detector. Empty patterns are dropped.
    pub fn new(
        patterns: impl IntoIterator<Item = impl Into<String>>,
        case_sensitive: bool,
    ) -> Self {
        let patterns = patterns
            .into_iter()
            .map(Into::<String>::into)
            .filter(|p| !p.is_empty())
            .map(|p| if case_sensitive { p } else { p.to_lowercase() })
            .collect();
        Self {
            patterns,
            case_sensitive,
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    fn matches(&self, text: &str) -> bool {
        if self.case_sensitive {
            self.patterns.iter().any(|p| text.contains(p.as_str()))
        } else {
            let folded = text.to_lowercase();
            self.patterns.iter().any(|p| folded.contains(p.as_str()))
        }
    }
}

impl CompletionDetector for TextPatternDetector {
    fn name(&self) -> &str {
        "text_pattern"
    }

    fn detect(&self, event: &ParsedEvent, _ctx: &DetectionContext) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        event.texts().any(|text| self.matches(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkflowKind;
    use proptest::prelude::*;
    use taskloop_proto::{ContentItem, StreamPayload};

    fn ctx() -> DetectionContext {
        DetectionContext {
            cycle: 1,
            kind: WorkflowKind::TestFix,
        }
    }

    fn text_event(text: &str) -> ParsedEvent {
        ParsedEvent::Stream {
            payload: StreamPayload {
                content: vec![ContentItem::Text {
                    text: text.to_string(),
                }],
            },
        }
    }

    #[test]
    fn test_case_insensitive_match() {
        let detector = TextPatternDetector::new(["All Tests Pass"], false);
        assert!(detector.detect(&text_event("Great news: all tests pass now."), &ctx()));
        assert!(!detector.detect(&text_event("2 tests still fail"), &ctx()));
    }

    #[test]
    fn test_case_sensitive_match() {
        let detector = TextPatternDetector::new(["DONE"], true);
        assert!(detector.detect(&text_event("TASK DONE"), &ctx()));
        assert!(!detector.detect(&text_event("task done"), &ctx()));
    }

    #[test]
    fn test_ignores_tool_results_and_lifecycle() {
        let detector = TextPatternDetector::new(["all tests pass"], false);
        let tool_result = ParsedEvent::decode(
            r#"{"event":"stream","payload":{"content":[
                {"type":"tool_result","content":"all tests pass"}
            ]}}"#,
        );
        assert!(!detector.detect(&tool_result, &ctx()));
        let completed =
            ParsedEvent::decode(r#"{"event":"run_completed","reason":"all tests pass"}"#);
        assert!(!detector.detect(&completed, &ctx()));
    }

    #[test]
    fn test_empty_patterns_never_match() {
        let detector = TextPatternDetector::new(["", ""], false);
        assert!(detector.patterns().is_empty());
        assert!(!detector.detect(&text_event("anything at all"), &ctx()));
    }

    #[test]
    fn test_any_text_item_can_match() {
        let event = ParsedEvent::decode(
            r#"{"event":"stream","payload":{"content":[
                {"type":"text","text":"running"},
                {"type":"text","text":"Build succeeded"}
            ]}}"#,
        );
        let detector = TextPatternDetector::new(["build succeeded"], false);
        assert!(detector.detect(&event, &ctx()));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Case-sensitive detection is exactly substring containment.
        #[test]
        fn prop_case_sensitive_is_substring(
            text in "[a-cA-C ]{0,24}",
            pattern in "[a-cA-C ]{1,4}",
        ) {
            let detector = TextPatternDetector::new([pattern.clone()], true);
            prop_assert_eq!(detector.detect(&text_event(&text), &ctx()), text.contains(&pattern));
        }

        /// Case-insensitive detection is substring containment after folding both sides.
        #[test]
        fn prop_case_insensitive_is_folded_substring(
            text in "[a-cA-C ]{0,24}",
            pattern in "[a-cA-C ]{1,4}",
        ) {
            let detector = TextPatternDetector::new([pattern.clone()], false);
            let expected = text.to_lowercase().contains(&pattern.to_lowercase());
            prop_assert_eq!(detector.detect(&text_event(&text), &ctx()), expected);
        }
    }
}
