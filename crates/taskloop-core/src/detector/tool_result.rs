use super::{CompletionDetector, DetectionContext, contains_phrase};
use serde_json::Value;
use taskloop_proto::{ParsedEvent, flatten_text};
use tracing::debug;

/// Inspects tool results for a structured "done" flag, falling back to
/// literal phrases in the result text.
///
/// A result decoding to an object with `success: true` and `completed: true`
/// matches outright.
#[derive(Debug, Clone)]
pub struct ToolResultDetector {
    patterns: Vec<String>,
}

impl ToolResultDetector {
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let patterns = patterns
            .into_iter()
            .map(Into::<String>::into)
            .filter(|p| !p.is_empty())
            .map(|p| p.to_lowercase())
            .collect();
        Self { patterns }
    }

    fn structured_done(content: &Value) -> bool {
        let Some(obj) = as_json_object(content) else {
            return false;
        };
        let flag = |key: &str| obj.get(key).and_then(Value::as_bool) == Some(true);
        flag("success") && flag("completed")
    }

    fn text_matches(&self, content: &Value) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let text = flatten_text(content).to_lowercase();
        self.patterns.iter().any(|p| contains_phrase(&text, p))
    }
}

impl CompletionDetector for ToolResultDetector {
    fn name(&self) -> &str {
        "tool_result"
    }

    fn detect(&self, event: &ParsedEvent, ctx: &DetectionContext) -> bool {
        event.tool_results().any(|content| {
            if Self::structured_done(content) {
                debug!(cycle = ctx.cycle, "Tool result reported success and completion");
                return true;
            }
            self.text_matches(content)
        })
    }
}

/// Decodes tool-result content into a JSON object when it holds one.
///
/// Objects pass through; strings and text-block arrays are parsed. Anything
/// that does not parse to an object yields `None`.
pub(crate) fn as_json_object(content: &Value) -> Option<serde_json::Map<String, Value>> {
    match content {
        Value::Object(obj) => Some(obj.clone()),
        Value::String(_) | Value::Array(_) => {
            let text = flatten_text(content);
            let trimmed = text.trim();
            if !trimmed.starts_with('{') {
                return None;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::Object(obj)) => Some(obj),
                Ok(_) => None,
                Err(e) => {
                    debug!(error = %e, "Tool result looked like JSON but did not decode");
                    None
                }
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkflowKind;
    use serde_json::json;

    fn ctx() -> DetectionContext {
        DetectionContext {
            cycle: 1,
            kind: WorkflowKind::TestFix,
        }
    }

    fn tool_result(content: Value) -> ParsedEvent {
        let line = json!({
            "event": "stream",
            "payload": {"content": [{"type": "tool_result", "content": content}]}
        });
        ParsedEvent::decode(&line.to_string())
    }

    #[test]
    fn test_structured_success_and_completed() {
        let detector = ToolResultDetector::new(Vec::<String>::new());
        assert!(detector.detect(&tool_result(json!({"success": true, "completed": true})), &ctx()));
        assert!(detector.detect(
            &tool_result(json!(r#"{"success": true, "completed": true, "detail": "ok"}"#)),
            &ctx()
        ));
        let unfinished = tool_result(json!({"success": true, "completed": false}));
        assert!(!detector.detect(&unfinished, &ctx()));
        assert!(!detector.detect(&tool_result(json!({"success": true})), &ctx()));
        let stringly = tool_result(json!({"success": "true", "completed": "true"}));
        assert!(!detector.detect(&stringly, &ctx()));
    }

    #[test]
    fn test_text_fallback_uses_patterns() {
        let detector = ToolResultDetector::new(["All Tests Passed"]);
        assert!(detector.detect(&tool_result(json!("Summary: all tests passed (12)")), &ctx()));
        assert!(!detector.detect(&tool_result(json!("3 tests failed")), &ctx()));
    }

    #[test]
    fn test_malformed_json_falls_back_to_text() {
        let detector = ToolResultDetector::new(["all tests passed"]);
        assert!(detector.detect(&tool_result(json!("{not json, but all tests passed")), &ctx()));
        assert!(!detector.detect(&tool_result(json!("{\"success\": tru")), &ctx()));
    }

    #[test]
    fn test_events_without_tool_results() {
        let detector = ToolResultDetector::new(["done"]);
        let text = ParsedEvent::decode(
            r#"{"event":"stream","payload":{"content":[{"type":"text","text":"done"}]}}"#,
        );
        assert!(!detector.detect(&text, &ctx()));
        assert!(!detector.detect(&ParsedEvent::Ready, &ctx()));
    }
}
