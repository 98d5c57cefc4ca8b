//! Stream handler trait and text helpers for rendering agent output.
//!
//! The `StreamHandler` trait abstracts over how decoded agent output is shown,
//! so the processor can feed a console, a test recorder, or nothing at all.

/// Receives human-readable fragments of agent output as they arrive.
pub trait StreamHandler: Send {
    /// Called when the agent emits text.
    fn on_text(&mut self, text: &str);

    /// Called when the agent invokes a tool.
    ///
    /// # Arguments
    /// * `name` - Tool name (e.g., "Read", "Bash", "Grep")
    /// * `id` - Tool invocation ID, empty when the agent did not send one
    /// * `input` - Tool input parameters as JSON
    fn on_tool_call(&mut self, name: &str, id: &str, input: &serde_json::Value);

    /// Called when a tool returns.
    fn on_tool_result(&mut self, id: &str, output: &str);

    /// Called for failed runs and failed tool results.
    fn on_error(&mut self, error: &str);

    /// Called for run lifecycle events (run started, state changes, ...).
    fn on_lifecycle(&mut self, event: &str, detail: &str);
}

/// Discards all output (the default for library use).
pub struct QuietStreamHandler;

impl StreamHandler for QuietStreamHandler {
    fn on_text(&mut self, _: &str) {}
    fn on_tool_call(&mut self, _: &str, _: &str, _: &serde_json::Value) {}
    fn on_tool_result(&mut self, _: &str, _: &str) {}
    fn on_error(&mut self, _: &str) {}
    fn on_lifecycle(&mut self, _: &str, _: &str) {}
}

/// Extracts the most relevant field from tool input for display.
///
/// Returns a short summary (file path, command, pattern, etc.) based on the
/// tool name, or `None` for unknown tools and missing fields.
pub fn format_tool_summary(name: &str, input: &serde_json::Value) -> Option<String> {
    match name {
        "Read" | "Edit" | "MultiEdit" | "Write" => {
            input.get("file_path")?.as_str().map(ToString::to_string)
        }
        "Bash" => {
            let cmd = input.get("command")?.as_str()?;
            Some(truncate(cmd, 60))
        }
        "Grep" | "Glob" => input.get("pattern")?.as_str().map(ToString::to_string),
        "Task" => input.get("description")?.as_str().map(ToString::to_string),
        "WebFetch" => input.get("url")?.as_str().map(ToString::to_string),
        "WebSearch" => input.get("query")?.as_str().map(ToString::to_string),
        "TodoWrite" => Some("updating todo list".to_string()),
        other if other.starts_with("mcp__") => {
            // MCP tools: show the spec or task they operate on when present
            ["specName", "spec_name", "taskId", "path"]
                .iter()
                .find_map(|key| input.get(*key).and_then(|v| v.as_str()))
                .map(ToString::to_string)
        }
        _ => None,
    }
}

/// Truncates a string to `max_len` characters, adding "..." if truncated.
///
/// Cuts on a character boundary, never inside a multi-byte sequence.
pub fn truncate(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        None => s.to_string(),
        Some((byte_idx, _)) => format!("{}...", &s[..byte_idx]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quiet_handler_is_silent() {
        let mut handler = QuietStreamHandler;
        handler.on_text("Hello");
        handler.on_tool_call("Read", "tool_1", &json!({}));
        handler.on_tool_result("tool_1", "output");
        handler.on_error("Something went wrong");
        handler.on_lifecycle("run_started", "r-1");
    }

    #[test]
    fn test_truncate_helper() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
        assert_eq!(truncate("this is a long string", 10), "this is a ...");
    }

    #[test]
    fn test_truncate_utf8_boundaries() {
        let with_arrows = "→→→→→→→→→→";
        assert_eq!(truncate(with_arrows, 5), "→→→→→...");

        let mixed = "a→b→c→d→e";
        assert_eq!(truncate(mixed, 5), "a→b→c...");

        let emoji = "🎉🎊🎁🎈🎄";
        assert_eq!(truncate(emoji, 3), "🎉🎊🎁...");
    }

    #[test]
    fn test_format_tool_summary_file_and_search_tools() {
        assert_eq!(
            format_tool_summary("Read", &json!({"file_path": "src/main.rs"})),
            Some("src/main.rs".to_string())
        );
        assert_eq!(
            format_tool_summary("Grep", &json!({"pattern": "TODO"})),
            Some("TODO".to_string())
        );
        assert_eq!(
            format_tool_summary("TodoWrite", &json!({"todos": []})),
            Some("updating todo list".to_string())
        );
    }

    #[test]
    fn test_format_tool_summary_bash_truncates() {
        let long_cmd = json!({
            "command": "cargo test --workspace --all-features -- --nocapture --test-threads=1 extra"
        });
        let result = format_tool_summary("Bash", &long_cmd).unwrap();
        assert!(result.ends_with("..."));
        assert_eq!(result.chars().count(), 63);
    }

    #[test]
    fn test_format_tool_summary_mcp_tools() {
        assert_eq!(
            format_tool_summary(
                "mcp__spec-workflow__manage-tasks",
                &json!({"specName": "user-auth", "action": "list"})
            ),
            Some("user-auth".to_string())
        );
        assert_eq!(format_tool_summary("mcp__other__tool", &json!({})), None);
    }

    #[test]
    fn test_format_tool_summary_unknown_or_incomplete() {
        assert_eq!(format_tool_summary("UnknownTool", &json!({"x": 1})), None);
        assert_eq!(format_tool_summary("Read", &json!({"wrong_field": "v"})), None);
        assert_eq!(format_tool_summary("Bash", &json!({})), None);
    }
}
