//! Events emitted by the agent process.
//!
//! The agent writes one JSON object per stdout line. Decoding is total: any
//! line that is not a well-formed event object becomes
//! [`ParsedEvent::ParseError`] instead of an error, so a single garbage line
//! can never interrupt monitoring.

use serde::Serialize;
use serde_json::{Map, Value};

/// A decoded line of agent output.
///
/// Serializes back to the wire shape (`{"event": "<name>", ...}`) so the
/// transcript can store exactly what was understood.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ParsedEvent {
    /// Handshake: the agent is ready to receive a prompt.
    Ready,

    /// Streamed progress for the current run.
    Stream { payload: StreamPayload },

    /// A run began.
    RunStarted {
        #[serde(skip_serializing_if = "Option::is_none")]
        run_id: Option<String>,
    },

    /// A run finished normally.
    RunCompleted {
        #[serde(skip_serializing_if = "Option::is_none")]
        run_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        outcome: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// A run failed.
    RunFailed {
        #[serde(skip_serializing_if = "Option::is_none")]
        run_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// A run was cancelled by the agent.
    RunCancelled {
        #[serde(skip_serializing_if = "Option::is_none")]
        run_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Agent state change (e.g. `"idle"`, `"running"`).
    State { state: String },

    /// The agent acknowledged a shutdown command.
    Shutdown,

    /// The agent shut itself down (e.g. `exit_on_complete`).
    AutoShutdown {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Well-formed event object with a name this client does not know.
    Unknown { name: String, raw: Value },

    /// The line was not a well-formed event object.
    ParseError { raw: String },
}

/// Payload of a `stream` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamPayload {
    pub content: Vec<ContentItem>,
}

/// One item of streamed content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    /// Assistant text.
    Text { text: String },

    /// The agent invoked a tool.
    ToolUse {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        name: String,
        input: Value,
    },

    /// A tool returned. `content` is kept as-is: string, block array or object.
    ToolResult {
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<String>,
        content: Value,
        is_error: bool,
    },

    /// A message or final result record.
    Message {
        #[serde(skip_serializing_if = "Option::is_none")]
        role: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        subtype: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        is_error: bool,
    },

    /// Any other item type, preserved raw.
    Unknown { raw: Value },
}

impl ParsedEvent {
    /// Decodes one line of agent output. Never fails.
    pub fn decode(line: &str) -> Self {
        let parse_error = || ParsedEvent::ParseError {
            raw: line.to_string(),
        };

        let value: Value = match serde_json::from_str(line.trim()) {
            Ok(value) => value,
            Err(_) => return parse_error(),
        };
        let Some(obj) = value.as_object() else {
            return parse_error();
        };
        let Some(name) = obj.get("event").and_then(Value::as_str) else {
            return parse_error();
        };

        match name {
            "ready" => ParsedEvent::Ready,
            "stream" => ParsedEvent::Stream {
                payload: StreamPayload::from_value(obj.get("payload")),
            },
            "run_started" => ParsedEvent::RunStarted {
                run_id: run_id(obj),
            },
            "run_completed" => ParsedEvent::RunCompleted {
                run_id: run_id(obj),
                outcome: str_field(obj, "outcome"),
                reason: str_field(obj, "reason"),
            },
            "run_failed" => ParsedEvent::RunFailed {
                run_id: run_id(obj),
                error: str_field(obj, "error"),
            },
            "run_cancelled" => ParsedEvent::RunCancelled {
                run_id: run_id(obj),
                reason: str_field(obj, "reason"),
            },
            "state" => ParsedEvent::State {
                state: str_field(obj, "state").unwrap_or_default(),
            },
            "shutdown" => ParsedEvent::Shutdown,
            "auto_shutdown" => ParsedEvent::AutoShutdown {
                reason: str_field(obj, "reason"),
            },
            other => ParsedEvent::Unknown {
                name: other.to_string(),
                raw: value.clone(),
            },
        }
    }

    /// Returns the wire name of this event.
    pub fn name(&self) -> &str {
        match self {
            ParsedEvent::Ready => "ready",
            ParsedEvent::Stream { .. } => "stream",
            ParsedEvent::RunStarted { .. } => "run_started",
            ParsedEvent::RunCompleted { .. } => "run_completed",
            ParsedEvent::RunFailed { .. } => "run_failed",
            ParsedEvent::RunCancelled { .. } => "run_cancelled",
            ParsedEvent::State { .. } => "state",
            ParsedEvent::Shutdown => "shutdown",
            ParsedEvent::AutoShutdown { .. } => "auto_shutdown",
            ParsedEvent::Unknown { name, .. } => name,
            ParsedEvent::ParseError { .. } => "parse_error",
        }
    }

    /// True for lifecycle events after which the agent will produce no more
    /// output for the current run.
    pub fn is_terminal(&self) -> bool {
        match self {
            ParsedEvent::RunCompleted { .. }
            | ParsedEvent::RunFailed { .. }
            | ParsedEvent::RunCancelled { .. }
            | ParsedEvent::AutoShutdown { .. }
            | ParsedEvent::Shutdown => true,
            ParsedEvent::State { state } => state == "idle",
            _ => false,
        }
    }

    pub fn is_parse_error(&self) -> bool {
        matches!(self, ParsedEvent::ParseError { .. })
    }

    /// Content items of a `stream` event; empty for every other event.
    pub fn content(&self) -> &[ContentItem] {
        match self {
            ParsedEvent::Stream { payload } => &payload.content,
            _ => &[],
        }
    }

    /// Iterates the text of every `text` item.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.content().iter().filter_map(|item| match item {
            ContentItem::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// Iterates the raw content of every `tool_result` item.
    pub fn tool_results(&self) -> impl Iterator<Item = &Value> {
        self.content().iter().filter_map(|item| match item {
            ContentItem::ToolResult { content, .. } => Some(content),
            _ => None,
        })
    }

    /// Iterates the textual `result` field of every `message` item.
    pub fn message_results(&self) -> impl Iterator<Item = &str> {
        self.content().iter().filter_map(|item| match item {
            ContentItem::Message {
                result: Some(result),
                ..
            } => Some(result.as_str()),
            _ => None,
        })
    }
}

impl StreamPayload {
    /// Extracts content items from a payload value.
    ///
    /// Accepts `{"content": [...]}`, `{"message": {"content": [...]}}` and a
    /// bare string `content`. A payload without content that is itself a
    /// result (a `message`/`result` type or a string `result`) becomes one
    /// message item. Anything else yields an empty payload.
    fn from_value(payload: Option<&Value>) -> Self {
        let Some(payload) = payload else {
            return Self::default();
        };

        let content = payload
            .get("content")
            .or_else(|| payload.get("message").and_then(|m| m.get("content")));

        let content = match content {
            Some(Value::Array(items)) => items.iter().map(ContentItem::from_value).collect(),
            Some(Value::String(text)) => vec![ContentItem::Text { text: text.clone() }],
            _ => payload
                .as_object()
                .filter(|obj| is_result_shaped(obj))
                .map(ContentItem::message)
                .into_iter()
                .collect(),
        };

        Self { content }
    }
}

impl ContentItem {
    /// Decodes one content item. Unrecognized shapes become `Unknown`.
    pub fn from_value(value: &Value) -> Self {
        let unknown = || ContentItem::Unknown { raw: value.clone() };
        let Some(obj) = value.as_object() else {
            return unknown();
        };

        let kind = obj.get("type").and_then(Value::as_str);
        match kind {
            Some("text") | None => match obj.get("text").and_then(Value::as_str) {
                Some(text) => ContentItem::Text {
                    text: text.to_string(),
                },
                None => unknown(),
            },
            Some("tool_use" | "tool_call" | "tool_invocation") => ContentItem::ToolUse {
                id: str_field(obj, "id"),
                name: str_field(obj, "name").unwrap_or_else(|| "unknown".to_string()),
                input: obj.get("input").cloned().unwrap_or(Value::Null),
            },
            Some("tool_result") => ContentItem::ToolResult {
                tool_use_id: str_field(obj, "tool_use_id"),
                content: obj.get("content").cloned().unwrap_or(Value::Null),
                is_error: bool_field(obj, "is_error"),
            },
            Some("message" | "result") => ContentItem::message(obj),
            Some(_) => unknown(),
        }
    }

    fn message(obj: &Map<String, Value>) -> Self {
        ContentItem::Message {
            role: str_field(obj, "role"),
            subtype: str_field(obj, "subtype"),
            text: obj
                .get("content")
                .map(flatten_text)
                .filter(|text| !text.is_empty()),
            result: str_field(obj, "result"),
            is_error: bool_field(obj, "is_error"),
        }
    }
}

fn is_result_shaped(obj: &Map<String, Value>) -> bool {
    let typed = matches!(
        obj.get("type").and_then(Value::as_str),
        Some("message" | "result")
    );
    typed || obj.get("result").is_some_and(Value::is_string)
}

/// Flattens tool-result style content into plain text.
///
/// Strings pass through, block arrays join their `text` fields with newlines,
/// objects with a `text` field yield it, other objects are re-serialized.
pub fn flatten_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other
                    .get("text")
                    .and_then(Value::as_str)
                    .map_or_else(|| other.to_string(), ToString::to_string),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(obj) => match obj.get("text").and_then(Value::as_str) {
            Some(text) => text.to_string(),
            None => value.to_string(),
        },
        other => other.to_string(),
    }
}

fn str_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(ToString::to_string)
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn run_id(obj: &Map<String, Value>) -> Option<String> {
    str_field(obj, "run_id").or_else(|| str_field(obj, "runId"))
}
