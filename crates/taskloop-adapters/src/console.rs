//! Plain-text rendering of agent output for a terminal.

use std::io::{self, Write};
use taskloop_core::{StreamHandler, format_tool_summary, truncate};

/// Writes agent output as it streams in.
///
/// Text goes out unchanged; tool calls, results and lifecycle events get a
/// bracketed prefix on their own line. Errors are also copied to stderr.
pub struct ConsoleStreamHandler<W: Write + Send = io::Stdout> {
    verbose: bool,
    out: W,
    /// Tracks whether last output ended with a newline
    last_was_newline: bool,
}

impl ConsoleStreamHandler<io::Stdout> {
    /// Creates a handler writing to stdout. `verbose` adds tool results and
    /// lifecycle events.
    pub fn new(verbose: bool) -> Self {
        Self::with_writer(io::stdout(), verbose)
    }
}

impl<W: Write + Send> ConsoleStreamHandler<W> {
    pub fn with_writer(out: W, verbose: bool) -> Self {
        Self {
            verbose,
            out,
            last_was_newline: true,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn ensure_newline(&mut self) {
        if !self.last_was_newline {
            let _ = writeln!(self.out);
            self.last_was_newline = true;
        }
    }

    fn line(&mut self, line: &str) {
        self.ensure_newline();
        let _ = writeln!(self.out, "{line}");
        let _ = self.out.flush();
    }
}

impl<W: Write + Send> StreamHandler for ConsoleStreamHandler<W> {
    fn on_text(&mut self, text: &str) {
        let _ = write!(self.out, "{}", text);
        let _ = self.out.flush();
        self.last_was_newline = text.ends_with('\n');
    }

    fn on_tool_call(&mut self, name: &str, _id: &str, input: &serde_json::Value) {
        match format_tool_summary(name, input) {
            Some(summary) => self.line(&format!("[Tool] {}: {}", name, summary)),
            None => self.line(&format!("[Tool] {}", name)),
        }
    }

    fn on_tool_result(&mut self, _id: &str, output: &str) {
        if self.verbose {
            self.line(&format!("[Result] {}", truncate(output, 200)));
        }
    }

    fn on_error(&mut self, error: &str) {
        self.line(&format!("[Error] {}", error));
        let _ = writeln!(io::stderr(), "[Error] {}", error);
    }

    fn on_lifecycle(&mut self, event: &str, detail: &str) {
        if !self.verbose {
            return;
        }
        if detail.is_empty() {
            self.line(&format!("[{event}]"));
        } else {
            self.line(&format!("[{event}] {detail}"));
        }
    }
}
