//! Terminal output for the end of a run.

use std::time::Duration;
use taskloop_core::{Config, ExecutionResult, TerminationReason};

/// ANSI color codes for terminal output.
pub mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const RED: &str = "\x1b[31m";
    pub const CYAN: &str = "\x1b[36m";
}

/// Run length for the summary: milliseconds below a second, tenths below a
/// minute, then two units with the smaller one zero-padded.
pub fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    match secs {
        0 => format!("{}ms", d.subsec_millis()),
        1..60 => format!("{:.1}s", d.as_secs_f64()),
        60..3600 => format!("{}m {:02}s", secs / 60, secs % 60),
        _ => format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60),
    }
}

fn reason_style(reason: TerminationReason) -> (&'static str, &'static str) {
    use colors::*;
    match reason {
        TerminationReason::Completed => (GREEN, "Task completed"),
        TerminationReason::MaxCycles => (YELLOW, "Maximum cycles reached"),
        TerminationReason::Cancelled => (YELLOW, "Cancelled"),
        TerminationReason::SessionStartFailed => (RED, "Agent session failed to start"),
        TerminationReason::PromptSendFailed => (RED, "Prompt could not be delivered"),
    }
}

/// Builds the boxed summary printed after a run.
pub fn render_summary(result: &ExecutionResult, config: &Config, use_colors: bool) -> String {
    use colors::*;

    let (color, label) = reason_style(result.reason);
    let separator = "-".repeat(58);
    let (bold, reset, color, cyan) = if use_colors {
        (BOLD, RESET, color, CYAN)
    } else {
        ("", "", "", "")
    };

    let mut out = String::new();
    out.push_str(&format!("\n{bold}+{separator}+{reset}\n"));
    out.push_str(&format!(
        "{bold}|{reset} {color}{bold}{label}{reset} ({})\n",
        config.kind()
    ));
    out.push_str(&format!("{bold}+{separator}+{reset}\n"));
    out.push_str(&format!(
        "{bold}|{reset}   Cycles:   {cyan}{}/{}{reset}\n",
        result.cycle,
        config.max_cycles()
    ));
    out.push_str(&format!(
        "{bold}|{reset}   Elapsed:  {cyan}{}{reset}\n",
        format_elapsed(result.elapsed)
    ));
    out.push_str(&format!(
        "{bold}|{reset}   Target:   {}\n",
        config.target_dir().display()
    ));
    out.push_str(&format!(
        "{bold}|{reset}   Exit:     {}\n",
        result.reason.exit_code()
    ));
    out.push_str(&format!("{bold}+{separator}+{reset}"));
    out
}

pub fn print_summary(result: &ExecutionResult, config: &Config, use_colors: bool) {
    println!("{}", render_summary(result, config, use_colors));
}

/// Prints the result as a single JSON object.
pub fn print_json(result: &ExecutionResult) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(result)?);
    Ok(())
}
