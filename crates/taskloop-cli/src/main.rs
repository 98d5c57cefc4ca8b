//! # taskloop
//!
//! Runs a coding agent over a task in repeated sessions until the agent's
//! output shows the task is done or the cycle budget runs out.

mod display;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{IsTerminal, stdout};
use std::path::PathBuf;
use taskloop_adapters::{ConsoleStreamHandler, ProcessLauncher};
use taskloop_core::{
    CancelHandle, Config, ConfigOptions, DebugOptions, Engine, QuietStreamHandler,
    StreamHandler, WorkflowKind, cancel_pair,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Color output mode for terminal display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum ColorMode {
    /// Automatically detect if stdout is a TTY
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn should_use_colors(self) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => stdout().is_terminal(),
        }
    }
}

/// Verbosity level for streaming output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Verbosity {
    /// No agent output at all
    Quiet,
    /// Agent text and tool calls
    #[default]
    Normal,
    /// Also tool results and run lifecycle events
    Verbose,
}

impl Verbosity {
    /// CLI flags win over `TASKLOOP_QUIET` / `TASKLOOP_VERBOSE`.
    fn resolve(cli_verbose: bool, cli_quiet: bool) -> Self {
        if cli_quiet {
            return Verbosity::Quiet;
        }
        if cli_verbose {
            return Verbosity::Verbose;
        }
        if std::env::var("TASKLOOP_QUIET").is_ok() {
            return Verbosity::Quiet;
        }
        if std::env::var("TASKLOOP_VERBOSE").is_ok() {
            return Verbosity::Verbose;
        }
        Verbosity::Normal
    }
}

#[derive(Parser, Debug)]
#[command(name = "taskloop", version, about = "Cycle a coding agent over a task until it is done")]
struct Cli {
    /// Workflow: spec, test-fix, type-fix or build-fix
    kind: WorkflowKind,

    /// Project directory (defaults to the current directory)
    dir: Option<PathBuf>,

    /// Spec name under .spec-workflow/specs (spec workflow only)
    #[arg(long, value_name = "NAME")]
    spec: Option<String>,

    /// Maximum number of agent sessions
    #[arg(long, value_name = "N")]
    max_cycles: Option<u32>,

    /// Per-session timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Test command (detected from the project when omitted)
    #[arg(long, value_name = "CMD")]
    test_cmd: Option<String>,

    /// Type check command
    #[arg(long, value_name = "CMD")]
    type_cmd: Option<String>,

    /// Build command
    #[arg(long, value_name = "CMD")]
    build_cmd: Option<String>,

    /// Completion phrase; repeat to add more (replaces the workflow defaults)
    #[arg(long = "pattern", value_name = "TEXT")]
    patterns: Vec<String>,

    /// Append every agent event to this JSONL file
    #[arg(long, value_name = "PATH")]
    transcript: Option<PathBuf>,

    /// Agent program and arguments, one word per flag
    #[arg(long = "agent", value_name = "ARG", allow_hyphen_values = true)]
    agent: Vec<String>,

    /// Permission mode sent with each prompt
    #[arg(long, value_name = "MODE")]
    permission_mode: Option<String>,

    /// Extra environment variable for the agent
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// Show agent output fragments in full
    #[arg(long)]
    no_truncate: bool,

    /// Print the result as JSON instead of a summary
    #[arg(long)]
    json: bool,

    /// Show tool results, lifecycle events and debug logs
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress agent output
    #[arg(short, long)]
    quiet: bool,

    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    color: ColorMode,
}

fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

impl Cli {
    fn verbosity(&self) -> Verbosity {
        Verbosity::resolve(self.verbose, self.quiet)
    }

    /// Translates flags into engine options. Unset flags keep the defaults.
    fn config_options(&self) -> Result<ConfigOptions> {
        let dir = match &self.dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("cannot determine current directory")?,
        };

        let mut options = ConfigOptions::new(self.kind, dir);
        options.spec_name.clone_from(&self.spec);
        if let Some(n) = self.max_cycles {
            options.max_cycles = n;
        }
        if let Some(secs) = self.timeout {
            options.session_timeout_secs = secs;
        }
        options.commands.test.clone_from(&self.test_cmd);
        options.commands.type_check.clone_from(&self.type_cmd);
        options.commands.build.clone_from(&self.build_cmd);
        options.completion_patterns.clone_from(&self.patterns);
        options.transcript_path.clone_from(&self.transcript);
        if !self.agent.is_empty() {
            options.agent_command.clone_from(&self.agent);
        }
        if let Some(mode) = &self.permission_mode {
            options.permission_mode.clone_from(mode);
        }
        options.env.extend(self.env.iter().cloned());

        let verbose = self.verbosity() == Verbosity::Verbose;
        options.debug = Some(DebugOptions {
            raw_dump: verbose,
            show_lifecycle: verbose,
            truncate: !self.no_truncate,
            ..DebugOptions::default()
        });
        Ok(options)
    }

    fn stream_handler(&self) -> Box<dyn StreamHandler> {
        // JSON output owns stdout.
        if self.json {
            return Box::new(QuietStreamHandler);
        }
        match self.verbosity() {
            Verbosity::Quiet => Box::new(QuietStreamHandler),
            Verbosity::Normal => Box::new(ConsoleStreamHandler::new(false)),
            Verbosity::Verbose => Box::new(ConsoleStreamHandler::new(true)),
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Cancels the run on SIGINT, and on SIGTERM where available.
fn spawn_signal_listeners(handle: &CancelHandle) {
    let on_interrupt = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after cleanup");
            on_interrupt.cancel();
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let on_terminate = handle.clone();
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::spawn(async move {
                    sigterm.recv().await;
                    info!("SIGTERM received, stopping after cleanup");
                    on_terminate.cancel();
                });
            }
            Err(e) => warn!(error = %e, "Could not install SIGTERM handler"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbosity() == Verbosity::Verbose);

    let options = cli.config_options()?;
    let config = Config::from_options(options).context("invalid configuration")?;
    debug!(kind = %config.kind(), dir = %config.target_dir().display(), "Configuration loaded");

    let (handle, token) = cancel_pair();
    spawn_signal_listeners(&handle);

    let mut engine = Engine::new(config.clone(), Box::new(ProcessLauncher))
        .with_cancel_token(token)
        .with_stream_handler(cli.stream_handler());
    let result = engine.execute().await;

    if cli.json {
        display::print_json(&result)?;
    } else {
        display::print_summary(&result, &config, cli.color.should_use_colors());
    }

    std::process::exit(result.reason.exit_code());
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["taskloop"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_env_pair() {
        assert_eq!(
            parse_env_pair("A=b=c"),
            Ok(("A".to_string(), "b=c".to_string()))
        );
        assert_eq!(parse_env_pair("EMPTY="), Ok(("EMPTY".to_string(), String::new())));
        assert!(parse_env_pair("=x").is_err());
        assert!(parse_env_pair("novalue").is_err());
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!(Cli::try_parse_from(["taskloop", "lint-fix"]).is_err());
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["taskloop", "test-fix", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_flags_map_onto_options() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_str().unwrap();
        let cli = parse(&[
            "test-fix",
            path,
            "--max-cycles",
            "3",
            "--timeout",
            "60",
            "--test-cmd",
            "pytest -x",
            "--pattern",
            "green",
            "--pattern",
            "all good",
            "--agent",
            "agent-ipc",
            "--agent",
            "--stdio",
            "--env",
            "CI=1",
            "--no-truncate",
        ]);

        let options = cli.config_options().unwrap();
        assert_eq!(options.kind, WorkflowKind::TestFix);
        assert_eq!(options.max_cycles, 3);
        assert_eq!(options.session_timeout_secs, 60);
        assert_eq!(options.commands.test.as_deref(), Some("pytest -x"));
        assert_eq!(options.completion_patterns, vec!["green", "all good"]);
        assert_eq!(options.agent_command, vec!["agent-ipc", "--stdio"]);
        assert_eq!(options.env.get("CI").map(String::as_str), Some("1"));
        assert!(!options.debug.as_ref().unwrap().truncate);

        let config = Config::from_options(options).unwrap();
        assert_eq!(config.commands().test.as_deref(), Some("pytest -x"));
    }

    #[test]
    fn test_unset_flags_keep_defaults() {
        let dir = TempDir::new().unwrap();
        let cli = parse(&["spec", dir.path().to_str().unwrap(), "--spec", "billing"]);

        let options = cli.config_options().unwrap();
        let defaults = ConfigOptions::new(WorkflowKind::Spec, dir.path());
        assert_eq!(options.max_cycles, defaults.max_cycles);
        assert_eq!(options.agent_command, defaults.agent_command);
        assert_eq!(options.permission_mode, defaults.permission_mode);
        assert_eq!(options.spec_name.as_deref(), Some("billing"));
    }

    #[test]
    fn test_verbose_enables_lifecycle_output() {
        let dir = TempDir::new().unwrap();
        let cli = parse(&["build-fix", dir.path().to_str().unwrap(), "-v"]);
        let debug = cli.config_options().unwrap().debug.unwrap();
        assert!(debug.show_lifecycle);
        assert!(debug.raw_dump);
    }
}
