//! Configuration for one taskloop execution.
//!
//! Callers describe an execution with [`ConfigOptions`] (plain, serde-friendly
//! input) and turn it into a validated, immutable [`Config`] with
//! [`Config::from_options`]. Validation fills in everything the caller left
//! out: project commands are detected from marker files, completion phrases
//! and debug toggles fall back to per-kind defaults.

use crate::patterns::default_completion_patterns;
use crate::project_detect::{detect_build_command, detect_test_command, detect_type_check_command};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// The objective a run works towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowKind {
    /// Implement the tasks of a named spec.
    Spec,
    /// Make the test suite pass.
    TestFix,
    /// Make the type checker pass.
    TypeFix,
    /// Make the build pass.
    BuildFix,
}

impl WorkflowKind {
    pub const ALL: [WorkflowKind; 4] = [
        WorkflowKind::Spec,
        WorkflowKind::TestFix,
        WorkflowKind::TypeFix,
        WorkflowKind::BuildFix,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::Spec => "spec",
            WorkflowKind::TestFix => "test-fix",
            WorkflowKind::TypeFix => "type-fix",
            WorkflowKind::BuildFix => "build-fix",
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkflowKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownWorkflowKind(s.to_string()))
    }
}

/// Shell commands the workflows ask the agent to run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCommands {
    #[serde(default)]
    pub test: Option<String>,
    #[serde(default)]
    pub type_check: Option<String>,
    #[serde(default)]
    pub build: Option<String>,
}

impl ProjectCommands {
    /// The command a workflow kind revolves around. `None` for spec runs.
    pub fn for_kind(&self, kind: WorkflowKind) -> Option<&str> {
        match kind {
            WorkflowKind::Spec => None,
            WorkflowKind::TestFix => self.test.as_deref(),
            WorkflowKind::TypeFix => self.type_check.as_deref(),
            WorkflowKind::BuildFix => self.build.as_deref(),
        }
    }
}

/// Toggles for the human-readable stream output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugOptions {
    /// Log every raw output line.
    #[serde(default)]
    pub raw_dump: bool,

    /// Include tool calls and tool results in the stream output.
    #[serde(default = "default_true")]
    pub show_tool_detail: bool,

    /// Include lifecycle events (run started, state changes) in the stream output.
    #[serde(default)]
    pub show_lifecycle: bool,

    /// Clip each output fragment to `truncate_length` characters.
    #[serde(default = "default_true")]
    pub truncate: bool,

    #[serde(default = "default_truncate_length")]
    pub truncate_length: usize,
}

fn default_true() -> bool {
    true
}

fn default_truncate_length() -> usize {
    500
}

impl Default for DebugOptions {
    fn default() -> Self {
        Self {
            raw_dump: false,
            show_tool_detail: true,
            show_lifecycle: false,
            truncate: true,
            truncate_length: default_truncate_length(),
        }
    }
}

/// Timeouts and intervals used by sessions and the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// How long to wait for the agent's `ready` event.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,

    /// How long to wait for a natural exit after the shutdown command.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// How long to wait after SIGTERM before killing the process group.
    #[serde(default = "default_terminate_grace_ms")]
    pub terminate_grace_ms: u64,

    /// Sleep between empty reads.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Pause between cycles. Zero is allowed.
    #[serde(default = "default_cycle_backoff_ms")]
    pub cycle_backoff_ms: u64,
}

fn default_handshake_timeout_ms() -> u64 {
    30_000
}

fn default_shutdown_grace_ms() -> u64 {
    10_000
}

fn default_terminate_grace_ms() -> u64 {
    5_000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_cycle_backoff_ms() -> u64 {
    2_000
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: default_handshake_timeout_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            terminate_grace_ms: default_terminate_grace_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            cycle_backoff_ms: default_cycle_backoff_ms(),
        }
    }
}

impl TimingConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn cycle_backoff(&self) -> Duration {
        Duration::from_millis(self.cycle_backoff_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("timing.handshake_timeout_ms", self.handshake_timeout_ms),
            ("timing.shutdown_grace_ms", self.shutdown_grace_ms),
            ("timing.terminate_grace_ms", self.terminate_grace_ms),
            ("timing.poll_interval_ms", self.poll_interval_ms),
        ];
        for (field, value) in required {
            if value == 0 {
                return Err(ConfigError::InvalidLimit { field });
            }
        }
        Ok(())
    }
}

/// Raw execution options as supplied by a caller.
///
/// Every field except `kind` and `target_dir` has a default, so the struct can
/// be deserialized from a sparse YAML/JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOptions {
    pub kind: WorkflowKind,

    pub target_dir: PathBuf,

    /// Spec to implement; required when `kind` is `spec`.
    #[serde(default)]
    pub spec_name: Option<String>,

    #[serde(default = "default_max_cycles")]
    pub max_cycles: u32,

    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,

    #[serde(default)]
    pub commands: ProjectCommands,

    /// Literal completion phrases. Empty means "use the kind defaults".
    #[serde(default)]
    pub completion_patterns: Vec<String>,

    /// Stream output toggles. `None` means "use the defaults".
    #[serde(default)]
    pub debug: Option<DebugOptions>,

    /// Extra environment variables for the agent process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Forward-compatible settings passed through untouched.
    #[serde(default)]
    pub extensions: BTreeMap<String, serde_json::Value>,

    /// Program and arguments of the agent process.
    #[serde(default = "default_agent_command")]
    pub agent_command: Vec<String>,

    #[serde(default = "default_permission_mode")]
    pub permission_mode: String,

    /// Append every decoded event to this JSONL file.
    #[serde(default)]
    pub transcript_path: Option<PathBuf>,

    #[serde(default)]
    pub timing: TimingConfig,
}

/// Default agent program; speaks the line-delimited JSON protocol on stdio.
pub const DEFAULT_AGENT_PROGRAM: &str = "agent-ipc";

/// Default permission mode sent with every prompt.
pub const DEFAULT_PERMISSION_MODE: &str = "bypassPermissions";

fn default_max_cycles() -> u32 {
    10
}

fn default_session_timeout_secs() -> u64 {
    1800 // 30 minutes
}

fn default_agent_command() -> Vec<String> {
    vec![DEFAULT_AGENT_PROGRAM.to_string()]
}

fn default_permission_mode() -> String {
    DEFAULT_PERMISSION_MODE.to_string()
}

impl ConfigOptions {
    /// Options with every optional field at its default.
    pub fn new(kind: WorkflowKind, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            target_dir: target_dir.into(),
            spec_name: None,
            max_cycles: default_max_cycles(),
            session_timeout_secs: default_session_timeout_secs(),
            commands: ProjectCommands::default(),
            completion_patterns: Vec::new(),
            debug: None,
            env: BTreeMap::new(),
            extensions: BTreeMap::new(),
            agent_command: default_agent_command(),
            permission_mode: default_permission_mode(),
            transcript_path: None,
            timing: TimingConfig::default(),
        }
    }
}

/// Validated, immutable description of one execution.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    kind: WorkflowKind,
    target_dir: PathBuf,
    spec_name: Option<String>,
    max_cycles: u32,
    session_timeout: Duration,
    commands: ProjectCommands,
    completion_patterns: Vec<String>,
    debug: DebugOptions,
    env: BTreeMap<String, String>,
    extensions: BTreeMap<String, serde_json::Value>,
    agent_command: Vec<String>,
    permission_mode: String,
    transcript_path: Option<PathBuf>,
    timing: TimingConfig,
}

impl Config {
    /// Validates `options` and fills in defaults.
    ///
    /// Order: target directory, kind requirements (spec name or command
    /// detection), completion phrases, debug toggles, numeric limits.
    pub fn from_options(options: ConfigOptions) -> Result<Self, ConfigError> {
        let target_dir = resolve_target_dir(&options.target_dir)?;

        let mut commands = options.commands;
        let spec_name = options
            .spec_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        match options.kind {
            WorkflowKind::Spec => {
                if spec_name.is_none() {
                    return Err(ConfigError::MissingSpecName);
                }
            }
            WorkflowKind::TestFix => {
                fill_missing(&mut commands.test, || detect_test_command(&target_dir));
            }
            WorkflowKind::TypeFix => {
                fill_missing(&mut commands.type_check, || {
                    detect_type_check_command(&target_dir)
                });
            }
            WorkflowKind::BuildFix => {
                fill_missing(&mut commands.build, || detect_build_command(&target_dir));
            }
        }

        let completion_patterns: Vec<String> = options
            .completion_patterns
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .collect();
        let completion_patterns = if completion_patterns.is_empty() {
            default_completion_patterns(options.kind)
        } else {
            completion_patterns
        };

        let debug = options.debug.unwrap_or_default();

        if options.max_cycles == 0 {
            return Err(ConfigError::InvalidLimit {
                field: "max_cycles",
            });
        }
        if options.session_timeout_secs == 0 {
            return Err(ConfigError::InvalidLimit {
                field: "session_timeout_secs",
            });
        }
        if debug.truncate && debug.truncate_length == 0 {
            return Err(ConfigError::InvalidLimit {
                field: "debug.truncate_length",
            });
        }
        options.timing.validate()?;

        if options
            .agent_command
            .first()
            .is_none_or(|program| program.trim().is_empty())
        {
            return Err(ConfigError::EmptyAgentCommand);
        }

        debug!(
            kind = %options.kind,
            target_dir = %target_dir.display(),
            max_cycles = options.max_cycles,
            patterns = completion_patterns.len(),
            "Configuration validated"
        );

        Ok(Self {
            kind: options.kind,
            target_dir,
            spec_name,
            max_cycles: options.max_cycles,
            session_timeout: Duration::from_secs(options.session_timeout_secs),
            commands,
            completion_patterns,
            debug,
            env: options.env,
            extensions: options.extensions,
            agent_command: options.agent_command,
            permission_mode: options.permission_mode,
            transcript_path: options.transcript_path,
            timing: options.timing,
        })
    }

    pub fn kind(&self) -> WorkflowKind {
        self.kind
    }

    /// Canonical, absolute project directory.
    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    pub fn spec_name(&self) -> Option<&str> {
        self.spec_name.as_deref()
    }

    pub fn max_cycles(&self) -> u32 {
        self.max_cycles
    }

    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    pub fn commands(&self) -> &ProjectCommands {
        &self.commands
    }

    pub fn completion_patterns(&self) -> &[String] {
        &self.completion_patterns
    }

    pub fn debug(&self) -> &DebugOptions {
        &self.debug
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn extensions(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.extensions
    }

    /// Looks up a forward-compatible setting.
    pub fn extension(&self, key: &str) -> Option<&serde_json::Value> {
        self.extensions.get(key)
    }

    /// Program followed by its arguments. Never empty.
    pub fn agent_command(&self) -> &[String] {
        &self.agent_command
    }

    pub fn permission_mode(&self) -> &str {
        &self.permission_mode
    }

    pub fn transcript_path(&self) -> Option<&Path> {
        self.transcript_path.as_deref()
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }
}

fn resolve_target_dir(path: &Path) -> Result<PathBuf, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::TargetDirNotFound {
            path: path.to_path_buf(),
        });
    }
    if !path.is_dir() {
        return Err(ConfigError::TargetNotDirectory {
            path: path.to_path_buf(),
        });
    }
    path.canonicalize().map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn fill_missing(slot: &mut Option<String>, detect: impl FnOnce() -> String) {
    let missing = slot.as_deref().is_none_or(|cmd| cmd.trim().is_empty());
    if missing {
        *slot = Some(detect());
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("target_dir '{}' does not exist", path.display())]
    TargetDirNotFound { path: PathBuf },

    #[error("target_dir '{}' is not a directory", path.display())]
    TargetNotDirectory { path: PathBuf },

    #[error("Failed to resolve target_dir '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("spec_name is required for the spec workflow - pass the name of the spec to implement")]
    MissingSpecName,

    #[error("{field} must be greater than zero")]
    InvalidLimit { field: &'static str },

    #[error("agent_command must name a program")]
    EmptyAgentCommand,

    #[error("Unknown workflow kind '{0}' - expected spec, test-fix, type-fix or build-fix")]
    UnknownWorkflowKind(String),
}

impl ConfigError {
    /// Name of the offending configuration field.
    pub fn field(&self) -> &'static str {
        match self {
            ConfigError::TargetDirNotFound { .. }
            | ConfigError::TargetNotDirectory { .. }
            | ConfigError::Io { .. } => "target_dir",
            ConfigError::MissingSpecName => "spec_name",
            ConfigError::InvalidLimit { field } => field,
            ConfigError::EmptyAgentCommand => "agent_command",
            ConfigError::UnknownWorkflowKind(_) => "kind",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn options(kind: WorkflowKind, dir: &TempDir) -> ConfigOptions {
        ConfigOptions::new(kind, dir.path())
    }

    #[test]
    fn test_workflow_kind_round_trips_through_str() {
        for kind in WorkflowKind::ALL {
            assert_eq!(kind.as_str().parse::<WorkflowKind>().unwrap(), kind);
        }
        let err = "lint-fix".parse::<WorkflowKind>().unwrap_err();
        assert_eq!(err.field(), "kind");
    }

    #[test]
    fn test_missing_target_dir_is_rejected() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = Config::from_options(ConfigOptions::new(WorkflowKind::TestFix, &missing))
            .unwrap_err();
        assert!(matches!(err, ConfigError::TargetDirNotFound { .. }));
        assert_eq!(err.field(), "target_dir");
    }

    #[test]
    fn test_file_target_is_rejected() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("README.md");
        fs::write(&file, "hello").unwrap();
        let err =
            Config::from_options(ConfigOptions::new(WorkflowKind::TestFix, &file)).unwrap_err();
        assert!(matches!(err, ConfigError::TargetNotDirectory { .. }));
    }

    #[test]
    fn test_target_dir_is_canonicalized() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("app")).unwrap();
        let dotted = dir.path().join("app").join("..").join("app");
        let config =
            Config::from_options(ConfigOptions::new(WorkflowKind::TestFix, dotted)).unwrap();
        assert!(config.target_dir().is_absolute());
        assert_eq!(
            config.target_dir(),
            dir.path().join("app").canonicalize().unwrap()
        );
    }

    #[test]
    fn test_spec_kind_requires_spec_name() {
        let dir = TempDir::new().unwrap();
        let err = Config::from_options(options(WorkflowKind::Spec, &dir)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSpecName));
        assert_eq!(err.field(), "spec_name");

        let mut blank = options(WorkflowKind::Spec, &dir);
        blank.spec_name = Some("   ".to_string());
        assert!(matches!(
            Config::from_options(blank).unwrap_err(),
            ConfigError::MissingSpecName
        ));

        let mut named = options(WorkflowKind::Spec, &dir);
        named.spec_name = Some(" user-auth ".to_string());
        let config = Config::from_options(named).unwrap();
        assert_eq!(config.spec_name(), Some("user-auth"));
        assert_eq!(config.commands(), &ProjectCommands::default());
    }

    #[test]
    fn test_target_dir_checked_before_spec_name() {
        let dir = TempDir::new().unwrap();
        let err = Config::from_options(ConfigOptions::new(
            WorkflowKind::Spec,
            dir.path().join("missing"),
        ))
        .unwrap_err();
        assert_eq!(err.field(), "target_dir");
    }

    #[test]
    fn test_kind_command_is_auto_detected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();

        let test_fix = Config::from_options(options(WorkflowKind::TestFix, &dir)).unwrap();
        assert_eq!(test_fix.commands().test.as_deref(), Some("cargo test"));
        assert_eq!(test_fix.commands().build, None);

        let type_fix = Config::from_options(options(WorkflowKind::TypeFix, &dir)).unwrap();
        assert_eq!(type_fix.commands().type_check.as_deref(), Some("cargo check"));

        let build_fix = Config::from_options(options(WorkflowKind::BuildFix, &dir)).unwrap();
        assert_eq!(build_fix.commands().for_kind(WorkflowKind::BuildFix), Some("cargo build"));
    }

    #[test]
    fn test_explicit_command_is_kept() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();
        let mut opts = options(WorkflowKind::TestFix, &dir);
        opts.commands.test = Some("cargo nextest run".to_string());
        let config = Config::from_options(opts).unwrap();
        assert_eq!(config.commands().test.as_deref(), Some("cargo nextest run"));
    }

    #[test]
    fn test_default_patterns_installed_when_empty() {
        let dir = TempDir::new().unwrap();
        let config = Config::from_options(options(WorkflowKind::TestFix, &dir)).unwrap();
        assert_eq!(
            config.completion_patterns(),
            default_completion_patterns(WorkflowKind::TestFix).as_slice()
        );

        let mut blanks = options(WorkflowKind::TestFix, &dir);
        blanks.completion_patterns = vec![String::new(), "  ".to_string()];
        let config = Config::from_options(blanks).unwrap();
        assert!(!config.completion_patterns().is_empty());
        assert!(config.completion_patterns().iter().all(|p| !p.trim().is_empty()));
    }

    #[test]
    fn test_custom_patterns_keep_order() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(WorkflowKind::BuildFix, &dir);
        opts.completion_patterns = vec!["SHIP IT".to_string(), "green build".to_string()];
        let config = Config::from_options(opts).unwrap();
        assert_eq!(config.completion_patterns(), ["SHIP IT", "green build"]);
    }

    #[test]
    fn test_default_debug_toggles() {
        let dir = TempDir::new().unwrap();
        let config = Config::from_options(options(WorkflowKind::TestFix, &dir)).unwrap();
        let debug = config.debug();
        assert!(debug.show_tool_detail);
        assert!(!debug.raw_dump);
        assert!(!debug.show_lifecycle);
        assert!(debug.truncate);
        assert_eq!(debug.truncate_length, 500);
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        let dir = TempDir::new().unwrap();

        let mut opts = options(WorkflowKind::TestFix, &dir);
        opts.max_cycles = 0;
        assert_eq!(Config::from_options(opts).unwrap_err().field(), "max_cycles");

        let mut opts = options(WorkflowKind::TestFix, &dir);
        opts.session_timeout_secs = 0;
        assert_eq!(
            Config::from_options(opts).unwrap_err().field(),
            "session_timeout_secs"
        );

        let mut opts = options(WorkflowKind::TestFix, &dir);
        opts.timing.poll_interval_ms = 0;
        assert_eq!(
            Config::from_options(opts).unwrap_err().field(),
            "timing.poll_interval_ms"
        );

        let mut opts = options(WorkflowKind::TestFix, &dir);
        opts.debug = Some(DebugOptions {
            truncate_length: 0,
            ..DebugOptions::default()
        });
        assert_eq!(
            Config::from_options(opts).unwrap_err().field(),
            "debug.truncate_length"
        );
    }

    #[test]
    fn test_zero_backoff_is_allowed() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(WorkflowKind::TestFix, &dir);
        opts.timing.cycle_backoff_ms = 0;
        let config = Config::from_options(opts).unwrap();
        assert_eq!(config.timing().cycle_backoff(), Duration::ZERO);
    }

    #[test]
    fn test_empty_agent_command_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(WorkflowKind::TestFix, &dir);
        opts.agent_command = Vec::new();
        assert!(matches!(
            Config::from_options(opts).unwrap_err(),
            ConfigError::EmptyAgentCommand
        ));
    }

    #[test]
    fn test_parse_sparse_yaml_options() {
        let dir = TempDir::new().unwrap();
        let yaml = format!(
            r#"
kind: build-fix
target_dir: "{}"
max_cycles: 3
session_timeout_secs: 60
env:
  CI: "1"
extensions:
  notify_on_finish: true
timing:
  cycle_backoff_ms: 0
"#,
            dir.path().display()
        );

        let opts: ConfigOptions = serde_yaml::from_str(&yaml).unwrap();
        let config = Config::from_options(opts).unwrap();
        assert_eq!(config.kind(), WorkflowKind::BuildFix);
        assert_eq!(config.max_cycles(), 3);
        assert_eq!(config.session_timeout(), Duration::from_secs(60));
        assert_eq!(config.env().get("CI").map(String::as_str), Some("1"));
        assert_eq!(
            config.extension("notify_on_finish"),
            Some(&serde_json::Value::Bool(true))
        );
        assert_eq!(config.agent_command(), [DEFAULT_AGENT_PROGRAM]);
        assert_eq!(config.permission_mode(), DEFAULT_PERMISSION_MODE);
        assert_eq!(config.timing().handshake_timeout(), Duration::from_secs(30));
        assert_eq!(config.timing().cycle_backoff(), Duration::ZERO);
    }
}
