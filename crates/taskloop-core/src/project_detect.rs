//! Guesses test, type-check and build commands from marker files.
//!
//! Each check walks an ordered marker table and returns the command of the
//! first marker present in the target directory, or a generic fallback.

use std::path::Path;
use tracing::debug;

pub const FALLBACK_TEST_COMMAND: &str = "npm test";
pub const FALLBACK_TYPE_CHECK_COMMAND: &str = "npx tsc --noEmit";
pub const FALLBACK_BUILD_COMMAND: &str = "npm run build";

/// Node package manager inferred from the lockfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeRunner {
    Npm,
    Pnpm,
    Yarn,
}

impl NodeRunner {
    fn detect(dir: &Path) -> Self {
        if dir.join("pnpm-lock.yaml").exists() {
            NodeRunner::Pnpm
        } else if dir.join("yarn.lock").exists() {
            NodeRunner::Yarn
        } else {
            NodeRunner::Npm
        }
    }

    fn test(self) -> &'static str {
        match self {
            NodeRunner::Npm => "npm test",
            NodeRunner::Pnpm => "pnpm test",
            NodeRunner::Yarn => "yarn test",
        }
    }

    fn build(self) -> &'static str {
        match self {
            NodeRunner::Npm => "npm run build",
            NodeRunner::Pnpm => "pnpm run build",
            NodeRunner::Yarn => "yarn build",
        }
    }
}

/// Detects the test command for a project directory.
pub fn detect_test_command(dir: &Path) -> String {
    let command = if has(dir, "Cargo.toml") {
        "cargo test"
    } else if has(dir, "package.json") {
        NodeRunner::detect(dir).test()
    } else if has(dir, "go.mod") {
        "go test ./..."
    } else if has_any(dir, &["pyproject.toml", "pytest.ini", "setup.py", "tox.ini"]) {
        "pytest"
    } else {
        FALLBACK_TEST_COMMAND
    };
    debug!(dir = %dir.display(), command, "Detected test command");
    command.to_string()
}

/// Detects the type-check command for a project directory.
pub fn detect_type_check_command(dir: &Path) -> String {
    let command = if has(dir, "tsconfig.json") {
        "npx tsc --noEmit"
    } else if has(dir, "Cargo.toml") {
        "cargo check"
    } else if has_any(dir, &["mypy.ini", "pyproject.toml"]) {
        "mypy ."
    } else if has(dir, "go.mod") {
        "go vet ./..."
    } else {
        FALLBACK_TYPE_CHECK_COMMAND
    };
    debug!(dir = %dir.display(), command, "Detected type-check command");
    command.to_string()
}

/// Detects the build command for a project directory.
pub fn detect_build_command(dir: &Path) -> String {
    let command = if has(dir, "Cargo.toml") {
        "cargo build"
    } else if has(dir, "package.json") {
        NodeRunner::detect(dir).build()
    } else if has(dir, "go.mod") {
        "go build ./..."
    } else if has(dir, "pom.xml") {
        "mvn package"
    } else if has_any(dir, &["build.gradle", "build.gradle.kts"]) {
        "./gradlew build"
    } else if has(dir, "Makefile") {
        "make"
    } else {
        FALLBACK_BUILD_COMMAND
    };
    debug!(dir = %dir.display(), command, "Detected build command");
    command.to_string()
}

fn has(dir: &Path, marker: &str) -> bool {
    dir.join(marker).is_file()
}

fn has_any(dir: &Path, markers: &[&str]) -> bool {
    markers.iter().any(|marker| has(dir, marker))
}
