//! Built-in completion phrase tables.
//!
//! These are plain data handed to detector constructors. Nothing here is
//! mutable at runtime; callers that want different phrases pass their own.

use crate::config::WorkflowKind;
use std::collections::BTreeMap;

const SPEC_PHRASES: &[&str] = &[
    "all tasks completed",
    "all tasks are completed",
    "all tasks complete",
    "all tasks are complete",
    "all tasks have been completed",
    "spec implementation complete",
    "specification is complete",
];

const TEST_FIX_PHRASES: &[&str] = &[
    "all tests pass",
    "all tests passed",
    "all tests are passing",
    "all tests now pass",
    "test suite passes",
];

const TYPE_FIX_PHRASES: &[&str] = &[
    "no type errors",
    "all type errors fixed",
    "all type errors have been fixed",
    "type check passes",
    "type check passed",
    "type checking passes",
];

const BUILD_FIX_PHRASES: &[&str] = &[
    "build succeeded",
    "build successful",
    "build is successful",
    "build completed successfully",
    "build now succeeds",
];

/// Default completion phrases for a workflow kind, in match order.
pub fn default_completion_patterns(kind: WorkflowKind) -> Vec<String> {
    let table = match kind {
        WorkflowKind::Spec => SPEC_PHRASES,
        WorkflowKind::TestFix => TEST_FIX_PHRASES,
        WorkflowKind::TypeFix => TYPE_FIX_PHRASES,
        WorkflowKind::BuildFix => BUILD_FIX_PHRASES,
    };
    table.iter().map(|s| (*s).to_string()).collect()
}

/// Curated phrases the spec workflow detector checks in agent text and result
/// messages. Matched case-insensitively, anywhere in the text.
pub const SPEC_PROGRESS_PHRASES: &[&str] = &[
    // task counts
    "all tasks completed",
    "all tasks are completed",
    "all tasks complete",
    "all tasks are complete",
    "all tasks have been completed",
    "all tasks are now complete",
    "all tasks marked as complete",
    "all tasks marked complete",
    "every task is complete",
    // pending counts
    "0 pending",
    "0 tasks pending",
    "0 tasks remaining",
    "0 remaining tasks",
    "pending: 0",
    "remaining: 0",
    "no pending tasks",
    "no remaining tasks",
    "no tasks remaining",
    // status
    "status: completed",
    "overall status: completed",
    "100% complete",
    "spec is complete",
    "spec implementation complete",
];

/// Output phrases produced by common test, build and type-check tools when
/// they succeed. Keyed by category.
pub fn default_command_categories() -> BTreeMap<String, Vec<String>> {
    let table: [(&str, &[&str]); 3] = [
        (
            "test",
            &[
                "all tests passed",
                "test result: ok",
                "tests passed, 0 failed",
                "0 failing",
            ],
        ),
        (
            "build",
            &[
                "build succeeded",
                "build successful",
                "compiled successfully",
                "finished `release` profile",
                "finished `dev` profile",
                "build completed",
            ],
        ),
        (
            "typecheck",
            &[
                "found 0 errors",
                "no errors found",
                "success: no issues found",
                "0 errors",
                "type check passed",
            ],
        ),
    ];

    table
        .iter()
        .map(|(category, phrases)| {
            (
                (*category).to_string(),
                phrases.iter().map(|p| (*p).to_string()).collect(),
            )
        })
        .collect()
}

/// Tool output fragments that mean the command failed somewhere, even when
/// a success phrase appears too (one test binary passing before another
/// fails, a build step succeeding before a later error).
pub const COMMAND_FAILURE_MARKERS: &[&str] = &[
    "test result: failed",
    "failures:",
    "panicked at",
    "error:",
    "error[",
    "error ts",
    "build failed",
    "compilation failed",
    "npm err!",
];

/// The command category a workflow kind is about. Spec runs have none.
pub fn command_category(kind: WorkflowKind) -> Option<&'static str> {
    match kind {
        WorkflowKind::Spec => None,
        WorkflowKind::TestFix => Some("test"),
        WorkflowKind::TypeFix => Some("typecheck"),
        WorkflowKind::BuildFix => Some("build"),
    }
}
