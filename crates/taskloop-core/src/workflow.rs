//! Workflows: what to ask the agent and how to tell when it is done.

use crate::config::{Config, WorkflowKind};
use crate::detector::{
    CommandPatternDetector, CompletionDetector, SpecWorkflowDetector, TextPatternDetector,
    ToolResultDetector,
};
use taskloop_proto::PromptOptions;

/// Supplies the prompt, prompt options and completion detectors for a run.
pub trait Workflow: Send + Sync {
    fn kind(&self) -> WorkflowKind;

    /// Prompt for the given 1-based cycle.
    fn prompt(&self, config: &Config, cycle: u32) -> String;

    /// Options sent with the prompt. Merged over the session defaults.
    fn options(&self, config: &Config) -> PromptOptions;

    /// Detectors in precedence order.
    fn detectors(&self, config: &Config) -> Vec<Box<dyn CompletionDetector>>;
}

/// The built-in workflow for each [`WorkflowKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardWorkflow {
    kind: WorkflowKind,
}

impl StandardWorkflow {
    pub fn for_kind(kind: WorkflowKind) -> Self {
        Self { kind }
    }

    fn spec_prompt(config: &Config) -> String {
        let name = config.spec_name().unwrap_or_default();
        format!(
            "Implement the spec \"{name}\".\n\
             \n\
             The task list is in .spec-workflow/specs/{name}/tasks.md. Use the \
             spec-workflow tools to check the spec status and pick the next pending \
             task. For each task: mark it in progress, implement it, verify it, then \
             mark it completed. Keep going until no tasks remain.\n\
             \n\
             When every task is completed, report the final spec status and say \
             \"All tasks completed\"."
        )
    }

    fn fix_prompt(config: &Config, kind: WorkflowKind) -> String {
        let (goal, fallback) = match kind {
            WorkflowKind::TestFix => ("every test passes", "the test suite"),
            WorkflowKind::TypeFix => ("the type checker reports no errors", "the type checker"),
            _ => ("the build succeeds", "the build"),
        };
        let command = config.commands().for_kind(kind).unwrap_or(fallback);
        let phrase = config
            .completion_patterns()
            .first()
            .map_or("done", String::as_str);
        format!(
            "Run `{command}` in this project and fix what it reports.\n\
             \n\
             Work in small steps: read the failures, fix the underlying code (not \
             the checks), and re-run `{command}` after each change. Repeat until \
             {goal}.\n\
             \n\
             When it is clean, run `{command}` once more to confirm and then say \
             \"{phrase}\"."
        )
    }
}

impl Workflow for StandardWorkflow {
    fn kind(&self) -> WorkflowKind {
        self.kind
    }

    fn prompt(&self, config: &Config, cycle: u32) -> String {
        let mut prompt = match self.kind {
            WorkflowKind::Spec => Self::spec_prompt(config),
            kind => Self::fix_prompt(config, kind),
        };
        if cycle > 1 {
            prompt.push_str(&format!(
                "\n\nThis is cycle {cycle} of {}. Earlier cycles already made progress: \
                 check the current state first and continue from there instead of \
                 starting over.",
                config.max_cycles()
            ));
        }
        prompt
    }

    fn options(&self, config: &Config) -> PromptOptions {
        PromptOptions::new()
            .with(PromptOptions::CWD, config.target_dir().display().to_string())
            .with(PromptOptions::EXIT_ON_COMPLETE, true)
            .with(PromptOptions::PERMISSION_MODE, config.permission_mode())
    }

    fn detectors(&self, config: &Config) -> Vec<Box<dyn CompletionDetector>> {
        let patterns = config.completion_patterns();
        match self.kind {
            WorkflowKind::Spec => vec![
                Box::new(SpecWorkflowDetector::new()),
                Box::new(TextPatternDetector::new(patterns.iter().cloned(), false)),
            ],
            _ => vec![
                Box::new(TextPatternDetector::new(patterns.iter().cloned(), false)),
                Box::new(CommandPatternDetector::with_defaults()),
                Box::new(ToolResultDetector::new(patterns.iter().cloned())),
            ],
        }
    }
}
