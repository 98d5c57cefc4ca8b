//! End-to-end engine runs against scripted sessions.

use serde_json::json;
use std::time::Duration;
use taskloop_core::testing::{ScriptedLauncher, SessionScript, text_line};
use taskloop_core::{
    Config, ConfigOptions, Engine, TerminationReason, WorkflowKind, cancel_pair, read_transcript,
};
use tempfile::TempDir;

fn spec_options(dir: &TempDir) -> ConfigOptions {
    let yaml = format!(
        r#"
kind: spec
target_dir: "{}"
spec_name: user-auth
max_cycles: 4
timing:
  poll_interval_ms: 5
  cycle_backoff_ms: 0
"#,
        dir.path().display()
    );
    serde_yaml::from_str(&yaml).unwrap()
}

fn tool_result_line(content: serde_json::Value) -> String {
    json!({
        "event": "stream",
        "payload": {
            "content": [
                {"type": "tool_result", "tool_use_id": "t1", "content": content.to_string()}
            ]
        }
    })
    .to_string()
}

#[tokio::test]
async fn spec_run_completes_on_structured_status() {
    let dir = TempDir::new().unwrap();
    let config = Config::from_options(spec_options(&dir)).unwrap();

    let in_progress = tool_result_line(json!({
        "success": true,
        "data": {
            "specName": "user-auth",
            "taskProgress": {"total": 5, "completed": 3, "pending": 2}
        }
    }));
    let done = tool_result_line(json!({
        "success": true,
        "data": {
            "specName": "user-auth",
            "taskProgress": {"total": 5, "completed": 5, "pending": 0}
        }
    }));

    let launcher = ScriptedLauncher::new(
        vec![SessionScript::lines([
            r#"{"event":"run_started","run_id":"r-1"}"#.to_string(),
            in_progress,
            r#"{"event":"run_completed","outcome":"success"}"#.to_string(),
        ])],
        SessionScript::lines([text_line("Checking status"), done]),
    );
    let log = launcher.log();

    let mut engine = Engine::new(config, Box::new(launcher));
    let result = engine.execute().await;

    assert!(result.success);
    assert_eq!(result.reason, TerminationReason::Completed);
    assert_eq!(result.cycle, 2);
    assert_eq!(log.starts(), 2);
    assert_eq!(log.shutdowns(), 2);
    assert!(log.prompts()[0].contains(".spec-workflow/specs/user-auth/tasks.md"));
}

#[tokio::test]
async fn bare_counters_do_not_complete_a_spec_run() {
    let dir = TempDir::new().unwrap();
    let mut options = spec_options(&dir);
    options.max_cycles = 2;
    let config = Config::from_options(options).unwrap();

    let counters = tool_result_line(json!({"total": 5, "completed": 5, "pending": 0}));
    let launcher = ScriptedLauncher::repeating(SessionScript::lines([counters]));
    let log = launcher.log();

    let result = Engine::new(config, Box::new(launcher)).execute().await;

    assert!(!result.completed);
    assert_eq!(result.reason, TerminationReason::MaxCycles);
    assert_eq!(result.cycle, 2);
    assert_eq!(log.shutdowns(), 2);
}

#[tokio::test]
async fn transcript_records_every_cycle() {
    let dir = TempDir::new().unwrap();
    let transcript = dir.path().join(".taskloop").join("transcript.jsonl");
    let mut options = ConfigOptions::new(WorkflowKind::BuildFix, dir.path());
    options.commands.build = Some("make".to_string());
    options.max_cycles = 2;
    options.transcript_path = Some(transcript.clone());
    options.timing.poll_interval_ms = 5;
    options.timing.cycle_backoff_ms = 0;
    let config = Config::from_options(options).unwrap();

    let launcher = ScriptedLauncher::repeating(SessionScript::lines([
        text_line("make: *** [all] Error 2"),
        "not json at all".to_string(),
    ]));

    let result = Engine::new(config, Box::new(launcher)).execute().await;
    assert_eq!(result.reason, TerminationReason::MaxCycles);

    let records = read_transcript(&transcript).unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(
        records.iter().map(|r| r.cycle).collect::<Vec<_>>(),
        vec![1, 1, 2, 2]
    );
    assert_eq!(records[1].event["event"], "parse_error");
}

#[tokio::test]
async fn engines_run_concurrently_without_interference() {
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();

    let make = |dir: &TempDir, text: &str| {
        let mut options = ConfigOptions::new(WorkflowKind::TestFix, dir.path());
        options.commands.test = Some("cargo test".to_string());
        options.max_cycles = 2;
        options.timing.poll_interval_ms = 5;
        options.timing.cycle_backoff_ms = 0;
        let config = Config::from_options(options).unwrap();
        let launcher = ScriptedLauncher::repeating(SessionScript::lines([text_line(text)]));
        Engine::new(config, Box::new(launcher))
    };

    let mut completing = make(&first_dir, "all tests pass");
    let mut failing = make(&second_dir, "3 failed");
    let (a, b) = tokio::join!(completing.execute(), failing.execute());

    assert_eq!(a.reason, TerminationReason::Completed);
    assert_eq!(a.cycle, 1);
    assert_eq!(b.reason, TerminationReason::MaxCycles);
    assert_eq!(b.cycle, 2);
}

fn fix_engine(dir: &TempDir, text: &str) -> Engine {
    let mut options = ConfigOptions::new(WorkflowKind::TestFix, dir.path());
    options.commands.test = Some("cargo test".to_string());
    options.max_cycles = 2;
    options.timing.poll_interval_ms = 5;
    options.timing.cycle_backoff_ms = 1;
    let config = Config::from_options(options).unwrap();
    let launcher = ScriptedLauncher::repeating(SessionScript::lines([text_line(text)]));
    Engine::new(config, Box::new(launcher))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn engines_run_as_spawned_tasks_on_worker_threads() {
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let mut completing = fix_engine(&first_dir, "all tests pass");
    let mut failing = fix_engine(&second_dir, "3 failed");

    let a = tokio::spawn(async move { completing.execute().await });
    let b = tokio::spawn(async move { failing.execute().await });
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    assert_eq!(a.reason, TerminationReason::Completed);
    assert_eq!(a.cycle, 1);
    assert_eq!(b.reason, TerminationReason::MaxCycles);
    assert_eq!(b.cycle, 2);
}

#[tokio::test]
async fn cancelled_engine_reports_exit_code_130() {
    let dir = TempDir::new().unwrap();
    let config = Config::from_options(spec_options(&dir)).unwrap();
    let launcher = ScriptedLauncher::repeating(SessionScript::hanging());
    let log = launcher.log();
    let (handle, token) = cancel_pair();
    let mut engine = Engine::new(config, Box::new(launcher)).with_cancel_token(token);

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.cancel();
    });
    let result = engine.execute().await;
    canceller.await.unwrap();

    assert_eq!(result.reason.exit_code(), 130);
    assert_eq!(log.shutdowns(), 1);
}
