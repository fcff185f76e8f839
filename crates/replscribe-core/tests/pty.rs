//! Tests against real child processes on a PTY.

#![cfg(unix)]

use replscribe_core::{transcribe, ReplError, RunOptions};
use replscribe_types::{ReplProfile, Sections, Timeout};
use std::collections::HashMap;
use std::time::Instant;
use tempfile::TempDir;

fn minimal_env() -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert(
        "PATH".to_string(),
        std::env::var("PATH").unwrap_or_else(|_| "/usr/bin:/bin".to_string()),
    );
    env.insert("TERM".to_string(), "dumb".to_string());
    env
}

fn options(dir: &TempDir) -> RunOptions {
    RunOptions {
        working_directory: Some(dir.path().to_path_buf()),
        base_env: Some(minimal_env()),
        ..RunOptions::default()
    }
}

fn one_section(text: &str) -> Sections {
    [("1", text)].into_iter().collect()
}

#[tokio::test]
async fn test_missing_executable_is_spawn_error() {
    let dir = TempDir::new().unwrap();
    let profile = ReplProfile::new("ghost", "replscribe-no-such-interpreter --flag");

    let err = transcribe(&profile, &one_section("1+1"), &options(&dir))
        .await
        .unwrap_err();

    match err {
        ReplError::Spawn { command, .. } => {
            assert_eq!(command, "replscribe-no-such-interpreter --flag")
        }
        other => panic!("Expected Spawn, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_working_directory_is_spawn_error() {
    let dir = TempDir::new().unwrap();
    let profile = ReplProfile::new("sh", "sh");
    let opts = RunOptions {
        working_directory: Some(dir.path().join("does-not-exist")),
        ..options(&dir)
    };

    let err = transcribe(&profile, &one_section("true"), &opts)
        .await
        .unwrap_err();
    assert!(matches!(err, ReplError::Spawn { .. }));
}

#[tokio::test]
async fn test_silent_process_hits_initial_prompt_timeout() {
    let dir = TempDir::new().unwrap();
    let profile = ReplProfile {
        initial_prompt_timeout: Timeout::millis(300),
        ..ReplProfile::new("sleeper", "sleep 30")
    };

    let started = Instant::now();
    let err = transcribe(&profile, &one_section("1+1"), &options(&dir))
        .await
        .unwrap_err();

    assert!(started.elapsed().as_secs() < 5, "waited past the bound");
    assert!(matches!(err, ReplError::InitialPromptTimeout { .. }));
}

#[tokio::test]
async fn test_save_vars_requires_template() {
    let dir = TempDir::new().unwrap();
    let profile = ReplProfile::new("sh", "sh");
    let opts = RunOptions {
        save_vars: Some(dir.path().join("vars.json")),
        ..options(&dir)
    };

    let err = transcribe(&profile, &one_section("true"), &opts)
        .await
        .unwrap_err();
    assert!(matches!(err, ReplError::Configuration(_)));
}

#[tokio::test]
async fn test_shell_session() {
    let dir = TempDir::new().unwrap();
    let profile = ReplProfile {
        prompt_regex: Some(r"\$ ".into()),
        initial_prompt: Some(r"\$ ".into()),
        trim_prompt: r"\$".into(),
        // bracketed-paste toggles some shells print around prompts
        strip_pattern: Some(r"\x1b\[\?2004[hl]".into()),
        check_return_code: false,
        ..ReplProfile::new("sh", "sh -i")
    };
    let opts = RunOptions {
        prompt_vars: replscribe_types::PromptVars {
            ps1: Some("$ ".into()),
            ..Default::default()
        },
        ..options(&dir)
    };

    let out = transcribe(&profile, &one_section("echo replscribe-$((40+2))"), &opts)
        .await
        .unwrap();

    let text = out.get("1").unwrap();
    let lines: Vec<&str> = replscribe_core::split_lines(text);
    assert_eq!(lines.last().map(|l| l.trim()), Some("replscribe-42"));
}
