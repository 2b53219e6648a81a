//! CLI Integration Tests
//!
//! Runs the `affine` binary end to end:
//! 1. `eval` prints the result as raw JSON
//! 2. `run` executes a script file and calls into it
//! 3. Invalid input exits non-zero with the error on stderr
//! 4. Stack size comes from the flag or `AFFINE_STACK_SIZE`

use std::process::{Command, Output};

// ============================================================================
// Test Helpers
// ============================================================================

fn affine() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_affine"));
    command.env_remove("AFFINE_STACK_SIZE").env_remove("RUST_LOG");
    command
}

/// Creates a temporary test script file.
fn create_test_script(content: &str) -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), content).unwrap();
    file
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

// ============================================================================
// eval
// ============================================================================

#[test]
fn test_eval_prints_json() {
    let output = affine().args(["eval", "1 + 2"]).output().unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "3");
}

#[test]
fn test_eval_structured_result() {
    let output = affine()
        .args(["eval", "({ list: [1, 2].map(x => x * 10), ok: true })"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value, serde_json::json!({ "list": [10, 20], "ok": true }));
}

#[test]
fn test_eval_runs_on_engine_thread() {
    let output = affine().args(["eval", "host.threadName()"]).output().unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "\"affine-js\"");
}

#[test]
fn test_eval_syntax_error_fails() {
    let output = affine().args(["eval", "this is not ))"]).output().unwrap();
    assert!(!output.status.success());
    assert!(stdout(&output).is_empty());
    assert!(!stderr(&output).is_empty());
}

// ============================================================================
// run
// ============================================================================

#[test]
fn test_run_and_call_function() {
    let script = create_test_script("function add(a, b) { return a + b; }");

    let output = affine()
        .arg("run")
        .arg("-s")
        .arg(script.path())
        .args(["--call", "add", "--args", "[2, 3]"])
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    // Logs go to stderr, so stdout holds only the result
    assert_eq!(stdout(&output), "5");
}

#[test]
fn test_run_without_call_prints_nothing() {
    let script = create_test_script("host.log('side effect');");

    let output = affine().arg("run").arg("-s").arg(script.path()).output().unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).is_empty());
    assert!(stderr(&output).contains("side effect"));
}

#[test]
fn test_run_missing_script_fails() {
    let dir = tempfile::tempdir().unwrap();

    let output = affine()
        .arg("run")
        .arg("-s")
        .arg(dir.path().join("missing.js"))
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn test_run_rejects_non_array_args() {
    let script = create_test_script("function f(x) { return x; }");

    let output = affine()
        .arg("run")
        .arg("-s")
        .arg(script.path())
        .args(["--call", "f", "--args", "{\"a\": 1}"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(stderr(&output).contains("JSON array"));
}

#[test]
fn test_run_call_missing_function_fails() {
    let script = create_test_script("var x = 1;");

    let output = affine()
        .arg("run")
        .arg("-s")
        .arg(script.path())
        .args(["--call", "nope"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(stderr(&output).contains("not a function"));
}

// ============================================================================
// Stack size
// ============================================================================

#[test]
fn test_stack_size_flag() {
    let output = affine()
        .args(["--stack-size-mb", "32", "eval", "1"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "1");
}

#[test]
fn test_large_stack_allows_deep_recursion() {
    let script = create_test_script(
        "function recurse(n) { return n === 0 ? 0 : 1 + recurse(n - 1); }",
    );

    let output = affine()
        .args(["--stack-size-mb", "64", "run", "-s"])
        .arg(script.path())
        .args(["--call", "recurse", "--args", "[10000]"])
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "10000");
}

#[test]
fn test_stack_size_too_small_fails() {
    let output = affine()
        .args(["--stack-size-mb", "0", "eval", "1"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Invalid dispatcher configuration"));
}

#[test]
fn test_invalid_stack_size_env_fails() {
    let output = affine()
        .env("AFFINE_STACK_SIZE", "lots")
        .args(["eval", "1"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("AFFINE_STACK_SIZE"));
}

#[test]
fn test_stack_size_flag_overrides_env() {
    let output = affine()
        .env("AFFINE_STACK_SIZE", "lots")
        .args(["--stack-size-mb", "16", "eval", "1"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
}
