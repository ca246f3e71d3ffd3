//! Subprocess execution with a time bound.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::{Result, XrefError};

/// Runs `command` (program followed by its arguments) in `cwd` and returns its
/// stdout.
///
/// Anything written to stderr, or a non-zero exit, fails the call. The child
/// is killed when `timeout` expires.
pub async fn run_command(command: &[String], cwd: &Path, timeout: Duration) -> Result<String> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| XrefError::Config("empty command".to_string()))?;
    let display = command.join(" ");

    let child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| XrefError::Subprocess {
            command: display.clone(),
            stderr: format!("failed to spawn: {}", e),
        })?;

    // Dropping the future on timeout drops the child, which kills it.
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => output?,
        Err(_) => {
            return Err(XrefError::Timeout {
                command: display,
                timeout,
            })
        }
    };

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        return Err(XrefError::Subprocess {
            command: display,
            stderr: stderr.trim().to_string(),
        });
    }

    if !output.status.success() {
        return Err(XrefError::Subprocess {
            command: display,
            stderr: format!("exited with {}", output.status),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let cwd = std::env::temp_dir();
        let out = run_command(&sh("echo hello"), &cwd, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn test_stderr_is_failure() {
        let cwd = std::env::temp_dir();
        let err = run_command(&sh("echo oops >&2"), &cwd, Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            XrefError::Subprocess { stderr, .. } => assert_eq!(stderr, "oops"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_failure() {
        let cwd = std::env::temp_dir();
        let result = run_command(&sh("exit 3"), &cwd, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(XrefError::Subprocess { .. })));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let cwd = std::env::temp_dir();
        let result = run_command(&sh("sleep 5"), &cwd, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(XrefError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_empty_command_rejected() {
        let cwd = std::env::temp_dir();
        let result = run_command(&[], &cwd, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(XrefError::Config(_))));
    }
}
