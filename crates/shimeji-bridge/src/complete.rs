//! One-shot autocompletion probe.
//!
//! Runs an independent shell subprocess combining command-name and filename
//! completion for a fragment. Never touches the interactive session's stdin,
//! so a probe can run while a command is pending.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::BridgeError;
use crate::marker::escape_double_quoted;

/// Hard timeout for the probe; the process is killed on expiry.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(3500);

/// Maximum number of candidates returned to the host.
pub const MAX_CANDIDATES: usize = 80;

/// Result of a completion probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Completion {
    pub completion: String,
    pub candidates: Vec<String>,
    pub exact: bool,
}

/// Longest common prefix of all values; empty for an empty list.
pub fn common_prefix(values: &[String]) -> String {
    let Some(first) = values.first() else {
        return String::new();
    };
    let mut prefix = first.as_str();
    for value in &values[1..] {
        let shared = prefix
            .char_indices()
            .zip(value.chars())
            .take_while(|((_, a), b)| a == b)
            .count();
        let end = prefix
            .char_indices()
            .nth(shared)
            .map_or(prefix.len(), |(i, _)| i);
        prefix = &prefix[..end];
        if prefix.is_empty() {
            break;
        }
    }
    prefix.to_string()
}

fn probe_command(shell_variant: &str, script: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("wsl.exe");
        if !shell_variant.is_empty() {
            cmd.args(["-d", shell_variant]);
        }
        cmd.args(["--", "bash", "-lc", script]);
        cmd
    } else {
        let mut cmd = Command::new("bash");
        cmd.args(["-lc", script]);
        cmd
    }
}

/// Run the completion script for `fragment` in `cwd`, returning deduplicated,
/// prefix-filtered, sorted candidates capped at [`MAX_CANDIDATES`].
pub async fn probe(
    fragment: &str,
    cwd: &str,
    shell_variant: &str,
) -> Result<Completion, BridgeError> {
    if fragment.is_empty() {
        return Ok(Completion::default());
    }

    let cwd_prefix = if cwd.is_empty() {
        String::new()
    } else {
        format!(
            "cd \"{}\" >/dev/null 2>&1 || true\n",
            escape_double_quoted(cwd)
        )
    };
    let script = format!(
        "{}fragment=\"{}\"\ncompgen -c -- \"$fragment\" 2>/dev/null\ncompgen -f -- \"$fragment\" 2>/dev/null\n",
        cwd_prefix,
        escape_double_quoted(fragment)
    );

    let mut cmd = probe_command(shell_variant, &script);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| BridgeError::CompletionFailed(e.to_string()))?;

    let output = match tokio::time::timeout(PROBE_TIMEOUT, child.wait_with_output()).await {
        // Dropping the future kills the probe (kill_on_drop)
        Err(_) => return Err(BridgeError::CompletionTimeout),
        Ok(Err(e)) => return Err(BridgeError::CompletionFailed(e.to_string())),
        Ok(Ok(output)) => output,
    };

    let stdout = String::from_utf8_lossy(&output.stdout).replace('\r', "");
    if !output.status.success() && stdout.trim().is_empty() {
        return Err(BridgeError::CompletionExit(
            output.status.code().unwrap_or(-1),
        ));
    }

    let mut candidates: Vec<String> = {
        let set: std::collections::BTreeSet<String> = stdout
            .split('\n')
            .map(str::trim)
            .filter(|line| !line.is_empty() && line.starts_with(fragment))
            .map(str::to_string)
            .collect();
        set.into_iter().collect()
    };

    if candidates.is_empty() {
        return Ok(Completion {
            completion: fragment.to_string(),
            candidates,
            exact: false,
        });
    }

    let exact = candidates.len() == 1;
    let completion = if exact {
        candidates[0].clone()
    } else {
        let prefix = common_prefix(&candidates);
        if prefix.is_empty() {
            fragment.to_string()
        } else {
            prefix
        }
    };
    candidates.truncate(MAX_CANDIDATES);

    Ok(Completion {
        completion,
        candidates,
        exact,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_prefix_of_candidates() {
        let values = vec!["gitignore".to_string(), "github".to_string(), "git".to_string()];
        assert_eq!(common_prefix(&values), "git");
        assert_eq!(common_prefix(&[]), "");
        assert_eq!(
            common_prefix(&["alpha".to_string(), "beta".to_string()]),
            ""
        );
    }

    #[test]
    fn common_prefix_respects_char_boundaries() {
        let values = vec!["héllo".to_string(), "hénri".to_string()];
        assert_eq!(common_prefix(&values), "hé");
    }

    #[tokio::test]
    async fn empty_fragment_short_circuits() {
        let result = probe("", "", "Ubuntu").await.unwrap();
        assert_eq!(result, Completion::default());
    }

    #[tokio::test]
    async fn fragment_with_no_candidates_returns_fragment() {
        let result = probe("zzz-no-such-command-zzz", "", "Ubuntu")
            .await
            .unwrap();
        assert_eq!(result.completion, "zzz-no-such-command-zzz");
        assert!(result.candidates.is_empty());
        assert!(!result.exact);
    }

    #[tokio::test]
    async fn known_command_prefix_yields_candidates() {
        // `ls` exists everywhere the bridge runs
        let result = probe("ls", "", "Ubuntu").await.unwrap();
        assert!(result.candidates.iter().any(|c| c == "ls"));
        assert!(result.candidates.iter().all(|c| c.starts_with("ls")));
        assert!(result.candidates.len() <= MAX_CANDIDATES);
    }

    #[tokio::test]
    async fn filename_completion_in_cwd() {
        let dir = format!("/tmp/shimeji-complete-{}", uuid::Uuid::new_v4().simple());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(format!("{}/target_one.txt", dir), b"x").unwrap();
        std::fs::write(format!("{}/target_two.txt", dir), b"x").unwrap();

        let result = probe("target_", &dir, "Ubuntu").await.unwrap();
        assert_eq!(
            result.candidates,
            vec!["target_one.txt".to_string(), "target_two.txt".to_string()]
        );
        assert_eq!(result.completion, "target_");
        assert!(!result.exact);

        let result = probe("target_one", &dir, "Ubuntu").await.unwrap();
        assert!(result.exact);
        assert_eq!(result.completion, "target_one.txt");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
