//! Error types for git subprocess execution

use crate::cancel::StopReason;
use std::io;
use thiserror::Error;

/// Errors that can occur while running a git probe
#[derive(Debug, Error)]
pub enum GitError {
    /// The git executable could not be started (missing binary, bad directory)
    #[error("Failed to run `git {args}`: {source}")]
    Spawn {
        args: String,
        #[source]
        source: io::Error,
    },

    /// Waiting on the child process failed
    #[error("I/O error while running `git {args}`: {source}")]
    Io {
        args: String,
        #[source]
        source: io::Error,
    },

    /// git ran and exited unsuccessfully
    #[error("`git {args}` failed ({}): {stderr}", describe_exit(.code))]
    Failed {
        args: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The deadline passed; the child was killed
    #[error("`git {args}` timed out")]
    TimedOut { args: String },

    /// The caller cancelled; the child was killed
    #[error("`git {args}` was cancelled")]
    Cancelled { args: String },
}

impl GitError {
    pub(crate) fn stopped(reason: StopReason, args: &str) -> Self {
        let args = args.to_string();
        match reason {
            StopReason::Cancelled => GitError::Cancelled { args },
            StopReason::DeadlineExceeded => GitError::TimedOut { args },
        }
    }

    /// True when the probe was cut short rather than failing on its own
    pub fn is_interrupted(&self) -> bool {
        matches!(self, GitError::TimedOut { .. } | GitError::Cancelled { .. })
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "killed by signal".to_string(),
    }
}

/// Result type alias using GitError
pub type Result<T> = std::result::Result<T, GitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_message_includes_exit_code_and_stderr() {
        let err = GitError::Failed {
            args: "status --porcelain=v2 --branch".to_string(),
            code: Some(128),
            stderr: "fatal: not a git repository".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "`git status --porcelain=v2 --branch` failed (exit code 128): fatal: not a git repository"
        );
        assert!(!err.is_interrupted());
    }

    #[test]
    fn test_stop_reason_maps_to_variant() {
        assert!(matches!(
            GitError::stopped(StopReason::DeadlineExceeded, "fetch"),
            GitError::TimedOut { .. }
        ));
        let cancelled = GitError::stopped(StopReason::Cancelled, "fetch");
        assert!(cancelled.is_interrupted());
        assert_eq!(cancelled.to_string(), "`git fetch` was cancelled");
    }
}
