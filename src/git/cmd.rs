//! Running `git` as a bounded, killable subprocess.

use super::error::{GitError, Result};
use crate::cancel::CancelToken;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

const GIT: &str = "git";

/// How long a single wait on the child lasts before the token is re-checked.
const WAIT_SLICE: Duration = Duration::from_millis(10);

/// Run `git <args>` in `dir` and return its stdout.
///
/// The child is killed and reaped as soon as `token` is cancelled or its
/// deadline passes. A non-zero exit becomes [`GitError::Failed`] carrying the
/// trimmed stderr.
pub fn git_output(dir: &Path, args: &[&str], token: &CancelToken) -> Result<String> {
    let cmd_str = args.join(" ");
    log::debug!("$ git {} [{}]", cmd_str, dir.display());

    if let Some(reason) = token.stop_reason() {
        return Err(GitError::stopped(reason, &cmd_str));
    }

    let started = Instant::now();
    let result = spawn_and_wait(dir, args, &cmd_str, token);
    let elapsed = started.elapsed();

    match &result {
        Ok(_) => log::debug!(
            "git {} [{}] dur_us={} ok=true",
            cmd_str,
            dir.display(),
            elapsed.as_micros()
        ),
        Err(err) => log::debug!(
            "git {} [{}] dur_us={} err=\"{}\"",
            cmd_str,
            dir.display(),
            elapsed.as_micros(),
            err
        ),
    }

    result
}

fn spawn_and_wait(dir: &Path, args: &[&str], cmd_str: &str, token: &CancelToken) -> Result<String> {
    let mut child = Command::new(GIT)
        .args(args)
        .current_dir(dir)
        // Read-only probes must not take index.lock away from the user.
        .env("GIT_OPTIONAL_LOCKS", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| GitError::Spawn {
            args: cmd_str.to_string(),
            source,
        })?;

    // Drain both pipes on their own threads so a chatty child never blocks on a full pipe.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = loop {
        match child.wait_timeout(WAIT_SLICE) {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(GitError::Io {
                    args: cmd_str.to_string(),
                    source,
                });
            }
        }

        if let Some(reason) = token.stop_reason() {
            let _ = child.kill();
            let _ = child.wait();
            // Helpers git spawned (ssh, credential managers) can keep the pipes
            // open after git itself is gone, so the reader threads are left to
            // finish on their own.
            drop((stdout, stderr));
            return Err(GitError::stopped(reason, cmd_str));
        }
    };

    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();

    if !status.success() {
        return Err(GitError::Failed {
            args: cmd_str.to_string(),
            code: status.code(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&stdout).into_owned())
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}
