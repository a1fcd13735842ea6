//! GitReader - status, fetch and diff telemetry read through the git CLI

use super::cmd::git_output;
use super::error::{GitError, Result};
use super::numstat::{count_lines, parse_daily_commits, parse_file_churn, parse_numstat};
use super::porcelain::{entry_paths, parse_porcelain_v2};
use super::remote::owner_from_remote_url;
use super::special_state::apply_special_state;
use crate::cancel::CancelToken;
use crate::repository::{DiffStats, RepoStatus};
use crate::sync::Semaphore;
use chrono::{DateTime, Local};
use indexmap::IndexMap;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, ScopedJoinHandle};
use std::time::Duration;

/// Machine-readable status probe; also the poller's fingerprint source
pub const STATUS_ARGS: [&str; 3] = ["status", "--porcelain=v2", "--branch"];
const STASH_LIST_ARGS: [&str; 2] = ["stash", "list"];
const LAST_COMMIT_ARGS: [&str; 3] = ["log", "-1", "--format=%ct"];
const REMOTE_URL_ARGS: [&str; 3] = ["remote", "get-url", "origin"];
const FETCH_ARGS: [&str; 2] = ["fetch", "--quiet"];
const UNSTAGED_DIFF_ARGS: [&str; 2] = ["diff", "--numstat"];
const STAGED_DIFF_ARGS: [&str; 3] = ["diff", "--cached", "--numstat"];
const COMMIT_DATES_ARGS: [&str; 4] = [
    "log",
    "--since=7.days",
    "--format=%cd",
    "--date=format:%Y-%m-%d",
];
const CHURN_ARGS: [&str; 4] = ["log", "--since=7.days", "--name-only", "--format="];

/// Per-invocation ceiling for local probes
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Per-invocation ceiling for `git fetch`
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Concurrent repositories per batch
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Per-path results of a batch operation. A path may appear in both maps
/// when a fetch failed but the following status read succeeded.
#[derive(Debug)]
pub struct Batch<T> {
    pub results: HashMap<PathBuf, T>,
    pub errors: HashMap<PathBuf, GitError>,
}

impl<T> Default for Batch<T> {
    fn default() -> Self {
        Self {
            results: HashMap::new(),
            errors: HashMap::new(),
        }
    }
}

impl<T> FromIterator<(PathBuf, Result<T>)> for Batch<T> {
    fn from_iter<I: IntoIterator<Item = (PathBuf, Result<T>)>>(iter: I) -> Self {
        let mut batch = Batch::default();
        for (path, outcome) in iter {
            match outcome {
                Ok(value) => {
                    batch.results.insert(path, value);
                }
                Err(err) => {
                    batch.errors.insert(path, err);
                }
            }
        }
        batch
    }
}

/// A status read that followed a fetch
#[derive(Debug)]
pub struct FetchOutcome {
    /// Fresh status, read regardless of how the fetch went
    pub status: RepoStatus,
    /// Why the fetch failed, if it did
    pub fetch_error: Option<GitError>,
}

/// Reads repository state by running git subprocesses.
///
/// Every call takes a [`CancelToken`]; each subprocess additionally gets its
/// own timeout derived from it. Batch calls fan out over rayon's pool and
/// hold a permit from a fixed-size budget per repository.
#[derive(Debug, Clone)]
pub struct GitReader {
    permits: Semaphore,
    fetch_permits: Semaphore,
    probe_timeout: Duration,
    fetch_timeout: Duration,
}

impl Default for GitReader {
    fn default() -> Self {
        Self::new()
    }
}

impl GitReader {
    pub fn new() -> Self {
        Self::with_concurrency(DEFAULT_CONCURRENCY)
    }

    /// Reader whose batches touch at most `limit` repositories at once
    pub fn with_concurrency(limit: usize) -> Self {
        Self {
            permits: Semaphore::new(limit),
            fetch_permits: Semaphore::new(limit),
            probe_timeout: PROBE_TIMEOUT,
            fetch_timeout: FETCH_TIMEOUT,
        }
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Run the status probe and build a full [`RepoStatus`].
    ///
    /// Fails only when the status probe itself fails.
    pub fn get_status(&self, path: &Path, token: &CancelToken) -> Result<RepoStatus> {
        let output = git_output(path, &STATUS_ARGS, &token.with_timeout(self.probe_timeout))?;
        Ok(self.get_status_from_output(path, &output, token))
    }

    /// Build a [`RepoStatus`] from status probe output captured earlier.
    ///
    /// The stash count, last commit time and remote owner probes run
    /// concurrently; any that fail leave their field empty. Special states and
    /// the last modification time come from the filesystem.
    pub fn get_status_from_output(
        &self,
        path: &Path,
        output: &str,
        token: &CancelToken,
    ) -> RepoStatus {
        let mut status = parse_porcelain_v2(output);

        let (stashes, last_commit, owner) = thread::scope(|s| {
            let stashes = s.spawn(|| {
                self.probe(path, &STASH_LIST_ARGS, token)
                    .map(|out| count_lines(&out))
            });
            let last_commit = s.spawn(|| {
                self.probe(path, &LAST_COMMIT_ARGS, token)
                    .and_then(|out| parse_unix_time(&out))
            });
            let owner = s.spawn(|| {
                self.probe(path, &REMOTE_URL_ARGS, token)
                    .and_then(|out| owner_from_remote_url(&out).map(str::to_string))
            });
            (joined(stashes), joined(last_commit), joined(owner))
        });

        status.stashes = stashes.unwrap_or(0);
        status.last_commit = last_commit;
        status.owner = owner;
        apply_special_state(path, &mut status);
        status.last_modified = newest_mtime(path, output);
        status
    }

    /// [`get_status`](Self::get_status) for every path, at most
    /// `concurrency` at a time. Failures are per path.
    pub fn get_status_batch(&self, paths: &[PathBuf], token: &CancelToken) -> Batch<RepoStatus> {
        self.fan_out(&self.permits, paths, token, |path| self.get_status(path, token))
            .into_iter()
            .collect()
    }

    /// Fetch, then read status with the caller's original deadline.
    ///
    /// A failed fetch still yields a fresh status alongside the fetch error;
    /// only a failed status read is an `Err`.
    pub fn fetch(&self, path: &Path, token: &CancelToken) -> Result<FetchOutcome> {
        let fetch_error = git_output(path, &FETCH_ARGS, &token.with_timeout(self.fetch_timeout))
            .inspect_err(|err| log::debug!("Fetch failed in {}: {}", path.display(), err))
            .err();
        let status = self.get_status(path, token)?;
        Ok(FetchOutcome {
            status,
            fetch_error,
        })
    }

    /// [`fetch`](Self::fetch) for every path on its own permit budget.
    ///
    /// Paths whose fetch failed appear in `errors` and, when the status read
    /// still worked, in `results` as well.
    pub fn fetch_batch(&self, paths: &[PathBuf], token: &CancelToken) -> Batch<RepoStatus> {
        let mut batch = Batch::default();
        for (path, outcome) in self.fan_out(&self.fetch_permits, paths, token, |path| {
            self.fetch(path, token)
        }) {
            match outcome {
                Ok(FetchOutcome {
                    status,
                    fetch_error,
                }) => {
                    if let Some(err) = fetch_error {
                        batch.errors.insert(path.clone(), err);
                    }
                    batch.results.insert(path, status);
                }
                Err(err) => {
                    batch.errors.insert(path, err);
                }
            }
        }
        batch
    }

    /// Line diffs (unstaged and staged) plus seven days of commit activity.
    ///
    /// The four probes run concurrently. A failed probe leaves its part of
    /// the result empty; this never fails.
    pub fn get_diff_stats(&self, path: &Path, token: &CancelToken) -> DiffStats {
        let today = Local::now().date_naive();

        let (unstaged, staged, daily_commits, file_churn) = thread::scope(|s| {
            let unstaged = s.spawn(|| {
                self.probe(path, &UNSTAGED_DIFF_ARGS, token)
                    .map(|out| parse_numstat(&out))
            });
            let staged = s.spawn(|| {
                self.probe(path, &STAGED_DIFF_ARGS, token)
                    .map(|out| parse_numstat(&out))
            });
            let daily_commits = s.spawn(|| {
                self.probe(path, &COMMIT_DATES_ARGS, token)
                    .map(|out| parse_daily_commits(&out, today))
            });
            let file_churn = s.spawn(|| {
                self.probe(path, &CHURN_ARGS, token)
                    .map(|out| parse_file_churn(&out))
            });
            (
                joined(unstaged),
                joined(staged),
                joined(daily_commits),
                joined(file_churn),
            )
        });

        DiffStats {
            unstaged: unstaged.unwrap_or_default(),
            staged: staged.unwrap_or_default(),
            daily_commits: daily_commits.unwrap_or([0; 7]),
            file_churn: file_churn.unwrap_or_default(),
            collected_at: Local::now(),
        }
    }

    /// [`get_diff_stats`](Self::get_diff_stats) for every path. Paths still
    /// queued when `token` stops get empty stats.
    pub fn get_diff_stats_batch(
        &self,
        paths: &[PathBuf],
        token: &CancelToken,
    ) -> HashMap<PathBuf, DiffStats> {
        paths
            .par_iter()
            .map(|path| {
                let stats = match self.permits.acquire_until(token) {
                    Ok(_permit) => self.get_diff_stats(path, token),
                    Err(_) => DiffStats::empty(Local::now()),
                };
                (path.clone(), stats)
            })
            .collect()
    }

    /// Run a user-defined git command (whitespace-split into arguments) and
    /// return its stdout.
    pub fn run_alias(&self, path: &Path, command: &str, token: &CancelToken) -> Result<String> {
        let args: Vec<&str> = command.split_whitespace().collect();
        git_output(path, &args, token)
    }

    /// Run every alias in `aliases`, keeping the trimmed output of those that
    /// succeed.
    pub fn run_aliases(
        &self,
        path: &Path,
        aliases: &IndexMap<String, String>,
        token: &CancelToken,
    ) -> BTreeMap<String, String> {
        aliases
            .iter()
            .filter_map(|(name, command)| {
                let output = self
                    .run_alias(path, command, &token.with_timeout(self.probe_timeout))
                    .inspect_err(|err| {
                        log::debug!("Alias '{}' failed in {}: {}", name, path.display(), err)
                    })
                    .ok()?;
                Some((name.clone(), output.trim().to_string()))
            })
            .collect()
    }

    /// [`run_aliases`](Self::run_aliases) for every path on the reader's
    /// permit budget. Paths still queued when `token` stops are left out.
    pub fn run_aliases_batch(
        &self,
        paths: &[PathBuf],
        aliases: &IndexMap<String, String>,
        token: &CancelToken,
    ) -> HashMap<PathBuf, BTreeMap<String, String>> {
        if aliases.is_empty() {
            return HashMap::new();
        }
        self.fan_out(&self.permits, paths, token, |path| {
            Ok(self.run_aliases(path, aliases, token))
        })
        .into_iter()
        .filter_map(|(path, outcome)| Some((path, outcome.ok()?)))
        .collect()
    }

    fn probe(&self, path: &Path, args: &[&str], token: &CancelToken) -> Option<String> {
        git_output(path, args, &token.with_timeout(self.probe_timeout))
            .inspect_err(|err| log::debug!("Probe failed in {}: {}", path.display(), err))
            .ok()
    }

    fn fan_out<T, F>(
        &self,
        permits: &Semaphore,
        paths: &[PathBuf],
        token: &CancelToken,
        op: F,
    ) -> Vec<(PathBuf, Result<T>)>
    where
        T: Send,
        F: Fn(&Path) -> Result<T> + Sync,
    {
        paths
            .par_iter()
            .map(|path| {
                let outcome = match permits.acquire_until(token) {
                    Ok(_permit) => op(path),
                    Err(reason) => Err(GitError::stopped(reason, "(queued)")),
                };
                (path.clone(), outcome)
            })
            .collect()
    }
}

fn joined<T>(handle: ScopedJoinHandle<'_, Option<T>>) -> Option<T> {
    handle.join().ok().flatten()
}

fn parse_unix_time(output: &str) -> Option<DateTime<Local>> {
    let secs = output.trim().parse::<i64>().ok()?;
    DateTime::from_timestamp(secs, 0).map(|utc| utc.with_timezone(&Local))
}

/// Newest mtime among the working-tree paths named in status output
fn newest_mtime(repo: &Path, status_output: &str) -> Option<DateTime<Local>> {
    entry_paths(status_output)
        .filter_map(|rel| {
            fs::symlink_metadata(repo.join(rel))
                .and_then(|meta| meta.modified())
                .ok()
        })
        .max()
        .map(DateTime::<Local>::from)
}
