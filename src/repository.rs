//! Repository data model
//!
//! Plain records describing a discovered repository, its working-tree status
//! and its diff telemetry. Status and diff records are produced fresh on each
//! refresh and replace the previous value wholesale.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// A git repository or linked worktree found by the scanner.
///
/// Identity is the absolute `path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    /// Absolute path of the working directory
    pub path: PathBuf,

    /// Optional display name; falls back to the final path component
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// True when the working directory is a linked worktree (`.git` is a file)
    pub is_worktree: bool,

    /// Working directory of the main repository, for linked worktrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_worktree: Option<PathBuf>,

    /// When status was last read
    #[serde(default)]
    pub last_scanned: Option<DateTime<Local>>,

    #[serde(default)]
    pub status: Option<RepoStatus>,

    #[serde(default)]
    pub diff: Option<DiffStats>,
}

impl Repository {
    /// A normal repository whose `.git` is a directory
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: None,
            is_worktree: false,
            main_worktree: None,
            last_scanned: None,
            status: None,
            diff: None,
        }
    }

    /// A linked worktree, optionally pointing back at its main working directory
    pub fn linked_worktree(path: impl Into<PathBuf>, main_worktree: Option<PathBuf>) -> Self {
        Self {
            is_worktree: true,
            main_worktree,
            ..Self::new(path)
        }
    }

    /// Configured name, or the final component of the path
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Replace the status record and stamp the scan time
    pub fn apply_status(&mut self, status: RepoStatus) {
        self.status = Some(status);
        self.last_scanned = Some(Local::now());
    }

    pub fn apply_diff(&mut self, diff: DiffStats) {
        self.diff = Some(diff);
    }

    pub fn is_dirty(&self) -> bool {
        self.status.as_ref().is_some_and(RepoStatus::is_dirty)
    }
}

/// Working-tree status of one repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoStatus {
    /// Checked-out branch; `None` when HEAD is detached
    pub branch: Option<String>,
    pub detached_head: bool,
    /// First seven characters of HEAD's object id
    pub commit_hash: Option<String>,

    pub staged: usize,
    pub modified: usize,
    pub untracked: usize,

    /// Upstream tracking ref, e.g. `origin/main`
    pub remote: Option<String>,
    /// Owner or organisation parsed from the `origin` URL
    pub owner: Option<String>,
    pub ahead: usize,
    pub behind: usize,
    pub stashes: usize,

    pub merge_head: bool,
    pub rebase_head: bool,
    pub cherry_pick: bool,
    pub reverting: bool,
    pub bisecting: bool,

    pub last_commit: Option<DateTime<Local>>,
    /// Newest mtime among the paths the status probe reported
    pub last_modified: Option<DateTime<Local>>,

    /// Alias name to captured output
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl RepoStatus {
    pub fn is_dirty(&self) -> bool {
        self.staged + self.modified + self.untracked > 0
    }

    /// True when a merge, rebase, cherry-pick, revert or bisect is in progress
    pub fn has_special_state(&self) -> bool {
        self.merge_head || self.rebase_head || self.cherry_pick || self.reverting || self.bisecting
    }

    /// Labels for every in-progress operation, in a fixed order
    pub fn special_states(&self) -> Vec<&'static str> {
        [
            (self.merge_head, "merging"),
            (self.rebase_head, "rebasing"),
            (self.cherry_pick, "cherry-picking"),
            (self.reverting, "reverting"),
            (self.bisecting, "bisecting"),
        ]
        .into_iter()
        .filter_map(|(set, label)| set.then_some(label))
        .collect()
    }

    /// Branch name, or `(detached <hash>)` when HEAD is detached
    pub fn head_label(&self) -> String {
        match (&self.branch, &self.commit_hash) {
            (Some(branch), _) => branch.clone(),
            (None, Some(hash)) => format!("(detached {hash})"),
            (None, None) => "(detached)".to_string(),
        }
    }
}

/// One line of `git diff --numstat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiffStat {
    pub path: String,
    pub added: usize,
    pub deleted: usize,
    /// Binary files count as changed but contribute no lines
    pub binary: bool,
}

/// File-level entries for one side of the diff (staged or unstaged).
///
/// The line totals are computed from `files` when the side is built and
/// cannot be set on their own. Deserializing recomputes them too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DiffSideFiles")]
pub struct DiffSide {
    files: Vec<FileDiffStat>,
    added: usize,
    deleted: usize,
}

#[derive(Deserialize)]
struct DiffSideFiles {
    #[serde(default)]
    files: Vec<FileDiffStat>,
}

impl From<DiffSideFiles> for DiffSide {
    fn from(side: DiffSideFiles) -> Self {
        Self::from_files(side.files)
    }
}

impl DiffSide {
    /// Build a side from its files, summing the non-binary line counts
    pub fn from_files(files: Vec<FileDiffStat>) -> Self {
        let (added, deleted) = files
            .iter()
            .filter(|file| !file.binary)
            .fold((0, 0), |(added, deleted), file| {
                (added + file.added, deleted + file.deleted)
            });
        Self {
            files,
            added,
            deleted,
        }
    }

    pub fn files(&self) -> &[FileDiffStat] {
        &self.files
    }

    /// Lines added across non-binary files
    pub fn added(&self) -> usize {
        self.added
    }

    pub fn deleted(&self) -> usize {
        self.deleted
    }
}

/// A file and the number of recent commits that touched it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChurnEntry {
    pub path: String,
    pub commits: usize,
}

/// Diff and activity telemetry for one repository.
///
/// Totals are derived from the two sides on every call, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffStats {
    pub unstaged: DiffSide,
    pub staged: DiffSide,
    /// Commits per day; index 0 is six days ago, index 6 is today
    pub daily_commits: [usize; 7],
    /// Commits in the last seven days touching each path
    pub file_churn: HashMap<String, usize>,
    pub collected_at: DateTime<Local>,
}

impl DiffStats {
    /// All-zero stats stamped with `collected_at`
    pub fn empty(collected_at: DateTime<Local>) -> Self {
        Self {
            unstaged: DiffSide::default(),
            staged: DiffSide::default(),
            daily_commits: [0; 7],
            file_churn: HashMap::new(),
            collected_at,
        }
    }

    pub fn total_added(&self) -> usize {
        self.unstaged.added() + self.staged.added()
    }

    pub fn total_deleted(&self) -> usize {
        self.unstaged.deleted() + self.staged.deleted()
    }

    /// Lines added minus lines deleted across both sides
    pub fn net_delta(&self) -> i64 {
        self.total_added() as i64 - self.total_deleted() as i64
    }

    /// Lines touched in either direction
    pub fn total_diff_volume(&self) -> usize {
        self.total_added() + self.total_deleted()
    }

    pub fn commits_this_week(&self) -> usize {
        self.daily_commits.iter().sum()
    }

    /// The `n` most-touched files, most commits first and ties by path.
    /// `n == 0` returns every file.
    pub fn top_churn_files(&self, n: usize) -> Vec<FileChurnEntry> {
        let mut entries: Vec<FileChurnEntry> = self
            .file_churn
            .iter()
            .map(|(path, &commits)| FileChurnEntry {
                path: path.clone(),
                commits,
            })
            .collect();
        entries.sort_by(|a, b| {
            (Reverse(a.commits), &a.path).cmp(&(Reverse(b.commits), &b.path))
        });
        if n > 0 {
            entries.truncate(n);
        }
        entries
    }
}
