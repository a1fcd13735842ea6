//! Walker - concurrent discovery of repositories under a set of roots

use super::detect::{detect_repository, discover_worktrees};
use super::error::{Result, ScanError};
use crate::cancel::CancelToken;
use crate::config::{Config, ConfigError, IgnoreSet};
use crate::repository::Repository;
use indexmap::IndexMap;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// Decides whether a directory should be pruned from the walk.
///
/// The path handed to the predicate is relative to the scan root, so
/// patterns never match the root's own ancestors.
pub trait IgnorePredicate: Sync {
    fn is_ignored(&self, path: &Path) -> bool;
}

impl IgnorePredicate for IgnoreSet {
    fn is_ignored(&self, path: &Path) -> bool {
        self.is_match(path)
    }
}

impl<F> IgnorePredicate for F
where
    F: Fn(&Path) -> bool + Sync,
{
    fn is_ignored(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Outcome of a scan across every root
#[derive(Debug)]
pub struct ScanReport {
    /// Deduplicated by path, in root order
    pub repos: Vec<Repository>,
    /// Roots that could not be read; the remaining roots were still scanned
    pub errors: Vec<ScanError>,
    pub duration: Duration,
}

impl ScanReport {
    pub fn worktree_count(&self) -> usize {
        self.repos.iter().filter(|repo| repo.is_worktree).count()
    }
}

/// Scans a set of roots for repositories and linked worktrees
#[derive(Debug, Clone)]
pub struct Walker<I = IgnoreSet> {
    roots: Vec<PathBuf>,
    max_depth: usize,
    ignore: I,
}

impl Walker<IgnoreSet> {
    /// Roots, depth and compiled ignore globs from `config`
    pub fn from_config(config: &Config) -> std::result::Result<Self, ConfigError> {
        Ok(Self::new(
            config.scan_paths.clone(),
            config.max_depth,
            config.ignore_set()?,
        ))
    }
}

impl<I: IgnorePredicate> Walker<I> {
    pub fn new(roots: Vec<PathBuf>, max_depth: usize, ignore: I) -> Self {
        Self {
            roots,
            max_depth,
            ignore,
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Walk every root in parallel and merge the results.
    ///
    /// Unreadable roots are reported in [`ScanReport::errors`]; only
    /// cancellation fails the whole scan.
    pub fn scan(&self, token: &CancelToken) -> Result<ScanReport> {
        let started = Instant::now();

        let outcomes: Vec<Result<Vec<Repository>>> = self
            .roots
            .par_iter()
            .map(|root| scan_root(root, self.max_depth, &self.ignore, token))
            .collect();

        let mut seen: IndexMap<PathBuf, Repository> = IndexMap::new();
        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(found) => {
                    for repo in found {
                        seen.entry(repo.path.clone()).or_insert(repo);
                    }
                }
                Err(ScanError::Cancelled) => return Err(ScanError::Cancelled),
                Err(err) => {
                    log::warn!("{}", err);
                    errors.push(err);
                }
            }
        }

        let report = ScanReport {
            repos: seen.into_values().collect(),
            errors,
            duration: started.elapsed(),
        };
        log::debug!(
            "Scanned {} roots: {} repositories in {:?}",
            self.roots.len(),
            report.repos.len(),
            report.duration
        );
        Ok(report)
    }
}

/// Walk one root, returning repositories in traversal order.
///
/// Depth counts path components below `root`: its children are depth 1.
/// Directories deeper than `max_depth`, named `.git`, or matched by `ignore`
/// (tested relative to the root, never the root itself) are not descended
/// into. Neither is a directory once it has been identified as a repository.
pub fn scan_root<I: IgnorePredicate + ?Sized>(
    root: &Path,
    max_depth: usize,
    ignore: &I,
    token: &CancelToken,
) -> Result<Vec<Repository>> {
    let unreadable = |source| ScanError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    };
    let root = dunce::canonicalize(root).map_err(unreadable)?;
    fs::read_dir(&root).map_err(unreadable)?;

    let mut repos = Vec::new();
    let mut entries = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = entries.next() {
        if token.is_stopped() {
            return Err(ScanError::Cancelled);
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::debug!("Skipping unreadable entry: {}", err);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        let depth = entry.depth();
        if depth > max_depth
            || entry.file_name() == ".git"
            || (depth > 0 && ignore.is_ignored(path.strip_prefix(&root).unwrap_or(path)))
        {
            entries.skip_current_dir();
            continue;
        }

        match detect_repository(path) {
            Ok(Some(repo)) => {
                let is_main = !repo.is_worktree;
                repos.push(repo);
                if is_main {
                    repos.extend(discover_worktrees(path));
                }
                entries.skip_current_dir();
            }
            Ok(None) => {}
            Err(err) => log::debug!("Cannot probe {}: {}", path.display(), err),
        }
    }

    Ok(repos)
}
