//! Filesystem probes that identify repositories and linked worktrees.

use crate::repository::Repository;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const DOT_GIT: &str = ".git";
const GITDIR_PREFIX: &str = "gitdir:";
const WORKTREES_SEGMENT: &str = "/.git/worktrees/";

/// Classify `dir` by its `.git` entry.
///
/// A `.git` directory means a normal repository, a `.git` file means a linked
/// worktree. Returns `Ok(None)` when there is no `.git` at all.
pub(crate) fn detect_repository(dir: &Path) -> io::Result<Option<Repository>> {
    let dot_git = dir.join(DOT_GIT);
    let meta = match fs::metadata(&dot_git) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };

    if meta.is_dir() {
        return Ok(Some(Repository::new(dir)));
    }

    let main_worktree = read_gitdir_pointer(&dot_git)?
        .map(|gitdir| resolve_pointer(dir, &gitdir))
        .and_then(|gitdir| main_worktree_of(&gitdir));
    Ok(Some(Repository::linked_worktree(dir, main_worktree)))
}

/// Read the `gitdir: <path>` line of a `.git` file. The path is returned as
/// written, which may be relative to the file's directory.
pub(crate) fn read_gitdir_pointer(dot_git_file: &Path) -> io::Result<Option<PathBuf>> {
    let content = fs::read_to_string(dot_git_file)?;
    Ok(content
        .lines()
        .find_map(|line| line.trim().strip_prefix(GITDIR_PREFIX))
        .map(|target| PathBuf::from(target.trim())))
}

/// The directory holding `<dir>`'s git metadata, following a worktree's
/// `gitdir:` pointer. Falls back to `<dir>/.git`.
pub(crate) fn resolve_git_dir(dir: &Path) -> PathBuf {
    let dot_git = dir.join(DOT_GIT);
    if dot_git.is_file()
        && let Ok(Some(target)) = read_gitdir_pointer(&dot_git)
    {
        return resolve_pointer(dir, &target);
    }
    dot_git
}

/// Absolute form of a path read from a pointer file in `base`. Relative
/// pointers are canonicalized when the target exists so they compare equal
/// to walked paths.
fn resolve_pointer(base: &Path, target: &Path) -> PathBuf {
    if target.is_absolute() {
        return target.to_path_buf();
    }
    let joined = base.join(target);
    dunce::canonicalize(&joined).unwrap_or(joined)
}

fn main_worktree_of(gitdir: &Path) -> Option<PathBuf> {
    let gitdir = gitdir.to_str()?;
    gitdir
        .find(WORKTREES_SEGMENT)
        .map(|idx| PathBuf::from(&gitdir[..idx]))
}

/// Linked worktrees registered under `<repo>/.git/worktrees/*`, sorted by path.
///
/// Each entry's `gitdir` file names the worktree's own `.git` file, relative
/// to the entry when not absolute; its parent is the working directory, which
/// must still exist.
pub(crate) fn discover_worktrees(repo: &Path) -> Vec<Repository> {
    let registry = repo.join(DOT_GIT).join("worktrees");
    let Ok(entries) = fs::read_dir(&registry) else {
        return Vec::new();
    };

    let mut worktrees: Vec<Repository> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|entry| {
            let pointer = fs::read_to_string(entry.path().join("gitdir")).ok()?;
            let dot_git = resolve_pointer(&entry.path(), Path::new(pointer.trim()));
            let workdir = dot_git.parent()?.to_path_buf();
            if !workdir.is_dir() {
                log::debug!(
                    "Skipping stale worktree {} (missing {})",
                    entry.path().display(),
                    workdir.display()
                );
                return None;
            }
            Some(Repository::linked_worktree(workdir, Some(repo.to_path_buf())))
        })
        .collect();

    worktrees.sort_by(|a, b| a.path.cmp(&b.path));
    worktrees
}
