//! Repository discovery
//!
//! Walks directory trees looking for `.git` entries. A `.git` directory marks
//! a normal repository, a `.git` file marks a linked worktree, and a main
//! repository's `.git/worktrees/*` registry contributes the worktrees that
//! live outside the scanned trees.

mod detect;
mod error;
mod walker;

pub use error::{Result as ScanResult, ScanError};
pub use walker::{IgnorePredicate, ScanReport, Walker, scan_root};

pub(crate) use detect::resolve_git_dir;
