//! Git Vision - keep an eye on every git repository under a set of directories
//!
//! This library is the repository observation engine behind the `gv` binary.
//! It discovers repositories (and their linked worktrees), reads their status
//! and diff telemetry by driving the `git` executable, and notices when a
//! repository changes without re-reading everything on every tick.
//!
//! # Architecture
//!
//! The library is organized into focused modules:
//!
//! - **repository** - Plain data: `Repository`, `RepoStatus`, `DiffStats`
//! - **scanner** - Concurrent filesystem walk that finds repositories and worktrees
//! - **git** - Timeout-bounded git subprocesses and the parsers for their output
//! - **watcher** - Fingerprint-based change poller with backpressure-safe delivery
//! - **config** - Scan roots, ignore globs, depth, poll interval and aliases
//! - **cancel** / **sync** - Deadlines, cancellation and the worker budget
//!
//! # Example
//!
//! ```rust,no_run
//! use gitvision::{CancelToken, Config, GitReader, Walker};
//! use std::time::Duration;
//!
//! let config = Config::default();
//! let walker = Walker::from_config(&config).expect("valid ignore patterns");
//! let token = CancelToken::background().with_timeout(Duration::from_secs(30));
//! let report = walker.scan(&token).expect("scan was not cancelled");
//!
//! let reader = GitReader::new();
//! let paths: Vec<_> = report.repos.iter().map(|r| r.path.clone()).collect();
//! let batch = reader.get_status_batch(&paths, &token);
//! for (path, status) in &batch.results {
//!     if status.is_dirty() {
//!         println!("{} has uncommitted changes", path.display());
//!     }
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod git;
pub mod repository;
pub mod scanner;
pub mod sync;
pub mod watcher;

pub use cancel::{CancelHandle, CancelToken, StopReason};
pub use config::{Config, ConfigError, IgnoreSet};
pub use git::{Batch, FetchOutcome, GitError, GitReader};
pub use repository::{DiffSide, DiffStats, FileChurnEntry, FileDiffStat, RepoStatus, Repository};
pub use scanner::{IgnorePredicate, ScanError, ScanReport, Walker};
pub use watcher::{PollEvent, Poller};
