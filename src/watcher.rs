//! Change detection by polling
//!
//! The [`Poller`] keeps one fingerprint per watched repository and emits a
//! [`PollEvent`] when it changes. Events carry the status probe output that
//! produced the new fingerprint, so the consumer can rebuild the status with
//! [`GitReader::get_status_from_output`](crate::GitReader::get_status_from_output)
//! instead of running the probe again.

mod poller;

pub use poller::{DEFAULT_EVENT_CAPACITY, MIN_POLL_INTERVAL, Poller};

use chrono::{DateTime, Local};
use std::path::PathBuf;

/// A watched repository whose fingerprint changed
#[derive(Debug, Clone, PartialEq)]
pub struct PollEvent {
    pub path: PathBuf,
    pub time: DateTime<Local>,
    /// Raw `git status --porcelain=v2 --branch` output at detection time
    pub status_output: String,
}
