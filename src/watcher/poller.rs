//! Poller - fingerprint-based change detection with lossless backpressure

use super::PollEvent;
use crate::cancel::CancelToken;
use crate::git::{STATUS_ARGS, git_output};
use crate::sync::Semaphore;
use chrono::Local;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// Shortest interval a poller will tick at
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Events buffered before delivery starts failing
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

const POLL_CONCURRENCY: usize = 4;
const STATUS_TIMEOUT: Duration = Duration::from_secs(5);
const STASH_REF_TIMEOUT: Duration = Duration::from_secs(3);
const STASH_REF_ARGS: [&str; 2] = ["rev-parse", "refs/stash"];

/// Watches repositories and reports the ones whose state changed.
///
/// Each watched path maps to the fingerprint last *delivered*. A change whose
/// event cannot be queued keeps the old fingerprint, so it is detected again
/// on the next pass instead of being lost.
#[derive(Debug)]
pub struct Poller {
    interval: Duration,
    repos: RwLock<HashMap<PathBuf, String>>,
    sender: Mutex<Option<Sender<PollEvent>>>,
    events: Receiver<PollEvent>,
    permits: Semaphore,
}

struct Fingerprint {
    hash: String,
    status_output: String,
}

impl Poller {
    /// Poller ticking every `interval` (at least [`MIN_POLL_INTERVAL`])
    pub fn new(interval: Duration) -> Self {
        Self::with_capacity(interval, DEFAULT_EVENT_CAPACITY)
    }

    /// Poller whose event queue holds at most `capacity` undelivered events
    pub fn with_capacity(interval: Duration, capacity: usize) -> Self {
        let (sender, events) = crossbeam_channel::bounded(capacity.max(1));
        Self {
            interval: interval.max(MIN_POLL_INTERVAL),
            repos: RwLock::new(HashMap::new()),
            sender: Mutex::new(Some(sender)),
            events,
            permits: Semaphore::new(POLL_CONCURRENCY),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Receiving end of the event stream. Disconnects after [`close`](Self::close)
    /// once drained.
    pub fn events(&self) -> Receiver<PollEvent> {
        self.events.clone()
    }

    /// Start watching `path`. Watching an already-watched path does nothing.
    ///
    /// The initial fingerprint is taken immediately; if the probe fails the
    /// path is still registered, with an empty fingerprint.
    pub fn watch(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        if self.read_repos().contains_key(&path) {
            return;
        }

        let hash = fingerprint(&path, &CancelToken::background())
            .map(|fp| fp.hash)
            .unwrap_or_default();

        self.write_repos().entry(path).or_insert(hash);
    }

    /// [`watch`](Self::watch) every path, taking the initial fingerprints in
    /// parallel on the poll permit budget.
    pub fn watch_all(&self, paths: &[PathBuf]) {
        paths.par_iter().for_each(|path| {
            let _permit = self.permits.acquire();
            self.watch(path.clone());
        });
    }

    /// Stop watching `path`. A poll pass already in flight for it is discarded.
    pub fn unwatch(&self, path: &Path) {
        self.write_repos().remove(path);
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.read_repos().contains_key(path)
    }

    pub fn watched(&self) -> usize {
        self.read_repos().len()
    }

    /// Poll every `interval` until `token` is cancelled or expires.
    pub fn run(&self, token: &CancelToken) {
        let ticker = crossbeam_channel::tick(self.interval);
        let expired = token.expired();
        log::debug!("Polling {} repositories every {:?}", self.watched(), self.interval);

        loop {
            crossbeam_channel::select! {
                recv(token.done()) -> _ => break,
                recv(expired) -> _ => break,
                recv(ticker) -> _ => {
                    self.poll(token);
                }
            }
        }

        log::debug!("Poller stopped");
    }

    /// One poll pass. Returns how many events were delivered.
    ///
    /// Fingerprints are recomputed in parallel without holding the map lock.
    /// Probe failures count as "no change".
    pub fn poll(&self, token: &CancelToken) -> usize {
        let snapshot: Vec<(PathBuf, String)> = self
            .read_repos()
            .iter()
            .map(|(path, hash)| (path.clone(), hash.clone()))
            .collect();

        let changes: Vec<(PathBuf, Fingerprint)> = snapshot
            .into_par_iter()
            .filter_map(|(path, last_hash)| {
                let _permit = self.permits.acquire_until(token).ok()?;
                let current = fingerprint(&path, token)?;
                (current.hash != last_hash).then_some((path, current))
            })
            .collect();

        if changes.is_empty() {
            return 0;
        }

        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = sender.as_ref() else {
            return 0;
        };

        let mut repos = self.write_repos();
        let mut delivered = 0;
        for (path, current) in changes {
            let Some(stored) = repos.get_mut(&path) else {
                continue;
            };
            let event = PollEvent {
                path: path.clone(),
                time: Local::now(),
                status_output: current.status_output,
            };
            match sender.try_send(event) {
                Ok(()) => {
                    *stored = current.hash;
                    delivered += 1;
                }
                Err(TrySendError::Full(_)) => {
                    log::debug!("Event queue full, will retry {}", path.display());
                }
                Err(TrySendError::Disconnected(_)) => break,
            }
        }
        delivered
    }

    /// Stop delivering events. Consumers see the stream end once drained.
    pub fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn read_repos(&self) -> RwLockReadGuard<'_, HashMap<PathBuf, String>> {
        self.repos.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_repos(&self) -> RwLockWriteGuard<'_, HashMap<PathBuf, String>> {
        self.repos.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// SHA-256 over the status probe output followed by the stash ref.
/// `None` when the status probe fails.
fn fingerprint(path: &Path, token: &CancelToken) -> Option<Fingerprint> {
    let status_output = git_output(path, &STATUS_ARGS, &token.with_timeout(STATUS_TIMEOUT))
        .inspect_err(|err| log::trace!("Fingerprint failed for {}: {}", path.display(), err))
        .ok()?;
    // No stash is an error here; it just contributes nothing.
    let stash_ref = git_output(path, &STASH_REF_ARGS, &token.with_timeout(STASH_REF_TIMEOUT))
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(status_output.as_bytes());
    hasher.update(stash_ref.as_bytes());
    Some(Fingerprint {
        hash: format!("{:x}", hasher.finalize()),
        status_output,
    })
}
