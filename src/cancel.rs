//! Cancellation and deadlines for blocking work
//!
//! Every git subprocess, filesystem walk and worker-slot wait takes a
//! [`CancelToken`]. A token carries an optional deadline and a cancellation
//! signal. Tokens derived with [`CancelToken::with_timeout`] share their
//! parent's signal and can only tighten its deadline, so cancelling a root
//! token stops everything started underneath it.

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::time::{Duration, Instant};

/// Why a token stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The owning [`CancelHandle`] was cancelled or dropped
    Cancelled,
    /// The token's deadline passed
    DeadlineExceeded,
}

/// Cheap, cloneable view of a cancellation scope
#[derive(Debug, Clone)]
pub struct CancelToken {
    // Nothing is ever sent; the channel disconnects when the handle goes away.
    done: Receiver<()>,
    deadline: Option<Instant>,
}

/// Owning side of a cancellable scope. Dropping it cancels the scope.
#[derive(Debug)]
pub struct CancelHandle {
    _signal: Sender<()>,
}

impl CancelHandle {
    /// Cancel every token derived from this handle
    pub fn cancel(self) {
        drop(self);
    }
}

impl CancelToken {
    /// Create a cancellable scope with no deadline
    pub fn new() -> (CancelHandle, CancelToken) {
        let (signal, done) = crossbeam_channel::bounded(0);
        (
            CancelHandle { _signal: signal },
            CancelToken {
                done,
                deadline: None,
            },
        )
    }

    /// A token that is never cancelled and has no deadline
    pub fn background() -> Self {
        CancelToken {
            done: crossbeam_channel::never(),
            deadline: None,
        }
    }

    /// Derive a token that additionally expires after `timeout`.
    ///
    /// The result keeps whichever deadline comes first.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.clone(),
        }
    }

    /// Derive a token that additionally expires at `deadline`
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        };
        CancelToken {
            done: self.done.clone(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns why the token stopped, or `None` while it is still live.
    /// Cancellation wins over an expired deadline.
    pub fn stop_reason(&self) -> Option<StopReason> {
        if let Err(TryRecvError::Disconnected) = self.done.try_recv() {
            return Some(StopReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(StopReason::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_reason().is_some()
    }

    /// Channel that becomes ready (disconnected) on cancellation, for use in
    /// `crossbeam_channel::select!`
    pub fn done(&self) -> &Receiver<()> {
        &self.done
    }

    /// Channel that fires once the deadline passes; never fires without one
    pub fn expired(&self) -> Receiver<Instant> {
        match self.deadline {
            Some(deadline) => crossbeam_channel::at(deadline),
            None => crossbeam_channel::never(),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::background()
    }
}
