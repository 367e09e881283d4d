//! Cooperative cancellation for session threads
//!
//! A session is never killed from the outside. Instead the registry holds a `CancelHandle` and
//! the session thread holds the matching `CancelToken`. Dropping the handle disconnects the
//! underlying [crossbeam](crossbeam) channel, which the token observes at its next check. A
//! session blocked in `CancelToken::sleep` wakes up immediately.
//!
//! [crossbeam]: https://docs.rs/crossbeam/0.7.3/crossbeam/channel/index.html

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::{Duration, Instant};

/// Create a connected pair of cancel handle and cancel token
pub fn cancellation() -> (CancelHandle, CancelToken) {
    // Nothing is ever sent on this channel, only the disconnect carries information
    let (tx, rx) = channel::bounded(0);
    (CancelHandle { _tx: tx }, CancelToken { rx })
}

/// Owning side of a cancellation pair
///
/// The session is cancelled as soon as this handle is dropped.
#[derive(Debug)]
pub struct CancelHandle {
    _tx: Sender<()>,
}

impl CancelHandle {
    /// Signal cancellation to the session holding the matching token
    pub fn cancel(self) {
        drop(self);
    }
}

/// Observing side of a cancellation pair
///
/// Once cancelled, a token stays cancelled.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Receiver<()>,
}

impl CancelToken {
    /// Return `true` if the matching handle has been dropped
    pub fn is_cancelled(&self) -> bool {
        match self.rx.try_recv() {
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) | Ok(()) => true,
        }
    }

    /// Block for `duration` or until cancelled, whichever comes first
    ///
    /// Returns `true` if the sleep ended because of cancellation. A `duration` too long to be
    /// represented as a point in time blocks until cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        if Instant::now().checked_add(duration).is_none() {
            // Only a disconnect ever ends this wait
            let _ = self.rx.recv();
            return true;
        }

        match self.rx.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) | Ok(()) => true,
        }
    }
}
