use std::collections::HashMap;
use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crate::cancel::CancelHandle;
use crate::PingId;

/// Record of a live session
#[derive(Debug)]
struct Entry {
    cancel: CancelHandle,
    thread: JoinHandle<()>,
}

/// Bookkeeping of the sessions that can still be cancelled
///
/// The `SessionRegistry` maps every live session to the handle that cancels it. Entries leave the
/// registry when the session is cancelled or when the session thread terminates on its own, so
/// the registry never grows beyond the number of running sessions.
///
/// Threads of cancelled sessions are kept until someone collects them with `take_retired`, so
/// that shutting down can wait for sessions that are still winding down.
///
/// Dropping the registry drops all cancel handles, which cancels every session still in it.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<PingId, Entry>>,
    retired: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // The map is never left half-updated, so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, HashMap<PingId, Entry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn retire(&self, threads: impl IntoIterator<Item = JoinHandle<()>>) {
        let mut retired = self.retired.lock().unwrap_or_else(PoisonError::into_inner);
        retired.retain(|thread| !thread.is_finished());
        retired.extend(threads);
    }

    /// Spawn a session thread and register it under `id`
    ///
    /// The registry stays locked from before `spawn` is called until the entry is inserted. A
    /// session thread that terminates right away therefore cannot deregister before it was
    /// registered, and a caller can cancel `id` as soon as this function returns.
    ///
    /// # Errors
    ///
    /// Errors from `spawn` are passed through and nothing is registered. The cancel handle is
    /// dropped in that case.
    pub fn register<F>(&self, id: PingId, cancel: CancelHandle, spawn: F) -> io::Result<()>
    where
        F: FnOnce() -> io::Result<JoinHandle<()>>,
    {
        let mut sessions = self.lock();
        let thread = spawn()?;
        if sessions.insert(id, Entry { cancel, thread }).is_some() {
            warn!("Session {} was registered twice", id);
        }
        Ok(())
    }

    /// Cancel the session registered under `id`
    ///
    /// Returns `false` for unknown identifiers, which are otherwise ignored. This makes
    /// cancelling idempotent. The session thread is retired.
    pub fn cancel(&self, id: PingId) -> bool {
        let entry = match self.lock().remove(&id) {
            Some(entry) => entry,
            None => return false,
        };
        trace!("Signalling cancellation to session {}", id);
        entry.cancel.cancel();
        self.retire(Some(entry.thread));
        true
    }

    /// Cancel every registered session and empty the registry
    ///
    /// Returns the number of sessions that were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<(PingId, Entry)> = self.lock().drain().collect();
        trace!("Signalling cancellation to {} sessions", drained.len());

        let count = drained.len();
        let threads = drained.into_iter().map(|(_, entry)| {
            entry.cancel.cancel();
            entry.thread
        });
        self.retire(threads.collect::<Vec<_>>());
        count
    }

    /// Hand out the threads of all sessions cancelled so far
    pub fn take_retired(&self) -> Vec<JoinHandle<()>> {
        let mut retired = self.retired.lock().unwrap_or_else(PoisonError::into_inner);
        retired.drain(..).collect()
    }

    /// Remove `id` without waiting for anything
    ///
    /// Called by the session thread itself when it terminates.
    pub fn deregister(&self, id: PingId) {
        if self.lock().remove(&id).is_some() {
            trace!("Session {} deregistered", id);
        }
    }

    pub fn contains(&self, id: PingId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::{cancellation, CancelToken};
    use std::thread;
    use std::time::Duration;

    // Session stand-in that runs until cancelled
    fn spawn_waiting(token: CancelToken) -> io::Result<JoinHandle<()>> {
        thread::Builder::new().spawn(move || {
            while !token.sleep(Duration::from_secs(30)) {}
        })
    }

    #[test]
    fn register_and_cancel() {
        let registry = SessionRegistry::new();
        let id = PingId::from(1);
        let (handle, token) = cancellation();

        registry
            .register(id, handle, || spawn_waiting(token))
            .expect("Failed registering session");
        assert!(registry.contains(id));
        assert_eq!(registry.len(), 1);

        assert!(registry.cancel(id));
        assert!(registry.is_empty());

        let threads = registry.take_retired();
        assert_eq!(threads.len(), 1);
        for thread in threads {
            thread.join().unwrap();
        }

        // Cancelling again is a no-op
        assert!(!registry.cancel(id));
        assert!(!registry.cancel(PingId::from(42)));
        assert!(registry.take_retired().is_empty());
    }

    #[test]
    fn cancel_all_empties_registry() {
        let registry = SessionRegistry::new();
        for id in 1..=3 {
            let (handle, token) = cancellation();
            registry
                .register(PingId::from(id), handle, || spawn_waiting(token))
                .unwrap();
        }
        assert_eq!(registry.len(), 3);

        assert_eq!(registry.cancel_all(), 3);
        assert!(registry.is_empty());

        let threads = registry.take_retired();
        assert_eq!(threads.len(), 3);
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(registry.cancel_all(), 0);
    }

    #[test]
    fn failed_spawn_registers_nothing() {
        let registry = SessionRegistry::new();
        let (handle, token) = cancellation();

        let result = registry.register(PingId::from(1), handle, || {
            Err(io::Error::new(io::ErrorKind::Other, "no threads left"))
        });

        assert!(result.is_err());
        assert!(registry.is_empty());
        assert!(token.is_cancelled());
    }

    #[test]
    fn deregister_from_session_thread() {
        use std::sync::Arc;

        let registry = Arc::new(SessionRegistry::new());
        let id = PingId::from(9);
        let (handle, _token) = cancellation();
        let session_registry = registry.clone();

        // The thread deregisters right away but has to wait for the registration to finish
        registry
            .register(id, handle, || {
                thread::Builder::new().spawn(move || session_registry.deregister(id))
            })
            .unwrap();

        for _ in 0..500 {
            if registry.is_empty() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("session was never deregistered");
    }
}
