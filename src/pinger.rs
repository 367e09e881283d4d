use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::thread;
use std::time::Duration;

use crate::cancel::cancellation;
use crate::icmp::IcmpTransport;
use crate::observer::{Listeners, PingInfo, PingListener};
use crate::registry::SessionRegistry;
use crate::resolver::{Resolver, SystemResolver};
use crate::session::Session;
use crate::transport::Transport;
use crate::{PingConfig, PingError, PingId};

/// Manager of concurrent ping sessions
///
/// Every call to one of the `start` methods spawns a session on its own thread and returns its
/// identifier right away. From then on the session reports to the listeners that were
/// subscribed at that moment, until it is cancelled through `cancel` or `cancel_all`.
///
/// Dropping the `Pinger` cancels all sessions without waiting for them, use `shutdown` to wait.
pub struct Pinger<T: Transport = IcmpTransport, R: Resolver = SystemResolver> {
    transport: Arc<T>,
    resolver: Arc<R>,
    registry: Arc<SessionRegistry>,
    last_id: AtomicU64,
    listeners: RwLock<Listeners>,
}

impl Pinger {
    /// Ping over raw ICMP sockets and resolve names through the operating system
    ///
    /// Opening raw sockets usually requires elevated privileges. Sessions started without them
    /// fail with a fatal `PingError::Socket`.
    pub fn new() -> Self {
        Self::with_collaborators(IcmpTransport::new(), SystemResolver)
    }
}

impl Default for Pinger {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport, R: Resolver> Pinger<T, R> {
    pub fn with_collaborators(transport: T, resolver: R) -> Self {
        Self {
            transport: Arc::new(transport),
            resolver: Arc::new(resolver),
            registry: Arc::new(SessionRegistry::new()),
            last_id: AtomicU64::new(0),
            listeners: RwLock::new(Listeners::default()),
        }
    }

    /// Make `listener` the only subscriber for sessions started from now on
    pub fn set_listener<L: PingListener + 'static>(&self, listener: L) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Arc::new(listener));
    }

    /// Subscribe `listener` in addition to the current subscribers
    pub fn add_listener<L: PingListener + 'static>(&self, listener: L) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Unsubscribe every listener
    pub fn clear_listeners(&self) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Ping `host` with the default configuration
    pub fn start(&self, host: &str) -> PingId {
        self.start_config(PingConfig::new(host))
    }

    /// Ping `host` with explicit settings
    ///
    /// Passing `None` as pattern leaves the payload zeroed.
    pub fn start_with(
        &self,
        host: &str,
        timeout: Duration,
        sleep: Duration,
        ttl: u8,
        size: usize,
        pattern: Option<&[u8]>,
    ) -> PingId {
        let config = PingConfig::new(host)
            .with_timeout(timeout)
            .with_sleep(sleep)
            .with_ttl(ttl)
            .with_size(size)
            .with_pattern(pattern.unwrap_or_default());
        self.start_config(config)
    }

    /// Start a session for `config`
    ///
    /// The session is registered before this function returns, so the identifier can be passed
    /// to `cancel` immediately. This function never fails: an invalid configuration or a thread
    /// that cannot be spawned is reported to the listeners as a fatal exception.
    pub fn start_config(&self, config: PingConfig) -> PingId {
        let id = PingId::from(self.last_id.fetch_add(1, Ordering::SeqCst) + 1);
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        if let Err(e) = config.validate() {
            warn!("Refusing to start session {}: {}", id, e);
            let info = Arc::new(PingInfo::unresolved(id, &config));
            listeners.on_exception(&info, &e, true);
            return id;
        }

        debug!("Starting session {} for host {}", id, config.host);

        let info = Arc::new(PingInfo::unresolved(id, &config));
        let (handle, token) = cancellation();
        let session = Session::new(
            id,
            config,
            self.transport.clone(),
            self.resolver.clone(),
            listeners.clone(),
            token,
            Arc::downgrade(&self.registry),
        );

        let spawned = self.registry.register(id, handle, || {
            thread::Builder::new()
                .name(format!("ping-{}", id))
                .spawn(move || session.run())
        });

        if let Err(e) = spawned {
            error!("Could not spawn thread for session {}: {}", id, e);
            listeners.on_exception(&info, &PingError::Spawn(e), true);
        }

        id
    }

    /// Cancel the session `id`
    ///
    /// The session emits `on_stop` once it noticed the cancellation. Unknown identifiers and
    /// sessions that already ended are ignored.
    pub fn cancel(&self, id: PingId) {
        self.registry.cancel(id);
    }

    /// Cancel every running session
    pub fn cancel_all(&self) {
        self.registry.cancel_all();
    }

    /// Handle for cancelling sessions from inside a listener
    pub fn stopper(&self) -> Stopper {
        Stopper {
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Number of sessions that are still running
    pub fn active(&self) -> usize {
        self.registry.len()
    }

    pub fn is_active(&self, id: PingId) -> bool {
        self.registry.contains(id)
    }

    /// Cancel every session and wait until all session threads have finished
    ///
    /// This includes sessions that were cancelled earlier and are still winding down.
    pub fn shutdown(self) {
        self.registry.cancel_all();
        let threads = self.registry.take_retired();
        trace!("Waiting for {} session threads", threads.len());

        for thread in threads {
            if thread.join().is_err() {
                warn!("A session thread panicked during shut down");
            }
        }
    }
}

/// Cancels sessions without owning the `Pinger`
///
/// Listeners are owned by the `Pinger`, so a listener holding the `Pinger` itself would keep it
/// alive forever. A `Stopper` only refers to the session registry weakly and turns into a no-op
/// once the `Pinger` is gone.
#[derive(Debug, Clone)]
pub struct Stopper {
    registry: Weak<SessionRegistry>,
}

impl Stopper {
    pub fn cancel(&self, id: PingId) {
        if let Some(registry) = self.registry.upgrade() {
            registry.cancel(id);
        }
    }

    pub fn cancel_all(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.cancel_all();
        }
    }
}
