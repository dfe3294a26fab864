//! Bounded pool of reusable connections with background liveness probing.
//!
//! Idle connections live in a fixed-capacity queue. `acquire` pops one (or
//! dials when the queue is empty); dropping the leased handle sends the
//! connection through a short read probe before it is queued again. A sweeper
//! task re-probes one idle connection per tick so dead peers are noticed
//! before a caller picks them up.

mod config;
mod connection;
mod dial;
mod probe;
mod queue;
mod stats;
mod sweeper;

pub use config::{PoolConfig, UnsolicitedDataPolicy};
pub use connection::PooledConnection;
pub use dial::{Dial, TcpDialer};
pub use stats::PoolStats;

use crate::utils::error::PoolError;
use connection::ProbeableConnection;
use probe::{probe, ProbeOutcome};
use queue::{PushError, SlotQueue};
use stats::PoolCounters;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::runtime::Handle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Upper bound on shutting down a discarded transport.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Byte stream the pool can manage.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// State shared between pool handles, leased connections, probes and the sweeper.
pub(crate) struct Shared<T: Transport> {
    dialer: Box<dyn Dial<T>>,
    pub(crate) idle: SlotQueue<ProbeableConnection<T>>,
    config: PoolConfig,
    counters: PoolCounters,
    next_id: AtomicU64,
    shutdown: CancellationToken,
    runtime: Handle,
}

impl<T: Transport> Shared<T> {
    fn wrap(&self, io: T) -> ProbeableConnection<T> {
        ProbeableConnection::new(io, self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Entry point for a connection coming back from a caller.
    pub(crate) fn release(self: Arc<Self>, conn: ProbeableConnection<T>) {
        PoolCounters::incr(&self.counters.released);
        trace!("Connection {} released, probing", conn.id());
        self.watch(conn);
    }

    /// Probes `conn` in its own task, then requeues or closes it.
    pub(crate) fn watch(self: &Arc<Self>, mut conn: ProbeableConnection<T>) {
        let shared = Arc::clone(self);
        self.runtime.spawn(async move {
            let outcome = probe(
                &mut conn,
                shared.config.probe_deadline(),
                shared.config.unsolicited_data,
            )
            .await;
            shared.settle(conn, outcome).await;
        });
    }

    async fn settle(&self, conn: ProbeableConnection<T>, outcome: ProbeOutcome) {
        if outcome.is_alive() {
            PoolCounters::incr(&self.counters.probes_passed);
            self.promote(conn).await;
        } else {
            PoolCounters::incr(&self.counters.probes_failed);
            debug!("Connection {} failed probe ({}), closing", conn.id(), outcome);
            self.close_transport(conn).await;
        }
    }

    async fn promote(&self, mut conn: ProbeableConnection<T>) {
        conn.mark_released();

        match self.idle.try_push(conn) {
            Ok(()) => {
                // close() may have drained between our closed check and the push
                if self.idle.is_closed() {
                    for conn in self.idle.drain() {
                        self.close_transport(conn).await;
                    }
                }
            }
            Err(PushError::Full(conn)) => {
                PoolCounters::incr(&self.counters.discarded_full);
                trace!("Pool is full, discarding connection {}", conn.id());
                self.close_transport(conn).await;
            }
            Err(PushError::Closed(conn)) => {
                trace!("Pool is closed, discarding connection {}", conn.id());
                self.close_transport(conn).await;
            }
        }
    }

    pub(crate) async fn discard(&self, conn: ProbeableConnection<T>) {
        PoolCounters::incr(&self.counters.discarded_by_caller);
        trace!("Connection {} discarded by caller", conn.id());
        self.close_transport(conn).await;
    }

    async fn close_transport(&self, conn: ProbeableConnection<T>) {
        let id = conn.id();
        let result = match timeout(CLOSE_TIMEOUT, conn.close()).await {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "shutdown timed out",
            )),
        };

        if let Err(e) = result {
            PoolCounters::incr(&self.counters.close_errors);
            debug!("Error closing connection {}: {}", id, e);
        }
    }
}

impl<T: Transport> Drop for Shared<T> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Connection pool for a single destination
///
/// Keeps up to `capacity` idle connections produced by one dialer. Handles are
/// cheap to clone and share the same pool.
pub struct ConnectionPool<T: Transport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> Clone for ConnectionPool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Transport> ConnectionPool<T> {
    /// Create a pool and fill it with `config.capacity` freshly dialed connections
    ///
    /// Must be called from within a tokio runtime; the sweeper and probe tasks
    /// run on it. If any dial fails, the connections opened so far are closed
    /// and `PoolError::InitializationFailed` is returned.
    pub async fn new<D: Dial<T>>(dialer: D, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let capacity = config.capacity;
        let sweep_interval = config.sweep_interval();
        let shared = Arc::new(Shared {
            dialer: Box::new(dialer),
            idle: SlotQueue::new(capacity),
            config,
            counters: PoolCounters::default(),
            next_id: AtomicU64::new(1),
            shutdown: CancellationToken::new(),
            runtime: Handle::current(),
        });

        for opened in 0..capacity {
            let io = match shared.dialer.dial().await {
                Ok(io) => io,
                Err(source) => {
                    warn!(
                        "Dial failed while filling pool ({} of {} opened): {}",
                        opened, capacity, source
                    );
                    shared.idle.close();
                    for conn in shared.idle.drain() {
                        shared.close_transport(conn).await;
                    }
                    return Err(PoolError::InitializationFailed { opened, source });
                }
            };

            PoolCounters::incr(&shared.counters.dialed);
            let conn = shared.wrap(io);
            if let Err(rejected) = shared.idle.try_push(conn) {
                shared.close_transport(rejected.into_inner()).await;
            }
        }

        sweeper::spawn(
            Arc::downgrade(&shared),
            shared.shutdown.clone(),
            sweep_interval,
        );

        info!(
            "Connection pool ready with {} idle connections (sweep every {:?})",
            capacity, sweep_interval
        );

        Ok(Self { shared })
    }

    /// Get an idle connection, or dial a new one if none is available
    ///
    /// Never waits for a connection to be released. A dial error is returned
    /// as `PoolError::Dial` with the dialer's error untouched.
    pub async fn acquire(&self) -> Result<PooledConnection<T>, PoolError> {
        let shared = &self.shared;
        if shared.idle.is_closed() {
            return Err(PoolError::Closed);
        }

        if let Some(conn) = shared.idle.try_pop() {
            PoolCounters::incr(&shared.counters.reused);
            trace!("Reusing idle connection {}", conn.id());
            return Ok(PooledConnection::new(conn, Arc::downgrade(shared)));
        }

        debug!("No idle connection available, dialing");
        let io = shared.dialer.dial().await.map_err(PoolError::Dial)?;
        PoolCounters::incr(&shared.counters.dialed);
        let conn = shared.wrap(io);
        trace!("Dialed new connection {}", conn.id());

        Ok(PooledConnection::new(conn, Arc::downgrade(shared)))
    }

    /// Stop the sweeper and close every idle connection
    ///
    /// Leased connections are left alone; when they are released later they
    /// are closed instead of requeued. Calling this more than once is a no-op.
    pub async fn close(&self) {
        let shared = &self.shared;
        if !shared.idle.close() {
            debug!("Connection pool already closed");
            return;
        }

        shared.shutdown.cancel();

        let drained = shared.idle.drain();
        let count = drained.len();
        for conn in drained {
            shared.close_transport(conn).await;
        }

        info!("Connection pool closed, shut down {} idle connections", count);
    }

    pub fn is_closed(&self) -> bool {
        self.shared.idle.is_closed()
    }

    /// Number of connections currently idle in the pool
    pub fn idle_count(&self) -> usize {
        self.shared.idle.len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.idle.capacity()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats::snapshot(
            &self.shared.counters,
            self.idle_count(),
            self.capacity(),
            self.is_closed(),
        )
    }
}
