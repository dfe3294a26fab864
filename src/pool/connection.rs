use super::{Shared, Transport};
use bytes::BytesMut;
use std::io;
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};

/// A transport owned by the pool, together with its bookkeeping.
///
/// Moves between the caller (inside a [`PooledConnection`]), the idle queue and
/// probe tasks. Whoever holds the value owns the connection.
pub(crate) struct ProbeableConnection<T> {
    pub(crate) io: T,
    /// Bytes a probe read while the connection sat idle, replayed to the next reader.
    pub(crate) pending: BytesMut,
    id: u64,
    created_at: Instant,
    last_released: Option<Instant>,
}

impl<T: Transport> ProbeableConnection<T> {
    pub(crate) fn new(io: T, id: u64) -> Self {
        Self {
            io,
            pending: BytesMut::new(),
            id,
            created_at: Instant::now(),
            last_released: None,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn mark_released(&mut self) {
        self.last_released = Some(Instant::now());
    }

    /// Shuts the transport down and drops it.
    pub(crate) async fn close(mut self) -> io::Result<()> {
        self.io.shutdown().await
    }
}

/// A connection leased from a [`ConnectionPool`](super::ConnectionPool).
///
/// Reads and writes go straight to the underlying transport. Dropping the
/// handle (or calling [`release`](Self::release)) returns it to the pool,
/// which probes it in the background before making it available again.
pub struct PooledConnection<T: Transport> {
    conn: Option<ProbeableConnection<T>>,
    pool: Weak<Shared<T>>,
}

impl<T: Transport> PooledConnection<T> {
    pub(crate) fn new(conn: ProbeableConnection<T>, pool: Weak<Shared<T>>) -> Self {
        Self {
            conn: Some(conn),
            pool,
        }
    }

    fn inner(&self) -> &ProbeableConnection<T> {
        self.conn
            .as_ref()
            .expect("connection is present until the handle is consumed")
    }

    fn inner_mut(&mut self) -> &mut ProbeableConnection<T> {
        self.conn
            .as_mut()
            .expect("connection is present until the handle is consumed")
    }

    /// Pool-unique identifier of this connection.
    pub fn id(&self) -> u64 {
        self.inner().id
    }

    /// Time since the transport was dialed.
    pub fn age(&self) -> Duration {
        self.inner().created_at.elapsed()
    }

    /// How long the connection sat in the pool before this lease, if it was reused.
    pub fn idle_time(&self) -> Option<Duration> {
        self.inner().last_released.map(|at| at.elapsed())
    }

    pub fn get_ref(&self) -> &T {
        &self.inner().io
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner_mut().io
    }

    /// Hands the connection back to the pool. Same as dropping the handle.
    pub fn release(self) {
        drop(self);
    }

    /// Closes the transport instead of returning it to the pool.
    ///
    /// Use this when the caller already knows the connection is unusable,
    /// e.g. after a protocol error left it in an unknown state.
    pub async fn discard(mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        match self.pool.upgrade() {
            Some(shared) => shared.discard(conn).await,
            None => {
                let _ = conn.close().await;
            }
        }
    }
}

impl<T: Transport> Drop for PooledConnection<T> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        // Pool already gone: dropping the transport closes it.
        if let Some(shared) = self.pool.upgrade() {
            shared.release(conn);
        }
    }
}

impl<T: Transport> std::fmt::Debug for PooledConnection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("PooledConnection");
        if let Some(conn) = &self.conn {
            s.field("id", &conn.id).field("pending", &conn.pending.len());
        }
        s.finish()
    }
}

impl<T: Transport> AsyncRead for PooledConnection<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let conn = self.get_mut().inner_mut();

        if !conn.pending.is_empty() {
            let n = conn.pending.len().min(buf.remaining());
            let chunk = conn.pending.split_to(n);
            buf.put_slice(&chunk);
            return Poll::Ready(Ok(()));
        }

        Pin::new(&mut conn.io).poll_read(cx, buf)
    }
}

impl<T: Transport> AsyncWrite for PooledConnection<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner_mut().io).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner_mut().io).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner().io.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner_mut().io).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner_mut().io).poll_shutdown(cx)
    }
}
