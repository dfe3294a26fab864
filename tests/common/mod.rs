//! Mock transports and dialers shared by the pool integration tests.
#![allow(dead_code)]

use cnxpool::Dial;
use futures::future::BoxFuture;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Observable state of one mock connection.
#[derive(Debug, Default)]
pub struct MockState {
    pub id: usize,
    /// Reads fail with `ConnectionReset` once set
    pub broken: AtomicBool,
    pub shutdowns: AtomicUsize,
    pub bytes_written: AtomicUsize,
}

impl MockState {
    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn break_connection(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }
}

/// Transport that never has data to read unless broken.
pub struct MockConn {
    pub state: Arc<MockState>,
}

impl AsyncRead for MockConn {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.state.broken.load(Ordering::SeqCst) {
            Poll::Ready(Err(io::ErrorKind::ConnectionReset.into()))
        } else {
            // Idle forever; the probe's deadline wakes the task
            Poll::Pending
        }
    }
}

impl AsyncWrite for MockConn {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.state.bytes_written.fetch_add(buf.len(), Ordering::SeqCst);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.state.shutdowns.fetch_add(1, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}

/// Dialer producing [`MockConn`]s and remembering each one's state.
#[derive(Clone, Default)]
pub struct MockDialer {
    pub created: Arc<Mutex<Vec<Arc<MockState>>>>,
    /// Dials after this many successes fail (`None` = never)
    pub fail_after: Option<usize>,
    /// Dials after this many successes never complete (`None` = never)
    pub hang_after: Option<usize>,
}

impl MockDialer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, id: usize) -> Arc<MockState> {
        self.created.lock().unwrap()[id].clone()
    }

    pub fn dial_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

impl Dial<MockConn> for MockDialer {
    fn dial(&self) -> BoxFuture<'static, io::Result<MockConn>> {
        let mut created = self.created.lock().unwrap();
        let count = created.len();

        if self.fail_after.is_some_and(|n| count >= n) {
            return Box::pin(async {
                Err::<MockConn, _>(io::Error::from(io::ErrorKind::ConnectionRefused))
            });
        }
        if self.hang_after.is_some_and(|n| count >= n) {
            return Box::pin(futures::future::pending::<io::Result<MockConn>>());
        }

        let state = Arc::new(MockState {
            id: count,
            ..Default::default()
        });
        created.push(state.clone());
        Box::pin(async move { Ok::<_, io::Error>(MockConn { state }) })
    }
}

/// Polls `cond` until it holds, panicking after about a second.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
