use futures::future::BoxFuture;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::trace;

/// Produces new transports for the pool.
///
/// Implemented for any `Fn() -> impl Future<Output = io::Result<T>>` closure,
/// so most callers just pass a closure.
pub trait Dial<T>: Send + Sync + 'static {
    fn dial(&self) -> BoxFuture<'static, io::Result<T>>;
}

impl<T, F, Fut> Dial<T> for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = io::Result<T>> + Send + 'static,
{
    fn dial(&self) -> BoxFuture<'static, io::Result<T>> {
        Box::pin(self())
    }
}

/// Dials a fixed TCP address with a connect timeout.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    addr: SocketAddr,
    connect_timeout: Duration,
}

impl TcpDialer {
    pub fn new(addr: SocketAddr, connect_timeout: Duration) -> Self {
        Self {
            addr,
            connect_timeout,
        }
    }

    /// Resolves `address` ("host:port") once and dials the first result from then on.
    pub async fn resolve(address: &str, connect_timeout: Duration) -> io::Result<Self> {
        let addr = lookup_host(address).await?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("No addresses found for {}", address),
            )
        })?;

        trace!("Resolved {} to {}", address, addr);
        Ok(Self::new(addr, connect_timeout))
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Dial<TcpStream> for TcpDialer {
    fn dial(&self) -> BoxFuture<'static, io::Result<TcpStream>> {
        Box::pin(connect_with_timeout(self.addr, self.connect_timeout))
    }
}

async fn connect_with_timeout(addr: SocketAddr, connect_timeout: Duration) -> io::Result<TcpStream> {
    match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!(
                "Connection to {} timed out after {:?}",
                addr, connect_timeout
            ),
        )),
    }
}
