/// Connection Pool Edge Cases over TCP
///
/// End-to-end behaviour against real loopback servers: reuse, peers that hang
/// up while idle, peers that push unsolicited bytes, unreachable upstreams.
mod common;

use cnxpool::{ConnectionPool, PoolConfig, PoolError, TcpDialer, UnsolicitedDataPolicy};
use common::wait_until;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Accepts connections and parks the server side so they stay open.
async fn parking_server() -> (SocketAddr, Arc<Mutex<Vec<TcpStream>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let parked = Arc::new(Mutex::new(Vec::new()));

    let accepted = parked.clone();
    tokio::spawn(async move {
        loop {
            if let Ok((stream, _)) = listener.accept().await {
                accepted.lock().unwrap().push(stream);
            }
        }
    });

    (addr, parked)
}

/// Echoes 4-byte messages on every accepted connection.
async fn echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            if let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 4];
                    while stream.read_exact(&mut buf).await.is_ok() {
                        if stream.write_all(&buf).await.is_err() {
                            break;
                        }
                    }
                });
            }
        }
    });

    addr
}

/// Sends one byte right after accepting, then stays open.
async fn greeting_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut parked = Vec::new();
        loop {
            if let Ok((mut stream, _)) = listener.accept().await {
                stream.write_all(b"!").await.ok();
                parked.push(stream);
            }
        }
    });

    addr
}

fn dialer(addr: SocketAddr) -> TcpDialer {
    TcpDialer::new(addr, Duration::from_secs(5))
}

#[tokio::test]
async fn pool_reuses_tcp_connections() {
    let addr = echo_server().await;
    let config = PoolConfig {
        capacity: 1,
        sweep_interval_ms: 60_000,
        ..Default::default()
    };
    let pool = ConnectionPool::new(dialer(addr), config).await.unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let first_id = conn.id();
    let local = conn.get_ref().local_addr().unwrap();
    conn.write_all(b"test").await.unwrap();
    let mut reply = [0u8; 4];
    conn.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply, b"test");
    conn.release();

    wait_until(|| pool.idle_count() == 1).await;

    let mut conn = pool.acquire().await.unwrap();
    assert_eq!(conn.id(), first_id);
    assert_eq!(conn.get_ref().local_addr().unwrap(), local, "same socket");
    conn.write_all(b"pool").await.unwrap();
    conn.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply, b"pool");
    assert_eq!(pool.stats().dialed, 1);
}

#[tokio::test]
async fn sweeper_replaces_connections_closed_by_server() {
    let (addr, parked) = parking_server().await;
    let config = PoolConfig {
        capacity: 2,
        sweep_interval_ms: 5,
        ..Default::default()
    };
    let pool = ConnectionPool::new(dialer(addr), config).await.unwrap();
    wait_until(|| parked.lock().unwrap().len() == 2).await;

    // Server hangs up on both idle connections
    parked.lock().unwrap().clear();

    wait_until(|| pool.stats().probes_failed == 2).await;
    assert_eq!(pool.idle_count(), 0);

    // Caller never sees the dead sockets: acquire dials a fresh one
    let conn = pool.acquire().await.unwrap();
    assert_eq!(pool.stats().dialed, 3);
    drop(conn);
}

#[tokio::test]
async fn unsolicited_data_discards_connection_by_default() {
    let addr = greeting_server().await;
    let config = PoolConfig {
        capacity: 1,
        sweep_interval_ms: 5,
        ..Default::default()
    };
    let pool = ConnectionPool::new(dialer(addr), config).await.unwrap();

    wait_until(|| pool.stats().probes_failed >= 1).await;
    assert_eq!(pool.idle_count(), 0);
}

#[tokio::test]
async fn unsolicited_data_is_replayed_with_retain_policy() {
    let addr = greeting_server().await;
    let config = PoolConfig {
        capacity: 1,
        sweep_interval_ms: 5,
        unsolicited_data: UnsolicitedDataPolicy::Retain,
        ..Default::default()
    };
    let pool = ConnectionPool::new(dialer(addr), config).await.unwrap();

    wait_until(|| pool.stats().probes_passed >= 1).await;
    wait_until(|| pool.idle_count() == 1).await;

    let mut conn = pool.acquire().await.unwrap();
    let mut byte = [0u8; 1];
    conn.read_exact(&mut byte).await.unwrap();
    assert_eq!(&byte, b"!");
    assert_eq!(pool.stats().probes_failed, 0);
}

#[tokio::test]
async fn pool_creation_fails_when_server_is_down() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = ConnectionPool::new(dialer(addr), PoolConfig::with_capacity(2)).await;
    match result {
        Err(err @ PoolError::InitializationFailed { opened: 0, .. }) => {
            assert!(err.io_error().is_some());
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("pool creation should fail"),
    }
}

#[tokio::test]
async fn pool_creation_times_out_on_unresponsive_server() {
    // Non-routable address (RFC 5737 TEST-NET-1)
    let addr: SocketAddr = "192.0.2.1:9999".parse().unwrap();
    let dialer = TcpDialer::new(addr, Duration::from_millis(100));

    let start = std::time::Instant::now();
    let result = ConnectionPool::new(dialer, PoolConfig::with_capacity(1)).await;
    let elapsed = start.elapsed();

    assert!(result.is_err(), "Should fail to fill the pool");
    assert!(
        elapsed < Duration::from_millis(500),
        "Should give up quickly, took {:?}",
        elapsed
    );
}

#[tokio::test]
async fn acquire_dial_failure_surfaces_io_error() {
    let (addr, _parked) = parking_server().await;
    let listener_gone = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    // Fill succeeds against a live server, later dials hit a dead port
    let live = dialer(addr);
    let dead = dialer(listener_gone);
    let fills = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let pool = ConnectionPool::new(
        move || {
            let n = fills.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let target = if n == 0 { live.clone() } else { dead.clone() };
            async move { cnxpool::Dial::dial(&target).await }
        },
        PoolConfig {
            capacity: 1,
            sweep_interval_ms: 60_000,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let _held = pool.acquire().await.unwrap();
    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, PoolError::Dial(_)));
    assert!(err.io_error().is_some());
}
