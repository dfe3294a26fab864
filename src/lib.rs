// cnxpool - connection pool that hides transient connection failure

pub mod config;
pub mod pool;
pub mod utils;

// Re-export commonly used types
pub use pool::{
    ConnectionPool, Dial, PoolConfig, PoolStats, PooledConnection, TcpDialer, Transport,
    UnsolicitedDataPolicy,
};
pub use utils::error::{CnxPoolError, PoolError, Result};
