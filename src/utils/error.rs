use std::io;
use thiserror::Error;

/// Errors surfaced by the connection pool's public operations.
///
/// Failures inside background probes and sweeps never show up here; they only
/// change which connections stay idle.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Pool initialization failed after opening {opened} connection(s): {source}")]
    InitializationFailed {
        opened: usize,
        #[source]
        source: io::Error,
    },

    #[error("Dial failed: {0}")]
    Dial(#[source] io::Error),

    #[error("Connection pool is closed")]
    Closed,
}

impl PoolError {
    /// The underlying I/O error for dial-related failures.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            PoolError::InitializationFailed { source, .. } => Some(source),
            PoolError::Dial(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CnxPoolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),
}

pub type Result<T> = std::result::Result<T, CnxPoolError>;
