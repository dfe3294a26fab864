use super::config::UnsolicitedDataPolicy;
use super::connection::ProbeableConnection;
use super::Transport;
use std::fmt;
use std::io;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::time::timeout;

/// Upper bound on bytes kept from probes under [`UnsolicitedDataPolicy::Retain`].
pub(crate) const MAX_RETAINED_BYTES: usize = 64;

/// Result of probing an idle connection.
#[derive(Debug)]
pub(crate) enum ProbeOutcome {
    /// The read deadline passed with nothing to read: alive and idle.
    Idle,
    /// A byte arrived and was kept for the next reader.
    Retained,
    /// The peer closed the connection.
    Closed,
    /// The read failed.
    Failed(io::Error),
    /// The peer sent data nobody asked for.
    UnexpectedData,
}

impl ProbeOutcome {
    pub(crate) fn is_alive(&self) -> bool {
        matches!(self, ProbeOutcome::Idle | ProbeOutcome::Retained)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Idle => write!(f, "idle"),
            ProbeOutcome::Retained => write!(f, "retained unsolicited data"),
            ProbeOutcome::Closed => write!(f, "closed by peer"),
            ProbeOutcome::Failed(e) => write!(f, "read error: {}", e),
            ProbeOutcome::UnexpectedData => write!(f, "unexpected data on idle connection"),
        }
    }
}

/// Checks whether an idle connection is still usable.
///
/// Attempts a 1-byte read bounded by `deadline`. Timing out is the healthy
/// case. The deadline belongs to the timeout future, so the transport carries
/// no leftover deadline afterwards, and tokio reads are cancel-safe so a timed
/// out read consumes nothing.
pub(crate) async fn probe<T: Transport>(
    conn: &mut ProbeableConnection<T>,
    deadline: Duration,
    policy: UnsolicitedDataPolicy,
) -> ProbeOutcome {
    let mut byte = [0u8; 1];

    match timeout(deadline, conn.io.read(&mut byte)).await {
        Err(_) => ProbeOutcome::Idle,
        Ok(Ok(0)) => ProbeOutcome::Closed,
        Ok(Ok(_)) => match policy {
            UnsolicitedDataPolicy::Retain if conn.pending.len() < MAX_RETAINED_BYTES => {
                conn.pending.extend_from_slice(&byte);
                ProbeOutcome::Retained
            }
            _ => ProbeOutcome::UnexpectedData,
        },
        Ok(Err(e)) => ProbeOutcome::Failed(e),
    }
}
