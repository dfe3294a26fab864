use super::{Shared, Transport};
use std::sync::Weak;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Starts the background task that probes one idle connection per tick.
///
/// Holds only a weak reference; dropping the last pool handle cancels the
/// sweeper even if nobody called `close`.
pub(crate) fn spawn<T: Transport>(
    pool: Weak<Shared<T>>,
    shutdown: CancellationToken,
    every: Duration,
) {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let Some(shared) = pool.upgrade() else {
                break;
            };

            if let Some(conn) = shared.idle.try_pop() {
                trace!("Sweeping idle connection {}", conn.id());
                shared.watch(conn);
            }
        }

        debug!("Connection pool sweeper stopped");
    });
}
