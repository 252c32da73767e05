//! Ticker
//!
//! A recurring background task with an explicit stop handle. Each tick runs
//! to completion before the next sleep starts, so ticks of one ticker never
//! overlap.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Handle to a running ticker.
#[derive(Debug)]
pub struct Ticker {
    name: &'static str,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Ticker {
    /// Spawns a task that waits `period`, runs `tick`, and repeats.
    ///
    /// # Arguments
    /// * `name` - Label used in log lines
    /// * `period` - Delay between the end of one tick and the start of the next
    /// * `tick` - Produces the work of one tick
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let guard = cancel.clone();

        let handle = tokio::spawn(async move {
            debug!(task = name, period_ms = period.as_millis() as u64, "Ticker started");
            loop {
                tokio::select! {
                    _ = guard.cancelled() => break,
                    _ = tokio::time::sleep(period) => {}
                }

                tick().await;

                // Stopped while the tick was in flight
                if guard.is_cancelled() {
                    break;
                }
            }
            debug!(task = name, "Ticker stopped");
        });

        Self {
            name,
            cancel,
            handle,
        }
    }

    /// Stops the ticker. A pending sleep is cancelled at once; an in-flight
    /// tick gets up to `grace` to finish before it is aborted.
    pub async fn stop(self, grace: Duration) {
        self.cancel.cancel();

        let mut handle = self.handle;
        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            warn!(task = self.name, "Tick still running after grace period, aborting");
            handle.abort();
        }
    }
}
