//! Lease reaper: puts stalled in-flight tasks back on the pending queue.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::orchestration::Dispatcher;

use super::ActorHandle;

const REAP_INTERVAL: Duration = Duration::from_secs(1);

/// Actor that periodically requeues tasks whose agent never reported back.
pub struct LeaseReaperActor {
    dispatcher: Dispatcher,
    lease: Duration,
    interval: Duration,
}

impl LeaseReaperActor {
    pub fn new(dispatcher: Dispatcher, lease: Duration) -> Self {
        Self {
            dispatcher,
            lease,
            interval: REAP_INTERVAL.min(lease.max(Duration::from_millis(10))),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Start the actor. It stops when `parent` or the returned handle is
    /// cancelled.
    pub fn spawn(self, parent: &CancellationToken) -> ActorHandle {
        let cancel = parent.child_token();
        let cancel_clone = cancel.clone();

        debug!(lease_ms = self.lease.as_millis() as u64, "LeaseReaperActor::spawn");

        let join = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);

            loop {
                tokio::select! {
                    _ = cancel_clone.cancelled() => {
                        debug!("LeaseReaperActor cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        self.dispatcher.requeue_expired(self.lease).await;
                    }
                }
            }
        });

        ActorHandle::new(cancel, join)
    }
}
