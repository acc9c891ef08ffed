//! Background actors.
//!
//! Each actor is an independent tokio task driven by a timer and stopped
//! through a `CancellationToken`:
//! - Lease redelivery of stalled tasks (LeaseReaperActor)

pub mod reaper;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use reaper::LeaseReaperActor;

/// Handle to a running actor, used for graceful shutdown.
pub struct ActorHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl ActorHandle {
    pub fn new(cancel: CancellationToken, join: JoinHandle<()>) -> Self {
        Self { cancel, join }
    }

    /// Signal the actor to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Check if shutdown has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Signal shutdown and wait for the actor's loop to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.join.await;
    }
}
