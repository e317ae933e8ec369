//! Shutdown coordination for the poller and sequencer tasks.

use tokio::sync::broadcast;

/// Broadcast trigger that every pipeline task subscribes to.
///
/// Dropping the last `Shutdown` also releases the subscribers.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Signal every subscribed task. Returns how many were listening.
    pub fn trigger(&self) -> usize {
        let listening = self.tx.send(()).unwrap_or(0);
        tracing::debug!(tasks = listening, "Shutdown signalled");
        listening
    }

    /// Tasks still holding a subscription.
    pub fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
