//! Delivery of terminal responses to the caller.

use tokio::sync::mpsc;

use crate::observability::metrics;
use crate::pipeline::types::Response;

/// Forwards responses in the order the sequencer produces them.
///
/// Sends are awaited, so a caller that stops reading eventually stalls the
/// sequencer once the channel buffer is full.
pub struct ResponseDispatcher {
    tx: mpsc::Sender<Response>,
}

impl ResponseDispatcher {
    pub fn new(tx: mpsc::Sender<Response>) -> Self {
        Self { tx }
    }

    pub async fn dispatch(&self, response: Response) {
        let sequence = response.sequence;
        match &response.error {
            None => {
                metrics::record_response("ok");
                tracing::info!(sequence = sequence, tx_hash = %response.tx_hash(), "Transaction confirmed");
            }
            Some(error) => {
                metrics::record_response("failed");
                tracing::warn!(sequence = sequence, error = %error, "Request failed");
            }
        }

        if self.tx.send(response).await.is_err() {
            tracing::warn!(sequence = sequence, "Response receiver dropped, discarding response");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{PipelineError, Request};

    #[tokio::test]
    async fn test_dispatch_preserves_order() {
        let (tx, mut rx) = mpsc::channel(4);
        let dispatcher = ResponseDispatcher::new(tx);
        for seq in [3, 4, 5] {
            dispatcher
                .dispatch(Response::failed(seq, Request::new(Vec::new(), 1), PipelineError::Closed))
                .await;
        }
        for seq in [3, 4, 5] {
            assert_eq!(rx.recv().await.map(|r| r.sequence), Some(seq));
        }
    }

    #[tokio::test]
    async fn test_dropped_receiver_does_not_block() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let dispatcher = ResponseDispatcher::new(tx);
        dispatcher
            .dispatch(Response::failed(1, Request::new(Vec::new(), 1), PipelineError::Closed))
            .await;
    }
}
