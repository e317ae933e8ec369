//! Caller-facing handle to a running pipeline.

use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::PipelineConfig;
use crate::ledger::{LedgerClient, TxSigner};
use crate::lifecycle::shutdown::Shutdown;
use crate::pipeline::dispatcher::ResponseDispatcher;
use crate::pipeline::executor::BroadcastExecutor;
use crate::pipeline::poller::AccountStatePoller;
use crate::pipeline::sequencer::Sequencer;
use crate::pipeline::types::{PipelineError, Request, Response, Submission};

/// Cloneable entry point for submitting requests.
#[derive(Debug, Clone)]
pub struct Submitter {
    tx: mpsc::Sender<Submission>,
}

impl Submitter {
    /// Hand `request` to the sequencer.
    ///
    /// Resolves once the sequencer has taken the request as its current one,
    /// so this waits while the in-flight window is full.
    pub async fn submit(&self, request: Request) -> Result<(), PipelineError> {
        let (accepted, ack) = oneshot::channel();
        self.tx
            .send(Submission { request, accepted })
            .await
            .map_err(|_| PipelineError::Closed)?;
        ack.await.map_err(|_| PipelineError::Closed)
    }
}

/// Ordered stream of terminal responses.
///
/// Ends once the sequencer has exited.
#[derive(Debug)]
pub struct Responses {
    rx: mpsc::Receiver<Response>,
}

impl Responses {
    pub async fn recv(&mut self) -> Option<Response> {
        self.rx.recv().await
    }
}

impl Stream for Responses {
    type Item = Response;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Response>> {
        self.rx.poll_recv(cx)
    }
}

/// A running poller and sequencer for one signing account.
///
/// Dropping the pipeline stops both tasks.
pub struct TxPipeline {
    address: String,
    submitter: Option<Submitter>,
    responses: Responses,
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
}

impl TxPipeline {
    /// Spawn the poller and sequencer on the current runtime.
    ///
    /// The polled account is `config.account_address`, or the signer's
    /// address when unset.
    pub fn spawn(
        config: &PipelineConfig,
        chain_id: impl Into<String>,
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn TxSigner>,
    ) -> Self {
        let address = config.account_address.clone().unwrap_or_else(|| signer.address());
        let shutdown = Shutdown::new();

        let (account_tx, account_rx) = mpsc::unbounded_channel();
        let (request_tx, request_rx) = mpsc::channel(1);
        let (response_tx, response_rx) = mpsc::channel(config.response_buffer.max(1));

        let poller = AccountStatePoller::new(
            ledger.clone(),
            address.clone(),
            Duration::from_millis(config.poll_interval_ms),
        );
        let executor = BroadcastExecutor::new(ledger, signer, chain_id);
        let sequencer = Sequencer::new(executor, ResponseDispatcher::new(response_tx), config);

        let tasks = vec![
            poller.spawn(account_tx, shutdown.subscribe()),
            tokio::spawn(sequencer.run(account_rx, request_rx, shutdown.subscribe())),
        ];

        tracing::info!(address = %address, "Transaction pipeline started");

        Self {
            address,
            submitter: Some(Submitter { tx: request_tx }),
            responses: Responses { rx: response_rx },
            shutdown,
            tasks,
        }
    }

    /// Account the pipeline signs for.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// A submitter for use from other tasks. `None` after [`close`](Self::close).
    pub fn submitter(&self) -> Option<Submitter> {
        self.submitter.clone()
    }

    pub async fn submit(&self, request: Request) -> Result<(), PipelineError> {
        match &self.submitter {
            Some(submitter) => submitter.submit(request).await,
            None => Err(PipelineError::Closed),
        }
    }

    pub fn responses(&mut self) -> &mut Responses {
        &mut self.responses
    }

    /// Submit `request` and wait for its response.
    ///
    /// Only meaningful when this is the sole submitter and no earlier
    /// response is still unread.
    pub async fn sign_and_broadcast(&mut self, request: Request) -> Result<Response, PipelineError> {
        self.submit(request).await?;
        let response = self.responses.recv().await.ok_or(PipelineError::Closed)?;
        match response.error.clone() {
            Some(error) => Err(error),
            None => Ok(response),
        }
    }

    /// Stop accepting requests from this handle.
    ///
    /// Once every cloned [`Submitter`] is dropped as well, the sequencer
    /// delivers what is still in flight and then ends the response stream.
    pub fn close(&mut self) {
        self.submitter = None;
    }

    /// Stop both tasks now. Undelivered responses are lost.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down transaction pipeline");
        self.shutdown.trigger();
        join_all(self.tasks).await;
    }

    /// Wait for the tasks to exit on their own after [`close`](Self::close).
    pub async fn join(self) {
        join_all(self.tasks).await;
    }
}

async fn join_all(tasks: Vec<JoinHandle<()>>) {
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Pipeline task failed");
        }
    }
}
