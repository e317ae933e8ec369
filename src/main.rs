//! ledger-sequencer
//!
//! Signs and broadcasts an ordered stream of transactions for one account.
//!
//! # Architecture Overview
//!
//! ```text
//!   requests.json ──▶ Submitter ──▶ ┌──────────────────────────────────────────────┐
//!                                   │                  PIPELINE                     │
//!                                   │  ┌───────────┐   ┌──────────┐   ┌──────────┐  │
//!                                   │  │ sequencer │──▶│ executor │──▶│  ledger  │──┼──▶ REST gateway
//!                                   │  └─────┬─────┘   └──────────┘   │  client  │  │
//!                                   │        ▲                        └────┬─────┘  │
//!                                   │        └──────── poller ◀────────────┘        │
//!   stdout (JSON lines) ◀─ Responses ◀── dispatcher                                 │
//!                                   └──────────────────────────────────────────────┘
//! ```

use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ledger_sequencer::config::{load_config, SequencerConfig};
use ledger_sequencer::ledger::{wait_for_tx_commit, LedgerClient, RestLedgerClient, TxSigner, Wallet};
use ledger_sequencer::lifecycle::signals::wait_for_signal;
use ledger_sequencer::observability::{logging, metrics};
use ledger_sequencer::{Request, Response, TxPipeline};

#[derive(Parser)]
#[command(name = "ledger-sequencer")]
#[command(about = "Sequenced transaction signer and broadcaster", long_about = None)]
struct Cli {
    /// Path to the TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the account state the ledger reports for the signer
    Account,
    /// Sign and broadcast the requests in a JSON file, in order.
    ///
    /// Transactions are sent as a JSON envelope with a secp256k1 signature
    /// over its keccak digest. The gateway behind `rest_url` must accept
    /// that envelope; a stock Cosmos SDK node cannot decode it.
    Submit {
        /// JSON array of requests
        file: PathBuf,

        /// Also wait up to this many seconds for each tx to be committed
        #[arg(long)]
        wait_commit: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SequencerConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!("ledger-sequencer v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let ledger = Arc::new(RestLedgerClient::new(config.ledger.clone())?);

    match cli.command {
        Commands::Account => {
            let address = match &config.sequencer.account_address {
                Some(address) => address.clone(),
                None => Wallet::from_env()?.address(),
            };
            let state = ledger.fetch_account_state(&address).await?;
            println!(
                "{}",
                json!({
                    "address": address,
                    "account_number": state.account_number,
                    "sequence": state.sequence,
                })
            );
        }
        Commands::Submit { file, wait_commit } => {
            submit(&config, ledger, file, wait_commit).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn submit(
    config: &SequencerConfig,
    ledger: Arc<RestLedgerClient>,
    file: PathBuf,
    wait_commit: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(&file)?;
    let mut requests: Vec<Request> = serde_json::from_str(&content)?;
    for request in &mut requests {
        if request.data.is_null() {
            request.data = json!(uuid::Uuid::new_v4().to_string());
        }
    }
    let total = requests.len();
    tracing::info!(file = %file.display(), requests = total, "Requests loaded");

    let wallet = Arc::new(Wallet::from_env()?);
    let mut pipeline = TxPipeline::spawn(&config.sequencer, config.ledger.chain_id.clone(), ledger.clone(), wallet);

    if let Some(submitter) = pipeline.submitter() {
        tokio::spawn(async move {
            for request in requests {
                if let Err(e) = submitter.submit(request).await {
                    tracing::error!(error = %e, "Submission stopped");
                    break;
                }
            }
        });
    }
    pipeline.close();

    let commit_deadline = wait_commit.map(Duration::from_secs);
    let poll_interval = Duration::from_millis(config.ledger.commit_poll_interval_ms);
    let mut received = 0;
    let mut failed = 0;

    let interrupted = loop {
        let response = tokio::select! {
            response = pipeline.responses().recv() => response,
            _ = wait_for_signal() => break true,
        };
        let Some(response) = response else {
            break false;
        };

        received += 1;
        if !response.is_ok() {
            failed += 1;
        }

        let committed = match commit_deadline {
            Some(deadline) if response.is_ok() => Some(
                wait_for_tx_commit(ledger.as_ref(), response.tx_hash(), deadline, poll_interval)
                    .await
                    .map_err(|e| e.to_string()),
            ),
            _ => None,
        };
        println!("{}", render(&response, committed));
    };

    if interrupted {
        tracing::warn!(received = received, total = total, "Interrupted before all responses arrived");
        pipeline.shutdown().await;
    } else {
        pipeline.join().await;
    }

    tracing::info!(received = received, failed = failed, "Submission finished");
    Ok(())
}

fn render(
    response: &Response,
    committed: Option<Result<ledger_sequencer::ledger::TxResult, String>>,
) -> serde_json::Value {
    let mut line = json!({
        "sequence": response.sequence,
        "data": response.request.data,
        "tx_hash": response.tx_hash(),
        "code": response.result.as_ref().map(|r| r.code),
        "error": response.error.as_ref().map(ToString::to_string),
    });
    match committed {
        Some(Ok(tx)) => {
            line["height"] = json!(tx.height);
            line["gas_used"] = json!(tx.gas_used);
        }
        Some(Err(e)) => line["commit_error"] = json!(e),
        None => {}
    }
    line
}
