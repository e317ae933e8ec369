//! Shared utilities for pipeline and gateway integration tests.

#![allow(dead_code)]

use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use ledger_sequencer::config::PipelineConfig;
use ledger_sequencer::ledger::{LedgerMsg, MockLedger, TxSigner, Wallet};
use ledger_sequencer::{Request, Response, TxPipeline};

// Well-known test private key (Anvil's first account)
pub const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub const CHAIN_ID: &str = "testing_1-1";

pub fn wallet() -> Arc<Wallet> {
    Arc::new(Wallet::from_private_key(TEST_PRIVATE_KEY).unwrap())
}

/// Pipeline settings tuned for tests: fast polling, no reset backoff.
pub fn test_config(inflight_limit: u64) -> PipelineConfig {
    PipelineConfig {
        account_address: Some("kava1testaccount".to_string()),
        inflight_limit,
        poll_interval_ms: 20,
        response_buffer: 16,
        max_sequence_resets: 0,
        reset_backoff_base_ms: 0,
        reset_backoff_max_ms: 0,
    }
}

pub fn spawn_pipeline(ledger: &MockLedger, config: &PipelineConfig) -> TxPipeline {
    spawn_with_signer(ledger, config, wallet())
}

pub fn spawn_with_signer(ledger: &MockLedger, config: &PipelineConfig, signer: Arc<dyn TxSigner>) -> TxPipeline {
    TxPipeline::spawn(config, CHAIN_ID, Arc::new(ledger.clone()), signer)
}

/// A request whose correlation payload is `n`.
pub fn request(n: u64) -> Request {
    Request::new(
        vec![LedgerMsg::new(
            "/cosmos.bank.v1beta1.MsgSend",
            json!({ "to_address": "kava1receiver", "amount": [{ "denom": "ukava", "amount": n.to_string() }] }),
        )],
        200_000,
    )
    .with_data(json!(n))
}

/// Commit a block every `interval`, including up to `max_txs` txs.
pub fn produce_blocks(ledger: &MockLedger, interval: Duration, max_txs: usize) -> JoinHandle<()> {
    let ledger = ledger.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            ledger.commit_block(max_txs);
        }
    })
}

/// Receive `n` responses or panic after `deadline`.
pub async fn collect(pipeline: &mut TxPipeline, n: usize, deadline: Duration) -> Vec<Response> {
    tokio::time::timeout(deadline, async {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            match pipeline.responses().recv().await {
                Some(response) => out.push(response),
                None => break,
            }
        }
        out
    })
    .await
    .expect("timed out waiting for responses")
}

pub fn correlation(responses: &[Response]) -> Vec<u64> {
    responses.iter().filter_map(|r| r.request.data.as_u64()).collect()
}

/// Start a programmable HTTP gateway on an ephemeral port.
///
/// The handler receives the method, the path and the body of each request.
pub async fn start_programmable_gateway<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String, String, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some((method, path, body)) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(method, path, body).await;
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            404 => "404 Not Found",
                            408 => "408 Request Timeout",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<(String, String, String)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut request_line = head.lines().next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
    Some((method, path, body))
}
