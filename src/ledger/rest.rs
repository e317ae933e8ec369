//! REST gateway client with timeout, failover and error classification.
//!
//! # Responsibilities
//! - Query account state (account number, sequence)
//! - Broadcast signed tx bytes in sync mode
//! - Look up committed txs by hash
//! - Separate transport failures (retryable) from pre-check rejections

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::ledger::client::{LedgerClient, TxLookup};
use crate::ledger::types::{
    parse_u64, AccountState, BroadcastResult, LedgerConfig, LedgerError, LedgerResult, TxResult,
};
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;

const ACCOUNTS_PATH: &str = "cosmos/auth/v1beta1/accounts";
const TXS_PATH: &str = "cosmos/tx/v1beta1/txs";

#[derive(Deserialize)]
struct TxResponseEnvelope<T> {
    tx_response: T,
}

/// HTTP client for a ledger node's REST gateway, with failover endpoints.
#[derive(Clone)]
pub struct RestLedgerClient {
    http: reqwest::Client,
    /// Primary endpoint first, then failovers.
    endpoints: Vec<Url>,
    config: LedgerConfig,
    timeout_duration: Duration,
}

impl RestLedgerClient {
    /// Create a new client. Fails only when the primary URL is invalid.
    pub fn new(config: LedgerConfig) -> LedgerResult<Self> {
        let timeout_duration = Duration::from_secs(config.request_timeout_secs);
        let mut endpoints = Vec::new();

        let primary = parse_base_url(&config.rest_url)
            .map_err(|e| LedgerError::Transport(format!("Invalid REST URL '{}': {}", config.rest_url, e)))?;
        endpoints.push(primary);

        for url_str in &config.failover_urls {
            match parse_base_url(url_str) {
                Ok(url) => endpoints.push(url),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover REST URL"),
            }
        }

        let http = reqwest::Client::builder()
            .timeout(timeout_duration)
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        tracing::info!(
            rest_url = %config.rest_url,
            failovers = endpoints.len() - 1,
            chain_id = %config.chain_id,
            "Ledger client initialized"
        );

        Ok(Self {
            http,
            endpoints,
            config,
            timeout_duration,
        })
    }

    fn endpoint(&self, base: &Url, path: &str) -> LedgerResult<Url> {
        base.join(path)
            .map_err(|e| LedgerError::Transport(format!("Invalid endpoint path {}: {}", path, e)))
    }

    async fn get_json(&self, url: Url) -> LedgerResult<(StatusCode, Value)> {
        with_deadline(self.timeout_duration, async {
            let response = self.http.get(url).send().await.map_err(transport_error)?;
            let status = response.status();
            let body = response.json::<Value>().await.unwrap_or(Value::Null);
            Ok((status, body))
        })
        .await
    }

    async fn try_fetch_account(&self, base: &Url, address: &str) -> LedgerResult<AccountState> {
        let url = self.endpoint(base, &format!("{}/{}", ACCOUNTS_PATH, address))?;
        let (status, body) = self.get_json(url).await?;
        match status {
            s if s.is_success() => parse_account(&body),
            StatusCode::NOT_FOUND => Err(LedgerError::AccountNotFound(address.to_string())),
            s => Err(LedgerError::Transport(format!("account query returned {}: {}", s, error_message(&body)))),
        }
    }

    async fn try_broadcast(&self, base: &Url, tx_bytes: &[u8]) -> LedgerResult<BroadcastResult> {
        let url = self.endpoint(base, TXS_PATH)?;
        let request = serde_json::json!({
            "tx_bytes": BASE64.encode(tx_bytes),
            "mode": "BROADCAST_MODE_SYNC",
        });

        with_deadline(self.timeout_duration, async {
            let response = self
                .http
                .post(url)
                .json(&request)
                .send()
                .await
                .map_err(transport_error)?;
            let status = response.status();
            let body = response.json::<Value>().await.unwrap_or(Value::Null);

            if !status.is_success() {
                return Err(broadcast_rejection(status, &body));
            }

            let envelope: TxResponseEnvelope<BroadcastResult> =
                serde_json::from_value(body).map_err(|e| LedgerError::Decode(e.to_string()))?;
            Ok(envelope.tx_response)
        })
        .await
    }

    async fn try_get_tx(&self, base: &Url, tx_hash: &str) -> LedgerResult<Option<TxResult>> {
        let url = self.endpoint(base, &format!("{}/{}", TXS_PATH, tx_hash))?;
        let (status, body) = self.get_json(url).await?;
        match status {
            s if s.is_success() => {
                let envelope: TxResponseEnvelope<TxResult> =
                    serde_json::from_value(body).map_err(|e| LedgerError::Decode(e.to_string()))?;
                Ok(Some(envelope.tx_response))
            }
            StatusCode::NOT_FOUND => Ok(None),
            s => Err(LedgerError::Transport(format!("tx query returned {}: {}", s, error_message(&body)))),
        }
    }
}

#[async_trait]
impl LedgerClient for RestLedgerClient {
    async fn fetch_account_state(&self, address: &str) -> LedgerResult<AccountState> {
        let mut last_error = LedgerError::Transport("no endpoints configured".to_string());
        for (i, base) in self.endpoints.iter().enumerate() {
            match self.try_fetch_account(base, address).await {
                Ok(state) => {
                    metrics::record_ledger_health(true);
                    return Ok(state);
                }
                Err(e) => {
                    tracing::debug!(endpoint_idx = i, error = %e, "Account query failed");
                    last_error = e;
                }
            }
        }
        metrics::record_ledger_health(false);
        Err(last_error)
    }

    async fn broadcast_tx(&self, tx_bytes: &[u8]) -> LedgerResult<BroadcastResult> {
        let mut last_error = LedgerError::Transport("no endpoints configured".to_string());
        for (i, base) in self.endpoints.iter().enumerate() {
            match self.try_broadcast(base, tx_bytes).await {
                Ok(result) => return Ok(result),
                // Pre-check rejections are not retried on other endpoints.
                Err(e) if e.is_pre_check() => return Err(e),
                Err(e) => {
                    tracing::warn!(endpoint_idx = i, error = %e, "Broadcast failed, trying next endpoint");
                    last_error = e;
                }
            }
        }
        metrics::record_ledger_health(false);
        Err(last_error)
    }
}

#[async_trait]
impl TxLookup for RestLedgerClient {
    async fn get_tx(&self, tx_hash: &str) -> LedgerResult<Option<TxResult>> {
        let mut last_error = LedgerError::Transport("no endpoints configured".to_string());
        for (i, base) in self.endpoints.iter().enumerate() {
            match self.try_get_tx(base, tx_hash).await {
                Ok(found) => return Ok(found),
                Err(e) => {
                    tracing::debug!(endpoint_idx = i, error = %e, "Tx query failed");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

impl std::fmt::Debug for RestLedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestLedgerClient")
            .field("rest_url", &self.config.rest_url)
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.request_timeout_secs)
            .finish()
    }
}

/// Parse a base URL, making sure relative joins keep its path.
fn parse_base_url(raw: &str) -> Result<Url, url::ParseError> {
    if raw.ends_with('/') {
        Url::parse(raw)
    } else {
        Url::parse(&format!("{}/", raw))
    }
}

fn transport_error(e: reqwest::Error) -> LedgerError {
    LedgerError::Transport(e.to_string())
}

/// Sort a failed broadcast into a terminal pre-check rejection or a
/// retryable transport failure.
///
/// Gateways report mempool pre-check failures from `BroadcastTx` as a 5xx
/// carrying `precheck:` in the message, so the body is checked before the
/// status. Throttling and request timeouts stay retryable.
fn broadcast_rejection(status: StatusCode, body: &Value) -> LedgerError {
    let message = error_message(body);
    let refused = matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE | StatusCode::UNPROCESSABLE_ENTITY
    );
    if refused || message.contains("precheck") {
        LedgerError::PreCheck(format!("{}: {}", status, message))
    } else {
        LedgerError::Transport(format!("broadcast returned {}: {}", status, message))
    }
}

fn error_message(body: &Value) -> String {
    body.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

/// Extract account number and sequence from an account query response.
///
/// Handles the plain layout and accounts that nest a `base_account`
/// (eth accounts, vesting accounts).
pub(crate) fn parse_account(body: &Value) -> LedgerResult<AccountState> {
    let account = body
        .get("account")
        .ok_or_else(|| LedgerError::Decode("missing account field".to_string()))?;
    find_account_fields(account)
        .ok_or_else(|| LedgerError::Decode(format!("no account_number/sequence in {}", account)))
}

fn find_account_fields(value: &Value) -> Option<AccountState> {
    let object = value.as_object()?;
    if let Some(account_number) = object.get("account_number").and_then(parse_u64) {
        let sequence = object.get("sequence").and_then(parse_u64).unwrap_or(0);
        return Some(AccountState {
            account_number,
            sequence,
        });
    }
    object.values().find_map(find_account_fields)
}
