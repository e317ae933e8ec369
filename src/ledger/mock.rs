//! In-process ledger for tests and dry runs.
//!
//! Emulates the mempool admission rules the sequencer depends on: one
//! account, strict sequence ordering, duplicate detection, a bounded
//! mempool, and blocks that include contiguous sequences. Individual
//! broadcasts can be scripted to fail.

use alloy::primitives::{hex, keccak256};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::ledger::client::{LedgerClient, TxLookup};
use crate::ledger::transaction::SignedTx;
use crate::ledger::types::{codes, AccountState, BroadcastResult, LedgerError, LedgerResult, TxResult};

/// Outcome forced on the next broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedBroadcast {
    /// Answer with this result code in the `sdk` codespace.
    Code(u32),
    /// Node cannot be reached.
    Unreachable,
    /// Pre-check rejection.
    PreCheck(String),
}

#[derive(Debug)]
struct MockState {
    account_number: u64,
    sequence: u64,
    height: u64,
    /// sequence -> (hash, bytes)
    mempool: BTreeMap<u64, (String, Vec<u8>)>,
    mempool_capacity: usize,
    committed: HashMap<String, TxResult>,
    script: VecDeque<ScriptedBroadcast>,
    broadcasts: Vec<SignedTx>,
    failing_fetches: u32,
}

impl MockState {
    fn evict_stale(&mut self) {
        let floor = self.sequence;
        self.mempool.retain(|seq, _| *seq >= floor);
    }

    /// Next sequence a new tx must carry to be admitted.
    fn next_admissible(&self) -> u64 {
        let mut next = self.sequence;
        while self.mempool.contains_key(&next) {
            next += 1;
        }
        next
    }
}

/// Shared handle to a simulated ledger. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct MockLedger {
    state: Arc<Mutex<MockState>>,
}

impl MockLedger {
    pub fn new(account_number: u64, sequence: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                account_number,
                sequence,
                height: 1,
                mempool: BTreeMap::new(),
                mempool_capacity: usize::MAX,
                committed: HashMap::new(),
                script: VecDeque::new(),
                broadcasts: Vec::new(),
                failing_fetches: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Force the outcome of the next unscripted broadcast.
    pub fn script_broadcast(&self, outcome: ScriptedBroadcast) {
        self.lock().script.push_back(outcome);
    }

    /// Make the next `n` account queries fail with a transport error.
    pub fn fail_next_fetches(&self, n: u32) {
        self.lock().failing_fetches = n;
    }

    pub fn set_mempool_capacity(&self, capacity: usize) {
        self.lock().mempool_capacity = capacity;
    }

    /// Confirmed sequence (next sequence the ledger will execute).
    pub fn sequence(&self) -> u64 {
        self.lock().sequence
    }

    pub fn mempool_len(&self) -> usize {
        self.lock().mempool.len()
    }

    /// Every tx that reached `broadcast_tx`, decoded, in arrival order.
    pub fn broadcasts(&self) -> Vec<SignedTx> {
        self.lock().broadcasts.clone()
    }

    /// Produce a block with up to `max_txs` contiguous txs from the mempool.
    ///
    /// Returns the new confirmed sequence.
    pub fn commit_block(&self, max_txs: usize) -> u64 {
        let mut state = self.lock();
        state.height += 1;
        let height = state.height;
        let mut included = 0;
        while included < max_txs {
            let seq = state.sequence;
            let Some((hash, _)) = state.mempool.remove(&seq) else {
                break;
            };
            state.committed.insert(
                hash.clone(),
                TxResult {
                    height,
                    tx_hash: hash,
                    code: codes::SUCCESS,
                    ..Default::default()
                },
            );
            state.sequence += 1;
            included += 1;
        }
        state.evict_stale();
        state.sequence
    }

    /// Another signer using the same key lands `n` txs in the next block.
    ///
    /// Mempool entries for the consumed sequences become invalid.
    pub fn consume_sequences(&self, n: u64) -> u64 {
        let mut state = self.lock();
        state.height += 1;
        state.sequence += n;
        state.evict_stale();
        state.sequence
    }

    /// Node restart: mempool contents are lost.
    pub fn drop_mempool(&self) {
        self.lock().mempool.clear();
    }
}

/// Hash used by the simulated ledger for tx bytes.
pub fn mock_tx_hash(tx_bytes: &[u8]) -> String {
    hex::encode_upper(keccak256(tx_bytes))
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn fetch_account_state(&self, address: &str) -> LedgerResult<AccountState> {
        let mut state = self.lock();
        if state.failing_fetches > 0 {
            state.failing_fetches -= 1;
            return Err(LedgerError::Transport(format!("account query for {} failed", address)));
        }
        Ok(AccountState {
            account_number: state.account_number,
            sequence: state.sequence,
        })
    }

    async fn broadcast_tx(&self, tx_bytes: &[u8]) -> LedgerResult<BroadcastResult> {
        let tx = SignedTx::decode(tx_bytes).map_err(|e| LedgerError::PreCheck(format!("tx parse error: {}", e)))?;
        let hash = mock_tx_hash(tx_bytes);
        let seq = tx.sequence();

        let mut state = self.lock();
        state.broadcasts.push(tx);

        let respond = |code: u32| BroadcastResult {
            code,
            codespace: if code == codes::SUCCESS { String::new() } else { codes::SDK_CODESPACE.to_string() },
            tx_hash: hash.clone(),
            raw_log: String::new(),
        };

        if let Some(outcome) = state.script.pop_front() {
            return match outcome {
                ScriptedBroadcast::Code(code) => Ok(respond(code)),
                ScriptedBroadcast::Unreachable => Err(LedgerError::Transport("connection refused".to_string())),
                ScriptedBroadcast::PreCheck(reason) => Err(LedgerError::PreCheck(reason)),
            };
        }

        if let Some((existing, _)) = state.mempool.get(&seq) {
            if *existing == hash {
                return Ok(respond(codes::TX_IN_MEMPOOL_CACHE));
            }
        }
        if seq != state.next_admissible() {
            return Ok(respond(codes::WRONG_SEQUENCE));
        }
        if state.mempool.len() >= state.mempool_capacity {
            return Ok(respond(codes::MEMPOOL_IS_FULL));
        }
        state.mempool.insert(seq, (hash.clone(), tx_bytes.to_vec()));
        Ok(respond(codes::SUCCESS))
    }
}

#[async_trait]
impl TxLookup for MockLedger {
    async fn get_tx(&self, tx_hash: &str) -> LedgerResult<Option<TxResult>> {
        Ok(self.lock().committed.get(tx_hash).cloned())
    }
}
