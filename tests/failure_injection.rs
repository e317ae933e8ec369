//! Failure injection tests for the pipeline.

use std::sync::Arc;
use std::time::Duration;

use ledger_sequencer::ledger::{
    codes, MockLedger, ScriptedBroadcast, SignedTx, SignerData, SigningError, TxSigner, UnsignedTx,
};
use ledger_sequencer::PipelineError;

mod common;

struct UnpluggedSigner;

impl TxSigner for UnpluggedSigner {
    fn address(&self) -> String {
        "kava1unplugged".to_string()
    }

    fn sign_tx(&self, _tx: &UnsignedTx, _signer_data: &SignerData) -> Result<SignedTx, SigningError> {
        Err(SigningError::Signature("device not connected".to_string()))
    }
}

async fn wait_until(deadline: Duration, condition: impl Fn() -> bool) {
    tokio::time::timeout(deadline, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_mempool_full_is_retried() {
    let ledger = MockLedger::new(4, 12);
    ledger.script_broadcast(ScriptedBroadcast::Code(codes::MEMPOOL_IS_FULL));
    let mut pipeline = common::spawn_pipeline(&ledger, &common::test_config(5));
    let blocks = common::produce_blocks(&ledger, Duration::from_millis(30), 5);

    pipeline.submit(common::request(1)).await.unwrap();
    let responses = common::collect(&mut pipeline, 1, Duration::from_secs(5)).await;
    assert_eq!(responses[0].sequence, 12);
    assert!(responses[0].is_ok());
    assert!(ledger.broadcasts().len() >= 2);

    blocks.abort();
    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_node_only_adds_latency() {
    let ledger = MockLedger::new(4, 0);
    for _ in 0..3 {
        ledger.script_broadcast(ScriptedBroadcast::Unreachable);
    }
    ledger.fail_next_fetches(3);
    let mut pipeline = common::spawn_pipeline(&ledger, &common::test_config(5));
    let blocks = common::produce_blocks(&ledger, Duration::from_millis(20), 5);

    let response = tokio::time::timeout(Duration::from_secs(5), pipeline.sign_and_broadcast(common::request(1)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.sequence, 0);

    blocks.abort();
    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_node_restart_refills_mempool() {
    let ledger = MockLedger::new(4, 0);
    let mut pipeline = common::spawn_pipeline(&ledger, &common::test_config(10));
    for n in 0..5 {
        pipeline.submit(common::request(n)).await.unwrap();
    }
    wait_until(Duration::from_secs(2), || ledger.mempool_len() == 5).await;

    ledger.drop_mempool();
    wait_until(Duration::from_secs(5), || ledger.mempool_len() == 5).await;

    ledger.commit_block(10);
    let responses = common::collect(&mut pipeline, 5, Duration::from_secs(5)).await;
    assert_eq!(common::correlation(&responses), vec![0, 1, 2, 3, 4]);
    assert!(responses.iter().all(|r| r.is_ok()));

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_external_signer_consuming_sequences() {
    let ledger = MockLedger::new(4, 15);
    let mut pipeline = common::spawn_pipeline(&ledger, &common::test_config(5));
    let blocks = common::produce_blocks(&ledger, Duration::from_millis(20), 5);

    let first = tokio::time::timeout(Duration::from_secs(5), pipeline.sign_and_broadcast(common::request(1)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.sequence, 15);

    // Another process lands sequences 16 and 17.
    ledger.consume_sequences(2);
    let second = tokio::time::timeout(Duration::from_secs(5), pipeline.sign_and_broadcast(common::request(2)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.sequence, 18);
    assert_eq!(second.tx.as_ref().map(|tx| tx.sequence()), Some(18));

    blocks.abort();
    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_signing_failure_is_reported_immediately() {
    let ledger = MockLedger::new(4, 20);
    let mut pipeline = common::spawn_with_signer(&ledger, &common::test_config(5), Arc::new(UnpluggedSigner));

    let result = tokio::time::timeout(Duration::from_secs(2), pipeline.sign_and_broadcast(common::request(1)))
        .await
        .unwrap();
    assert!(matches!(result, Err(PipelineError::Signing(_))));
    assert!(ledger.broadcasts().is_empty());

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_pre_check_rejection_does_not_stall_later_requests() {
    let ledger = MockLedger::new(4, 0);
    ledger.script_broadcast(ScriptedBroadcast::PreCheck("insufficient fees".to_string()));
    let mut pipeline = common::spawn_pipeline(&ledger, &common::test_config(5));
    let blocks = common::produce_blocks(&ledger, Duration::from_millis(20), 5);

    pipeline.submit(common::request(1)).await.unwrap();
    pipeline.submit(common::request(2)).await.unwrap();
    let responses = common::collect(&mut pipeline, 2, Duration::from_secs(5)).await;

    assert_eq!(common::correlation(&responses), vec![1, 2]);
    assert_eq!(
        responses[0].error,
        Some(PipelineError::PreCheck("insufficient fees".to_string()))
    );
    assert!(responses[1].is_ok());
    assert_eq!(responses[1].sequence, 0);

    blocks.abort();
    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_persistent_contention_is_bounded() {
    let ledger = MockLedger::new(4, 7);
    for _ in 0..3 {
        ledger.script_broadcast(ScriptedBroadcast::Code(codes::WRONG_SEQUENCE));
    }
    let mut config = common::test_config(5);
    config.max_sequence_resets = 3;
    let mut pipeline = common::spawn_pipeline(&ledger, &config);

    let result = tokio::time::timeout(Duration::from_secs(5), pipeline.sign_and_broadcast(common::request(1)))
        .await
        .unwrap();
    assert_eq!(
        result.unwrap_err(),
        PipelineError::SequenceContention { sequence: 7, resets: 3 }
    );
    assert_eq!(ledger.broadcasts().len(), 3);

    pipeline.shutdown().await;
}
