//! End-to-end flow over in-memory ports.
//!
//! 1. Register the three contracts
//! 2. Faucet sends tokens to a fresh identity
//! 3. Proofs are proven, submitted in fixed order and settled
//! 4. A second store rebuilt from the submitted token proofs agrees with
//!    the first, down to the commitment hash
//!
//! Run with:
//!   cargo test --test integration

use std::{
    sync::Arc,
    time::Duration,
};

use p256::ecdsa::SigningKey;
use tokio::sync::Mutex;

use proof_relay::{
    adapters::{
        credential_file::CredentialFile,
        mock_ledger::MockLedger,
        mock_prover::MockProver,
        software_authenticator::SoftwareAuthenticator,
    },
    codec::split_tokens,
    crypto::commitment::hash_balances,
    domain::{
        balance::BalanceRecord,
        payload::ContractName,
        store::BalanceStore,
    },
    indexer::BalanceIndexer,
    orchestrator::{
        OrchestratorConfig,
        ProofOrchestrator,
        ProvingStatus,
        SubmissionPolicy,
    },
    registry::ensure_contracts_registered,
    session::{
        Session,
        TransferRequest,
    },
};

const BRYAN: &str = "bryan.ecdsa_secp256r1";

type TestSession = Session<MockProver, MockLedger, SoftwareAuthenticator, CredentialFile>;

fn session(
    dir: &tempfile::TempDir,
    prover: MockProver,
    config: OrchestratorConfig,
) -> (TestSession, Arc<MockLedger>) {
    let ledger = Arc::new(MockLedger::new());
    let orchestrator = ProofOrchestrator::new(Arc::new(prover), Arc::clone(&ledger), config);
    let key = SigningKey::from_slice(&[0x42; 32]).unwrap();
    let session = Session::new(
        orchestrator,
        SoftwareAuthenticator::new(key, "relay.test"),
        CredentialFile::new(dir.path().join("credentials.json")),
        Arc::new(Mutex::new(BalanceStore::default())),
    );
    (session, ledger)
}

fn faucet_to(to: &str, amount: u128) -> TransferRequest {
    TransferRequest {
        from: Some("faucet".into()),
        to: to.into(),
        amount,
        image: vec![255, 0, 128, 64],
    }
}

#[tokio::test(start_paused = true)]
async fn test_full_flow_settles_and_reindexes() {
    let dir = tempfile::tempdir().unwrap();
    // Completion order 0, 1, 2: the reverse of submission order.
    let prover = MockProver::new()
        .with_delay(ContractName::EcdsaSecp256r1, Duration::from_secs(1))
        .with_delay(ContractName::Smile, Duration::from_secs(2))
        .with_delay(ContractName::SmileToken, Duration::from_secs(3));
    let (session, ledger) = session(&dir, prover, OrchestratorConfig::default());

    let genesis = BalanceStore::default().settled_balances();
    let registered = ensure_contracts_registered(ledger.as_ref(), &genesis, b"vk")
        .await
        .unwrap();
    assert_eq!(registered.len(), 3);

    let receipts = session.transfer(faucet_to(BRYAN, 10)).await.unwrap();

    // Proof transactions reference the payload transaction in fixed order.
    let proof_txs = ledger.proof_txs().await;
    let order: Vec<(ContractName, u32)> = proof_txs
        .iter()
        .map(|tx| (tx.contract, tx.payload_index))
        .collect();
    assert_eq!(
        order,
        vec![
            (ContractName::SmileToken, 2),
            (ContractName::Smile, 1),
            (ContractName::EcdsaSecp256r1, 0),
        ]
    );
    assert!(proof_txs.iter().all(|tx| tx.payload_tx == receipts.payload_tx));
    assert_eq!(
        session.orchestrator().status(),
        ProvingStatus::TxSuccess {
            proof_tx: proof_txs[0].hash.clone(),
        }
    );

    let settled = session.store().lock().await.settled_balances();
    assert_eq!(
        settled,
        vec![
            BalanceRecord::new("faucet", 999_990),
            BalanceRecord::new(BRYAN, 10),
        ]
    );
    assert_eq!(
        hash_balances(&settled).unwrap().to_string(),
        "2523441536062093824103475821034131902199544848307769536383186226797524756552"
    );

    // Rebuild from what went on chain.
    let rebuilt = Arc::new(Mutex::new(BalanceStore::default()));
    let indexer = BalanceIndexer::with_default_decoder(Arc::clone(&rebuilt));
    assert_eq!(indexer.sync(ledger.as_ref()).await.unwrap(), 1);
    assert_eq!(rebuilt.lock().await.settled_balances(), settled);
}

#[tokio::test(start_paused = true)]
async fn test_payload_tx_carries_three_blobs_in_index_order() {
    let dir = tempfile::tempdir().unwrap();
    let (session, ledger) = session(&dir, MockProver::new(), OrchestratorConfig::default());

    session.transfer(faucet_to("alice", 1)).await.unwrap();

    let payload_txs = ledger.payload_txs().await;
    let blobs = &payload_txs[0].blobs;
    let names: Vec<ContractName> = blobs.iter().map(|b| b.contract_name).collect();
    assert_eq!(names, ContractName::ALL.to_vec());

    // Every sub-payload declares its own token count.
    for blob in blobs {
        let text = String::from_utf8(blob.data.clone()).unwrap();
        let tokens = split_tokens(&text);
        let declared: usize = tokens[0].parse().unwrap();
        assert_eq!(declared, tokens.len() - 1, "{}", blob.contract_name);
    }
    assert_eq!(blobs[1].data, b"4 255 0 128 64");
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_transfers_build_on_pending_balances() {
    let dir = tempfile::tempdir().unwrap();
    let (session, _) = session(&dir, MockProver::new(), OrchestratorConfig::default());

    session.transfer(faucet_to("alice", 100)).await.unwrap();
    session.transfer(faucet_to("bob", 50)).await.unwrap();

    let store = session.store();
    let store = store.lock().await;
    assert_eq!(
        store.settled_balances(),
        vec![
            BalanceRecord::new("faucet", 999_850),
            BalanceRecord::new("alice", 100),
            BalanceRecord::new("bob", 50),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_eager_policy_partial_submission_is_overall_failure() {
    let dir = tempfile::tempdir().unwrap();
    let prover = MockProver::new()
        .with_delay(ContractName::EcdsaSecp256r1, Duration::from_secs(10))
        .failing(ContractName::EcdsaSecp256r1, "witness rejected");
    let config = OrchestratorConfig {
        policy: SubmissionPolicy::Eager,
        ..OrchestratorConfig::default()
    };
    let (session, ledger) = session(&dir, prover, config);

    assert!(session.transfer(faucet_to("alice", 1)).await.is_err());
    assert_eq!(ledger.proof_txs().await.len(), 2);
    assert!(matches!(
        session.orchestrator().status(),
        ProvingStatus::FailedAtProving { .. }
    ));
    assert_eq!(session.store().lock().await.pending_balance("alice"), 0);
}
