use std::{
    collections::HashMap,
    sync::Arc,
    time::Duration,
};

use serde::{
    Deserialize,
    Serialize,
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{
        Instant,
        timeout_at,
    },
};
use tracing::{
    error,
    info,
    warn,
};

use crate::{
    domain::{
        payload::ContractName,
        proof::{
            FrameError,
            ProofArtifact,
        },
    },
    ports::{
        TxHash,
        ledger::{
            Ledger,
            LedgerError,
        },
        prover::{
            Prover,
            ProverError,
            ProvingJob,
        },
    },
};

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("prover error: {0}")]
    Prover(#[from] ProverError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("proof framing error: {0}")]
    Frame(#[from] FrameError),

    #[error("transaction failed: {raw_log}")]
    TxFailed { raw_log: String },
}

/// Lifecycle of one user action.
///
/// `Idle → Proving → CheckingTx → TxSuccess | TxFailure`, or
/// `Proving → FailedAtProving` when any proof or proof broadcast fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProvingStatus {
    Idle,
    Proving,
    CheckingTx,
    TxSuccess { proof_tx: TxHash },
    TxFailure { error: String },
    FailedAtProving { error: String },
}

impl ProvingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProvingStatus::TxSuccess { .. }
                | ProvingStatus::TxFailure { .. }
                | ProvingStatus::FailedAtProving { .. }
        )
    }
}

/// When proof transactions are broadcast relative to proof completion.
///
/// Either way they go out in [`ContractName::SUBMISSION_ORDER`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionPolicy {
    /// Wait for all three proofs, then broadcast. A proving failure sends nothing.
    #[default]
    AwaitAll,
    /// Broadcast each proof as soon as it and every proof ahead of it in
    /// submission order are ready. A late proving failure can leave earlier
    /// proofs on chain.
    Eager,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub policy: SubmissionPolicy,
    /// Wait between the last broadcast and the status checks.
    pub post_broadcast_delay: Duration,
    /// Budget for all three proofs, measured from the start of proving.
    pub proving_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            policy: SubmissionPolicy::AwaitAll,
            post_broadcast_delay: Duration::from_secs(4),
            proving_timeout: Duration::from_secs(600),
        }
    }
}

/// Which proofs have completed, for progress display only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    done: [bool; 3],
}

impl Progress {
    pub fn is_done(&self, contract: ContractName) -> bool {
        self.done[contract.index() as usize]
    }

    pub fn completed(&self) -> usize {
        self.done.iter().filter(|d| **d).count()
    }

    fn mark(&mut self, contract: ContractName) {
        self.done[contract.index() as usize] = true;
    }
}

/// One broadcast proof transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub contract: ContractName,
    pub proof_tx: TxHash,
    pub artifact: ProofArtifact,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofReceipts {
    pub payload_tx: TxHash,
    /// In broadcast order.
    pub submissions: Vec<Submission>,
}

impl ProofReceipts {
    pub fn get(&self, contract: ContractName) -> Option<&Submission> {
        self.submissions.iter().find(|s| s.contract == contract)
    }
}

type ProofTask = JoinHandle<Result<ProofArtifact, ProverError>>;

/// Fans one job out to the three provers, broadcasts the proofs in fixed
/// order and aggregates their transaction statuses.
///
/// Generic over `Prover` and `Ledger`. Status and progress are published on
/// watch channels; one job runs at a time.
pub struct ProofOrchestrator<P, L> {
    prover: Arc<P>,
    ledger: Arc<L>,
    config: OrchestratorConfig,
    status: watch::Sender<ProvingStatus>,
    progress: Arc<watch::Sender<Progress>>,
}

impl<P, L> ProofOrchestrator<P, L>
where
    P: Prover + 'static,
    L: Ledger,
{
    pub fn new(prover: Arc<P>, ledger: Arc<L>, config: OrchestratorConfig) -> Self {
        let (status, _) = watch::channel(ProvingStatus::Idle);
        let (progress, _) = watch::channel(Progress::default());
        Self {
            prover,
            ledger,
            config,
            status,
            progress: Arc::new(progress),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn status(&self) -> ProvingStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProvingStatus> {
        self.status.subscribe()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    fn set_status(&self, status: ProvingStatus) {
        info!(?status, "proving status");
        self.status.send_replace(status);
    }

    /// Prove the job, broadcast the proofs and wait for their statuses.
    pub async fn prove_and_submit(
        &self,
        job: ProvingJob,
    ) -> Result<ProofReceipts, OrchestratorError> {
        let payload_tx = job.tx_hash.clone();
        self.progress.send_replace(Progress::default());
        self.set_status(ProvingStatus::Proving);

        let job = Arc::new(job);
        let deadline = Instant::now() + self.config.proving_timeout;
        let mut tasks: [ProofTask; 3] =
            ContractName::ALL.map(|contract| self.spawn_proof(contract, Arc::clone(&job)));

        let submissions = match self.submit_proofs(&payload_tx, &mut tasks, deadline).await {
            Ok(submissions) => submissions,
            Err(e) => {
                for task in &tasks {
                    task.abort();
                }
                error!(error = %e, "proving failed");
                self.set_status(ProvingStatus::FailedAtProving {
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        self.set_status(ProvingStatus::CheckingTx);
        tokio::time::sleep(self.config.post_broadcast_delay).await;

        match self.check_statuses(&submissions).await {
            None => {
                let proof_tx = submissions
                    .iter()
                    .find(|s| s.contract == ContractName::SmileToken)
                    .map(|s| s.proof_tx.clone())
                    .unwrap_or_else(|| payload_tx.clone());
                self.set_status(ProvingStatus::TxSuccess { proof_tx });
                Ok(ProofReceipts {
                    payload_tx,
                    submissions,
                })
            }
            Some(raw_log) => {
                self.set_status(ProvingStatus::TxFailure {
                    error: raw_log.clone(),
                });
                Err(OrchestratorError::TxFailed { raw_log })
            }
        }
    }

    fn spawn_proof(&self, contract: ContractName, job: Arc<ProvingJob>) -> ProofTask {
        let prover = Arc::clone(&self.prover);
        let progress = Arc::clone(&self.progress);
        tokio::spawn(async move {
            let result = prover.prove(contract, &job).await;
            if result.is_ok() {
                progress.send_modify(|p| p.mark(contract));
                info!(%contract, "proof computed");
            }
            result
        })
    }

    async fn join_proof(
        &self,
        task: &mut ProofTask,
        deadline: Instant,
    ) -> Result<ProofArtifact, ProverError> {
        match timeout_at(deadline, task).await {
            Err(_) => Err(ProverError::Timeout(self.config.proving_timeout)),
            Ok(Err(join)) => Err(ProverError::ProvingFailed(format!(
                "proving task failed: {join}"
            ))),
            Ok(Ok(result)) => result,
        }
    }

    async fn submit_proofs(
        &self,
        payload_tx: &TxHash,
        tasks: &mut [ProofTask; 3],
        deadline: Instant,
    ) -> Result<Vec<Submission>, OrchestratorError> {
        let mut ready = HashMap::new();
        if self.config.policy == SubmissionPolicy::AwaitAll {
            // Joined together so the first failure surfaces immediately.
            let [ecdsa, smile, smile_token] = &mut *tasks;
            let (ecdsa, smile, smile_token) = tokio::try_join!(
                self.join_task(ecdsa, ContractName::EcdsaSecp256r1, deadline),
                self.join_task(smile, ContractName::Smile, deadline),
                self.join_task(smile_token, ContractName::SmileToken, deadline),
            )?;
            ready.insert(ContractName::EcdsaSecp256r1, ecdsa);
            ready.insert(ContractName::Smile, smile);
            ready.insert(ContractName::SmileToken, smile_token);
        }

        let mut submissions = Vec::with_capacity(3);
        for contract in ContractName::SUBMISSION_ORDER {
            let artifact = match ready.remove(&contract) {
                Some(artifact) => artifact,
                None => {
                    let task = &mut tasks[contract.index() as usize];
                    self.join_task(task, contract, deadline).await?
                }
            };
            let proof_base64 = artifact.to_base64()?;
            let proof_tx = self
                .ledger
                .broadcast_proof_tx(payload_tx, contract.index(), contract, &proof_base64)
                .await?;
            info!(%contract, tx_hash = %proof_tx, "proof transaction sent");
            submissions.push(Submission {
                contract,
                proof_tx,
                artifact,
            });
        }
        Ok(submissions)
    }

    async fn join_task(
        &self,
        task: &mut ProofTask,
        contract: ContractName,
        deadline: Instant,
    ) -> Result<ProofArtifact, ProverError> {
        self.join_proof(task, deadline)
            .await
            .map_err(|e| match e {
                ProverError::ProvingFailed(msg) => {
                    ProverError::ProvingFailed(format!("{contract}: {msg}"))
                }
                other => other,
            })
    }

    /// Query every proof transaction in payload index order. Returns the
    /// first failure's log, or `None` when all succeeded.
    async fn check_statuses(&self, submissions: &[Submission]) -> Option<String> {
        let mut first_error = None;
        for contract in ContractName::ALL {
            let Some(submission) = submissions.iter().find(|s| s.contract == contract) else {
                continue;
            };
            let failure = match self.ledger.tx_status(&submission.proof_tx).await {
                Ok(status) if status.is_success() => None,
                Ok(status) => Some(status.raw_log),
                Err(e) => Some(e.to_string()),
            };
            if let Some(raw_log) = failure {
                warn!(%contract, tx_hash = %submission.proof_tx, %raw_log, "proof transaction failed");
                first_error.get_or_insert(raw_log);
            }
        }
        first_error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapters::{
            mock_ledger::MockLedger,
            mock_prover::MockProver,
        },
        domain::payload::PayloadSet,
        ports::TxStatus,
    };

    fn job() -> ProvingJob {
        ProvingJob {
            tx_hash: TxHash::from("payload-tx"),
            identity: "bob.ecdsa_secp256r1".into(),
            challenge: b"challenge".to_vec(),
            payloads: PayloadSet {
                signature: "1 7".into(),
                image: "2 1 2".into(),
                transfer: "7 0 112568767309172 6 0 6451042 3 5".into(),
            },
            balances: vec![],
        }
    }

    fn orchestrator(
        prover: MockProver,
        config: OrchestratorConfig,
    ) -> (ProofOrchestrator<MockProver, MockLedger>, Arc<MockLedger>) {
        let ledger = Arc::new(MockLedger::new());
        (
            ProofOrchestrator::new(Arc::new(prover), Arc::clone(&ledger), config),
            ledger,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_submits_in_fixed_order_regardless_of_completion() {
        // Completion order is 0, 1, 2, the reverse of submission order.
        let prover = MockProver::new()
            .with_delay(ContractName::EcdsaSecp256r1, Duration::from_millis(10))
            .with_delay(ContractName::Smile, Duration::from_millis(20))
            .with_delay(ContractName::SmileToken, Duration::from_millis(30));
        let (orchestrator, ledger) = orchestrator(prover, OrchestratorConfig::default());

        let receipts = orchestrator.prove_and_submit(job()).await.unwrap();

        let sent: Vec<(ContractName, u32)> = ledger
            .proof_txs()
            .await
            .iter()
            .map(|tx| (tx.contract, tx.payload_index))
            .collect();
        assert_eq!(
            sent,
            vec![
                (ContractName::SmileToken, 2),
                (ContractName::Smile, 1),
                (ContractName::EcdsaSecp256r1, 0),
            ]
        );
        assert_eq!(receipts.submissions.len(), 3);
        assert_eq!(
            orchestrator.status(),
            ProvingStatus::TxSuccess {
                proof_tx: receipts.get(ContractName::SmileToken).unwrap().proof_tx.clone(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_status_failure_reports_raw_log() {
        let (orchestrator, ledger) = orchestrator(MockProver::new(), OrchestratorConfig::default());
        ledger
            .set_proof_status(ContractName::Smile, TxStatus::failed(7, "smile verifier rejected"))
            .await;
        ledger
            .set_proof_status(ContractName::SmileToken, TxStatus::failed(9, "later error"))
            .await;

        let err = orchestrator.prove_and_submit(job()).await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::TxFailed { ref raw_log } if raw_log == "smile verifier rejected"
        ));
        assert_eq!(
            orchestrator.status(),
            ProvingStatus::TxFailure {
                error: "smile verifier rejected".into()
            }
        );
        // All three were still checked, in payload index order.
        let proof_txs = ledger.proof_txs().await;
        let expected: Vec<TxHash> = [2, 1, 0].iter().map(|i| proof_txs[*i].hash.clone()).collect();
        assert_eq!(ledger.status_queries().await, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_proving_failure_submits_nothing_when_awaiting_all() {
        let prover = MockProver::new()
            .with_delay(ContractName::EcdsaSecp256r1, Duration::from_secs(5))
            .failing(ContractName::EcdsaSecp256r1, "bad witness");
        let (orchestrator, ledger) = orchestrator(prover, OrchestratorConfig::default());

        let err = orchestrator.prove_and_submit(job()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Prover(_)));
        assert!(ledger.proof_txs().await.is_empty());
        assert!(matches!(
            orchestrator.status(),
            ProvingStatus::FailedAtProving { ref error } if error.contains("bad witness")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_all_fails_fast_on_any_proof() {
        // The failing proof is last in submission order; the first one is slow.
        let prover = MockProver::new()
            .with_delay(ContractName::EcdsaSecp256r1, Duration::from_secs(1))
            .failing(ContractName::EcdsaSecp256r1, "bad witness")
            .with_delay(ContractName::SmileToken, Duration::from_secs(3600));
        let config = OrchestratorConfig {
            proving_timeout: Duration::from_secs(60),
            ..OrchestratorConfig::default()
        };
        let (orchestrator, ledger) = orchestrator(prover, config);
        let started = Instant::now();

        let err = orchestrator.prove_and_submit(job()).await.unwrap_err();

        assert_eq!(started.elapsed().as_secs(), 1);
        assert!(err.to_string().contains("bad witness"), "{err}");
        assert!(ledger.proof_txs().await.is_empty());
        assert!(matches!(
            orchestrator.status(),
            ProvingStatus::FailedAtProving { ref error } if error.contains("bad witness")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eager_policy_broadcasts_before_slow_proofs_finish() {
        let prover = MockProver::new()
            .with_delay(ContractName::SmileToken, Duration::from_secs(1))
            .with_delay(ContractName::Smile, Duration::from_secs(2))
            .with_delay(ContractName::EcdsaSecp256r1, Duration::from_secs(30));
        let config = OrchestratorConfig {
            policy: SubmissionPolicy::Eager,
            ..OrchestratorConfig::default()
        };
        let (orchestrator, ledger) = orchestrator(prover, config);
        let started = Instant::now();

        orchestrator.prove_and_submit(job()).await.unwrap();

        let sent = ledger.proof_txs().await;
        assert_eq!(sent[0].contract, ContractName::SmileToken);
        let offsets: Vec<u64> = sent.iter().map(|tx| (tx.sent_at - started).as_secs()).collect();
        assert_eq!(offsets, vec![1, 2, 30]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_all_policy_waits_for_slowest_proof() {
        let prover = MockProver::new()
            .with_delay(ContractName::SmileToken, Duration::from_secs(1))
            .with_delay(ContractName::EcdsaSecp256r1, Duration::from_secs(30));
        let (orchestrator, ledger) = orchestrator(prover, OrchestratorConfig::default());
        let started = Instant::now();

        orchestrator.prove_and_submit(job()).await.unwrap();

        for tx in ledger.proof_txs().await {
            assert_eq!((tx.sent_at - started).as_secs(), 30);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_eager_policy_keeps_earlier_submissions_on_late_failure() {
        let prover = MockProver::new()
            .with_delay(ContractName::EcdsaSecp256r1, Duration::from_secs(3))
            .failing(ContractName::EcdsaSecp256r1, "late failure");
        let config = OrchestratorConfig {
            policy: SubmissionPolicy::Eager,
            ..OrchestratorConfig::default()
        };
        let (orchestrator, ledger) = orchestrator(prover, config);

        assert!(orchestrator.prove_and_submit(job()).await.is_err());
        let sent: Vec<ContractName> = ledger.proof_txs().await.iter().map(|t| t.contract).collect();
        assert_eq!(sent, vec![ContractName::SmileToken, ContractName::Smile]);
        assert!(matches!(
            orchestrator.status(),
            ProvingStatus::FailedAtProving { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_proving_timeout() {
        let prover = MockProver::new().with_delay(ContractName::Smile, Duration::from_secs(3600));
        let config = OrchestratorConfig {
            proving_timeout: Duration::from_secs(60),
            ..OrchestratorConfig::default()
        };
        let (orchestrator, ledger) = orchestrator(prover, config);

        let err = orchestrator.prove_and_submit(job()).await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Prover(ProverError::Timeout(d)) if d == Duration::from_secs(60)
        ));
        assert!(ledger.proof_txs().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_before_checking_status() {
        let (orchestrator, ledger) = orchestrator(MockProver::new(), OrchestratorConfig::default());
        let mut status = orchestrator.subscribe();
        let started = Instant::now();

        orchestrator.prove_and_submit(job()).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(4));
        assert_eq!(ledger.status_queries().await.len(), 3);
        assert!(status.has_changed().unwrap());
        assert!(status.borrow_and_update().is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_marks_each_proof() {
        let (orchestrator, _) = orchestrator(MockProver::new(), OrchestratorConfig::default());
        let progress = orchestrator.subscribe_progress();

        orchestrator.prove_and_submit(job()).await.unwrap();

        let progress = *progress.borrow();
        assert_eq!(progress.completed(), 3);
        for contract in ContractName::ALL {
            assert!(progress.is_done(contract));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_failure_is_a_proving_stage_failure() {
        let (orchestrator, ledger) = orchestrator(MockProver::new(), OrchestratorConfig::default());
        ledger.reject_broadcasts("mempool full").await;

        let err = orchestrator.prove_and_submit(job()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Ledger(_)));
        assert!(matches!(
            orchestrator.status(),
            ProvingStatus::FailedAtProving { ref error } if error.contains("mempool full")
        ));
    }
}
