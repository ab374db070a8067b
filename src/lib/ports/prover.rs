use std::{
    future::Future,
    time::Duration,
};

use serde::Serialize;

use crate::{
    codec::split_tokens,
    domain::{
        balance::BalanceRecord,
        payload::{
            ContractName,
            PayloadSet,
        },
        proof::ProofArtifact,
    },
    ports::TxHash,
};

/// Everything the three proving paths need for one user action.
///
/// Shared read-only between the concurrent proving tasks.
#[derive(Debug, Clone)]
pub struct ProvingJob {
    /// Payload transaction the proofs settle.
    pub tx_hash: TxHash,
    pub identity: String,
    /// Challenge signed by the authenticator.
    pub challenge: Vec<u8>,
    pub payloads: PayloadSet,
    /// Token balances as of the payload transaction.
    pub balances: Vec<BalanceRecord>,
}

/// Port for producing a proof for one contract of a job.
///
/// Implementations:
/// - `PipelineProver` (VM runner + remote provers)
/// - `MockProver` for testing
pub trait Prover: Send + Sync {
    fn prove(
        &self,
        contract: ContractName,
        job: &ProvingJob,
    ) -> impl Future<Output = Result<ProofArtifact, ProverError>> + Send;
}

/// Result of executing a VM program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmRun {
    pub output: String,
    pub memory: Vec<u8>,
    pub trace: Vec<u8>,
}

/// Port for executing a VM program on an argument string.
pub trait VmRunner: Send + Sync {
    fn run(
        &self,
        program: ContractName,
        args: &str,
    ) -> impl Future<Output = Result<VmRun, ProverError>> + Send;
}

/// Port for the VM proving service.
pub trait VmProver: Send + Sync {
    fn prove_run(&self, run: &VmRun) -> impl Future<Output = Result<Vec<u8>, ProverError>> + Send;
}

/// Port for generating the signature circuit witness.
pub trait WitnessGenerator: Send + Sync {
    fn generate(
        &self,
        input: &SignatureCircuitInput,
    ) -> impl Future<Output = Result<Vec<u8>, ProverError>> + Send;
}

/// Port for the signature proving service.
pub trait SignatureProver: Send + Sync {
    fn prove_witness(
        &self,
        witness: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, ProverError>> + Send;

    fn health(&self) -> impl Future<Output = Result<(), ProverError>> + Send;
}

const STATE_LEN: usize = 4;

/// Inputs of the signature circuit.
///
/// Field names match the circuit parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureCircuitInput {
    pub version: u32,
    pub initial_state_len: usize,
    pub initial_state: Vec<u8>,
    pub next_state_len: usize,
    pub next_state: Vec<u8>,
    pub identity_len: usize,
    pub identity: Vec<u8>,
    pub tx_hash_len: usize,
    pub tx_hash: Vec<u8>,
    pub success: bool,
    /// Combined payload tokens, brackets stripped.
    pub payloads: Vec<String>,
}

impl SignatureCircuitInput {
    pub fn from_job(job: &ProvingJob) -> Self {
        let combined = job.payloads.combined();
        Self {
            version: 1,
            initial_state_len: STATE_LEN,
            initial_state: vec![0; STATE_LEN],
            next_state_len: STATE_LEN,
            next_state: vec![0; STATE_LEN],
            identity_len: job.identity.len(),
            identity: job.identity.as_bytes().to_vec(),
            tx_hash_len: job.challenge.len(),
            tx_hash: job.challenge.clone(),
            success: true,
            payloads: split_tokens(&combined).into_iter().map(String::from).collect(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProverError {
    #[error("proving failed: {0}")]
    ProvingFailed(String),

    #[error("program run failed: {0}")]
    RunFailed(String),

    #[error("witness generation failed: {0}")]
    WitnessError(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("proving timed out after {0:?}")]
    Timeout(Duration),
}
