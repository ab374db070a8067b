use std::{
    collections::HashMap,
    time::Duration,
};

use tokio::sync::Mutex;

use crate::{
    codec::split_tokens,
    domain::{
        payload::ContractName,
        proof::ProofArtifact,
    },
    ports::prover::{
        Prover,
        ProverError,
        ProvingJob,
    },
};

/// In-memory `Prover` for orchestrator tests and demos.
///
/// Each contract can be given a latency and a failure. Token-contract
/// artifacts carry the transfer fields in their output region the way the
/// real program lays them out, so they decode with the proof-output decoder.
pub struct MockProver {
    delays: HashMap<ContractName, Duration>,
    failures: HashMap<ContractName, String>,
    completed: Mutex<Vec<ContractName>>,
}

impl MockProver {
    pub fn new() -> Self {
        Self {
            delays: HashMap::new(),
            failures: HashMap::new(),
            completed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, contract: ContractName, delay: Duration) -> Self {
        self.delays.insert(contract, delay);
        self
    }

    pub fn failing(mut self, contract: ContractName, reason: impl Into<String>) -> Self {
        self.failures.insert(contract, reason.into());
        self
    }

    /// Contracts in the order their proofs completed.
    pub async fn completed(&self) -> Vec<ContractName> {
        self.completed.lock().await.clone()
    }

    fn output_for(contract: ContractName, job: &ProvingJob) -> Vec<u8> {
        match contract {
            ContractName::SmileToken => {
                let tokens = split_tokens(&job.payloads.transfer);
                let text = tokens.get(1..).unwrap_or_default().join(" ");
                let mut output = vec![0u8; 4];
                output.push(text.len().min(u8::MAX as usize) as u8);
                output.extend_from_slice(text.as_bytes());
                output
            }
            _ => job.identity.as_bytes().to_vec(),
        }
    }
}

impl Default for MockProver {
    fn default() -> Self {
        Self::new()
    }
}

impl Prover for MockProver {
    async fn prove(
        &self,
        contract: ContractName,
        job: &ProvingJob,
    ) -> Result<ProofArtifact, ProverError> {
        if let Some(delay) = self.delays.get(&contract) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(reason) = self.failures.get(&contract) {
            return Err(ProverError::ProvingFailed(reason.clone()));
        }
        self.completed.lock().await.push(contract);

        Ok(ProofArtifact::new(
            contract,
            format!("proof:{contract}").into_bytes(),
            Self::output_for(contract, job),
        ))
    }
}
