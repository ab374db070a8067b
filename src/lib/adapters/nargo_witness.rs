use std::path::PathBuf;

use tokio::process::Command;
use tracing::debug;

use crate::ports::prover::{
    ProverError,
    SignatureCircuitInput,
    WitnessGenerator,
};

/// Witness file name passed to `nargo execute`.
const WITNESS_NAME: &str = "witness";

/// Generates signature circuit witnesses with `nargo execute`.
///
/// Writes `Prover.toml` into the circuit directory, runs
/// `nargo execute witness` there and returns `target/witness.gz`.
pub struct NargoWitness {
    nargo: PathBuf,
    circuit_dir: PathBuf,
}

impl NargoWitness {
    pub fn new(nargo: PathBuf, circuit_dir: PathBuf) -> Self {
        Self { nargo, circuit_dir }
    }

    pub fn prover_toml(input: &SignatureCircuitInput) -> Result<String, ProverError> {
        toml::to_string(input).map_err(|e| ProverError::WitnessError(e.to_string()))
    }
}

impl WitnessGenerator for NargoWitness {
    async fn generate(&self, input: &SignatureCircuitInput) -> Result<Vec<u8>, ProverError> {
        if !tokio::fs::try_exists(&self.circuit_dir).await? {
            return Err(ProverError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Circuit directory not found: {}", self.circuit_dir.display()),
            )));
        }

        tokio::fs::write(self.circuit_dir.join("Prover.toml"), Self::prover_toml(input)?).await?;

        debug!(dir = %self.circuit_dir.display(), "executing signature circuit");
        let status = Command::new(&self.nargo)
            .args(["execute", WITNESS_NAME])
            .current_dir(&self.circuit_dir)
            .output()
            .await?;

        if !status.status.success() {
            let stderr = String::from_utf8_lossy(&status.stderr);
            return Err(ProverError::WitnessError(format!(
                "nargo execute failed: {stderr}"
            )));
        }

        let witness_path = self
            .circuit_dir
            .join("target")
            .join(format!("{WITNESS_NAME}.gz"));
        Ok(tokio::fs::read(witness_path).await?)
    }
}
