use base64::{
    Engine,
    engine::general_purpose::STANDARD,
};
use serde::{
    Deserialize,
    Serialize,
};

use super::payload::ContractName;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("{field} is {len} bytes, too long for a u32 length prefix")]
    TooLong { field: &'static str, len: usize },
}

fn length_prefix(field: &'static str, len: usize) -> Result<[u8; 4], FrameError> {
    u32::try_from(len)
        .map(u32::to_le_bytes)
        .map_err(|_| FrameError::TooLong { field, len })
}

/// Proof produced by an external proving service for one contract.
///
/// On chain the artifact is stored framed as
/// `u32le(proof.len) ‖ proof ‖ u32le(inputs.len) ‖ inputs ‖ output`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofArtifact {
    pub contract: ContractName,
    pub proof: Vec<u8>,
    pub public_inputs: Vec<u8>,
    pub output: Vec<u8>,
}

impl ProofArtifact {
    pub fn new(contract: ContractName, proof: Vec<u8>, output: Vec<u8>) -> Self {
        Self {
            contract,
            proof,
            public_inputs: Vec::new(),
            output,
        }
    }

    pub fn with_public_inputs(mut self, public_inputs: Vec<u8>) -> Self {
        self.public_inputs = public_inputs;
        self
    }

    /// Framed bytes as stored by the chain.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FrameError> {
        let proof_len = length_prefix("proof", self.proof.len())?;
        let inputs_len = length_prefix("public inputs", self.public_inputs.len())?;
        let mut bytes =
            Vec::with_capacity(8 + self.proof.len() + self.public_inputs.len() + self.output.len());
        bytes.extend_from_slice(&proof_len);
        bytes.extend_from_slice(&self.proof);
        bytes.extend_from_slice(&inputs_len);
        bytes.extend_from_slice(&self.public_inputs);
        bytes.extend_from_slice(&self.output);
        Ok(bytes)
    }

    /// Base64 of the framed bytes, the form carried by a proof transaction.
    pub fn to_base64(&self) -> Result<String, FrameError> {
        Ok(STANDARD.encode(self.to_bytes()?))
    }
}
