use std::{
    fmt,
    future::Future,
};

use serde::{
    Deserialize,
    Serialize,
};

use super::{
    TxHash,
    TxStatus,
};
use crate::domain::payload::{
    Blob,
    ContractName,
};

/// Verifier a contract's proofs are checked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verifier {
    Cairo,
    Noir,
}

impl fmt::Display for Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verifier::Cairo => f.write_str("cairo"),
            Verifier::Noir => f.write_str("noir"),
        }
    }
}

/// On-chain registration of one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRegistration {
    pub verifier: Verifier,
    pub name: ContractName,
    pub program_id: Vec<u8>,
    /// Initial state digest.
    pub state_digest: Vec<u8>,
}

/// A payload transaction as stored on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadTxRecord {
    pub identity: String,
    pub blobs: Vec<Blob>,
}

/// A proof transaction as stored on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofTxRecord {
    /// Payload transaction the proof settles.
    pub tx_hash: TxHash,
    pub blob_index: u32,
    pub contract_name: ContractName,
    /// Base64 framed proof artifact.
    pub proof: String,
}

/// Port for the chain the payload and proof transactions land on.
///
/// Implementations:
/// - `NodeLedger` (node REST API + JSON-RPC)
/// - `MockLedger` for testing
pub trait Ledger: Send + Sync {
    fn register_contract(
        &self,
        registration: &ContractRegistration,
    ) -> impl Future<Output = Result<TxHash, LedgerError>> + Send;

    fn contract_exists(
        &self,
        name: ContractName,
    ) -> impl Future<Output = Result<bool, LedgerError>> + Send;

    /// Broadcast the blobs of one user action, returning the payload transaction hash.
    fn broadcast_payload_tx(
        &self,
        identity: &str,
        blobs: &[Blob],
    ) -> impl Future<Output = Result<TxHash, LedgerError>> + Send;

    /// Broadcast a proof settling blob `payload_index` of `tx_hash`.
    fn broadcast_proof_tx(
        &self,
        tx_hash: &TxHash,
        payload_index: u32,
        contract: ContractName,
        proof_base64: &str,
    ) -> impl Future<Output = Result<TxHash, LedgerError>> + Send;

    fn tx_status(
        &self,
        tx_hash: &TxHash,
    ) -> impl Future<Output = Result<TxStatus, LedgerError>> + Send;

    /// Look up a broadcast payload transaction.
    fn payload_tx(
        &self,
        tx_hash: &TxHash,
    ) -> impl Future<Output = Result<PayloadTxRecord, LedgerError>> + Send;

    /// Successful proof transactions for `contract`, oldest first.
    fn settled_proofs(
        &self,
        contract: ContractName,
    ) -> impl Future<Output = Result<Vec<ProofTxRecord>, LedgerError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("transaction not found: {0}")]
    NotFound(TxHash),
}
