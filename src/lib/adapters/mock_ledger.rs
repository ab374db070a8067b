use std::{
    collections::HashMap,
    sync::atomic::{
        AtomicU64,
        Ordering,
    },
};

use tokio::{
    sync::Mutex,
    time::Instant,
};

use crate::{
    domain::payload::{
        Blob,
        ContractName,
    },
    ports::{
        TxHash,
        TxStatus,
        ledger::{
            ContractRegistration,
            Ledger,
            LedgerError,
            PayloadTxRecord,
            ProofTxRecord,
        },
    },
};

/// A proof transaction recorded by [`MockLedger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofTx {
    pub hash: TxHash,
    pub payload_tx: TxHash,
    pub payload_index: u32,
    pub contract: ContractName,
    pub proof_base64: String,
    pub sent_at: Instant,
}

/// A payload transaction recorded by [`MockLedger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadTx {
    pub hash: TxHash,
    pub identity: String,
    pub blobs: Vec<Blob>,
}

/// In-memory `Ledger` that records every call.
///
/// Every transaction succeeds unless a status is scripted for its contract
/// with [`MockLedger::set_proof_status`].
pub struct MockLedger {
    nonce: AtomicU64,
    registrations: Mutex<Vec<ContractRegistration>>,
    payload_txs: Mutex<Vec<PayloadTx>>,
    proof_txs: Mutex<Vec<ProofTx>>,
    proof_statuses: Mutex<HashMap<ContractName, TxStatus>>,
    status_queries: Mutex<Vec<TxHash>>,
    reject_broadcasts: Mutex<Option<String>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            nonce: AtomicU64::new(1),
            registrations: Mutex::new(Vec::new()),
            payload_txs: Mutex::new(Vec::new()),
            proof_txs: Mutex::new(Vec::new()),
            proof_statuses: Mutex::new(HashMap::new()),
            status_queries: Mutex::new(Vec::new()),
            reject_broadcasts: Mutex::new(None),
        }
    }

    fn next_hash(&self) -> TxHash {
        TxHash(format!("{:064x}", self.nonce.fetch_add(1, Ordering::SeqCst)))
    }

    pub async fn set_proof_status(&self, contract: ContractName, status: TxStatus) {
        self.proof_statuses.lock().await.insert(contract, status);
    }

    pub async fn reject_broadcasts(&self, reason: impl Into<String>) {
        *self.reject_broadcasts.lock().await = Some(reason.into());
    }

    pub async fn registrations(&self) -> Vec<ContractRegistration> {
        self.registrations.lock().await.clone()
    }

    pub async fn payload_txs(&self) -> Vec<PayloadTx> {
        self.payload_txs.lock().await.clone()
    }

    /// Proof transactions in broadcast order.
    pub async fn proof_txs(&self) -> Vec<ProofTx> {
        self.proof_txs.lock().await.clone()
    }

    pub async fn status_queries(&self) -> Vec<TxHash> {
        self.status_queries.lock().await.clone()
    }

    async fn check_rejected(&self) -> Result<(), LedgerError> {
        match self.reject_broadcasts.lock().await.as_ref() {
            Some(reason) => Err(LedgerError::TransactionFailed(reason.clone())),
            None => Ok(()),
        }
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger for MockLedger {
    async fn register_contract(
        &self,
        registration: &ContractRegistration,
    ) -> Result<TxHash, LedgerError> {
        self.check_rejected().await?;
        self.registrations.lock().await.push(registration.clone());
        Ok(self.next_hash())
    }

    async fn contract_exists(&self, name: ContractName) -> Result<bool, LedgerError> {
        Ok(self
            .registrations
            .lock()
            .await
            .iter()
            .any(|r| r.name == name))
    }

    async fn broadcast_payload_tx(
        &self,
        identity: &str,
        blobs: &[Blob],
    ) -> Result<TxHash, LedgerError> {
        self.check_rejected().await?;
        let hash = self.next_hash();
        self.payload_txs.lock().await.push(PayloadTx {
            hash: hash.clone(),
            identity: identity.to_string(),
            blobs: blobs.to_vec(),
        });
        Ok(hash)
    }

    async fn broadcast_proof_tx(
        &self,
        tx_hash: &TxHash,
        payload_index: u32,
        contract: ContractName,
        proof_base64: &str,
    ) -> Result<TxHash, LedgerError> {
        self.check_rejected().await?;
        let hash = self.next_hash();
        self.proof_txs.lock().await.push(ProofTx {
            hash: hash.clone(),
            payload_tx: tx_hash.clone(),
            payload_index,
            contract,
            proof_base64: proof_base64.to_string(),
            sent_at: Instant::now(),
        });
        Ok(hash)
    }

    async fn tx_status(&self, tx_hash: &TxHash) -> Result<TxStatus, LedgerError> {
        self.status_queries.lock().await.push(tx_hash.clone());

        let contract = self
            .proof_txs
            .lock()
            .await
            .iter()
            .find(|tx| &tx.hash == tx_hash)
            .map(|tx| tx.contract);
        match contract {
            Some(contract) => Ok(self
                .proof_statuses
                .lock()
                .await
                .get(&contract)
                .cloned()
                .unwrap_or_else(TxStatus::success)),
            None if self.payload_txs.lock().await.iter().any(|tx| &tx.hash == tx_hash) => {
                Ok(TxStatus::success())
            }
            None => Err(LedgerError::NotFound(tx_hash.clone())),
        }
    }

    async fn payload_tx(&self, tx_hash: &TxHash) -> Result<PayloadTxRecord, LedgerError> {
        self.payload_txs
            .lock()
            .await
            .iter()
            .find(|tx| &tx.hash == tx_hash)
            .map(|tx| PayloadTxRecord {
                identity: tx.identity.clone(),
                blobs: tx.blobs.clone(),
            })
            .ok_or_else(|| LedgerError::NotFound(tx_hash.clone()))
    }

    async fn settled_proofs(
        &self,
        contract: ContractName,
    ) -> Result<Vec<ProofTxRecord>, LedgerError> {
        let statuses = self.proof_statuses.lock().await;
        if statuses.get(&contract).is_some_and(|status| !status.is_success()) {
            return Ok(Vec::new());
        }
        Ok(self
            .proof_txs
            .lock()
            .await
            .iter()
            .filter(|tx| tx.contract == contract)
            .map(|tx| ProofTxRecord {
                tx_hash: tx.payload_tx.clone(),
                blob_index: tx.payload_index,
                contract_name: tx.contract,
                proof: tx.proof_base64.clone(),
            })
            .collect())
    }
}
