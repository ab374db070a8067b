use base64::{
    Engine,
    engine::general_purpose::STANDARD,
};
use reqwest::{
    Client,
    Response,
    StatusCode,
};
use serde::{
    Serialize,
    de::DeserializeOwned,
};
use tracing::{
    debug,
    info,
};

use super::rpc::{
    JsonRpcClient,
    Transport,
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

#[derive(Serialize)]
struct RegisterContractRequest<'a> {
    verifier: String,
    contract_name: ContractName,
    program_id: &'a [u8],
    state_digest: &'a [u8],
}

#[derive(Serialize)]
struct BlobTxRequest<'a> {
    identity: &'a str,
    blobs: &'a [Blob],
}

#[derive(Serialize)]
struct ProofTxRequest<'a> {
    tx_hash: &'a TxHash,
    blob_index: u32,
    contract_name: ContractName,
    proof: &'a str,
}

/// `Ledger` backed by a node: transactions go through its REST API,
/// statuses are read over JSON-RPC.
pub struct NodeLedger<T> {
    client: Client,
    rest_url: String,
    rpc: JsonRpcClient<T>,
}

impl<T: Transport> NodeLedger<T> {
    pub fn new(client: Client, rest_url: impl Into<String>, rpc: JsonRpcClient<T>) -> Self {
        Self {
            client,
            rest_url: rest_url.into().trim_end_matches('/').to_string(),
            rpc,
        }
    }

    pub fn rpc(&self) -> &JsonRpcClient<T> {
        &self.rpc
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<TxHash, LedgerError> {
        let url = format!("{}{path}", self.rest_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| LedgerError::Connection(e.to_string()))?;
        let response = rejected(response).await?;
        let hash: String = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(format!("{url}: {e}")))?;
        Ok(TxHash(hash))
    }
}

/// Indexed transactions carry the base64 JSON body they were sent with.
fn decode_tx<D: DeserializeOwned>(hash: &TxHash, tx: &str) -> Result<D, LedgerError> {
    let bytes = STANDARD
        .decode(tx.trim())
        .map_err(|e| LedgerError::InvalidResponse(format!("tx {hash} is not base64: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| LedgerError::InvalidResponse(format!("tx {hash}: {e}")))
}

async fn rejected(response: Response) -> Result<Response, LedgerError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(LedgerError::TransactionFailed(format!("{status}: {body}")))
}

impl<T: Transport> Ledger for NodeLedger<T> {
    async fn register_contract(
        &self,
        registration: &ContractRegistration,
    ) -> Result<TxHash, LedgerError> {
        let request = RegisterContractRequest {
            verifier: registration.verifier.to_string(),
            contract_name: registration.name,
            program_id: &registration.program_id,
            state_digest: &registration.state_digest,
        };
        let hash = self.post("/v1/contract/register", &request).await?;
        info!(contract = %registration.name, tx_hash = %hash, "contract registration sent");
        Ok(hash)
    }

    async fn contract_exists(&self, name: ContractName) -> Result<bool, LedgerError> {
        let url = format!("{}/v1/contract/{name}", self.rest_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LedgerError::Connection(e.to_string()))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(LedgerError::Rpc(format!("{url} returned {status}"))),
        }
    }

    async fn broadcast_payload_tx(
        &self,
        identity: &str,
        blobs: &[Blob],
    ) -> Result<TxHash, LedgerError> {
        self.post("/v1/tx/send/blob", &BlobTxRequest { identity, blobs })
            .await
    }

    async fn broadcast_proof_tx(
        &self,
        tx_hash: &TxHash,
        payload_index: u32,
        contract: ContractName,
        proof_base64: &str,
    ) -> Result<TxHash, LedgerError> {
        let request = ProofTxRequest {
            tx_hash,
            blob_index: payload_index,
            contract_name: contract,
            proof: proof_base64,
        };
        self.post("/v1/tx/send/proof", &request).await
    }

    async fn tx_status(&self, tx_hash: &TxHash) -> Result<TxStatus, LedgerError> {
        self.rpc.tx(tx_hash).await
    }

    async fn payload_tx(&self, tx_hash: &TxHash) -> Result<PayloadTxRecord, LedgerError> {
        let tx = self.rpc.tx_info(tx_hash).await?;
        decode_tx(tx_hash, &tx.tx)
    }

    async fn settled_proofs(
        &self,
        contract: ContractName,
    ) -> Result<Vec<ProofTxRecord>, LedgerError> {
        let query = format!("proof.contract_name='{contract}'");
        let txs = self.rpc.tx_search(&query).await?;
        let mut proofs = Vec::with_capacity(txs.len());
        for tx in txs.iter().filter(|tx| tx.status.is_success()) {
            let record: ProofTxRecord = decode_tx(&tx.hash, &tx.tx)?;
            if record.contract_name == contract {
                proofs.push(record);
            }
        }
        debug!(%contract, found = txs.len(), settled = proofs.len(), "searched proof transactions");
        Ok(proofs)
    }
}
