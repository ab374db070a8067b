//! Re-derives token balances from settled `smile_token` proof artifacts.

use std::sync::Arc;

use base64::{
    Engine,
    engine::general_purpose::STANDARD,
};
use tokio::sync::Mutex;
use tracing::{
    debug,
    info,
};

use crate::{
    decoder::{
        DecodeError,
        MarkerLocator,
        OutputLocator,
        ProofOutputDecoder,
    },
    domain::{
        balance::TransferEvent,
        payload::ContractName,
        store::{
            BalanceStore,
            StoreError,
        },
    },
    ports::{
        TxHash,
        ledger::{
            Ledger,
            LedgerError,
        },
    },
};

#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("balance error: {0}")]
    Store(#[from] StoreError),

    #[error("proof is not base64: {0}")]
    InvalidEncoding(String),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Feeds settled token-contract proofs into a [`BalanceStore`].
pub struct BalanceIndexer<L = MarkerLocator> {
    decoder: ProofOutputDecoder<L>,
    store: Arc<Mutex<BalanceStore>>,
}

impl BalanceIndexer<MarkerLocator> {
    pub fn with_default_decoder(store: Arc<Mutex<BalanceStore>>) -> Self {
        Self::new(ProofOutputDecoder::default(), store)
    }
}

impl<L: OutputLocator> BalanceIndexer<L> {
    pub fn new(decoder: ProofOutputDecoder<L>, store: Arc<Mutex<BalanceStore>>) -> Self {
        Self { decoder, store }
    }

    /// Settle the transfer carried by a framed artifact. A transfer already
    /// pending under `tx_hash` is settled as is; otherwise it is applied first.
    /// Already settled transfers are left alone.
    pub async fn ingest(
        &self,
        tx_hash: &TxHash,
        artifact: &[u8],
    ) -> Result<TransferEvent, IndexerError> {
        let event = self.decoder.decode(artifact)?;
        let mut store = self.store.lock().await;
        if store.is_settled(tx_hash.as_str()) {
            debug!(%tx_hash, "transfer already indexed");
            return Ok(event);
        }
        if !store.is_pending(tx_hash.as_str()) {
            store.apply_transaction(tx_hash.as_str(), event.clone())?;
        }
        store.settle(tx_hash.as_str(), true)?;
        debug!(%tx_hash, from = %event.from, to = %event.to, amount = %event.amount, "indexed transfer");
        Ok(event)
    }

    /// [`BalanceIndexer::ingest`] for the base64 form carried by proof transactions.
    pub async fn ingest_base64(
        &self,
        tx_hash: &TxHash,
        proof_base64: &str,
    ) -> Result<TransferEvent, IndexerError> {
        let artifact = STANDARD
            .decode(proof_base64.trim())
            .map_err(|e| IndexerError::InvalidEncoding(e.to_string()))?;
        self.ingest(tx_hash, &artifact).await
    }

    /// Replay settled proofs oldest first. Stops at the first proof that
    /// cannot be decoded or applied.
    pub async fn replay<'a, I>(&self, proofs: I) -> Result<usize, IndexerError>
    where
        I: IntoIterator<Item = (&'a TxHash, &'a str)>,
    {
        let mut count = 0;
        for (tx_hash, proof_base64) in proofs {
            self.ingest_base64(tx_hash, proof_base64).await?;
            count += 1;
        }
        info!(count, "replayed settled transfers");
        Ok(count)
    }

    /// Replay every settled `smile_token` proof the ledger knows about.
    pub async fn sync<G: Ledger>(&self, ledger: &G) -> Result<usize, IndexerError> {
        let proofs = ledger.settled_proofs(ContractName::SmileToken).await?;
        self.replay(proofs.iter().map(|p| (&p.tx_hash, p.proof.as_str())))
            .await
    }
}
