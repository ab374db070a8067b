//! One user action end to end: sign, broadcast the payloads, prove, settle.

use std::sync::Arc;

use base64::{
    Engine,
    engine::general_purpose::URL_SAFE_NO_PAD,
};
use sha2::{
    Digest,
    Sha256,
};
use tokio::sync::Mutex;
use tracing::{
    info,
    warn,
};

use crate::{
    codec::{
        CodecError,
        build_image_payload,
        build_signature_assertion_payload,
        build_transfer_payload,
        parse_transfer_payload,
    },
    crypto::{
        SignatureError,
        identity::identity_from_public_key,
        webauthn::extract_public_key,
    },
    domain::{
        assertion::SignatureAssertionArgs,
        balance::{
            ImageBlobArgs,
            TransferArgs,
            TransferEvent,
        },
        payload::PayloadSet,
        store::{
            BalanceStore,
            StoreError,
        },
    },
    orchestrator::{
        OrchestratorError,
        ProofOrchestrator,
        ProofReceipts,
    },
    ports::{
        authenticator::{
            AuthenticatorError,
            CredentialStore,
            PlatformAuthenticator,
            ensure_credential,
        },
        ledger::{
            Ledger,
            LedgerError,
        },
        TxHash,
        prover::{
            Prover,
            ProvingJob,
        },
    },
};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("authenticator error: {0}")]
    Authenticator(#[from] AuthenticatorError),

    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),

    #[error("balance error: {0}")]
    Store(#[from] StoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("payload error: {0}")]
    Codec(#[from] CodecError),

    #[error("transaction {0} is already settled")]
    AlreadySettled(TxHash),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

/// A transfer requested by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Sending account; the credential's identity when `None`.
    pub from: Option<String>,
    pub to: String,
    pub amount: u128,
    pub image: Vec<u64>,
}

/// Challenge signed for a user action: SHA-256 over the image payload
/// followed by the transfer payload.
pub fn derive_challenge(image_payload: &str, transfer_payload: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(image_payload.as_bytes());
    hasher.update(transfer_payload.as_bytes());
    hasher.finalize().to_vec()
}

/// The challenge as the authenticator embeds it in clientDataJSON.
pub fn encoded_challenge(image_payload: &str, transfer_payload: &str) -> Vec<u8> {
    URL_SAFE_NO_PAD
        .encode(derive_challenge(image_payload, transfer_payload))
        .into_bytes()
}

/// Drives user actions through the authenticator, the ledger and the
/// orchestrator, keeping the balance store in step.
pub struct Session<P, L, A, S> {
    orchestrator: ProofOrchestrator<P, L>,
    authenticator: A,
    credentials: S,
    store: Arc<Mutex<BalanceStore>>,
}

impl<P, L, A, S> Session<P, L, A, S>
where
    P: Prover + 'static,
    L: Ledger,
    A: PlatformAuthenticator,
    S: CredentialStore,
{
    pub fn new(
        orchestrator: ProofOrchestrator<P, L>,
        authenticator: A,
        credentials: S,
        store: Arc<Mutex<BalanceStore>>,
    ) -> Self {
        Self {
            orchestrator,
            authenticator,
            credentials,
            store,
        }
    }

    pub fn orchestrator(&self) -> &ProofOrchestrator<P, L> {
        &self.orchestrator
    }

    pub fn store(&self) -> Arc<Mutex<BalanceStore>> {
        Arc::clone(&self.store)
    }

    /// Identity of the device credential, registering it on first use.
    pub async fn identity(&self) -> Result<String, SessionError> {
        let credential = ensure_credential(&self.authenticator, &self.credentials).await?;
        let (x, y) = extract_public_key(&credential.public_key)?;
        Ok(identity_from_public_key(&x, &y))
    }

    /// Run one transfer. The store keeps the transfer only if every proof
    /// transaction succeeds.
    pub async fn transfer(&self, request: TransferRequest) -> Result<ProofReceipts, SessionError> {
        let credential = ensure_credential(&self.authenticator, &self.credentials).await?;
        let (x, y) = extract_public_key(&credential.public_key)?;
        let from = request
            .from
            .unwrap_or_else(|| identity_from_public_key(&x, &y));
        let transfer_args = TransferArgs {
            from,
            to: request.to,
            amount: request.amount,
        };

        // Fail before anything reaches the ledger.
        {
            let store = self.store.lock().await;
            let available = store.pending_balance(&transfer_args.from);
            if available < transfer_args.amount {
                return Err(StoreError::InsufficientBalance {
                    account: transfer_args.from.clone(),
                    available,
                    required: transfer_args.amount,
                }
                .into());
            }
        }

        let transfer = build_transfer_payload(&transfer_args);
        let image = build_image_payload(&ImageBlobArgs {
            image: request.image,
        });
        let challenge = derive_challenge(&image, &transfer);
        let assertion = self.authenticator.sign(&credential, &challenge).await?;
        let args = SignatureAssertionArgs::from_assertion(&credential, &assertion)?;
        let payloads = PayloadSet {
            signature: build_signature_assertion_payload(&args),
            image,
            transfer,
        };

        let payload_tx = self
            .orchestrator
            .ledger()
            .broadcast_payload_tx(&args.identity, &payloads.blobs())
            .await?;
        info!(tx_hash = %payload_tx, identity = %args.identity, "payload transaction sent");

        let balances = {
            let mut store = self.store.lock().await;
            let balances = store.pending_balances();
            store.apply_transaction(payload_tx.as_str(), TransferEvent::from(transfer_args))?;
            balances
        };

        let job = ProvingJob {
            tx_hash: payload_tx,
            identity: args.identity,
            challenge: args.challenge,
            payloads,
            balances,
        };
        self.prove_and_settle(job).await
    }

    /// Prove a payload transaction already on chain, e.g. one whose first
    /// proving attempt failed. The payloads come from its blobs.
    pub async fn prove_existing(
        &self,
        payload_tx: &TxHash,
    ) -> Result<ProofReceipts, SessionError> {
        let record = self.orchestrator.ledger().payload_tx(payload_tx).await?;
        let payloads = PayloadSet::from_blobs(&record.blobs)?;
        let event = parse_transfer_payload(payloads.transfer.as_bytes())?;

        let balances = {
            let mut store = self.store.lock().await;
            if store.is_settled(payload_tx.as_str()) {
                return Err(SessionError::AlreadySettled(payload_tx.clone()));
            }
            if !store.is_pending(payload_tx.as_str()) {
                store.apply_transaction(payload_tx.as_str(), event)?;
            }
            store
                .pending_balances_before(payload_tx.as_str())
                .ok_or_else(|| StoreError::UnknownTransaction(payload_tx.to_string()))?
        };
        info!(tx_hash = %payload_tx, identity = %record.identity, "proving existing payload");

        let job = ProvingJob {
            tx_hash: payload_tx.clone(),
            identity: record.identity,
            challenge: encoded_challenge(&payloads.image, &payloads.transfer),
            payloads,
            balances,
        };
        self.prove_and_settle(job).await
    }

    async fn prove_and_settle(&self, job: ProvingJob) -> Result<ProofReceipts, SessionError> {
        let payload_tx = job.tx_hash.clone();
        let result = self.orchestrator.prove_and_submit(job).await;

        let mut store = self.store.lock().await;
        if let Err(e) = store.settle(payload_tx.as_str(), result.is_ok()) {
            // The proofs are on chain either way; the indexer settles it later.
            warn!(tx_hash = %payload_tx, error = %e, "transfer left pending");
        }
        if let Err(e) = &result {
            warn!(tx_hash = %payload_tx, error = %e, "transfer dropped");
        }
        result.map_err(SessionError::from)
    }
}
