//! Operator CLI for the proof relay.
//!
//! Offline helpers (`encode`, `hash-balances`, `transfer-payload`,
//! `decode-output`, `identity`) work without a config file. `health`,
//! `register`, `run` and `prove` talk to the provers and the node
//! configured in `--config`.
//!
//! Run with:
//!   cargo run --bin relay -- --config relay.toml run --to bob --amount 5

use std::{
    path::PathBuf,
    sync::Arc,
};

use base64::{
    Engine,
    engine::general_purpose::STANDARD,
};
use clap::{
    Parser,
    Subcommand,
};
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{
    error,
    info,
};

use proof_relay::{
    adapters::{
        cairo_runner::CairoRunner,
        credential_file::CredentialFile,
        nargo_witness::NargoWitness,
        node_ledger::NodeLedger,
        pipeline_prover::PipelineProver,
        remote_prover::{
            HttpSignatureProver,
            HttpVmProver,
        },
        rpc::{
            ConnectionManager,
            HttpTransport,
            JsonRpcClient,
        },
        software_authenticator::SoftwareAuthenticator,
    },
    codec::{
        CodecError,
        build_transfer_payload,
        encode_byte_array,
    },
    config::{
        ConfigError,
        RelayConfig,
    },
    crypto::{
        SignatureError,
        commitment::hash_balances,
        identity::identity_from_public_key,
        webauthn::extract_public_key,
    },
    decoder::{
        DecodeError,
        MarkerLocator,
        ProofOutputDecoder,
    },
    domain::{
        balance::{
            BalanceRecord,
            TransferArgs,
        },
        store::BalanceStore,
    },
    indexer::{
        BalanceIndexer,
        IndexerError,
    },
    orchestrator::{
        ProofOrchestrator,
        ProofReceipts,
    },
    ports::{
        TxHash,
        authenticator::AuthenticatorError,
        ledger::LedgerError,
        prover::{
            ProverError,
            SignatureProver,
        },
    },
    registry::{
        RegistryError,
        ensure_contracts_registered,
    },
    session::{
        Session,
        SessionError,
        TransferRequest,
    },
};

#[derive(Parser)]
#[command(name = "relay", about = "Payload codecs and proof orchestration")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "./relay.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the ByteArray felt encoding of a string
    Encode { text: String },

    /// Print the commitment hash of `name=amount` balance records
    HashBalances {
        #[arg(required = true)]
        balances: Vec<String>,
    },

    /// Print a transfer payload
    TransferPayload {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u128,
    },

    /// Decode the transfer carried by a token-contract proof artifact
    DecodeOutput {
        /// Framed artifact file
        file: PathBuf,
        /// The file holds base64 text instead of raw bytes
        #[arg(long)]
        base64: bool,
        /// Account whose encoded name anchors the output
        #[arg(long, default_value = "faucet")]
        marker: String,
    },

    /// Derive the account identity of a DER SubjectPublicKeyInfo
    Identity { spki: PathBuf },

    /// Check the signature prover
    Health,

    /// Register the three contracts if missing
    Register,

    /// Prove and submit one transfer
    Run {
        /// Sending account; defaults to the faucet
        #[arg(long, default_value = "faucet")]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u128,
        /// Image values, comma separated
        #[arg(long, value_delimiter = ',')]
        image: Vec<u64>,
    },

    /// Prove and submit a payload transaction already on chain
    Prove {
        /// Payload transaction hash
        #[arg(long)]
        tx: String,
    },
}

#[derive(Debug, thiserror::Error)]
enum RelayError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),

    #[error("prover error: {0}")]
    Prover(#[from] ProverError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("indexer error: {0}")]
    Indexer(#[from] IndexerError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("authenticator error: {0}")]
    Authenticator(#[from] AuthenticatorError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), RelayError> {
    match args.command {
        Command::Encode { text } => println!("{}", encode_byte_array(&text)),
        Command::HashBalances { balances } => {
            let records = balances
                .iter()
                .map(String::as_str)
                .map(parse_balance)
                .collect::<Result<Vec<_>, _>>()?;
            println!("{}", hash_balances(&records)?);
        }
        Command::TransferPayload { from, to, amount } => {
            println!("{}", build_transfer_payload(&TransferArgs { from, to, amount }));
        }
        Command::DecodeOutput {
            file,
            base64,
            marker,
        } => {
            let raw = tokio::fs::read(&file).await?;
            let artifact = if base64 {
                STANDARD
                    .decode(String::from_utf8_lossy(&raw).trim())
                    .map_err(|e| RelayError::InvalidArgument(format!("not base64: {e}")))?
            } else {
                raw
            };
            let decoder = ProofOutputDecoder::new(MarkerLocator::for_account(&marker));
            let event = decoder.decode(&artifact)?;
            println!("{} -> {}: {}", event.from, event.to, event.amount);
        }
        Command::Identity { spki } => {
            let der = tokio::fs::read(&spki).await?;
            let (x, y) = extract_public_key(&der)?;
            println!("{}", identity_from_public_key(&x, &y));
        }
        Command::Health => {
            let config = RelayConfig::load(&args.config)?;
            HttpSignatureProver::new(Client::new(), &config.provers.ecdsa_url)
                .health()
                .await?;
            info!(url = %config.provers.ecdsa_url, "signature prover is healthy");
        }
        Command::Register => {
            let config = RelayConfig::load(&args.config)?;
            let registry = config.registry.as_ref().ok_or_else(|| {
                RelayError::InvalidArgument("[registry] section required for register".into())
            })?;
            let vkey = tokio::fs::read(&registry.ecdsa_vkey).await?;
            let ledger = node_ledger(&config, Client::new());
            let genesis = BalanceStore::default().settled_balances();
            let sent = ensure_contracts_registered(&ledger, &genesis, &vkey).await?;
            info!(registered = sent.len(), "registration done");
        }
        Command::Run {
            from,
            to,
            amount,
            image,
        } => {
            let config = RelayConfig::load(&args.config)?;
            let request = TransferRequest {
                from: Some(from),
                to,
                amount,
                image,
            };
            let session = build_session(&config).await?;
            let result = session.transfer(request).await;
            report(&session, result)?;
        }
        Command::Prove { tx } => {
            let config = RelayConfig::load(&args.config)?;
            let session = build_session(&config).await?;
            let result = session.prove_existing(&TxHash::from(tx)).await;
            report(&session, result)?;
        }
    }
    Ok(())
}

fn parse_balance(arg: &str) -> Result<BalanceRecord, RelayError> {
    let (name, amount) = arg
        .rsplit_once('=')
        .ok_or_else(|| RelayError::InvalidArgument(format!("expected name=amount, got {arg}")))?;
    let amount = amount
        .parse::<u128>()
        .map_err(|_| RelayError::InvalidArgument(format!("bad amount in {arg}")))?;
    Ok(BalanceRecord::new(name, amount))
}

fn node_ledger(config: &RelayConfig, client: Client) -> NodeLedger<HttpTransport> {
    let transport = HttpTransport::new(client.clone(), &config.ledger.rpc_url);
    let rpc = JsonRpcClient::new(ConnectionManager::new(transport));
    NodeLedger::new(client, &config.ledger.rest_url, rpc)
}

type RelaySession = Session<
    PipelineProver<CairoRunner, HttpVmProver, NargoWitness, HttpSignatureProver>,
    NodeLedger<HttpTransport>,
    SoftwareAuthenticator,
    CredentialFile,
>;

/// Wire the production adapters, seeding the balance store from the
/// settled token proofs on chain.
async fn build_session(config: &RelayConfig) -> Result<RelaySession, RelayError> {
    let auth = config.authenticator.as_ref().ok_or_else(|| {
        RelayError::InvalidArgument("[authenticator] section required".into())
    })?;
    let client = Client::new();

    let prover = PipelineProver::new(
        CairoRunner::new(
            config.runner.cairo_runner.clone(),
            config.runner.work_dir.clone(),
            config.runner.smile_program.clone(),
            config.runner.smile_token_program.clone(),
        ),
        HttpVmProver::new(client.clone(), &config.provers.vm_url),
        NargoWitness::new(config.runner.nargo.clone(), config.runner.webauthn_circuit.clone()),
        HttpSignatureProver::new(client.clone(), &config.provers.ecdsa_url),
    );
    let ledger = node_ledger(config, client);

    let store = Arc::new(Mutex::new(BalanceStore::default()));
    let indexed = BalanceIndexer::with_default_decoder(Arc::clone(&store))
        .sync(&ledger)
        .await?;
    info!(indexed, "balances synced from chain");

    let orchestrator = ProofOrchestrator::new(
        Arc::new(prover),
        Arc::new(ledger),
        config.orchestrator_config(),
    );
    let session = Session::new(
        orchestrator,
        SoftwareAuthenticator::from_hex(&auth.signing_key, auth.rp_id.clone())?,
        CredentialFile::new(config.credentials.path.clone()),
        store,
    );

    let identity = session.identity().await?;
    info!(%identity, "using credential");
    Ok(session)
}

/// Print the final proving status and log the proof transactions.
fn report(
    session: &RelaySession,
    result: Result<ProofReceipts, SessionError>,
) -> Result<(), RelayError> {
    let status = session.orchestrator().status();
    println!(
        "{}",
        serde_json::to_string_pretty(&status).unwrap_or_else(|_| format!("{status:?}"))
    );
    let receipts = result?;
    for submission in &receipts.submissions {
        info!(contract = %submission.contract, tx_hash = %submission.proof_tx, "proof transaction");
    }
    Ok(())
}
