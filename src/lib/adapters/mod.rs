pub mod cairo_runner;
pub mod credential_file;
pub mod mock_ledger;
pub mod mock_prover;
pub mod nargo_witness;
pub mod node_ledger;
pub mod pipeline_prover;
pub mod remote_prover;
pub mod rpc;
pub mod software_authenticator;
