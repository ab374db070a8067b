use std::{
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};

use serde::Deserialize;

use crate::orchestrator::{
    OrchestratorConfig,
    SubmissionPolicy,
};

/// Top-level relay configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    pub provers: ProversConfig,
    pub runner: RunnerConfig,
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorSection,
    pub credentials: CredentialsConfig,
    /// Software authenticator. Required by `run`.
    pub authenticator: Option<AuthenticatorConfig>,
    /// Required by `register`.
    pub registry: Option<RegistryConfig>,
}

/// Remote proving services.
#[derive(Debug, Clone, Deserialize)]
pub struct ProversConfig {
    /// Base URL of the VM prover (`POST /prove`).
    pub vm_url: String,
    /// Base URL of the signature prover (`POST /prove-ecdsa`, `GET /health`).
    pub ecdsa_url: String,
}

/// Local program runner and witness generator.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_cairo_runner")]
    pub cairo_runner: PathBuf,
    #[serde(default = "default_nargo")]
    pub nargo: PathBuf,
    pub work_dir: PathBuf,
    pub smile_program: PathBuf,
    pub smile_token_program: PathBuf,
    pub webauthn_circuit: PathBuf,
}

fn default_cairo_runner() -> PathBuf {
    PathBuf::from("cairo-runner")
}

fn default_nargo() -> PathBuf {
    PathBuf::from("nargo")
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub rest_url: String,
    pub rpc_url: String,
}

/// Proof submission settings.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSection {
    #[serde(default)]
    pub policy: SubmissionPolicy,
    /// e.g. "4s". Parsed via humantime.
    #[serde(with = "humantime_serde", default = "default_post_broadcast_delay")]
    pub post_broadcast_delay: Duration,
    /// e.g. "10m". Parsed via humantime.
    #[serde(with = "humantime_serde", default = "default_proving_timeout")]
    pub proving_timeout: Duration,
}

fn default_post_broadcast_delay() -> Duration {
    OrchestratorConfig::default().post_broadcast_delay
}

fn default_proving_timeout() -> Duration {
    OrchestratorConfig::default().proving_timeout
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            policy: SubmissionPolicy::default(),
            post_broadcast_delay: default_post_broadcast_delay(),
            proving_timeout: default_proving_timeout(),
        }
    }
}

impl From<&OrchestratorSection> for OrchestratorConfig {
    fn from(section: &OrchestratorSection) -> Self {
        Self {
            policy: section.policy,
            post_broadcast_delay: section.post_broadcast_delay,
            proving_timeout: section.proving_timeout,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticatorConfig {
    /// 32-byte hex P-256 scalar.
    pub signing_key: String,
    #[serde(default = "default_rp_id")]
    pub rp_id: String,
}

fn default_rp_id() -> String {
    "localhost".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Verification key of the signature circuit.
    pub ecdsa_vkey: PathBuf,
}

/// Errors from config loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl RelayConfig {
    /// Load and validate a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, url) in [
            ("provers.vm_url", &self.provers.vm_url),
            ("provers.ecdsa_url", &self.provers.ecdsa_url),
            ("ledger.rest_url", &self.ledger.rest_url),
            ("ledger.rpc_url", &self.ledger.rpc_url),
        ] {
            if url.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{field} must not be empty")));
            }
        }

        if self.orchestrator.proving_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "orchestrator.proving_timeout must be greater than zero".into(),
            ));
        }

        if let Some(auth) = &self.authenticator {
            let key = auth.signing_key.trim().trim_start_matches("0x");
            if key.len() != 64 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ConfigError::Validation(
                    "authenticator.signing_key must be 32 bytes of hex".into(),
                ));
            }
        }

        Ok(())
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::from(&self.orchestrator)
    }
}
