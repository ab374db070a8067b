pub mod authenticator;
pub mod ledger;
pub mod prover;

use std::fmt;

use serde::{
    Deserialize,
    Serialize,
};

/// Hash of a transaction as reported by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl TxHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TxHash {
    fn from(hash: String) -> Self {
        Self(hash)
    }
}

impl From<&str> for TxHash {
    fn from(hash: &str) -> Self {
        Self(hash.to_string())
    }
}

/// Execution result of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxStatus {
    /// Zero on success.
    pub code: u32,
    /// Ledger log, the error message when `code != 0`.
    pub raw_log: String,
}

impl TxStatus {
    pub fn success() -> Self {
        Self {
            code: 0,
            raw_log: String::new(),
        }
    }

    pub fn failed(code: u32, raw_log: impl Into<String>) -> Self {
        Self {
            code,
            raw_log: raw_log.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}
