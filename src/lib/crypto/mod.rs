pub mod commitment;
pub mod identity;
pub mod webauthn;

use thiserror::Error;

/// Failures turning an authenticator assertion into circuit inputs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid public key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("invalid signature encoding: {0}")]
    InvalidSignatureEncoding(String),

    #[error("input of {len} bytes exceeds the {max} byte limit")]
    InputTooLarge { len: usize, max: usize },

    #[error("invalid clientDataJSON: {0}")]
    InvalidClientData(String),
}
