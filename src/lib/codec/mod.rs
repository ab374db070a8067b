//! Felt-string codecs shared by the VM programs and the signature circuit.
//!
//! Every payload on the wire is a whitespace separated list of decimal
//! field elements, optionally wrapped in a single pair of brackets.

pub mod byte_array;
pub mod payload;
pub mod program;

use num_bigint::BigUint;
use thiserror::Error;

pub use byte_array::{
    ByteArray,
    decode_byte_array,
    encode_byte_array,
};
pub use payload::{
    ImagePayload,
    build_image_payload,
    build_signature_assertion_payload,
    build_transfer_payload,
    combine_payloads,
    parse_image_payload,
    parse_transfer_payload,
};

/// Errors raised while building or parsing felt strings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("\"{0}\" is not a valid decimal felt")]
    InvalidNumber(String),
}

/// Split a payload into its felt tokens, dropping one pair of outer brackets.
pub fn split_tokens(text: &str) -> Vec<&str> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(trimmed);
    inner.split_ascii_whitespace().collect()
}

pub(crate) fn parse_felt(token: &str) -> Result<BigUint, CodecError> {
    token
        .parse::<BigUint>()
        .map_err(|_| CodecError::InvalidNumber(token.to_string()))
}

pub(crate) fn parse_usize(token: &str) -> Result<usize, CodecError> {
    token
        .parse::<usize>()
        .map_err(|_| CodecError::InvalidNumber(token.to_string()))
}
