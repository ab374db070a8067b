//! Decoder for settled token-contract proof artifacts.
//!
//! A framed artifact is `u32le proof_size ‖ proof ‖ u32le inputs_size ‖
//! inputs ‖ output`. The transfer is recovered from the output region by
//! locating the ByteArray text of a known account name, reading the length
//! byte right before it and parsing that many ASCII bytes as
//! `encode(from) encode(to) amount`.
//!
//! Locating by marker is fragile: any coincidental byte match anchors the
//! parse, and transfers not involving the marker account cannot be found.
//! It is kept for compatibility with deployed programs and sits behind
//! [`OutputLocator`] so a fixed-offset layout can replace it.

use thiserror::Error;

use crate::{
    codec::{
        CodecError,
        encode_byte_array,
        payload::parse_transfer_tokens,
    },
    domain::{
        balance::TransferEvent,
        store::FAUCET,
    },
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("transfer output not found: {0}")]
    OutputNotFound(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("artifact truncated: {section} needs {needed} bytes, {available} available")]
    Truncated {
        section: &'static str,
        needed: usize,
        available: usize,
    },
}

impl From<CodecError> for DecodeError {
    fn from(e: CodecError) -> Self {
        DecodeError::MalformedPayload(e.to_string())
    }
}

/// The three regions of a framed proof artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactSections<'a> {
    pub proof: &'a [u8],
    pub inputs: &'a [u8],
    pub output: &'a [u8],
}

pub fn split_artifact(bytes: &[u8]) -> Result<ArtifactSections<'_>, DecodeError> {
    let (proof, rest) = read_section(bytes, "proof")?;
    let (inputs, output) = read_section(rest, "inputs")?;
    Ok(ArtifactSections {
        proof,
        inputs,
        output,
    })
}

fn read_section<'a>(
    bytes: &'a [u8],
    section: &'static str,
) -> Result<(&'a [u8], &'a [u8]), DecodeError> {
    let Some((size, rest)) = bytes.split_first_chunk::<4>() else {
        return Err(DecodeError::Truncated {
            section,
            needed: 4,
            available: bytes.len(),
        });
    };
    let size = u32::from_le_bytes(*size) as usize;
    if rest.len() < size {
        return Err(DecodeError::Truncated {
            section,
            needed: size,
            available: rest.len(),
        });
    }
    Ok(rest.split_at(size))
}

/// Finds the transfer text inside an artifact's output region.
pub trait OutputLocator {
    fn locate<'a>(&self, output: &'a [u8]) -> Result<&'a [u8], DecodeError>;
}

/// Anchors on the encoded form of an account name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerLocator {
    marker_hex: String,
}

impl MarkerLocator {
    pub fn new(marker: &[u8]) -> Self {
        Self {
            marker_hex: hex::encode(marker),
        }
    }

    pub fn for_account(name: &str) -> Self {
        Self::new(encode_byte_array(name).as_bytes())
    }
}

impl Default for MarkerLocator {
    fn default() -> Self {
        Self::for_account(FAUCET)
    }
}

impl OutputLocator for MarkerLocator {
    fn locate<'a>(&self, output: &'a [u8]) -> Result<&'a [u8], DecodeError> {
        let haystack = hex::encode(output);
        // Odd offsets would straddle two bytes.
        let start = haystack
            .match_indices(&self.marker_hex)
            .map(|(i, _)| i)
            .find(|i| i % 2 == 0)
            .map(|i| i / 2)
            .ok_or_else(|| DecodeError::OutputNotFound("marker not present in output".into()))?;

        let len_at = start.checked_sub(1).ok_or_else(|| {
            DecodeError::MalformedPayload("no length byte before marker".into())
        })?;
        let len = output[len_at] as usize;
        output.get(start..start + len).ok_or_else(|| {
            DecodeError::MalformedPayload(format!(
                "length byte {len} runs past the output region ({} bytes left)",
                output.len() - start
            ))
        })
    }
}

/// Decodes framed artifacts into transfer events.
#[derive(Debug, Clone, Default)]
pub struct ProofOutputDecoder<L = MarkerLocator> {
    locator: L,
}

impl<L: OutputLocator> ProofOutputDecoder<L> {
    pub fn new(locator: L) -> Self {
        Self { locator }
    }

    pub fn decode(&self, artifact: &[u8]) -> Result<TransferEvent, DecodeError> {
        let sections = split_artifact(artifact)?;
        let text = self.locator.locate(sections.output)?;
        let text = std::str::from_utf8(text)
            .map_err(|e| DecodeError::MalformedPayload(format!("output is not ascii: {e}")))?;
        let tokens: Vec<&str> = text.split_ascii_whitespace().collect();
        Ok(parse_transfer_tokens(&tokens)?)
    }
}

/// Decode with the default faucet marker.
pub fn decode_transfer_event(artifact: &[u8]) -> Result<TransferEvent, DecodeError> {
    ProofOutputDecoder::<MarkerLocator>::default().decode(artifact)
}
