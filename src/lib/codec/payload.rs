//! Payload schemas for the three contracts, built on the ByteArray codec.

use base64::{
    Engine,
    engine::general_purpose::STANDARD,
};

use super::{
    CodecError,
    byte_array::{
        ByteArray,
        bytes_to_string,
    },
    parse_usize,
    split_tokens,
};
use crate::domain::{
    assertion::SignatureAssertionArgs,
    balance::{
        BalanceRecord,
        ImageBlobArgs,
        TransferArgs,
        TransferEvent,
    },
};

/// Declared number of sub-payloads in a combined blob.
pub const PAYLOAD_COUNT: usize = 3;

/// `encode(name) amount` as tokens.
pub fn serialize_balance(record: &BalanceRecord) -> Vec<String> {
    let mut tokens = ByteArray::from_bytes(record.name.as_bytes()).tokens();
    tokens.push(record.amount.to_string());
    tokens
}

/// `"<len> <encode(from)> <encode(to)> <amount>"`, `len` counting the tokens after it.
pub fn build_transfer_payload(args: &TransferArgs) -> String {
    let mut body = ByteArray::from_bytes(args.from.as_bytes()).tokens();
    body.extend(ByteArray::from_bytes(args.to.as_bytes()).tokens());
    body.push(args.amount.to_string());
    with_count(body.len(), &body)
}

/// `"<image.len> <values...>"`.
pub fn build_image_payload(args: &ImageBlobArgs) -> String {
    let values: Vec<String> = args.image.iter().map(|v| v.to_string()).collect();
    with_count(values.len(), &values)
}

/// Length-prefixed sub-fields in circuit order: authenticator data,
/// clientDataJSON (raw length then padded length), challenge, signature,
/// public key x, public key y. The leading total counts every token after it,
/// i.e. the summed field lengths plus 7 count tokens.
pub fn build_signature_assertion_payload(args: &SignatureAssertionArgs) -> String {
    let mut body = Vec::new();
    push_field(&mut body, &args.authenticator_data);
    body.push(args.client_data_json_len.to_string());
    push_field(&mut body, &args.client_data_json);
    push_field(&mut body, &args.challenge);
    push_field(&mut body, &args.signature);
    push_field(&mut body, &args.pub_key_x);
    push_field(&mut body, &args.pub_key_y);
    with_count(body.len(), &body)
}

/// `"[3 <signature> <image> <transfer>]"`.
pub fn combine_payloads(signature: &str, image: &str, transfer: &str) -> String {
    format!("[{PAYLOAD_COUNT} {signature} {image} {transfer}]")
}

fn push_field(body: &mut Vec<String>, bytes: &[u8]) {
    body.push(bytes.len().to_string());
    body.extend(bytes.iter().map(|b| b.to_string()));
}

fn with_count(count: usize, tokens: &[String]) -> String {
    if tokens.is_empty() {
        count.to_string()
    } else {
        format!("{count} {}", tokens.join(" "))
    }
}

/// Parse a transfer payload, bracketed or not. The declared length must
/// match the number of tokens that follow it.
pub fn parse_transfer_payload(bytes: &[u8]) -> Result<TransferEvent, CodecError> {
    let text = bytes_to_string(bytes.to_vec())?;
    let tokens = split_tokens(&text);
    let (declared, body) = tokens
        .split_first()
        .ok_or_else(|| CodecError::MalformedPayload("empty transfer payload".into()))?;
    let declared = parse_usize(declared)?;
    if declared != body.len() {
        return Err(CodecError::MalformedPayload(format!(
            "transfer payload declares {declared} tokens but has {}",
            body.len()
        )));
    }
    parse_transfer_tokens(body)
}

/// Parse exactly `encode(from) encode(to) amount`.
pub fn parse_transfer_tokens(tokens: &[&str]) -> Result<TransferEvent, CodecError> {
    let (from, from_len) = ByteArray::read(tokens)?;
    let (to, to_len) = ByteArray::read(&tokens[from_len..])?;
    let rest = &tokens[from_len + to_len..];
    let [amount] = rest else {
        return Err(CodecError::MalformedPayload(format!(
            "expected a single amount token after the account names, found {}",
            rest.len()
        )));
    };
    let amount = amount
        .parse::<u128>()
        .map_err(|_| CodecError::InvalidNumber(amount.to_string()))?;

    Ok(TransferEvent {
        from: bytes_to_string(from.to_bytes()?)?,
        to: bytes_to_string(to.to_bytes()?)?,
        amount,
    })
}

/// Image values decoded from a payload.
///
/// Holds the payload text and parses values on demand; [`ImagePayload::values`]
/// may be called any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    text: String,
}

impl ImagePayload {
    pub fn values(&self) -> impl Iterator<Item = Result<u64, CodecError>> + '_ {
        split_tokens(&self.text).into_iter().skip(1).map(|token| {
            token
                .parse::<u64>()
                .map_err(|_| CodecError::InvalidNumber(token.to_string()))
        })
    }

    pub fn len(&self) -> usize {
        split_tokens(&self.text).len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_vec(&self) -> Result<Vec<u64>, CodecError> {
        self.values().collect()
    }
}

/// Parse an image payload. Input that is not plain felt text is treated as
/// base64 of the payload text.
pub fn parse_image_payload(bytes: &[u8]) -> Result<ImagePayload, CodecError> {
    let text = if is_felt_text(bytes) {
        bytes_to_string(bytes.to_vec())?
    } else {
        let raw = STANDARD
            .decode(bytes)
            .map_err(|e| CodecError::MalformedPayload(format!("image payload is not base64: {e}")))?;
        bytes_to_string(raw)?
    };

    let tokens = split_tokens(&text);
    let (declared, values) = tokens
        .split_first()
        .ok_or_else(|| CodecError::MalformedPayload("empty image payload".into()))?;
    let declared = parse_usize(declared)?;
    if declared != values.len() {
        return Err(CodecError::MalformedPayload(format!(
            "image payload declares {declared} values but has {}",
            values.len()
        )));
    }
    Ok(ImagePayload { text })
}

fn is_felt_text(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .all(|b| b.is_ascii_digit() || b.is_ascii_whitespace() || *b == b'[' || *b == b']')
}
