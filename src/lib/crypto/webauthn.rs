//! Turns a platform authenticator assertion into signature-circuit inputs.

use p256::{
    PublicKey,
    ecdsa::Signature,
    elliptic_curve::sec1::ToEncodedPoint,
    pkcs8::DecodePublicKey,
};
use serde::Deserialize;

use super::SignatureError;

/// Fixed clientDataJSON buffer size expected by the circuit.
pub const CLIENT_DATA_LEN: usize = 255;

/// Uncompressed point coordinates from a DER SubjectPublicKeyInfo.
pub fn extract_public_key(spki_der: &[u8]) -> Result<([u8; 32], [u8; 32]), SignatureError> {
    let key = PublicKey::from_public_key_der(spki_der)
        .map_err(|e| SignatureError::InvalidKeyEncoding(e.to_string()))?;
    let point = key.to_encoded_point(false);

    let (Some(x), Some(y)) = (point.x(), point.y()) else {
        return Err(SignatureError::InvalidKeyEncoding(
            "public key is the identity point".into(),
        ));
    };

    let mut out_x = [0u8; 32];
    let mut out_y = [0u8; 32];
    out_x.copy_from_slice(x);
    out_y.copy_from_slice(y);
    Ok((out_x, out_y))
}

/// `r ‖ s` of a DER signature, each 32 bytes big-endian, with `s` folded
/// into the lower half of the curve order.
pub fn extract_signature(signature_der: &[u8]) -> Result<[u8; 64], SignatureError> {
    let signature = Signature::from_der(signature_der)
        .map_err(|e| SignatureError::InvalidSignatureEncoding(e.to_string()))?;
    let signature = signature.normalize_s().unwrap_or(signature);

    let mut out = [0u8; 64];
    out.copy_from_slice(&signature.to_bytes());
    Ok(out)
}

/// Right-pad with zeros to exactly 255 bytes. Never truncates.
pub fn pad_client_data(client_data_json: &[u8]) -> Result<Vec<u8>, SignatureError> {
    if client_data_json.len() > CLIENT_DATA_LEN {
        return Err(SignatureError::InputTooLarge {
            len: client_data_json.len(),
            max: CLIENT_DATA_LEN,
        });
    }
    let mut padded = client_data_json.to_vec();
    padded.resize(CLIENT_DATA_LEN, 0);
    Ok(padded)
}

#[derive(Deserialize)]
struct ClientData {
    challenge: Option<String>,
}

/// ASCII bytes of the base64url `challenge` member of clientDataJSON.
pub fn extract_challenge(client_data_json: &[u8]) -> Result<Vec<u8>, SignatureError> {
    let client_data: ClientData = serde_json::from_slice(client_data_json)
        .map_err(|e| SignatureError::InvalidClientData(e.to_string()))?;
    client_data
        .challenge
        .map(String::into_bytes)
        .ok_or_else(|| SignatureError::InvalidClientData("missing challenge".into()))
}
