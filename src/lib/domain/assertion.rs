use serde::{
    Deserialize,
    Serialize,
};

use crate::crypto::{
    SignatureError,
    webauthn::{
        extract_challenge,
        extract_public_key,
        extract_signature,
        pad_client_data,
    },
    identity::identity_from_public_key,
};

/// Credential persisted once per device after the registration ceremony.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub raw_id: Vec<u8>,
    /// DER SubjectPublicKeyInfo of the P-256 key.
    pub public_key: Vec<u8>,
}

/// Raw output of one authentication ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    /// DER-encoded ECDSA signature.
    pub signature: Vec<u8>,
    pub authenticator_data: Vec<u8>,
    pub client_data_json: Vec<u8>,
}

/// Circuit-ready view of an assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureAssertionArgs {
    pub authenticator_data: Vec<u8>,
    /// clientDataJSON right-padded with zeros to 255 bytes.
    pub client_data_json: Vec<u8>,
    /// Length of clientDataJSON before padding.
    pub client_data_json_len: usize,
    /// Low-s `r ‖ s`.
    pub signature: [u8; 64],
    pub pub_key_x: [u8; 32],
    pub pub_key_y: [u8; 32],
    pub identity: String,
    pub challenge: Vec<u8>,
}

impl SignatureAssertionArgs {
    pub fn from_assertion(
        credential: &Credential,
        assertion: &Assertion,
    ) -> Result<Self, SignatureError> {
        let (pub_key_x, pub_key_y) = extract_public_key(&credential.public_key)?;
        let signature = extract_signature(&assertion.signature)?;
        let client_data_json = pad_client_data(&assertion.client_data_json)?;
        let challenge = extract_challenge(&assertion.client_data_json)?;

        Ok(Self {
            authenticator_data: assertion.authenticator_data.clone(),
            client_data_json,
            client_data_json_len: assertion.client_data_json.len(),
            signature,
            pub_key_x,
            pub_key_y,
            identity: identity_from_public_key(&pub_key_x, &pub_key_y),
            challenge,
        })
    }
}
