//! Software stand-in for the platform authenticator.
//!
//! Produces assertions with the same shape a browser returns: 37 bytes of
//! authenticator data (`sha256(rp_id) ‖ flags ‖ counter`), a clientDataJSON
//! carrying the base64url challenge, and a DER ECDSA signature over
//! `authenticator_data ‖ sha256(client_data_json)`.

use std::sync::atomic::{
    AtomicU32,
    Ordering,
};

use base64::{
    Engine,
    engine::general_purpose::URL_SAFE_NO_PAD,
};
use p256::{
    ecdsa::{
        Signature,
        SigningKey,
        signature::Signer,
    },
    pkcs8::EncodePublicKey,
};
use serde::Serialize;
use sha2::{
    Digest,
    Sha256,
};

use crate::{
    domain::assertion::{
        Assertion,
        Credential,
    },
    ports::authenticator::{
        AuthenticatorError,
        PlatformAuthenticator,
    },
};

/// User present and user verified.
const FLAGS: u8 = 0x05;

#[derive(Serialize)]
struct ClientData<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    challenge: String,
    origin: &'a str,
    #[serde(rename = "crossOrigin")]
    cross_origin: bool,
}

pub struct SoftwareAuthenticator {
    key: SigningKey,
    rp_id: String,
    origin: String,
    counter: AtomicU32,
}

impl SoftwareAuthenticator {
    pub fn new(key: SigningKey, rp_id: impl Into<String>) -> Self {
        let rp_id = rp_id.into();
        Self {
            key,
            origin: format!("https://{rp_id}"),
            rp_id,
            counter: AtomicU32::new(0),
        }
    }

    /// Load a key from its 32-byte hex scalar.
    pub fn from_hex(secret_hex: &str, rp_id: impl Into<String>) -> Result<Self, AuthenticatorError> {
        let bytes = hex::decode(secret_hex.trim().trim_start_matches("0x"))
            .map_err(|e| AuthenticatorError::Ceremony(format!("invalid key hex: {e}")))?;
        let key = SigningKey::from_slice(&bytes)
            .map_err(|e| AuthenticatorError::Ceremony(format!("invalid key: {e}")))?;
        Ok(Self::new(key, rp_id))
    }

    fn public_key_der(&self) -> Result<Vec<u8>, AuthenticatorError> {
        self.key
            .verifying_key()
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| AuthenticatorError::Ceremony(e.to_string()))
    }

    fn authenticator_data(&self) -> Vec<u8> {
        let counter = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let mut data = Sha256::digest(self.rp_id.as_bytes()).to_vec();
        data.push(FLAGS);
        data.extend_from_slice(&counter.to_be_bytes());
        data
    }
}

impl PlatformAuthenticator for SoftwareAuthenticator {
    async fn register(&self) -> Result<Credential, AuthenticatorError> {
        let public_key = self.public_key_der()?;
        let raw_id = Sha256::digest(&public_key)[..16].to_vec();
        Ok(Credential { raw_id, public_key })
    }

    async fn sign(
        &self,
        credential: &Credential,
        challenge: &[u8],
    ) -> Result<Assertion, AuthenticatorError> {
        if credential.public_key != self.public_key_der()? {
            return Err(AuthenticatorError::UnknownCredential);
        }

        let client_data_json = serde_json::to_vec(&ClientData {
            kind: "webauthn.get",
            challenge: URL_SAFE_NO_PAD.encode(challenge),
            origin: &self.origin,
            cross_origin: false,
        })
        .map_err(|e| AuthenticatorError::Ceremony(e.to_string()))?;
        let authenticator_data = self.authenticator_data();

        let mut message = authenticator_data.clone();
        message.extend_from_slice(&Sha256::digest(&client_data_json));
        let signature: Signature = self.key.sign(&message);

        Ok(Assertion {
            signature: signature.to_der().as_bytes().to_vec(),
            authenticator_data,
            client_data_json,
        })
    }
}
