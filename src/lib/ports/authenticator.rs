use std::future::Future;

use tracing::info;

use crate::domain::assertion::{
    Assertion,
    Credential,
};

/// Port for the platform authenticator ceremonies.
pub trait PlatformAuthenticator: Send + Sync {
    /// Create a new credential.
    fn register(&self) -> impl Future<Output = Result<Credential, AuthenticatorError>> + Send;

    /// Sign `challenge` with a registered credential.
    fn sign(
        &self,
        credential: &Credential,
        challenge: &[u8],
    ) -> impl Future<Output = Result<Assertion, AuthenticatorError>> + Send;
}

/// Port for persisting the device credential.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> impl Future<Output = Result<Option<Credential>, AuthenticatorError>> + Send;

    fn save(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<(), AuthenticatorError>> + Send;
}

/// Load the stored credential, running the registration ceremony once if none exists.
pub async fn ensure_credential<A, S>(
    authenticator: &A,
    store: &S,
) -> Result<Credential, AuthenticatorError>
where
    A: PlatformAuthenticator,
    S: CredentialStore,
{
    if let Some(credential) = store.load().await? {
        return Ok(credential);
    }
    let credential = authenticator.register().await?;
    store.save(&credential).await?;
    info!(raw_id = %hex::encode(&credential.raw_id), "registered new credential");
    Ok(credential)
}

#[derive(Debug, thiserror::Error)]
pub enum AuthenticatorError {
    #[error("ceremony failed: {0}")]
    Ceremony(String),

    #[error("credential does not belong to this authenticator")]
    UnknownCredential,

    #[error("credential storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
