use std::path::PathBuf;

use crate::{
    domain::assertion::Credential,
    ports::authenticator::{
        AuthenticatorError,
        CredentialStore,
    },
};

/// Stores the device credential as JSON (`{"raw_id": [..], "public_key": [..]}`).
pub struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CredentialStore for CredentialFile {
    async fn load(&self) -> Result<Option<Credential>, AuthenticatorError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        // An unreadable record counts as absent so registration runs again.
        match serde_json::from_slice::<Credential>(&content) {
            Ok(credential) if !credential.raw_id.is_empty() => Ok(Some(credential)),
            _ => Ok(None),
        }
    }

    async fn save(&self, credential: &Credential) -> Result<(), AuthenticatorError> {
        let json = serde_json::to_vec_pretty(credential)
            .map_err(|e| AuthenticatorError::Storage(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialFile::new(dir.path().join("credentials.json"));
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialFile::new(dir.path().join("nested/credentials.json"));
        let credential = Credential {
            raw_id: vec![1, 2, 3],
            public_key: vec![48, 89],
        };
        store.save(&credential).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(credential));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(CredentialFile::new(path).load().await.unwrap(), None);
    }
}
