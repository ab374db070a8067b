use reqwest::Client;
use serde_json::Value;

use super::Transport;
use crate::ports::ledger::LedgerError;

/// JSON-RPC over HTTP POST.
pub struct HttpTransport {
    client: Client,
    url: String,
}

impl HttpTransport {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into().trim_end_matches('/').to_string(),
        }
    }
}

fn connection_error(e: reqwest::Error) -> LedgerError {
    LedgerError::Connection(e.to_string())
}

impl Transport for HttpTransport {
    async fn connect(&self) -> Result<(), LedgerError> {
        let response = self
            .client
            .get(format!("{}/health", self.url))
            .send()
            .await
            .map_err(connection_error)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(LedgerError::Connection(format!(
                "health check returned {}",
                response.status()
            )))
        }
    }

    async fn request(&self, body: &Value) -> Result<Value, LedgerError> {
        let response = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(connection_error)?;
        if !response.status().is_success() {
            return Err(LedgerError::Rpc(format!("HTTP {}", response.status())));
        }
        response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))
    }
}
