//! HTTP clients for the two proving services.
//!
//! VM prover: `POST /prove`, multipart `memory` (zip), `trace` (zip) and
//! `output` (text), answering with the base64 proof.
//! Signature prover: `POST /prove-ecdsa` with the raw witness as
//! `application/octet-stream`, answering with the raw proof; `GET /health`
//! answers `ok`.

use std::io::{
    Cursor,
    Write,
};

use base64::{
    Engine,
    engine::general_purpose::STANDARD,
};
use reqwest::{
    Client,
    Response,
    header::CONTENT_TYPE,
    multipart::{
        Form,
        Part,
    },
};
use tracing::debug;
use zip::{
    ZipWriter,
    write::SimpleFileOptions,
};

use crate::ports::prover::{
    ProverError,
    SignatureProver,
    VmProver,
    VmRun,
};

impl From<reqwest::Error> for ProverError {
    fn from(e: reqwest::Error) -> Self {
        ProverError::Http(e.to_string())
    }
}

/// Zip `data` as a single archive entry called `name`.
pub fn zip_single(name: &str, data: &[u8]) -> Result<Vec<u8>, ProverError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(name, SimpleFileOptions::default())
        .map_err(|e| ProverError::ProvingFailed(format!("zip {name}: {e}")))?;
    writer.write_all(data)?;
    let cursor = writer
        .finish()
        .map_err(|e| ProverError::ProvingFailed(format!("zip {name}: {e}")))?;
    Ok(cursor.into_inner())
}

async fn ensure_success(response: Response, endpoint: &str) -> Result<Response, ProverError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProverError::ProvingFailed(format!(
        "{endpoint} returned {status}: {body}"
    )))
}

/// Client for the VM proving service.
pub struct HttpVmProver {
    client: Client,
    base_url: String,
}

impl HttpVmProver {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl VmProver for HttpVmProver {
    async fn prove_run(&self, run: &VmRun) -> Result<Vec<u8>, ProverError> {
        let form = Form::new()
            .part(
                "memory",
                Part::bytes(zip_single("memory", &run.memory)?).file_name("memory.zip"),
            )
            .part(
                "trace",
                Part::bytes(zip_single("trace", &run.trace)?).file_name("trace.zip"),
            )
            .text("output", run.output.clone());

        let url = format!("{}/prove", self.base_url);
        debug!(%url, memory = run.memory.len(), trace = run.trace.len(), "requesting VM proof");
        let response = self.client.post(&url).multipart(form).send().await?;
        let body = ensure_success(response, &url).await?.text().await?;
        if body.is_empty() {
            return Err(ProverError::ProvingFailed(format!("{url} returned no proof")));
        }

        STANDARD
            .decode(body.trim())
            .map_err(|e| ProverError::ProvingFailed(format!("proof is not base64: {e}")))
    }
}

/// Client for the signature proving service.
pub struct HttpSignatureProver {
    client: Client,
    base_url: String,
}

impl HttpSignatureProver {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl SignatureProver for HttpSignatureProver {
    async fn prove_witness(&self, witness: &[u8]) -> Result<Vec<u8>, ProverError> {
        let url = format!("{}/prove-ecdsa", self.base_url);
        debug!(%url, witness = witness.len(), "requesting signature proof");
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(witness.to_vec())
            .send()
            .await?;
        Ok(ensure_success(response, &url).await?.bytes().await?.to_vec())
    }

    async fn health(&self) -> Result<(), ProverError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        let body = ensure_success(response, &url).await?.text().await?;
        if body.trim() == "ok" {
            Ok(())
        } else {
            Err(ProverError::ProvingFailed(format!(
                "{url} answered {body:?} instead of \"ok\""
            )))
        }
    }
}
