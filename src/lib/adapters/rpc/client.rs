use std::sync::atomic::{
    AtomicU64,
    Ordering,
};

use serde::Deserialize;
use serde_json::{
    Value,
    json,
};
use tracing::debug;

use super::{
    ConnectionManager,
    Transport,
};
use crate::ports::{
    TxHash,
    TxStatus,
    ledger::LedgerError,
};

/// Results per `tx_search` page.
pub const PAGE_SIZE: usize = 40;

/// A transaction returned by `tx_search`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedTx {
    pub height: u64,
    pub hash: TxHash,
    /// Base64 encoded transaction bytes.
    pub tx: String,
    pub status: TxStatus,
}

#[derive(Deserialize)]
struct TxResult {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    log: String,
}

#[derive(Deserialize)]
struct TxResponse {
    hash: String,
    height: String,
    #[serde(default)]
    tx: String,
    tx_result: TxResult,
}

#[derive(Deserialize)]
struct SearchResponse {
    txs: Vec<TxResponse>,
    total_count: String,
}

impl TryFrom<TxResponse> for IndexedTx {
    type Error = LedgerError;

    fn try_from(r: TxResponse) -> Result<Self, Self::Error> {
        Ok(Self {
            height: r
                .height
                .parse()
                .map_err(|_| LedgerError::InvalidResponse(format!("bad height {}", r.height)))?,
            hash: TxHash(r.hash),
            tx: r.tx,
            status: TxStatus {
                code: r.tx_result.code,
                raw_log: r.tx_result.log,
            },
        })
    }
}

/// JSON-RPC 2.0 client over a managed connection.
pub struct JsonRpcClient<T> {
    connection: ConnectionManager<T>,
    next_id: AtomicU64,
}

impl<T: Transport> JsonRpcClient<T> {
    pub fn new(connection: ConnectionManager<T>) -> Self {
        Self {
            connection,
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });
        debug!(%method, id, "rpc call");

        let mut response = self.connection.request(&body).await?;
        if response.get("id").and_then(Value::as_u64) != Some(id) {
            return Err(LedgerError::InvalidResponse(format!(
                "response id does not match request {id}"
            )));
        }
        if let Some(error) = response.get("error") {
            return Err(LedgerError::Rpc(error.to_string()));
        }
        response
            .get_mut("result")
            .map(Value::take)
            .ok_or_else(|| LedgerError::InvalidResponse("missing result".into()))
    }

    /// An included transaction with its bytes and execution status.
    pub async fn tx_info(&self, hash: &TxHash) -> Result<IndexedTx, LedgerError> {
        let hash_param = format!("0x{}", hash.as_str().trim_start_matches("0x"));
        let result = self.call("tx", json!({ "hash": hash_param })).await?;
        let response: TxResponse = serde_json::from_value(result)
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;
        IndexedTx::try_from(response)
    }

    /// Execution status of an included transaction.
    pub async fn tx(&self, hash: &TxHash) -> Result<TxStatus, LedgerError> {
        Ok(self.tx_info(hash).await?.status)
    }

    /// All transactions matching `query`, oldest first.
    pub async fn tx_search(&self, query: &str) -> Result<Vec<IndexedTx>, LedgerError> {
        let mut txs = Vec::new();
        let mut page = 1usize;
        loop {
            let result = self
                .call(
                    "tx_search",
                    json!({
                        "query": query,
                        "page": page.to_string(),
                        "per_page": PAGE_SIZE.to_string(),
                        "order_by": "desc",
                    }),
                )
                .await?;
            let response: SearchResponse = serde_json::from_value(result)
                .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;
            let total: usize = response.total_count.parse().map_err(|_| {
                LedgerError::InvalidResponse(format!("bad total_count {}", response.total_count))
            })?;

            for tx in response.txs {
                txs.push(IndexedTx::try_from(tx)?);
            }
            if page * PAGE_SIZE >= total {
                break;
            }
            page += 1;
        }

        txs.sort_by_key(|tx| tx.height);
        Ok(txs)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Answers `tx_search` with `total` synthetic transactions, newest first.
    struct SearchNode {
        total: usize,
        pages: Mutex<Vec<usize>>,
    }

    impl Transport for SearchNode {
        async fn connect(&self) -> Result<(), LedgerError> {
            Ok(())
        }

        async fn request(&self, body: &Value) -> Result<Value, LedgerError> {
            let id = body["id"].clone();
            let method = body["method"].as_str().unwrap_or_default();
            let result = match method {
                "tx_search" => {
                    let page: usize = body["params"]["page"].as_str().unwrap().parse().unwrap();
                    self.pages.lock().unwrap().push(page);
                    let start = (page - 1) * PAGE_SIZE;
                    let end = (start + PAGE_SIZE).min(self.total);
                    let txs: Vec<Value> = (start..end)
                        .map(|i| {
                            let height = self.total - i;
                            json!({
                                "hash": format!("{height:02X}"),
                                "height": height.to_string(),
                                "tx": "",
                                "tx_result": {"code": 0, "log": ""},
                            })
                        })
                        .collect();
                    json!({"txs": txs, "total_count": self.total.to_string()})
                }
                "tx" => json!({
                    "hash": "AB",
                    "height": "7",
                    "tx_result": {"code": 5, "log": "out of gas"},
                }),
                _ => return Ok(json!({"id": id, "error": {"code": -32601}})),
            };
            Ok(json!({"jsonrpc": "2.0", "id": id, "result": result}))
        }
    }

    fn client(total: usize) -> JsonRpcClient<SearchNode> {
        JsonRpcClient::new(ConnectionManager::new(SearchNode {
            total,
            pages: Mutex::new(Vec::new()),
        }))
    }

    #[tokio::test]
    async fn test_tx_search_walks_all_pages() {
        let client = client(95);
        let txs = client.tx_search("tx.height>0").await.unwrap();

        assert_eq!(txs.len(), 95);
        assert_eq!(txs.first().unwrap().height, 1);
        assert_eq!(txs.last().unwrap().height, 95);
        let pages = client.connection.transport().pages.lock().unwrap().clone();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_tx_search_single_page_when_exact() {
        let client = client(40);
        client.tx_search("q").await.unwrap();
        let pages = client.connection.transport().pages.lock().unwrap().clone();
        assert_eq!(pages, vec![1]);
    }

    #[tokio::test]
    async fn test_tx_status() {
        let client = client(0);
        let status = client.tx(&TxHash::from("AB")).await.unwrap();
        assert_eq!(status, TxStatus::failed(5, "out of gas"));
    }

    #[tokio::test]
    async fn test_rpc_error_is_surfaced() {
        let client = client(0);
        let err = client.call("unknown", json!({})).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rpc(_)));
    }
}
