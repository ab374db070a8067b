//! JSON-RPC access to the node.
//!
//! The transport only moves request/response bodies, the
//! [`ConnectionManager`] owns the reconnect policy, and the [`JsonRpcClient`]
//! speaks the protocol on top of the manager.

mod client;
mod connection;
mod http;

use std::future::Future;

use serde_json::Value;

pub use client::{
    IndexedTx,
    JsonRpcClient,
    PAGE_SIZE,
};
pub use connection::{
    ConnectionManager,
    ReconnectPolicy,
};
pub use http::HttpTransport;

use crate::ports::ledger::LedgerError;

/// Byte-level link to the node.
pub trait Transport: Send + Sync {
    /// (Re)establish the link. Called before first use and after a
    /// `LedgerError::Connection` failure.
    fn connect(&self) -> impl Future<Output = Result<(), LedgerError>> + Send;

    fn request(&self, body: &Value) -> impl Future<Output = Result<Value, LedgerError>> + Send;
}
