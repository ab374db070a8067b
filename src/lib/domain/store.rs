//! Explicit balance store for the token contract.
//!
//! Balances are tracked twice: `settled` only moves when a transaction is
//! confirmed on chain, `pending` additionally includes every transaction
//! applied but not yet settled. Account order is first-seen order and is
//! preserved in every listing since the commitment hash depends on it.

use std::collections::{
    HashMap,
    HashSet,
};

use thiserror::Error;
use tracing::debug;

use super::balance::{
    BalanceRecord,
    TransferEvent,
};

pub const FAUCET: &str = "faucet";
pub const FAUCET_SUPPLY: u128 = 1_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("insufficient balance for {account}: has {available}, needs {required}")]
    InsufficientBalance {
        account: String,
        available: u128,
        required: u128,
    },

    #[error("balance overflow for {0}")]
    Overflow(String),

    #[error("transaction {0} is already tracked")]
    DuplicateTransaction(String),

    #[error("unknown pending transaction {0}")]
    UnknownTransaction(String),
}

#[derive(Debug, Clone, Default)]
struct Ledger {
    order: Vec<String>,
    balances: HashMap<String, u128>,
}

impl Ledger {
    fn balance(&self, account: &str) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn credit(&mut self, account: &str, amount: u128) -> Result<(), StoreError> {
        let current = self.balance(account);
        let next = current
            .checked_add(amount)
            .ok_or_else(|| StoreError::Overflow(account.to_string()))?;
        if !self.balances.contains_key(account) {
            self.order.push(account.to_string());
        }
        self.balances.insert(account.to_string(), next);
        Ok(())
    }

    /// Check then apply, so a failed transfer leaves the ledger untouched.
    fn transfer(&mut self, event: &TransferEvent) -> Result<(), StoreError> {
        let available = self.balance(&event.from);
        if available < event.amount {
            return Err(StoreError::InsufficientBalance {
                account: event.from.clone(),
                available,
                required: event.amount,
            });
        }
        if event.from != event.to {
            self.balance(&event.to)
                .checked_add(event.amount)
                .ok_or_else(|| StoreError::Overflow(event.to.clone()))?;
        }
        self.balances.insert(event.from.clone(), available - event.amount);
        self.credit(&event.to, event.amount)
    }

    fn records(&self) -> Vec<BalanceRecord> {
        self.order
            .iter()
            .map(|name| BalanceRecord::new(name.clone(), self.balance(name)))
            .collect()
    }
}

/// Settled and pending balances of the token contract.
#[derive(Debug, Clone)]
pub struct BalanceStore {
    settled: Ledger,
    pending: Ledger,
    pending_txs: Vec<(String, TransferEvent)>,
    settled_txs: HashSet<String>,
}

impl Default for BalanceStore {
    fn default() -> Self {
        Self::with_genesis([BalanceRecord::new(FAUCET, FAUCET_SUPPLY)])
    }
}

impl BalanceStore {
    pub fn with_genesis(genesis: impl IntoIterator<Item = BalanceRecord>) -> Self {
        let mut settled = Ledger::default();
        for record in genesis {
            if !settled.balances.contains_key(&record.name) {
                settled.order.push(record.name.clone());
            }
            settled.balances.insert(record.name, record.amount);
        }
        Self {
            pending: settled.clone(),
            settled,
            pending_txs: Vec::new(),
            settled_txs: HashSet::new(),
        }
    }

    /// Apply a transfer to the pending view. Nothing changes on error.
    pub fn apply_transaction(
        &mut self,
        tx_hash: &str,
        event: TransferEvent,
    ) -> Result<(), StoreError> {
        if self.is_pending(tx_hash) || self.is_settled(tx_hash) {
            return Err(StoreError::DuplicateTransaction(tx_hash.to_string()));
        }
        self.pending.transfer(&event)?;
        debug!(%tx_hash, from = %event.from, to = %event.to, amount = %event.amount, "applied pending transfer");
        self.pending_txs.push((tx_hash.to_string(), event));
        Ok(())
    }

    /// Settle a pending transaction. A failed transaction is dropped and the
    /// pending view is rebuilt from the settled one.
    ///
    /// A successful transaction the settled balances cannot cover yet stays
    /// pending and nothing changes.
    pub fn settle(&mut self, tx_hash: &str, success: bool) -> Result<(), StoreError> {
        let position = self
            .pending_txs
            .iter()
            .position(|(h, _)| h == tx_hash)
            .ok_or_else(|| StoreError::UnknownTransaction(tx_hash.to_string()))?;

        if success {
            self.settled.transfer(&self.pending_txs[position].1)?;
            self.settled_txs.insert(tx_hash.to_string());
        }
        self.pending_txs.remove(position);
        self.rebuild_pending();
        debug!(%tx_hash, success, "settled transfer");
        Ok(())
    }

    fn rebuild_pending(&mut self) {
        let mut pending = self.settled.clone();
        self.pending_txs.retain(|(hash, event)| match pending.transfer(event) {
            Ok(()) => true,
            Err(e) => {
                debug!(tx_hash = %hash, error = %e, "dropping pending transfer");
                false
            }
        });
        self.pending = pending;
    }

    pub fn is_pending(&self, tx_hash: &str) -> bool {
        self.pending_txs.iter().any(|(h, _)| h == tx_hash)
    }

    pub fn is_settled(&self, tx_hash: &str) -> bool {
        self.settled_txs.contains(tx_hash)
    }

    /// Pending balances as they stood right before `tx_hash` was applied.
    pub fn pending_balances_before(&self, tx_hash: &str) -> Option<Vec<BalanceRecord>> {
        let position = self.pending_txs.iter().position(|(h, _)| h == tx_hash)?;
        let mut ledger = self.settled.clone();
        for (_, event) in &self.pending_txs[..position] {
            ledger.transfer(event).ok()?;
        }
        Some(ledger.records())
    }

    pub fn pending_balances(&self) -> Vec<BalanceRecord> {
        self.pending.records()
    }

    pub fn settled_balances(&self) -> Vec<BalanceRecord> {
        self.settled.records()
    }

    pub fn pending_balance(&self, account: &str) -> u128 {
        self.pending.balance(account)
    }

    pub fn settled_balance(&self, account: &str) -> u128 {
        self.settled.balance(account)
    }
}
