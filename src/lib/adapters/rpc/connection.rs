use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;

use super::Transport;
use crate::ports::ledger::LedgerError;

/// Reconnect attempts and their exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl ReconnectPolicy {
    /// `base * 2^attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

#[derive(Debug, Default)]
struct LinkState {
    connected: bool,
}

/// Owns a transport and keeps it connected.
///
/// A failed connect is retried up to `max_attempts` times with backoff of
/// 1 s, 2 s, 4 s. The attempt counter starts over after every successful
/// connect. A request failing with a connection error reconnects and is
/// sent once more.
pub struct ConnectionManager<T> {
    transport: T,
    policy: ReconnectPolicy,
    state: Mutex<LinkState>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T) -> Self {
        Self::with_policy(transport, ReconnectPolicy::default())
    }

    pub fn with_policy(transport: T, policy: ReconnectPolicy) -> Self {
        Self {
            transport,
            policy,
            state: Mutex::new(LinkState::default()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn ensure_connected(&self) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        if state.connected {
            return Ok(());
        }

        let mut attempt = 0;
        loop {
            match self.transport.connect().await {
                Ok(()) => {
                    state.connected = true;
                    return Ok(());
                }
                Err(e) if attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay(attempt);
                    warn!(error = %e, attempt = attempt + 1, ?delay, "connect failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(LedgerError::Connection(format!(
                        "maximum reconnect attempts reached: {e}"
                    )));
                }
            }
        }
    }

    async fn mark_disconnected(&self) {
        self.state.lock().await.connected = false;
    }

    pub async fn request(&self, body: &Value) -> Result<Value, LedgerError> {
        self.ensure_connected().await?;
        match self.transport.request(body).await {
            Err(LedgerError::Connection(reason)) => {
                warn!(%reason, "connection lost, reconnecting");
                self.mark_disconnected().await;
                self.ensure_connected().await?;
                self.transport.request(body).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{
        AtomicU32,
        Ordering,
    };

    use serde_json::json;

    use super::*;

    /// Fails the first `failures` connects, then echoes requests.
    struct FlakyTransport {
        failures: u32,
        connects: AtomicU32,
        drop_next_request: AtomicU32,
    }

    impl FlakyTransport {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                connects: AtomicU32::new(0),
                drop_next_request: AtomicU32::new(0),
            }
        }
    }

    impl Transport for FlakyTransport {
        async fn connect(&self) -> Result<(), LedgerError> {
            let n = self.connects.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(LedgerError::Connection("refused".into()))
            } else {
                Ok(())
            }
        }

        async fn request(&self, body: &Value) -> Result<Value, LedgerError> {
            if self.drop_next_request.swap(0, Ordering::SeqCst) > 0 {
                return Err(LedgerError::Connection("reset".into()));
            }
            Ok(body.clone())
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_within_budget() {
        let manager = ConnectionManager::new(FlakyTransport::new(3));
        let started = tokio::time::Instant::now();

        let reply = manager.request(&json!({"id": 1})).await.unwrap();
        assert_eq!(reply, json!({"id": 1}));
        assert_eq!(manager.transport().connects.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_three_retries() {
        let manager = ConnectionManager::new(FlakyTransport::new(4));
        let err = manager.request(&json!({})).await.unwrap_err();
        assert!(matches!(err, LedgerError::Connection(_)));
        assert_eq!(manager.transport().connects.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_retried_after_connection_loss() {
        let manager = ConnectionManager::new(FlakyTransport::new(0));
        manager.request(&json!({"id": 1})).await.unwrap();

        manager
            .transport()
            .drop_next_request
            .store(1, Ordering::SeqCst);
        let reply = manager.request(&json!({"id": 2})).await.unwrap();
        assert_eq!(reply, json!({"id": 2}));
        assert_eq!(manager.transport().connects.load(Ordering::SeqCst), 2);
    }
}
