//! Request/reply correlation for host round-trips.
//!
//! A request such as `getSettings` has no id on the wire; the host answers
//! with a `didReceiveSettings` event for the same context. Waiters are keyed
//! by (reply event, context) and removed explicitly when they settle or
//! their deadline passes.

use crate::error::{DeckError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{timeout_at, Instant};
use uuid::Uuid;

/// Default deadline for a correlated request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Identity of a pending correlation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    pub event: String,
    pub context: Option<String>,
}

impl CorrelationKey {
    pub fn new(event: impl Into<String>, context: Option<&str>) -> Self {
        Self {
            event: event.into(),
            context: context.map(str::to_string),
        }
    }
}

struct Waiter {
    id: Uuid,
    tx: oneshot::Sender<Value>,
}

/// A registered wait, consumed by [`CorrelationTable::wait`]
pub struct Pending {
    key: CorrelationKey,
    id: Uuid,
    deadline: Instant,
    rx: oneshot::Receiver<Value>,
}

impl Pending {
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

/// Table of outstanding request/reply waits
#[derive(Default)]
pub struct CorrelationTable {
    pending: Mutex<HashMap<CorrelationKey, Vec<Waiter>>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in the next reply for `key`
    ///
    /// Register before sending the request so a fast reply cannot be missed.
    pub fn register(&self, key: CorrelationKey, timeout: Duration) -> Pending {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_default()
            .push(Waiter { id, tx });

        Pending {
            key,
            id,
            deadline: Instant::now() + timeout,
            rx,
        }
    }

    /// Deliver a reply to every waiter registered for `key`
    ///
    /// Returns how many waiters were resolved; zero means the reply was
    /// unsolicited or arrived after its waiters timed out.
    pub fn resolve(&self, key: &CorrelationKey, value: Value) -> usize {
        let waiters = self.pending.lock().unwrap().remove(key).unwrap_or_default();
        let mut resolved = 0;
        for waiter in waiters {
            if waiter.tx.send(value.clone()).is_ok() {
                resolved += 1;
            }
        }
        if resolved > 0 {
            tracing::debug!("Resolved {} waiter(s) for {:?}", resolved, key);
        }
        resolved
    }

    /// Wait for the reply or the deadline, whichever comes first
    pub async fn wait(&self, pending: Pending) -> Result<Value> {
        let Pending {
            key,
            id,
            deadline,
            rx,
        } = pending;

        match timeout_at(deadline, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => {
                self.remove(&key, id);
                Err(DeckError::ConnectionClosed)
            }
            Err(_) => {
                self.remove(&key, id);
                tracing::warn!("Timed out waiting for {:?}", key);
                Err(DeckError::Timeout { event: key.event })
            }
        }
    }

    /// Drop every waiter; they fail with `ConnectionClosed`
    pub fn clear(&self) {
        self.pending.lock().unwrap().clear();
    }

    /// Number of outstanding waiters
    pub fn len(&self) -> usize {
        self.pending.lock().unwrap().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, key: &CorrelationKey, id: Uuid) {
        let mut pending = self.pending.lock().unwrap();
        if let Some(waiters) = pending.get_mut(key) {
            waiters.retain(|w| w.id != id);
            if waiters.is_empty() {
                pending.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn settings_key(context: &str) -> CorrelationKey {
        CorrelationKey::new("didReceiveSettings", Some(context))
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_with_first_reply_only() {
        let table = Arc::new(CorrelationTable::new());
        let pending = table.register(settings_key("ctx"), DEFAULT_TIMEOUT);

        assert_eq!(table.resolve(&settings_key("ctx"), json!({ "n": 1 })), 1);
        assert_eq!(table.resolve(&settings_key("ctx"), json!({ "n": 2 })), 0);

        assert_eq!(table.wait(pending).await.unwrap(), json!({ "n": 1 }));
        assert!(table.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn replies_for_other_contexts_are_ignored() {
        let table = CorrelationTable::new();
        let pending = table.register(settings_key("a"), Duration::from_millis(100));

        assert_eq!(table.resolve(&settings_key("b"), json!({})), 0);
        assert!(matches!(table.wait(pending).await, Err(DeckError::Timeout { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_removes_waiter_and_late_reply_is_dropped() {
        let table = CorrelationTable::new();
        let pending = table.register(settings_key("ctx"), Duration::from_millis(5000));
        let deadline = pending.deadline();

        let err = table.wait(pending).await.unwrap_err();
        assert!(matches!(err, DeckError::Timeout { ref event } if event == "didReceiveSettings"));
        assert!(Instant::now() >= deadline);
        assert!(table.is_empty());

        assert_eq!(table.resolve(&settings_key("ctx"), json!({ "late": true })), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_each_get_the_reply() {
        let table = Arc::new(CorrelationTable::new());
        let key = CorrelationKey::new("didReceiveGlobalSettings", None);
        let first = table.register(key.clone(), DEFAULT_TIMEOUT);
        let second = table.register(key.clone(), DEFAULT_TIMEOUT);
        assert_eq!(table.len(), 2);

        assert_eq!(table.resolve(&key, json!({ "host": "10.0.0.2" })), 2);
        assert_eq!(table.wait(first).await.unwrap()["host"], "10.0.0.2");
        assert_eq!(table.wait(second).await.unwrap()["host"], "10.0.0.2");
    }
}
