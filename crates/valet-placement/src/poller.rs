//! Submit/poll protocol against the shared row store.
//!
//! A request is inserted into `requests` under `{operation}-{request_id}`,
//! then `results` is queried under the same key every `poll_every` until a
//! row shows up or `wait_until` has elapsed. An observed row is deleted
//! (best effort) before it is handed back.

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use valet_core::Operation;
use valet_core::config::PollingConfig;
use valet_store::{PlacementStore, Table};

use crate::packager::{delete_envelope, insert_envelope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub wait_until: Duration,
    pub poll_every: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            wait_until: Duration::from_secs(300),
            poll_every: Duration::from_secs(5),
        }
    }
}

impl From<&PollingConfig> for PollSettings {
    fn from(config: &PollingConfig) -> Self {
        Self {
            wait_until: config.wait_until(),
            poll_every: config.poll_every(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The engine's result row.
    Delivered(Value),
    TimedOut,
}

/// Insert `request` and wait for its result row.
///
/// A failed insert is logged and polling still runs; the result may have
/// been written by a replica that answered late.
pub async fn submit_and_poll(
    store: &dyn PlacementStore,
    operation: Operation,
    request_id: &str,
    request: &Value,
    settings: PollSettings,
) -> PollOutcome {
    let key = operation.request_key(request_id);
    match store.insert(Table::Requests, &insert_envelope(&key, request)).await {
        Ok(()) => info!(request_key = %key, %operation, "placement request submitted"),
        Err(e) => error!(request_key = %key, %operation, error = %e, "failed to submit placement request"),
    }
    poll_for_result(store, &key, settings).await
}

/// Poll `results` for `key` until a row appears or the deadline passes.
pub async fn poll_for_result(
    store: &dyn PlacementStore,
    key: &str,
    settings: PollSettings,
) -> PollOutcome {
    let deadline = Instant::now() + settings.wait_until;
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        debug!(request_key = %key, attempt, "polling results");
        match store.get(Table::Results, key).await {
            Ok(Some(row)) => {
                if let Err(e) = store.delete(Table::Results, key, &delete_envelope()).await {
                    warn!(request_key = %key, error = %e, "failed to delete result row");
                }
                info!(request_key = %key, attempt, "placement result delivered");
                return PollOutcome::Delivered(row);
            }
            Ok(None) => {}
            Err(e) => warn!(request_key = %key, attempt, error = %e, "result query failed"),
        }

        if Instant::now() >= deadline {
            warn!(request_key = %key, attempt, "timed out waiting for placement result");
            return PollOutcome::TimedOut;
        }
        tokio::time::sleep(settings.poll_every).await;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use valet_store::{StoreError, StoreResult};

    /// Store stub that answers `get` with `None` a fixed number of times,
    /// then with a scripted row.
    #[derive(Default)]
    pub(crate) struct ScriptedStore {
        pub empty_polls: usize,
        pub row: Option<Value>,
        pub fail_insert: bool,
        pub inserts: Mutex<Vec<Value>>,
        pub gets: AtomicUsize,
        pub deletes: AtomicUsize,
    }

    impl ScriptedStore {
        pub fn answering(empty_polls: usize, row: Value) -> Self {
            Self {
                empty_polls,
                row: Some(row),
                ..Self::default()
            }
        }

        pub fn gets(&self) -> usize {
            self.gets.load(Ordering::SeqCst)
        }

        pub fn deletes(&self) -> usize {
            self.deletes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PlacementStore for ScriptedStore {
        async fn insert(&self, _table: Table, document: &Value) -> StoreResult<()> {
            if self.fail_insert {
                return Err(StoreError::Unavailable {
                    operation: "insert".into(),
                    attempts: 3,
                    last: "connection refused".into(),
                });
            }
            self.inserts.lock().unwrap().push(document.clone());
            Ok(())
        }

        async fn get(&self, _table: Table, _key: &str) -> StoreResult<Option<Value>> {
            let seen = self.gets.fetch_add(1, Ordering::SeqCst);
            if seen < self.empty_polls {
                return Ok(None);
            }
            Ok(self.row.clone())
        }

        async fn delete(&self, _table: Table, _key: &str, _document: &Value) -> StoreResult<()> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn settings() -> PollSettings {
        PollSettings {
            wait_until: Duration::from_millis(300),
            poll_every: Duration::from_millis(50),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn row_after_k_empty_polls() {
        let store = ScriptedStore::answering(3, json!({"request_id": "create-r1"}));
        let outcome = submit_and_poll(&store, Operation::Create, "r1", &json!({}), settings()).await;

        assert_eq!(outcome, PollOutcome::Delivered(json!({"request_id": "create-r1"})));
        assert_eq!(store.gets(), 4);
        assert_eq!(store.deletes(), 1);
        let inserts = store.inserts.lock().unwrap();
        assert_eq!(inserts[0]["values"]["request_id"], "create-r1");
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_without_delete() {
        let store = ScriptedStore::default();
        let outcome = poll_for_result(&store, "update-r2", settings()).await;

        assert_eq!(outcome, PollOutcome::TimedOut);
        assert_eq!(store.gets(), 7);
        assert_eq!(store.deletes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_insert_still_polls() {
        let store = ScriptedStore {
            fail_insert: true,
            row: Some(json!({"status": "{}"})),
            ..ScriptedStore::default()
        };
        let outcome = submit_and_poll(&store, Operation::Delete, "r3", &json!({}), settings()).await;
        assert!(matches!(outcome, PollOutcome::Delivered(_)));
        assert!(store.inserts.lock().unwrap().is_empty());
    }

    #[test]
    fn settings_from_config() {
        let config = PollingConfig {
            wait_until: "10s".into(),
            poll_every: "500ms".into(),
        };
        let settings = PollSettings::from(&config);
        assert_eq!(settings.wait_until, Duration::from_secs(10));
        assert_eq!(settings.poll_every, Duration::from_millis(500));
        assert_eq!(PollSettings::default().poll_every, Duration::from_secs(5));
    }
}
