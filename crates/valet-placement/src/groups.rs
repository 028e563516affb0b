//! Valet groups service: query, create, update and delete groups through
//! the same submit/poll protocol as placements.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;
use valet_core::Operation;
use valet_store::PlacementStore;

use crate::poller::{PollOutcome, PollSettings, submit_and_poll};
use crate::response::ResponseBody;
use crate::service::PlacementOutcome;

#[derive(Clone)]
pub struct GroupsService {
    store: Arc<dyn PlacementStore>,
    settings: PollSettings,
}

impl GroupsService {
    pub fn new(store: Arc<dyn PlacementStore>, settings: PollSettings) -> Self {
        Self { store, settings }
    }

    /// Query groups. The filter is sent only when both `name` and
    /// `datacenter_id` are given.
    pub async fn query(
        &self,
        request_id: &str,
        name: Option<&str>,
        datacenter_id: Option<&str>,
        host: Option<&str>,
    ) -> PlacementOutcome {
        debug!(request_id, ?name, ?datacenter_id, ?host, "group query");
        let mut filter = Map::new();
        if let (Some(name), Some(datacenter_id)) = (name, datacenter_id) {
            filter.insert("name".to_string(), Value::from(name));
            filter.insert("datacenter_id".to_string(), Value::from(datacenter_id));
        }
        self.submit(Operation::GroupQuery, &Value::Object(filter), request_id)
            .await
    }

    pub async fn create(&self, body: &Value, request_id: &str) -> PlacementOutcome {
        self.submit(Operation::GroupCreate, body, request_id).await
    }

    pub async fn update(&self, body: &Value, request_id: &str) -> PlacementOutcome {
        self.submit(Operation::GroupUpdate, body, request_id).await
    }

    pub async fn delete(&self, body: &Value, request_id: &str) -> PlacementOutcome {
        self.submit(Operation::GroupDelete, body, request_id).await
    }

    /// Delivered group answers are the raw result row.
    async fn submit(&self, operation: Operation, request: &Value, request_id: &str) -> PlacementOutcome {
        let outcome = submit_and_poll(
            self.store.as_ref(),
            operation,
            request_id,
            request,
            self.settings,
        )
        .await;
        match outcome {
            PollOutcome::Delivered(row) => PlacementOutcome::Delivered(ResponseBody::Json(row)),
            PollOutcome::TimedOut => PlacementOutcome::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;

    use crate::poller::tests::ScriptedStore;

    fn settings() -> PollSettings {
        PollSettings {
            wait_until: Duration::from_millis(40),
            poll_every: Duration::from_millis(10),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn query_builds_filter_only_with_both_keys() {
        let row = json!({"request_id": "group_query-q1", "result": "[]", "status": "ok"});
        let store = Arc::new(ScriptedStore::answering(0, row.clone()));
        let service = GroupsService::new(store.clone(), settings());

        let outcome = service.query("q1", Some("g1"), Some("dc1"), None).await;
        assert_eq!(outcome, PlacementOutcome::Delivered(ResponseBody::Json(row)));

        service.query("q2", Some("g1"), None, Some("host1")).await;
        let inserts = store.inserts.lock().unwrap();
        assert_eq!(
            inserts[0]["values"]["request"],
            "{\"name\":\"g1\",\"datacenter_id\":\"dc1\"}"
        );
        assert_eq!(inserts[1]["values"]["request_id"], "group_query-q2");
        assert_eq!(inserts[1]["values"]["request"], "{}");
    }

    #[tokio::test(start_paused = true)]
    async fn create_times_out() {
        let store = Arc::new(ScriptedStore::default());
        let service = GroupsService::new(store.clone(), settings());
        let outcome = service.create(&json!({"name": "g1"}), "c1").await;
        assert_eq!(outcome, PlacementOutcome::TimedOut);
        assert_eq!(store.inserts.lock().unwrap()[0]["values"]["request_id"], "group_create-c1");
    }
}
