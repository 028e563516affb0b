//! Placement service: create, update, delete, confirm and rollback.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use valet_core::{Operation, PlacementEnvelope};
use valet_store::{PlacementStore, Table};
use valet_template::resolve_heat_request;

use crate::error::{PlacementError, PlacementResult};
use crate::packager::{PlacementRequest, format_delete_request};
use crate::poller::{PollOutcome, PollSettings, submit_and_poll};
use crate::response::{ResponseBody, placement_response, status_response};
use crate::validate::missing_fields;

/// Key probed by the health check.
pub const PING_KEY: &str = "pingRequest";

/// How a placement call ended, short of an internal failure.
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementOutcome {
    Delivered(ResponseBody),
    /// Required envelope fields that were absent or empty.
    MissingFields(Vec<&'static str>),
    TimedOut,
}

#[derive(Clone)]
pub struct PlacementService {
    store: Arc<dyn PlacementStore>,
    settings: PollSettings,
}

impl PlacementService {
    pub fn new(store: Arc<dyn PlacementStore>, settings: PollSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &Arc<dyn PlacementStore> {
        &self.store
    }

    pub async fn create(&self, body: &Value, request_id: &str) -> PlacementResult<PlacementOutcome> {
        self.place(Operation::Create, body, request_id).await
    }

    pub async fn update(&self, body: &Value, request_id: &str) -> PlacementResult<PlacementOutcome> {
        self.place(Operation::Update, body, request_id).await
    }

    /// Delete submits only the stack coordinates of the body.
    pub async fn delete(&self, body: &Value, request_id: &str) -> PlacementOutcome {
        let request = format_delete_request(body);
        self.forward(Operation::Delete, &request, request_id).await
    }

    pub async fn confirm(&self, body: &Value, prior_request_id: &str) -> PlacementOutcome {
        self.forward(Operation::Confirm, body, prior_request_id).await
    }

    pub async fn rollback(&self, body: &Value, prior_request_id: &str) -> PlacementOutcome {
        self.forward(Operation::Rollback, body, prior_request_id).await
    }

    /// Look up the health-check row; any answer from the store counts.
    pub async fn ping(&self) -> PlacementResult<Option<Value>> {
        Ok(self.store.get(Table::Requests, PING_KEY).await?)
    }

    /// Validate, resolve and submit a create/update envelope.
    async fn place(
        &self,
        operation: Operation,
        body: &Value,
        request_id: &str,
    ) -> PlacementResult<PlacementOutcome> {
        let envelope: PlacementEnvelope = serde_json::from_value(body.clone())
            .map_err(|e| PlacementError::Envelope(e.to_string()))?;

        let missing = missing_fields(&envelope);
        if !missing.is_empty() {
            warn!(%operation, request_id, ?missing, "placement envelope incomplete");
            return Ok(PlacementOutcome::MissingFields(missing));
        }

        let heat = envelope
            .heat_request
            .as_ref()
            .ok_or_else(|| PlacementError::Envelope("heat_request is missing".to_string()))?;
        let resources = resolve_heat_request(heat)?;
        info!(%operation, request_id, resources = resources.len(), "placement request resolved");

        let request = serde_json::to_value(PlacementRequest::assemble(&envelope, resources))
            .map_err(|e| PlacementError::Serialize(e.to_string()))?;

        let outcome = submit_and_poll(
            self.store.as_ref(),
            operation,
            request_id,
            &request,
            self.settings,
        )
        .await;
        Ok(match outcome {
            PollOutcome::Delivered(row) => {
                PlacementOutcome::Delivered(placement_response(row, &heat.parameters))
            }
            PollOutcome::TimedOut => PlacementOutcome::TimedOut,
        })
    }

    async fn forward(&self, operation: Operation, request: &Value, request_id: &str) -> PlacementOutcome {
        let outcome = submit_and_poll(
            self.store.as_ref(),
            operation,
            request_id,
            request,
            self.settings,
        )
        .await;
        match outcome {
            PollOutcome::Delivered(row) => PlacementOutcome::Delivered(status_response(&row)),
            PollOutcome::TimedOut => PlacementOutcome::TimedOut,
        }
    }
}
