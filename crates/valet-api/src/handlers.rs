//! REST API handlers.
//!
//! Each handler forwards to the placement or groups service and maps the
//! outcome onto an HTTP status:
//!
//! - delivered → 200 with the response document
//! - missing envelope fields → 422 with `RequiredFields : [..]`
//! - no result before the deadline → 504
//! - template or internal failure → 500 with an empty body

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info};
use valet_core::html_escape;
use valet_placement::validate::required_fields_message;
use valet_placement::{PlacementOutcome, PlacementResult, ResponseBody};

use crate::ApiState;

/// Body returned by the groups API when the engine does not answer.
pub const GROUP_TIMEOUT_BODY: &str = "Request timedout";

#[derive(Debug, Deserialize)]
pub struct RequestIdQuery {
    #[serde(rename = "requestId")]
    pub request_id: String,
}

#[derive(Debug, Deserialize)]
pub struct GroupQuery {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub name: Option<String>,
    pub datacenter_id: Option<String>,
    pub host: Option<String>,
}

fn delivered(body: ResponseBody) -> Response {
    match body {
        ResponseBody::Json(value) => (StatusCode::OK, Json(value)).into_response(),
        ResponseBody::Text(text) => (StatusCode::OK, text).into_response(),
    }
}

fn placement_reply(outcome: PlacementOutcome) -> Response {
    match outcome {
        PlacementOutcome::Delivered(body) => delivered(body),
        PlacementOutcome::MissingFields(missing) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            required_fields_message(&missing),
        )
            .into_response(),
        PlacementOutcome::TimedOut => StatusCode::GATEWAY_TIMEOUT.into_response(),
    }
}

fn placement_result(request_id: &str, result: PlacementResult<PlacementOutcome>) -> Response {
    match result {
        Ok(outcome) => placement_reply(outcome),
        Err(e) => {
            error!(request_id, error = %e, "placement request failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn group_reply(outcome: PlacementOutcome) -> Response {
    match outcome {
        PlacementOutcome::TimedOut => {
            (StatusCode::GATEWAY_TIMEOUT, GROUP_TIMEOUT_BODY).into_response()
        }
        other => placement_reply(other),
    }
}

// ── Placement ──────────────────────────────────────────────────

/// POST /placement/v1/?requestId=
pub async fn create_placement(
    State(state): State<ApiState>,
    Query(query): Query<RequestIdQuery>,
    Json(body): Json<Value>,
) -> Response {
    let request_id = html_escape(&query.request_id);
    let result = state.placement.create(&body, &request_id).await;
    placement_result(&request_id, result)
}

/// PUT /placement/v1/?requestId=
pub async fn update_placement(
    State(state): State<ApiState>,
    Query(query): Query<RequestIdQuery>,
    Json(body): Json<Value>,
) -> Response {
    let request_id = html_escape(&query.request_id);
    let result = state.placement.update(&body, &request_id).await;
    placement_result(&request_id, result)
}

/// DELETE /placement/v1/?requestId=
pub async fn delete_placement(
    State(state): State<ApiState>,
    Query(query): Query<RequestIdQuery>,
    Json(body): Json<Value>,
) -> Response {
    let request_id = html_escape(&query.request_id);
    placement_reply(state.placement.delete(&body, &request_id).await)
}

/// PUT /placement/v1/{priorRequestId}/confirm
pub async fn confirm_placement(
    State(state): State<ApiState>,
    Path(prior_request_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let prior = html_escape(&prior_request_id);
    placement_reply(state.placement.confirm(&body, &prior).await)
}

/// PUT /placement/v1/{priorRequestId}/rollback
pub async fn rollback_placement(
    State(state): State<ApiState>,
    Path(prior_request_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let prior = html_escape(&prior_request_id);
    placement_reply(state.placement.rollback(&body, &prior).await)
}

// ── Groups ─────────────────────────────────────────────────────

/// GET /groups/v1/?requestId=&name=&datacenter_id=&host=
pub async fn query_groups(
    State(state): State<ApiState>,
    Query(query): Query<GroupQuery>,
) -> Response {
    let request_id = html_escape(&query.request_id);
    let outcome = state
        .groups
        .query(
            &request_id,
            query.name.as_deref(),
            query.datacenter_id.as_deref(),
            query.host.as_deref(),
        )
        .await;
    group_reply(outcome)
}

/// POST /groups/v1/?requestId=
pub async fn create_group(
    State(state): State<ApiState>,
    Query(query): Query<RequestIdQuery>,
    Json(body): Json<Value>,
) -> Response {
    let request_id = html_escape(&query.request_id);
    group_reply(state.groups.create(&body, &request_id).await)
}

/// PUT /groups/v1/?requestId=
pub async fn update_group(
    State(state): State<ApiState>,
    Query(query): Query<RequestIdQuery>,
    Json(body): Json<Value>,
) -> Response {
    let request_id = html_escape(&query.request_id);
    group_reply(state.groups.update(&body, &request_id).await)
}

/// DELETE /groups/v1/?requestId=
pub async fn delete_group(
    State(state): State<ApiState>,
    Query(query): Query<RequestIdQuery>,
    Json(body): Json<Value>,
) -> Response {
    let request_id = html_escape(&query.request_id);
    group_reply(state.groups.delete(&body, &request_id).await)
}

// ── Utility ────────────────────────────────────────────────────

/// GET /alive
pub async fn alive() -> &'static str {
    "ok"
}

/// GET /ping
pub async fn ping(State(state): State<ApiState>) -> impl IntoResponse {
    let db_service = match state.placement.ping().await {
        Ok(_) => "OK",
        Err(e) => {
            error!(error = %e, "ping store probe failed");
            "Failed"
        }
    };
    if state.log_ping {
        info!(db_service, "ping");
    }
    Json(json!({
        "status": {"valet_service": "ok", "db_service": db_service}
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::to_bytes;
    use valet_placement::PollSettings;
    use valet_store::{LocalStore, MusicClient, Table};

    fn settings() -> PollSettings {
        PollSettings {
            wait_until: Duration::from_millis(50),
            poll_every: Duration::from_millis(10),
        }
    }

    fn test_state() -> (ApiState, LocalStore) {
        let store = LocalStore::open_in_memory().unwrap();
        (ApiState::new(Arc::new(store.clone()), settings()), store)
    }

    fn request_id(id: &str) -> Query<RequestIdQuery> {
        Query(RequestIdQuery {
            request_id: id.to_string(),
        })
    }

    fn envelope() -> Value {
        json!({
            "region_id": "dc1",
            "keystone_url": "http://keystone:5000/v3",
            "tenant_id": "t1",
            "service_instance_id": "si1",
            "vnf_id": "vnf1",
            "vnf_name": "vnf-one",
            "vf_module_id": "vfm1",
            "vf_module_name": "vfm-one",
            "heat_request": {
                "stack_name": "stack-1",
                "template": "resources:\n  vm:\n    type: OS::Nova::Server\n    properties:\n      name: {get_param: vm_name}\n",
                "files": {},
                "environment": "",
                "parameters": {"vm_name": "vm-42"}
            }
        })
    }

    async fn body_text(resp: Response) -> String {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn create_placement_delivers_merged_parameters() {
        let (state, store) = test_state();
        store
            .put_row(
                Table::Results,
                "create-r1",
                &json!({
                    "request_id": "create-r1",
                    "status": "{\"status\": \"ok\", \"message\": \"\"}",
                    "result": "{\"availability_zone\": \"az1:host1\"}"
                }),
            )
            .unwrap();

        let resp = create_placement(State(state), request_id("r1"), Json(envelope())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(body["parameters"]["vm_name"], "vm-42");
        assert_eq!(body["parameters"]["availability_zone"], "az1:host1");
        assert!(store.row(Table::Results, "create-r1").unwrap().is_none());
        assert!(store.row(Table::Requests, "create-r1").unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_fields_are_unprocessable() {
        let (state, store) = test_state();
        let mut body = envelope();
        body["tenant_id"] = Value::Null;
        body["vnf_name"] = json!("");

        let resp = update_placement(State(state), request_id("r2"), Json(body)).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_text(resp).await, "RequiredFields : [tenant_id, vnf_name]");
        assert!(store.row(Table::Requests, "update-r2").unwrap().is_none());
    }

    #[tokio::test]
    async fn numeric_tenant_is_accepted() {
        let (state, store) = test_state();
        store
            .put_row(
                Table::Results,
                "create-r6",
                &json!({"status": "{\"status\": \"ok\"}", "result": "{}"}),
            )
            .unwrap();
        let mut body = envelope();
        body["tenant_id"] = json!(42);

        let resp = create_placement(State(state), request_id("r6"), Json(body)).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn template_failure_is_internal_error() {
        let (state, _store) = test_state();
        let mut body = envelope();
        body["heat_request"]["template"] = json!("description: nothing here\n");

        let resp = create_placement(State(state), request_id("r3"), Json(body)).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(resp).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn placement_timeout_has_empty_body() {
        let (state, _store) = test_state();
        let resp = create_placement(State(state), request_id("r4"), Json(envelope())).await;
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(body_text(resp).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn group_timeout_has_message() {
        let (state, _store) = test_state();
        let query = Query(GroupQuery {
            request_id: "g1".to_string(),
            name: Some("grp".to_string()),
            datacenter_id: Some("dc1".to_string()),
            host: None,
        });
        let resp = query_groups(State(state), query).await;
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body_text(resp).await, GROUP_TIMEOUT_BODY);
    }

    #[tokio::test]
    async fn confirm_uses_escaped_prior_id() {
        let (state, store) = test_state();
        store
            .put_row(
                Table::Results,
                "confirm-a&lt;b",
                &json!({"status": "{\"status\": \"ok\", \"message\": \"\"}"}),
            )
            .unwrap();

        let resp = confirm_placement(
            State(state),
            Path("a<b".to_string()),
            Json(json!({"confirmed": true})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(body, json!({"status": {"status": "ok", "message": ""}}));
    }

    #[tokio::test]
    async fn alive_says_ok() {
        assert_eq!(alive().await, "ok");
    }

    #[tokio::test]
    async fn ping_reports_store_health() {
        let (state, _store) = test_state();
        let resp = ping(State(state)).await.into_response();
        let body: Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(body["status"]["db_service"], "OK");

        let config = valet_core::config::StoreConfig {
            endpoints: vec!["http://127.0.0.1:1".to_string()],
            request_timeout: "200ms".to_string(),
            ..Default::default()
        };
        let music = MusicClient::new(&config).unwrap();
        let state = ApiState::new(Arc::new(music), settings());
        let resp = ping(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(
            body["status"],
            json!({"valet_service": "ok", "db_service": "Failed"})
        );
    }
}
