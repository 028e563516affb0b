//! valet-api — REST facade for Valet.
//!
//! Accepts placement and group requests from the orchestrator, hands them
//! to the placement engine through the shared row store, and returns the
//! engine's answer.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/placement/v1/?requestId=` | Create a placement |
//! | PUT | `/placement/v1/?requestId=` | Update a placement |
//! | DELETE | `/placement/v1/?requestId=` | Delete a placement |
//! | PUT | `/placement/v1/{priorRequestId}/confirm` | Confirm a placement |
//! | PUT | `/placement/v1/{priorRequestId}/rollback` | Roll back a placement |
//! | GET | `/groups/v1/?requestId=&name=&datacenter_id=&host=` | Query groups |
//! | POST | `/groups/v1/?requestId=` | Create a group |
//! | PUT | `/groups/v1/?requestId=` | Update a group |
//! | DELETE | `/groups/v1/?requestId=` | Delete a group |
//! | GET | `/alive` | Liveness |
//! | GET | `/ping` | Store reachability |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use valet_placement::{GroupsService, PlacementService, PollSettings};
use valet_store::PlacementStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub placement: PlacementService,
    pub groups: GroupsService,
    /// Log `/ping` probes.
    pub log_ping: bool,
}

impl ApiState {
    pub fn new(store: Arc<dyn PlacementStore>, settings: PollSettings) -> Self {
        Self {
            placement: PlacementService::new(store.clone(), settings),
            groups: GroupsService::new(store, settings),
            log_ping: false,
        }
    }
}

/// Build the complete API router. Collection routes answer with and
/// without the trailing slash.
pub fn build_router(state: ApiState) -> Router {
    let placement = post(handlers::create_placement)
        .put(handlers::update_placement)
        .delete(handlers::delete_placement);
    let groups = get(handlers::query_groups)
        .post(handlers::create_group)
        .put(handlers::update_group)
        .delete(handlers::delete_group);

    Router::new()
        .route("/placement/v1/", placement.clone())
        .route("/placement/v1", placement)
        .route(
            "/placement/v1/{prior_request_id}/confirm",
            put(handlers::confirm_placement),
        )
        .route(
            "/placement/v1/{prior_request_id}/rollback",
            put(handlers::rollback_placement),
        )
        .route("/groups/v1/", groups.clone())
        .route("/groups/v1", groups)
        .route("/alive", get(handlers::alive))
        .route("/ping", get(handlers::ping))
        .with_state(state)
}
