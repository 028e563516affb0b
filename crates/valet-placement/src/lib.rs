//! valet-placement — placement request handling.
//!
//! Turns an orchestrator placement envelope into a request for the
//! placement engine and waits for its answer:
//!
//! ```text
//! envelope ──validate──▶ resolve template ──package──▶ insert `requests`
//!                                                        │
//!        response ◀──merge parameters── row ◀──poll `results` (delete once)
//! ```
//!
//! The engine itself is external; the two sides only share the row store.

pub mod error;
pub mod groups;
pub mod packager;
pub mod poller;
pub mod response;
pub mod service;
pub mod validate;

pub use error::{PlacementError, PlacementResult};
pub use groups::GroupsService;
pub use packager::PlacementRequest;
pub use poller::{PollOutcome, PollSettings};
pub use response::ResponseBody;
pub use service::{PlacementOutcome, PlacementService};
