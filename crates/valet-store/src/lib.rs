//! valet-store — request and result tables shared with the placement engine.
//!
//! The API writes placement requests into the `requests` table and polls the
//! `results` table for the engine's answer. Two backends implement
//! [`PlacementStore`]:
//!
//! - [`MusicClient`]: the replicated REST row store, with failover across
//!   replica endpoints
//! - [`LocalStore`]: an embedded [redb](https://docs.rs/redb) database for
//!   standalone runs and tests

pub mod error;
pub mod local;
pub mod music;
pub mod store;
pub mod tables;

pub use error::{StoreError, StoreResult};
pub use local::LocalStore;
pub use music::MusicClient;
pub use store::PlacementStore;
pub use tables::Table;
