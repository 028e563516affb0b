//! valet-core — shared types and configuration for the Valet placement facade.
//!
//! Holds the inbound placement envelope (`PlacementEnvelope`, `HeatRequest`),
//! the operation names used to key requests and results in the store, and
//! the `valet.toml` configuration parser.

pub mod config;
pub mod types;

pub use config::{ValetConfig, parse_duration};
pub use types::*;
