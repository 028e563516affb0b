//! valet-template — Heat template resolution for placement requests.
//!
//! Flattens a Heat orchestration template (plus its nested template files,
//! environment and caller parameters) into the map of concrete server
//! resources the placement engine reasons about.
//!
//! # Architecture
//!
//! ```text
//! resolve_heat_request(HeatRequest)
//!   └── ResolutionContext (scopes, resource stack, cursor, depth)
//!       ├── process_template     walk `resources`, merge parent properties
//!       ├── parse_resource_object  group expansion / nested file / properties
//!       ├── evaluate             get_param, get_attr, get_resource, str_replace
//!       └── resolve_param        parent → request → environment precedence
//! ```
//!
//! Templates are handled as `serde_json::Value` documents (insertion order
//! preserved); YAML text is normalized on entry by [`yaml::normalize`].

pub mod context;
pub mod engine;
pub mod error;
pub mod heat;
pub mod intrinsic;
pub mod params;
pub mod property;
pub mod yaml;

pub use context::{ResolutionContext, ResourceStack};
pub use engine::resolve_heat_request;
pub use error::{TemplateError, TemplateResult};
pub use params::resolve_param;
pub use property::{Intrinsic, ParamIndex, ParamRef, Property};
