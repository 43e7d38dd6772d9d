//! Gateway CRD Definitions
//!
//! Kubernetes Custom Resource Definitions owned by the gateway controller.
//! Gateway API kinds and core kinds are not defined here; the watch engine
//! addresses them by group/version/kind.

pub mod control_config;
pub mod policy;
pub mod proxy_config;
pub mod references;
pub mod snippets_filter;

pub use control_config::*;
pub use policy::*;
pub use proxy_config::*;
pub use references::*;
pub use snippets_filter::*;

/// API group shared by every CRD in this crate.
pub const API_GROUP: &str = "gateway.microscaler.io";
