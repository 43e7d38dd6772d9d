//! Attachment policies
//!
//! Policies attach to Gateway API objects or Services through
//! `PolicyTargetReference`s and share `PolicyStatus`.

pub mod client_settings;
pub mod observability;
pub mod upstream_settings;

pub use client_settings::*;
pub use observability::*;
pub use upstream_settings::*;
