//! HTTP plumbing shared by every route: request tracing, the rate guard
//! and the development panel.

pub mod panel;
pub mod rate_limit;
pub mod tracing;
