//! Shared NAT gateway lifecycle domain primitives.
//!
//! This crate owns the invocation contract and the deterministic route
//! reconciliation planning. It intentionally excludes AWS SDK and Lambda
//! runtime concerns.

pub mod contract;
pub mod routes;
