//! AWS-oriented adapter and handler for the scheduled NAT gateway lifecycle.
//!
//! This crate owns runtime integration details (the Lambda handler and the
//! EC2 control-plane seam); the invocation contract and route planning live
//! in `natgw_lifecycle_core`.

pub mod adapters;
pub mod handlers;
