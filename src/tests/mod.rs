//! Integration tests for csiproxy.
//!
//! End-to-end tests that serve every API group on loopback listeners and drive them
//! over HTTP against in-memory management collaborators.

mod cases_endpoints_test;

pub mod support;
