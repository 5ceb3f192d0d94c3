//! End-to-End Integration Tests
//!
//! These tests drive the federation engine through its public entry
//! points, with every collaborator replaced by an in-memory fake.

mod common;
mod artifact_exchange;
mod logout_fanout;
mod server_lifecycle;
mod session_pairs;
mod sp_logout;
