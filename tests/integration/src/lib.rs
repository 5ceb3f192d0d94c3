//! End-to-end scenarios for the federation engine.
//!
//! The scenarios live under `tests/`; they drive a `FederationEngine`
//! assembled over in-memory collaborators.
