//! # fed-core
//!
//! Core utilities shared by every crate of the federation engine:
//! configuration, the top-level error type, audit events and the
//! keyed lock factory that serializes mutations per session index or
//! per federation key.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod lock;

pub use config::Config;
pub use error::{Error, Result};
pub use event::{Event, EventOutcome, EventType};
pub use lock::{KeyGuard, KeyedLocks};
