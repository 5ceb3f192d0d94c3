//! # fed-spi
//!
//! Ports through which the federation engine reaches its collaborators.
//!
//! The engine never looks collaborators up globally. The composition root
//! builds one implementation of each port and hands it to the engine:
//!
//! - [`MetadataProvider`] - endpoints and policy flags per entity
//! - [`CryptoService`] - signing, verification and encryption
//! - [`LocalSessionProvider`] - the authentication sessions the engine
//!   federates, plus invalidation callbacks

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod crypto;
pub mod error;
pub mod metadata;
pub mod session;

use std::sync::Arc;

pub use crypto::{Certificate, CryptoService, KeyReference};
pub use error::{SpiError, SpiResult};
pub use metadata::{LocalEntity, MetadataProvider};
pub use session::{LocalSessionProvider, SessionInvalidationListener};

/// The set of injected collaborators.
#[derive(Clone)]
pub struct Ports {
    /// Metadata provider.
    pub metadata: Arc<dyn MetadataProvider>,
    /// Crypto service.
    pub crypto: Arc<dyn CryptoService>,
    /// Local session provider.
    pub sessions: Arc<dyn LocalSessionProvider>,
}

impl Ports {
    /// Bundles the collaborators.
    #[must_use]
    pub fn new(
        metadata: Arc<dyn MetadataProvider>,
        crypto: Arc<dyn CryptoService>,
        sessions: Arc<dyn LocalSessionProvider>,
    ) -> Self {
        Self {
            metadata,
            crypto,
            sessions,
        }
    }
}

impl std::fmt::Debug for Ports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ports").finish_non_exhaustive()
    }
}
