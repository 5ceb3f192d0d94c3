//! Local authentication session port.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SpiResult;

/// Callback invoked when a local session ends.
#[async_trait]
pub trait SessionInvalidationListener: Send + Sync {
    /// Called once after `handle` was invalidated or expired.
    async fn session_invalidated(&self, handle: &str);
}

/// Provider of the local authentication sessions.
///
/// Sessions are addressed by an opaque handle. The engine reads and tags
/// them but never stores credentials.
#[async_trait]
pub trait LocalSessionProvider: Send + Sync {
    /// Returns the principal the session is authenticated as.
    async fn principal_name(&self, handle: &str) -> SpiResult<String>;

    /// Reads a session property.
    async fn property(&self, handle: &str, name: &str) -> SpiResult<Option<String>>;

    /// Writes a session property.
    async fn set_property(&self, handle: &str, name: &str, value: &str) -> SpiResult<()>;

    /// Registers a listener called when the session ends.
    async fn add_invalidation_listener(
        &self,
        handle: &str,
        listener: Arc<dyn SessionInvalidationListener>,
    ) -> SpiResult<()>;

    /// Returns the remaining lifetime, or `None` if the session is gone.
    async fn time_left(&self, handle: &str) -> SpiResult<Option<Duration>>;

    /// Invalidates the session and notifies its listeners.
    async fn invalidate(&self, handle: &str) -> SpiResult<()>;
}
