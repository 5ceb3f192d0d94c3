//! Audit events for federation state changes.
//!
//! Every event carries a timestamp, its type, the outcome and the parties
//! involved. Events are written to the `audit` tracing target; NameID
//! values are never recorded, only the entity IDs and session indexes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    // Session events
    /// An IdP session was created for a local session.
    IdpSessionCreated,
    /// An IdP session was removed.
    IdpSessionRemoved,
    /// A federation record was stored.
    FederationRecorded,

    // Logout events
    /// A logout request was dispatched to a remote party.
    LogoutDispatched,
    /// A remote party failed or did not answer a logout request.
    LogoutTargetFailed,
    /// A logout fan-out was aggregated.
    LogoutCompleted,

    // Name identifier management events
    /// A NameID federation was terminated.
    NameIdTerminated,
    /// A NameID federation was re-keyed.
    NameIdRekeyed,

    // Artifact events
    /// An artifact was issued for a cached response.
    ArtifactIssued,
    /// An artifact was resolved.
    ArtifactResolved,

    /// An inbound request was rejected before any state was touched.
    RequestRejected,
}

/// Outcome of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOutcome {
    /// Operation succeeded.
    Success,
    /// Operation failed.
    Failure,
}

/// An audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,

    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Type of event.
    pub event_type: EventType,

    /// Outcome of the event.
    pub outcome: EventOutcome,

    /// Realm the event occurred in.
    pub realm: Option<String>,

    /// Local entity ID.
    pub local_entity_id: Option<String>,

    /// Remote entity ID.
    pub remote_entity_id: Option<String>,

    /// Session index.
    pub session_index: Option<String>,

    /// Error message (for failure events).
    pub error: Option<String>,

    /// Additional details as key-value pairs.
    pub details: Vec<(String, String)>,
}

impl Event {
    /// Creates a new event builder.
    #[must_use]
    pub const fn builder(event_type: EventType) -> EventBuilder {
        EventBuilder::new(event_type)
    }

    /// Writes the event to the `audit` tracing target.
    pub fn emit(&self) {
        let details = self
            .details
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");

        match self.outcome {
            EventOutcome::Success => tracing::info!(
                target: "audit",
                event_id = %self.id,
                event_type = ?self.event_type,
                realm = self.realm.as_deref().unwrap_or(""),
                local = self.local_entity_id.as_deref().unwrap_or(""),
                remote = self.remote_entity_id.as_deref().unwrap_or(""),
                session_index = self.session_index.as_deref().unwrap_or(""),
                details = %details,
                "federation event"
            ),
            EventOutcome::Failure => tracing::warn!(
                target: "audit",
                event_id = %self.id,
                event_type = ?self.event_type,
                realm = self.realm.as_deref().unwrap_or(""),
                local = self.local_entity_id.as_deref().unwrap_or(""),
                remote = self.remote_entity_id.as_deref().unwrap_or(""),
                session_index = self.session_index.as_deref().unwrap_or(""),
                error = self.error.as_deref().unwrap_or(""),
                details = %details,
                "federation event failed"
            ),
        }
    }
}

/// Builder for creating events.
pub struct EventBuilder {
    event_type: EventType,
    outcome: EventOutcome,
    realm: Option<String>,
    local_entity_id: Option<String>,
    remote_entity_id: Option<String>,
    session_index: Option<String>,
    error: Option<String>,
    details: Vec<(String, String)>,
}

impl EventBuilder {
    /// Creates a new event builder.
    #[must_use]
    pub const fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            outcome: EventOutcome::Success,
            realm: None,
            local_entity_id: None,
            remote_entity_id: None,
            session_index: None,
            error: None,
            details: Vec::new(),
        }
    }

    /// Sets the outcome to failure with an error message.
    #[must_use]
    pub fn failure(mut self, error: impl Into<String>) -> Self {
        self.outcome = EventOutcome::Failure;
        self.error = Some(error.into());
        self
    }

    /// Sets the realm.
    #[must_use]
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// Sets the local entity ID.
    #[must_use]
    pub fn local(mut self, entity_id: impl Into<String>) -> Self {
        self.local_entity_id = Some(entity_id.into());
        self
    }

    /// Sets the remote entity ID.
    #[must_use]
    pub fn remote(mut self, entity_id: impl Into<String>) -> Self {
        self.remote_entity_id = Some(entity_id.into());
        self
    }

    /// Sets the session index.
    #[must_use]
    pub fn session(mut self, session_index: impl Into<String>) -> Self {
        self.session_index = Some(session_index.into());
        self
    }

    /// Adds a detail key-value pair.
    #[must_use]
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.push((key.into(), value.into()));
        self
    }

    /// Builds the event.
    #[must_use]
    pub fn build(self) -> Event {
        Event {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            event_type: self.event_type,
            outcome: self.outcome,
            realm: self.realm,
            local_entity_id: self.local_entity_id,
            remote_entity_id: self.remote_entity_id,
            session_index: self.session_index,
            error: self.error,
            details: self.details,
        }
    }

    /// Builds and emits the event.
    pub fn emit(self) {
        self.build().emit();
    }
}
