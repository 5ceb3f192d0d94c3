//! IdP session model.

use chrono::{DateTime, Utc};
use fed_model::NameId;
use serde::{Deserialize, Serialize};

/// A NameID issued to one service provider within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameIdPair {
    /// The NameID the SP knows the user by.
    pub name_id: NameId,
    /// Entity ID of the SP.
    pub sp_entity_id: String,
}

impl NameIdPair {
    /// Creates a new pair.
    #[must_use]
    pub fn new(name_id: NameId, sp_entity_id: impl Into<String>) -> Self {
        Self {
            name_id,
            sp_entity_id: sp_entity_id.into(),
        }
    }
}

/// One authenticated local session as known to a hosted IdP.
///
/// The serialized form is what the failover repository stores; it is a
/// copy, never a live reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpSession {
    /// Globally unique session index.
    pub session_index: String,
    /// Handle of the underlying local session.
    pub local_session_handle: String,
    /// Meta alias of the hosted IdP.
    pub meta_alias: String,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    pairs: Vec<NameIdPair>,
}

impl IdpSession {
    /// Creates a session with no federated SP.
    #[must_use]
    pub fn new(
        session_index: impl Into<String>,
        local_session_handle: impl Into<String>,
        meta_alias: impl Into<String>,
    ) -> Self {
        Self {
            session_index: session_index.into(),
            local_session_handle: local_session_handle.into(),
            meta_alias: meta_alias.into(),
            created_at: Utc::now(),
            pairs: Vec::new(),
        }
    }

    /// Returns the pairs in insertion order.
    #[must_use]
    pub fn pairs(&self) -> &[NameIdPair] {
        &self.pairs
    }

    /// Returns true if no SP is federated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Returns true if the session is federated with `sp_entity_id`.
    #[must_use]
    pub fn has_sp(&self, sp_entity_id: &str) -> bool {
        self.pairs.iter().any(|p| p.sp_entity_id == sp_entity_id)
    }

    /// Returns the newest pair for an SP.
    #[must_use]
    pub fn pair_for(&self, sp_entity_id: &str) -> Option<&NameIdPair> {
        self.pairs
            .iter()
            .rev()
            .find(|p| p.sp_entity_id == sp_entity_id)
    }

    /// Adds a pair unless the SP is already present.
    ///
    /// Returns false when the SP was present; the first NameID recorded
    /// for an SP wins.
    pub fn add_pair(&mut self, pair: NameIdPair) -> bool {
        if self.has_sp(&pair.sp_entity_id) {
            return false;
        }
        self.pairs.push(pair);
        true
    }

    /// Appends the pair produced by a NameID re-key.
    ///
    /// The pair carrying the previous NameID stays in place until the
    /// federation is terminated or logged out. Appending an identical
    /// pair twice is a no-op.
    pub fn append_rekeyed_pair(&mut self, pair: NameIdPair) -> bool {
        if self.pairs.contains(&pair) {
            return false;
        }
        self.pairs.push(pair);
        true
    }

    /// Removes every pair of an SP and returns them.
    pub fn remove_pairs_for(&mut self, sp_entity_id: &str) -> Vec<NameIdPair> {
        let (removed, kept) = std::mem::take(&mut self.pairs)
            .into_iter()
            .partition(|p| p.sp_entity_id == sp_entity_id);
        self.pairs = kept;
        removed
    }

    /// Returns one pair per SP, carrying the newest NameID, in the order
    /// the SPs were first federated.
    #[must_use]
    pub fn logout_targets(&self) -> Vec<NameIdPair> {
        let mut targets: Vec<NameIdPair> = Vec::new();
        for pair in &self.pairs {
            match targets
                .iter_mut()
                .find(|t| t.sp_entity_id == pair.sp_entity_id)
            {
                Some(existing) => *existing = pair.clone(),
                None => targets.push(pair.clone()),
            }
        }
        targets
    }
}
