//! Federation records and keys.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::name_id::NameId;

/// Role an entity plays in a federation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRole {
    /// Identity provider.
    #[serde(rename = "idp")]
    IdentityProvider,
    /// Service provider.
    #[serde(rename = "sp")]
    ServiceProvider,
}

impl EntityRole {
    /// Returns the role of the other party.
    #[must_use]
    pub const fn peer(&self) -> Self {
        match self {
            Self::IdentityProvider => Self::ServiceProvider,
            Self::ServiceProvider => Self::IdentityProvider,
        }
    }

    /// Returns the short name (`idp` or `sp`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::IdentityProvider => "idp",
            Self::ServiceProvider => "sp",
        }
    }
}

impl fmt::Display for EntityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable key identifying one federation relationship.
///
/// Derived from the NameID value and the IdP and SP entity IDs, so both
/// sides of a federation compute the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FederationKey(String);

impl FederationKey {
    /// Derives the key of a federation.
    #[must_use]
    pub fn derive(name_id_value: &str, idp_entity_id: &str, sp_entity_id: &str) -> Self {
        Self(fed_crypto::federation_digest(&[
            name_id_value,
            idp_entity_id,
            sp_entity_id,
        ]))
    }

    /// Returns the key as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FederationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A durable federation fact between a local and a remote entity.
///
/// The owning user is not part of the record; stores key it by
/// `(user_id, local_entity_id, remote_entity_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameIdInfo {
    /// Hosted entity ID.
    pub local_entity_id: String,
    /// Remote entity ID, or the affiliation ID for affiliation-scoped records.
    pub remote_entity_id: String,
    /// The federated identifier.
    pub name_id: NameId,
    /// Role of the hosted entity.
    pub role: EntityRole,
    /// Whether `remote_entity_id` names an affiliation.
    #[serde(default)]
    pub affiliation: bool,
    /// Creation time of the record.
    pub created_at: DateTime<Utc>,
}

/// Alias used where the record is handled as the stored federation fact.
pub type FederationRecord = NameIdInfo;

impl NameIdInfo {
    /// Creates a new record.
    #[must_use]
    pub fn new(
        local_entity_id: impl Into<String>,
        remote_entity_id: impl Into<String>,
        name_id: NameId,
        role: EntityRole,
    ) -> Self {
        Self {
            local_entity_id: local_entity_id.into(),
            remote_entity_id: remote_entity_id.into(),
            name_id,
            role,
            affiliation: false,
            created_at: Utc::now(),
        }
    }

    /// Marks the record as affiliation scoped.
    #[must_use]
    pub const fn with_affiliation(mut self, affiliation: bool) -> Self {
        self.affiliation = affiliation;
        self
    }

    /// Returns the replacement record carrying a new NameID value.
    #[must_use]
    pub fn with_name_id_value(&self, value: impl Into<String>) -> Self {
        Self {
            name_id: self.name_id.with_value(value),
            created_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Returns the IdP entity ID of this federation.
    #[must_use]
    pub fn idp_entity_id(&self) -> &str {
        match self.role {
            EntityRole::IdentityProvider => &self.local_entity_id,
            EntityRole::ServiceProvider => &self.remote_entity_id,
        }
    }

    /// Returns the SP entity ID of this federation.
    #[must_use]
    pub fn sp_entity_id(&self) -> &str {
        match self.role {
            EntityRole::IdentityProvider => &self.remote_entity_id,
            EntityRole::ServiceProvider => &self.local_entity_id,
        }
    }

    /// Derives the federation key.
    #[must_use]
    pub fn federation_key(&self) -> FederationKey {
        FederationKey::derive(
            &self.name_id.value,
            self.idp_entity_id(),
            self.sp_entity_id(),
        )
    }
}
