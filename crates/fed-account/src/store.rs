//! Federation record store.
//!
//! At most one record exists per `(user, local entity, remote entity)`.
//! Writes to one triple are serialized so a re-key replacing a record
//! cannot interleave with another write for the same triple.

use std::sync::Arc;

use fed_core::event::{Event, EventType};
use fed_core::KeyedLocks;
use fed_model::{FederationKey, NameIdInfo};
use fed_spi::MetadataProvider;

use crate::backend::AccountFederationStore;
use crate::error::{AccountError, AccountResult};

/// CRUD over federation records, with affiliation handling.
pub struct FederationRecordStore {
    backend: Arc<dyn AccountFederationStore>,
    metadata: Arc<dyn MetadataProvider>,
    locks: KeyedLocks,
}

impl FederationRecordStore {
    /// Creates a store over an account federation backend.
    #[must_use]
    pub fn new(
        backend: Arc<dyn AccountFederationStore>,
        metadata: Arc<dyn MetadataProvider>,
    ) -> Self {
        Self {
            backend,
            metadata,
            locks: KeyedLocks::new(),
        }
    }

    /// Returns the record of `(user_id, local, remote)`.
    pub async fn get(
        &self,
        user_id: &str,
        local_entity_id: &str,
        remote_entity_id: &str,
    ) -> AccountResult<Option<NameIdInfo>> {
        self.backend
            .load(user_id, local_entity_id, remote_entity_id)
            .await
    }

    /// Returns the affiliation-scoped record of a user.
    ///
    /// `member_id` is the entity acting for the affiliation, usually the
    /// remote party that sent the request.
    ///
    /// ## Errors
    ///
    /// Returns [`AccountError::NotAffiliationMember`] if `member_id` is not
    /// a declared member of `affiliation_id`.
    pub async fn get_by_affiliation(
        &self,
        realm: &str,
        user_id: &str,
        local_entity_id: &str,
        affiliation_id: &str,
        member_id: &str,
    ) -> AccountResult<Option<NameIdInfo>> {
        self.require_member(realm, affiliation_id, member_id).await?;
        let record = self
            .backend
            .load(user_id, local_entity_id, affiliation_id)
            .await?;
        Ok(record.filter(|r| r.affiliation))
    }

    /// Returns the ID a record with `requester_id` is stored under.
    ///
    /// A NameID whose SP name qualifier names an affiliation is scoped to
    /// that affiliation, provided the requester is one of its members.
    ///
    /// ## Errors
    ///
    /// Returns [`AccountError::NotAffiliationMember`] for non-members.
    pub async fn remote_scope(
        &self,
        realm: &str,
        requester_id: &str,
        sp_name_qualifier: Option<&str>,
    ) -> AccountResult<(String, bool)> {
        if let Some(q) = sp_name_qualifier.filter(|q| *q != requester_id) {
            if self.metadata.is_affiliation(realm, q).await? {
                self.require_member(realm, q, requester_id).await?;
                return Ok((q.to_string(), true));
            }
        }
        Ok((requester_id.to_string(), false))
    }

    /// Checks that `entity_id` may act for `affiliation_id`.
    ///
    /// ## Errors
    ///
    /// Returns [`AccountError::NotAffiliationMember`] for non-members.
    pub async fn require_member(
        &self,
        realm: &str,
        affiliation_id: &str,
        entity_id: &str,
    ) -> AccountResult<()> {
        if self
            .metadata
            .is_affiliation_member(realm, affiliation_id, entity_id)
            .await?
        {
            Ok(())
        } else {
            tracing::warn!(
                affiliation = %affiliation_id,
                entity = %entity_id,
                "entity is not an affiliation member"
            );
            Err(AccountError::NotAffiliationMember {
                affiliation: affiliation_id.to_string(),
                entity: entity_id.to_string(),
            })
        }
    }

    /// Stores a record, replacing any record with the same triple.
    pub async fn put(&self, record: &NameIdInfo, user_id: &str) -> AccountResult<()> {
        let _guard = self
            .locks
            .lock(&triple_key(
                user_id,
                &record.local_entity_id,
                &record.remote_entity_id,
            ))
            .await;
        self.backend.save(user_id, record).await?;

        tracing::debug!(
            local = %record.local_entity_id,
            remote = %record.remote_entity_id,
            role = %record.role,
            "federation record stored"
        );
        Event::builder(EventType::FederationRecorded)
            .local(&record.local_entity_id)
            .remote(&record.remote_entity_id)
            .detail("role", record.role.as_str())
            .detail("affiliation", record.affiliation.to_string())
            .emit();
        Ok(())
    }

    /// Removes a record.
    ///
    /// Failures are logged and reported as `false` so callers decide
    /// whether a partial teardown is acceptable.
    pub async fn remove(&self, record: &NameIdInfo, user_id: &str) -> bool {
        let _guard = self
            .locks
            .lock(&triple_key(
                user_id,
                &record.local_entity_id,
                &record.remote_entity_id,
            ))
            .await;
        match self
            .backend
            .delete(user_id, &record.local_entity_id, &record.remote_entity_id)
            .await
        {
            Ok(existed) => {
                tracing::debug!(
                    local = %record.local_entity_id,
                    remote = %record.remote_entity_id,
                    existed,
                    "federation record removed"
                );
                existed
            }
            Err(e) => {
                tracing::warn!(
                    local = %record.local_entity_id,
                    remote = %record.remote_entity_id,
                    error = %e,
                    "failed to remove federation record"
                );
                false
            }
        }
    }

    /// Returns the user owning the federation with this key.
    pub async fn find_user(&self, key: &FederationKey) -> AccountResult<Option<String>> {
        self.backend.find_user(key).await
    }
}

impl std::fmt::Debug for FederationRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederationRecordStore")
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

/// Lock key of a record triple; parts are length-prefixed so distinct
/// triples never share a key.
fn triple_key(user_id: &str, local: &str, remote: &str) -> String {
    [user_id, local, remote]
        .iter()
        .map(|p| format!("{}:{p}", p.len()))
        .collect::<Vec<_>>()
        .join("|")
}
