//! NameID management (responder side).
//!
//! A request goes through the signature gate before anything is read,
//! then the federation it names is resolved and either terminated or
//! re-keyed. For a hosted IdP the sessions holding the NameID are locked
//! first, then the federation keys; the record is resolved and changed only
//! once both are held, so a change cannot interleave with a logout fan-out
//! of the same session.

use std::sync::Arc;

use fed_account::FederationRecordStore;
use fed_core::event::{Event, EventType};
use fed_model::{EntityRole, FederationKey, MessageKind, NameId, NameIdInfo};
use fed_session::{LockedSession, NameIdPair, SessionIndexCache, SpSessionBindings};
use fed_spi::{CryptoService, KeyReference, LocalEntity, MetadataProvider};

use crate::error::{SamlError, SamlResult};
use crate::gate::SignatureGate;
use crate::outcome::FederationStatus;
use crate::types::{decrypt_value, ManageNameIdRequest, NameIdAction};

/// What a processed request changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameIdChange {
    /// The federation was removed.
    Terminated {
        /// Key of the removed federation.
        key: FederationKey,
        /// IdP sessions that lost their pair for the requester.
        sessions_updated: usize,
        /// SP sessions unbound.
        bindings_removed: usize,
    },
    /// The NameID value was replaced.
    Rekeyed {
        /// Key before the change.
        old_key: FederationKey,
        /// Key after the change.
        new_key: FederationKey,
        /// IdP sessions that received the new pair.
        sessions_updated: usize,
        /// SP sessions moved to the new key.
        bindings_moved: usize,
    },
}

/// Processes ManageNameID requests for hosted IdPs and SPs.
pub struct ManageNameIdCoordinator {
    sessions: Arc<SessionIndexCache>,
    bindings: Arc<SpSessionBindings>,
    records: Arc<FederationRecordStore>,
    metadata: Arc<dyn MetadataProvider>,
    crypto: Arc<dyn CryptoService>,
    gate: SignatureGate,
}

impl ManageNameIdCoordinator {
    /// Creates a coordinator.
    #[must_use]
    pub fn new(
        sessions: Arc<SessionIndexCache>,
        bindings: Arc<SpSessionBindings>,
        records: Arc<FederationRecordStore>,
        metadata: Arc<dyn MetadataProvider>,
        crypto: Arc<dyn CryptoService>,
    ) -> Self {
        let gate = SignatureGate::new(metadata.clone(), crypto.clone());
        Self {
            sessions,
            bindings,
            records,
            metadata,
            crypto,
            gate,
        }
    }

    /// Processes a request and returns its terminal status.
    pub async fn process(
        &self,
        local: &LocalEntity,
        request: &ManageNameIdRequest,
    ) -> FederationStatus {
        match self.apply(local, request).await {
            Ok(_) => FederationStatus::Success,
            Err(e) => {
                tracing::info!(
                    issuer = %request.issuer,
                    error = %e,
                    "NameID management request not applied"
                );
                FederationStatus::from(e)
            }
        }
    }

    /// Processes a request and returns what changed.
    ///
    /// ## Errors
    ///
    /// - [`SamlError::SignatureInvalid`] / [`SamlError::InvalidRequest`]
    ///   before any state is touched
    /// - [`SamlError::RequestDenied`] for a requester outside the
    ///   affiliation the NameID is scoped to
    /// - [`SamlError::UnknownPrincipal`] if no federation matches
    pub async fn apply(
        &self,
        local: &LocalEntity,
        request: &ManageNameIdRequest,
    ) -> SamlResult<NameIdChange> {
        request.validate()?;
        self.gate
            .check(
                &local.realm,
                &local.entity_id,
                MessageKind::ManageNameIdRequest,
                request,
            )
            .await?;

        let keys = self.decryption_keys(local, request).await?;
        let name_id = request
            .identifier
            .resolve(self.crypto.as_ref(), &keys)
            .await?;
        let new_value = match &request.action {
            NameIdAction::Terminate => None,
            NameIdAction::NewId(value) => Some(value.clone()),
            NameIdAction::NewEncryptedId(blob) => {
                Some(decrypt_value::<String>(blob, self.crypto.as_ref(), &keys).await?)
            }
        };

        let issuer = request.issuer.as_str();
        let (remote, scoped) = match local.role {
            EntityRole::IdentityProvider => {
                self.records
                    .remote_scope(&local.realm, issuer, name_id.sp_name_qualifier.as_deref())
                    .await?
            }
            EntityRole::ServiceProvider => (issuer.to_string(), false),
        };
        let federation = Federation {
            local,
            remote: &remote,
            scoped,
            issuer,
        };

        match new_value {
            None => self.terminate(&federation, &name_id).await,
            Some(value) => self.rekey(&federation, &name_id, &value).await,
        }
    }

    async fn decryption_keys(
        &self,
        local: &LocalEntity,
        request: &ManageNameIdRequest,
    ) -> SamlResult<Vec<KeyReference>> {
        let encrypted = request.identifier.is_encrypted()
            || matches!(request.action, NameIdAction::NewEncryptedId(_));
        if !encrypted {
            return Ok(Vec::new());
        }
        Ok(self
            .metadata
            .decryption_keys(&local.realm, &local.entity_id)
            .await?)
    }

    /// Locks the IdP sessions that hold `name_id` for the requester.
    ///
    /// Sessions are found before their locks are taken; holders must check
    /// the pair is still there once locked.
    async fn lock_sessions(
        &self,
        federation: &Federation<'_>,
        name_id: &NameId,
    ) -> Vec<LockedSession<'_>> {
        if federation.local.role != EntityRole::IdentityProvider {
            return Vec::new();
        }
        let indexes = self.sessions.find_by_pair(&name_id.value, federation.issuer);
        self.sessions.lock_many(&indexes).await
    }

    async fn terminate(
        &self,
        federation: &Federation<'_>,
        name_id: &NameId,
    ) -> SamlResult<NameIdChange> {
        let key = federation.key(&name_id.value);
        let sessions = self.lock_sessions(federation, name_id).await;
        let guard = self.bindings.lock(&[&key]).await;
        let (user_id, record) = self.resolve(federation, &key, name_id).await?;

        if !self.records.remove(&record, &user_id).await {
            return Err(SamlError::Storage(
                "federation record could not be removed".into(),
            ));
        }
        let bindings_removed = guard.take(&key)?.len();
        drop(guard);

        let mut sessions_updated = 0;
        for locked in &sessions {
            match locked.remove_pair(federation.issuer).await {
                Ok(removal) if !removal.removed.is_empty() => sessions_updated += 1,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(session_index = %locked.session_index(), error = %e, "session gone");
                }
            }
        }
        drop(sessions);

        tracing::info!(
            local = %federation.local.entity_id,
            remote = %federation.remote,
            sessions_updated,
            bindings_removed,
            "NameID federation terminated"
        );
        Event::builder(EventType::NameIdTerminated)
            .realm(&federation.local.realm)
            .local(&federation.local.entity_id)
            .remote(federation.remote)
            .detail("requester", federation.issuer)
            .emit();

        Ok(NameIdChange::Terminated {
            key,
            sessions_updated,
            bindings_removed,
        })
    }

    async fn rekey(
        &self,
        federation: &Federation<'_>,
        name_id: &NameId,
        new_value: &str,
    ) -> SamlResult<NameIdChange> {
        let old_key = federation.key(&name_id.value);
        let new_key = federation.key(new_value);
        let sessions = self.lock_sessions(federation, name_id).await;
        let guard = self.bindings.lock(&[&old_key, &new_key]).await;
        let (user_id, record) = self.resolve(federation, &old_key, name_id).await?;

        let replacement = record.with_name_id_value(new_value);
        self.records.put(&replacement, &user_id).await?;
        let bindings_moved = guard.rekey(&old_key, &new_key)?;
        drop(guard);

        // The old pair stays: responses to requests already in flight
        // still reference it.
        let mut sessions_updated = 0;
        let pair = NameIdPair::new(replacement.name_id.clone(), federation.issuer);
        for locked in &sessions {
            let federated = locked.get().await.is_some_and(|session| {
                session
                    .pairs()
                    .iter()
                    .any(|p| p.sp_entity_id == federation.issuer && p.name_id.value == name_id.value)
            });
            if !federated {
                continue;
            }
            match locked.append_rekeyed_pair(pair.clone()).await {
                Ok(true) => sessions_updated += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::debug!(session_index = %locked.session_index(), error = %e, "session gone");
                }
            }
        }
        drop(sessions);

        tracing::info!(
            local = %federation.local.entity_id,
            remote = %federation.remote,
            sessions_updated,
            bindings_moved,
            "NameID federation re-keyed"
        );
        Event::builder(EventType::NameIdRekeyed)
            .realm(&federation.local.realm)
            .local(&federation.local.entity_id)
            .remote(federation.remote)
            .detail("requester", federation.issuer)
            .emit();

        Ok(NameIdChange::Rekeyed {
            old_key,
            new_key,
            sessions_updated,
            bindings_moved,
        })
    }

    /// Finds the owner and the record of a federation.
    async fn resolve(
        &self,
        federation: &Federation<'_>,
        key: &FederationKey,
        name_id: &NameId,
    ) -> SamlResult<(String, NameIdInfo)> {
        let unknown =
            || SamlError::UnknownPrincipal(format!("no federation with {}", federation.remote));
        let user_id = self.records.find_user(key).await?.ok_or_else(unknown)?;

        let local = federation.local;
        let record = if federation.scoped {
            self.records
                .get_by_affiliation(
                    &local.realm,
                    &user_id,
                    &local.entity_id,
                    federation.remote,
                    federation.issuer,
                )
                .await?
        } else {
            self.records
                .get(&user_id, &local.entity_id, federation.remote)
                .await?
        };
        let record = record
            .filter(|r| r.name_id.value == name_id.value)
            .ok_or_else(unknown)?;
        Ok((user_id, record))
    }
}

impl std::fmt::Debug for ManageNameIdCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManageNameIdCoordinator").finish_non_exhaustive()
    }
}

/// The federation a request targets, seen from the hosted entity.
struct Federation<'a> {
    local: &'a LocalEntity,
    /// Remote entity or affiliation the record is stored under.
    remote: &'a str,
    scoped: bool,
    issuer: &'a str,
}

impl Federation<'_> {
    fn key(&self, name_id_value: &str) -> FederationKey {
        match self.local.role {
            EntityRole::IdentityProvider => {
                FederationKey::derive(name_id_value, &self.local.entity_id, self.remote)
            }
            EntityRole::ServiceProvider => {
                FederationKey::derive(name_id_value, self.remote, &self.local.entity_id)
            }
        }
    }
}
