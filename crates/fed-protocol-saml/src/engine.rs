//! Caller-facing entry point.
//!
//! [`FederationEngine`] owns the caches and coordinators of one node. The
//! protocol layer hands it a decoded message together with the hosted
//! entity and role it arrived for; the engine answers with a terminal
//! status and, where the protocol expects one, the response to deliver.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use fed_account::{AccountFederationStore, FederationRecordStore, TransientNameIdCache};
use fed_cache::TokenRepository;
use fed_core::event::{Event, EventType};
use fed_core::{Config, KeyedLocks};
use fed_model::{
    EntityRole, FederationKey, MessageKind, NameId, NameIdInfo, SamlBinding, ServiceKind,
};
use fed_session::{
    NameIdPair, SessionIndexCache, SpSession, SpSessionBindings, IDP_SESSION_INDEX_PROPERTY,
    SP_SESSION_INDEX_PROPERTY,
};
use fed_spi::{LocalEntity, Ports, SessionInvalidationListener};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::artifact::ResponseCache;
use crate::binding;
use crate::error::{SamlError, SamlResult};
use crate::gate::SignatureGate;
use crate::logout::{FanoutRequest, LogoutCoordinator};
use crate::manage_name_id::ManageNameIdCoordinator;
use crate::outcome::FederationStatus;
use crate::transport::Transport;
use crate::types::{
    LogoutRequest, ManageNameIdRequest, SamlMessage, StatusResponse,
};

/// Repository namespace of artifact-bound responses.
const ARTIFACT_NAMESPACE: &str = "artifact";

/// Repository namespace of pending front-channel logout responses.
const PENDING_NAMESPACE: &str = "slo-response";

/// What the caller asks the engine to do.
#[derive(Debug, Clone)]
pub enum ProtocolVerb {
    /// Log a hosted IdP session out of every SP it is federated with.
    InitiateLogout {
        /// Session index to log out.
        session_index: String,
        /// Logout reason; the user reason when absent.
        reason: Option<String>,
    },
    /// Inbound logout request.
    LogoutRequest(LogoutRequest),
    /// Inbound ManageNameID request.
    ManageNameId(ManageNameIdRequest),
    /// Artifact resolution.
    ResolveArtifact {
        /// Artifact handle.
        handle: String,
    },
}

/// A request to the engine.
#[derive(Debug, Clone)]
pub struct FederationRequest {
    /// What to do.
    pub verb: ProtocolVerb,
    /// Role the hosted entity acts in.
    pub role: EntityRole,
    /// Meta alias of the hosted entity.
    pub meta_alias: String,
    /// Binding the request arrived with.
    pub binding: Option<SamlBinding>,
    /// Relay state to echo back.
    pub relay_state: Option<String>,
}

impl FederationRequest {
    /// Creates a request without binding hint or relay state.
    #[must_use]
    pub fn new(verb: ProtocolVerb, role: EntityRole, meta_alias: impl Into<String>) -> Self {
        Self {
            verb,
            role,
            meta_alias: meta_alias.into(),
            binding: None,
            relay_state: None,
        }
    }

    /// Sets the binding the request arrived with.
    #[must_use]
    pub const fn with_binding(mut self, binding: SamlBinding) -> Self {
        self.binding = Some(binding);
        self
    }

    /// Sets the relay state.
    #[must_use]
    pub fn with_relay_state(mut self, relay_state: impl Into<String>) -> Self {
        self.relay_state = Some(relay_state.into());
        self
    }
}

/// Payload of a response delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// The message itself.
    Message(SamlMessage),
    /// An artifact handle; the message waits in the artifact cache.
    Artifact(String),
}

/// A response the caller has to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseDelivery {
    /// Binding to deliver with.
    pub binding: SamlBinding,
    /// Endpoint URL; `None` for an answer on the same SOAP exchange.
    pub destination: Option<String>,
    /// What to deliver.
    pub body: ResponseBody,
    /// Relay state to echo back.
    pub relay_state: Option<String>,
}

/// The engine's answer.
#[derive(Debug, Clone)]
pub struct FederationReply {
    /// Terminal status.
    pub status: FederationStatus,
    /// Response to deliver, if the exchange calls for one.
    pub response: Option<ResponseDelivery>,
}

impl FederationReply {
    fn status(status: FederationStatus) -> Self {
        Self {
            status,
            response: None,
        }
    }
}

struct EngineInner {
    config: Config,
    ports: Ports,
    repository: Arc<dyn TokenRepository>,
    sessions: Arc<SessionIndexCache>,
    bindings: Arc<SpSessionBindings>,
    records: Arc<FederationRecordStore>,
    transient: Arc<TransientNameIdCache>,
    artifacts: ResponseCache<SamlMessage>,
    pending: ResponseCache<SamlMessage>,
    logout: LogoutCoordinator,
    name_ids: ManageNameIdCoordinator,
    gate: SignatureGate,
    handle_locks: KeyedLocks,
}

/// Federation session and logout engine of one node.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct FederationEngine {
    inner: Arc<EngineInner>,
}

impl FederationEngine {
    /// Assembles an engine from its collaborators.
    #[must_use]
    pub fn new(
        config: Config,
        ports: Ports,
        repository: Arc<dyn TokenRepository>,
        accounts: Arc<dyn AccountFederationStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let sessions = Arc::new(SessionIndexCache::new(
            repository.clone(),
            ports.sessions.clone(),
            config.session.fallback_ttl(),
        ));
        let bindings = Arc::new(SpSessionBindings::new());
        let records = Arc::new(FederationRecordStore::new(accounts, ports.metadata.clone()));
        let transient = Arc::new(TransientNameIdCache::new());
        let default_ttl = config.artifact.default_ttl();

        let logout = LogoutCoordinator::new(
            sessions.clone(),
            bindings.clone(),
            records.clone(),
            transient.clone(),
            ports.metadata.clone(),
            ports.crypto.clone(),
            transport,
            config.logout.clone(),
        );
        let name_ids = ManageNameIdCoordinator::new(
            sessions.clone(),
            bindings.clone(),
            records.clone(),
            ports.metadata.clone(),
            ports.crypto.clone(),
        );

        Self {
            inner: Arc::new(EngineInner {
                gate: SignatureGate::new(ports.metadata.clone(), ports.crypto.clone()),
                artifacts: ResponseCache::new(ARTIFACT_NAMESPACE, repository.clone(), default_ttl),
                pending: ResponseCache::new(PENDING_NAMESPACE, repository.clone(), default_ttl),
                handle_locks: KeyedLocks::new(),
                config,
                ports,
                repository,
                sessions,
                bindings,
                records,
                transient,
                logout,
                name_ids,
            }),
        }
    }

    /// Handles one protocol exchange.
    pub async fn handle(&self, request: FederationRequest) -> FederationReply {
        let local = match self.resolve_local(&request.meta_alias, request.role).await {
            Ok(local) => local,
            Err(e) => {
                tracing::warn!(meta_alias = %request.meta_alias, error = %e, "request for unknown entity");
                return FederationReply::status(e.into());
            }
        };

        match request.verb {
            ProtocolVerb::InitiateLogout {
                session_index,
                reason,
            } => {
                self.initiate_logout(&local, &session_index, request.binding, reason)
                    .await
            }
            ProtocolVerb::LogoutRequest(message) => match local.role {
                EntityRole::IdentityProvider => {
                    self.idp_logout_request(&local, message, request.binding, request.relay_state)
                        .await
                }
                EntityRole::ServiceProvider => {
                    self.sp_logout_request(&local, message, request.binding, request.relay_state)
                        .await
                }
            },
            ProtocolVerb::ManageNameId(message) => {
                self.manage_name_id(&local, message, request.binding, request.relay_state)
                    .await
            }
            ProtocolVerb::ResolveArtifact { handle } => self.resolve_artifact(&local, &handle).await,
        }
    }

    async fn resolve_local(&self, meta_alias: &str, role: EntityRole) -> SamlResult<LocalEntity> {
        let local = self.inner.ports.metadata.resolve_meta_alias(meta_alias).await?;
        if local.role != role {
            return Err(SamlError::Unsupported(format!(
                "{meta_alias} is not a hosted {role}"
            )));
        }
        Ok(local)
    }

    async fn initiate_logout(
        &self,
        local: &LocalEntity,
        session_index: &str,
        binding: Option<SamlBinding>,
        reason: Option<String>,
    ) -> FederationReply {
        if local.role != EntityRole::IdentityProvider {
            return FederationReply::status(
                SamlError::Unsupported("logout fan-out is run by a hosted IdP".into()).into(),
            );
        }

        let request = FanoutRequest::new(&local.realm, &local.entity_id, session_index)
            .with_binding(binding)
            .with_reason(reason.unwrap_or_else(|| LogoutRequest::REASON_USER.to_string()));
        let outcome = self.inner.logout.fan_out(request).await;
        if let Some(session) = &outcome.session {
            self.invalidate_local(&session.local_session_handle).await;
        }
        FederationReply::status(outcome.status)
    }

    /// SP-initiated logout received by a hosted IdP.
    async fn idp_logout_request(
        &self,
        local: &LocalEntity,
        message: LogoutRequest,
        binding: Option<SamlBinding>,
        relay_state: Option<String>,
    ) -> FederationReply {
        let status = match self.idp_logout(local, &message, binding).await {
            Ok(status) => status,
            Err(e) => FederationStatus::from(e),
        };

        let response = self
            .respond(
                local,
                &message.issuer,
                &message.id,
                ServiceKind::SingleLogout,
                MessageKind::LogoutResponse,
                binding,
                &status,
                relay_state,
            )
            .await;
        if let (Some(delivery), Some(binding)) = (&response, binding) {
            if binding.is_front_channel() {
                if let ResponseBody::Message(message_out) = &delivery.body {
                    if let Err(e) = self
                        .inner
                        .pending
                        .store_with_key(&message.id, message_out.clone())
                        .await
                    {
                        tracing::warn!(error = %e, "failed to cache pending logout response");
                    }
                }
            }
        }
        FederationReply { status, response }
    }

    async fn idp_logout(
        &self,
        local: &LocalEntity,
        message: &LogoutRequest,
        binding: Option<SamlBinding>,
    ) -> SamlResult<FederationStatus> {
        message.validate()?;
        self.inner
            .gate
            .check(&local.realm, &local.entity_id, MessageKind::LogoutRequest, message)
            .await?;
        let name_id = self.resolve_identifier(local, message).await?;
        let issuer = message.issuer.as_str();

        let mut session_indexes = Vec::new();
        if message.session_indexes.is_empty() {
            session_indexes = self.inner.sessions.find_by_pair(&name_id.value, issuer);
        } else {
            for idx in &message.session_indexes {
                let owned = self.inner.sessions.get(idx).await.is_some_and(|s| {
                    s.pairs()
                        .iter()
                        .any(|p| p.sp_entity_id == issuer && p.name_id.value == name_id.value)
                });
                if owned {
                    session_indexes.push(idx.clone());
                }
            }
        }
        if session_indexes.is_empty() {
            return Err(SamlError::UnknownPrincipal(format!(
                "no session federated with {issuer}"
            )));
        }

        let reason = message
            .reason
            .clone()
            .unwrap_or_else(|| LogoutRequest::REASON_USER.to_string());
        let mut aggregate: Option<FederationStatus> = None;
        for idx in session_indexes {
            let request = FanoutRequest::new(&local.realm, &local.entity_id, &idx)
                .with_binding(binding)
                .with_initiator(issuer)
                .with_reason(&reason);
            let outcome = self.inner.logout.fan_out(request).await;
            let Some(session) = outcome.session else {
                continue;
            };
            self.invalidate_local(&session.local_session_handle).await;
            aggregate = Some(match aggregate {
                Some(previous) => previous.merge(outcome.status),
                None => outcome.status,
            });
        }
        Ok(aggregate.unwrap_or(FederationStatus::UnknownPrincipal))
    }

    /// IdP-initiated logout received by a hosted SP.
    async fn sp_logout_request(
        &self,
        local: &LocalEntity,
        message: LogoutRequest,
        binding: Option<SamlBinding>,
        relay_state: Option<String>,
    ) -> FederationReply {
        let status = match self.sp_logout(local, &message).await {
            Ok(()) => FederationStatus::Success,
            Err(e) => FederationStatus::from(e),
        };
        let response = self
            .respond(
                local,
                &message.issuer,
                &message.id,
                ServiceKind::SingleLogout,
                MessageKind::LogoutResponse,
                binding,
                &status,
                relay_state,
            )
            .await;
        FederationReply { status, response }
    }

    async fn sp_logout(&self, local: &LocalEntity, message: &LogoutRequest) -> SamlResult<()> {
        message.validate()?;
        self.inner
            .gate
            .check(&local.realm, &local.entity_id, MessageKind::LogoutRequest, message)
            .await?;
        let name_id = self.resolve_identifier(local, message).await?;

        let sessions = self
            .inner
            .logout
            .terminate_sp_sessions(
                &local.entity_id,
                &message.issuer,
                &name_id,
                &message.session_indexes,
            )
            .await?;
        for session in sessions {
            self.invalidate_local(&session.handle).await;
        }
        Ok(())
    }

    async fn manage_name_id(
        &self,
        local: &LocalEntity,
        message: ManageNameIdRequest,
        binding: Option<SamlBinding>,
        relay_state: Option<String>,
    ) -> FederationReply {
        let status = self.inner.name_ids.process(local, &message).await;
        let response = self
            .respond(
                local,
                &message.issuer,
                &message.id,
                ServiceKind::ManageNameId,
                MessageKind::ManageNameIdResponse,
                binding,
                &status,
                relay_state,
            )
            .await;
        FederationReply { status, response }
    }

    async fn resolve_artifact(&self, local: &LocalEntity, handle: &str) -> FederationReply {
        let Some(message) = self.inner.artifacts.take(handle).await else {
            tracing::info!("unknown or consumed artifact");
            return FederationReply::status(FederationStatus::RequesterError {
                reason: "unknown or consumed artifact".into(),
            });
        };

        Event::builder(EventType::ArtifactResolved)
            .realm(&local.realm)
            .local(&local.entity_id)
            .detail("kind", format!("{:?}", message.kind()))
            .emit();
        FederationReply {
            status: FederationStatus::Success,
            response: Some(ResponseDelivery {
                binding: SamlBinding::Soap,
                destination: None,
                body: ResponseBody::Message(message),
                relay_state: None,
            }),
        }
    }

    async fn resolve_identifier(
        &self,
        local: &LocalEntity,
        message: &LogoutRequest,
    ) -> SamlResult<NameId> {
        let keys = if message.identifier.is_encrypted() {
            self.inner
                .ports
                .metadata
                .decryption_keys(&local.realm, &local.entity_id)
                .await?
        } else {
            Vec::new()
        };
        message
            .identifier
            .resolve(self.inner.ports.crypto.as_ref(), &keys)
            .await
    }

    /// Composes and routes the status response to an inbound request.
    ///
    /// Returns `None` when no route back to the requester exists; the
    /// status is still reported to the caller.
    #[allow(clippy::too_many_arguments)]
    async fn respond(
        &self,
        local: &LocalEntity,
        requester: &str,
        request_id: &str,
        service: ServiceKind,
        kind: MessageKind,
        binding: Option<SamlBinding>,
        status: &FederationStatus,
        relay_state: Option<String>,
    ) -> Option<ResponseDelivery> {
        if requester.is_empty() {
            return None;
        }
        match self
            .route_response(local, requester, request_id, service, kind, binding, status, relay_state)
            .await
        {
            Ok(delivery) => Some(delivery),
            Err(e) => {
                tracing::warn!(requester = %requester, error = %e, "response not deliverable");
                None
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn route_response(
        &self,
        local: &LocalEntity,
        requester: &str,
        request_id: &str,
        service: ServiceKind,
        kind: MessageKind,
        binding: Option<SamlBinding>,
        status: &FederationStatus,
        relay_state: Option<String>,
    ) -> SamlResult<ResponseDelivery> {
        let mut response =
            StatusResponse::new(&local.entity_id, status.to_status()).in_response_to(request_id);

        let (binding, destination) = match binding {
            Some(b) if b.is_synchronous() => (b, None),
            preferred => {
                let endpoints = self
                    .inner
                    .ports
                    .metadata
                    .endpoints(&local.realm, requester, local.role.peer(), service)
                    .await?;
                let endpoint = binding::select(&endpoints, preferred).ok_or_else(|| {
                    SamlError::NoEndpoint {
                        entity: requester.to_string(),
                        service: format!("{service:?}"),
                    }
                })?;
                (endpoint.binding, Some(endpoint.response_target().to_string()))
            }
        };
        response.destination.clone_from(&destination);

        self.inner
            .gate
            .sign_outbound(&local.realm, &local.entity_id, requester, kind, &mut response)
            .await?;
        let message = match kind {
            MessageKind::ManageNameIdResponse => SamlMessage::ManageNameIdResponse(response),
            _ => SamlMessage::LogoutResponse(response),
        };

        let body = if binding == SamlBinding::HttpArtifact {
            let handle = self.inner.artifacts.store(message).await?;
            Event::builder(EventType::ArtifactIssued)
                .realm(&local.realm)
                .local(&local.entity_id)
                .remote(requester)
                .emit();
            ResponseBody::Artifact(handle)
        } else {
            ResponseBody::Message(message)
        };

        Ok(ResponseDelivery {
            binding,
            destination,
            body,
            relay_state,
        })
    }

    async fn invalidate_local(&self, handle: &str) {
        if let Err(e) = self.inner.ports.sessions.invalidate(handle).await {
            tracing::warn!(error = %e, "failed to invalidate local session");
        }
    }

    /// Registers a federation created while authenticating for an SP.
    ///
    /// Creates the IdP session of the local session if needed, adds the
    /// `(NameID, SP)` pair and records the federation. Transient NameIDs
    /// only go to the reverse-lookup cache. Returns the session index.
    ///
    /// ## Errors
    ///
    /// Fails if the meta alias is not a hosted IdP, the local session is
    /// unknown, the SP is not a member of `affiliation_id`, or the record
    /// cannot be stored.
    pub async fn record_idp_federation(
        &self,
        meta_alias: &str,
        local_session_handle: &str,
        name_id: NameId,
        sp_entity_id: &str,
        affiliation_id: Option<&str>,
    ) -> SamlResult<String> {
        let inner = &self.inner;
        let local = self
            .resolve_local(meta_alias, EntityRole::IdentityProvider)
            .await?;
        let local_sessions = &inner.ports.sessions;
        let user_id = local_sessions.principal_name(local_session_handle).await?;
        if let Some(affiliation) = affiliation_id {
            inner
                .records
                .require_member(&local.realm, affiliation, sp_entity_id)
                .await?;
        }

        let handle_guard = inner.handle_locks.lock(local_session_handle).await;
        let session_index = match local_sessions
            .property(local_session_handle, IDP_SESSION_INDEX_PROPERTY)
            .await?
        {
            Some(idx) => idx,
            None => {
                let idx = fed_crypto::generate_session_index();
                local_sessions
                    .set_property(local_session_handle, IDP_SESSION_INDEX_PROPERTY, &idx)
                    .await?;
                idx
            }
        };
        let locked = inner.sessions.lock(&session_index).await;
        let (_, created) = locked
            .get_or_create(local_session_handle, meta_alias)
            .await;
        locked
            .add_pair(NameIdPair::new(name_id.clone(), sp_entity_id))
            .await?;
        drop(handle_guard);

        // Records of a session only change under its lock.
        if name_id.is_transient() {
            let left = local_sessions.time_left(local_session_handle).await?;
            let ttl = left.unwrap_or_else(|| inner.config.session.fallback_ttl());
            inner.transient.insert(
                &name_id.value,
                &user_id,
                chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(2)),
            );
        } else {
            let remote = affiliation_id.unwrap_or(sp_entity_id);
            let existing = inner.records.get(&user_id, &local.entity_id, remote).await?;
            if existing.as_ref().map(|r| &r.name_id) != Some(&name_id) {
                let record = NameIdInfo::new(
                    &local.entity_id,
                    remote,
                    name_id,
                    EntityRole::IdentityProvider,
                )
                .with_affiliation(affiliation_id.is_some());
                inner.records.put(&record, &user_id).await?;
            }
        }
        drop(locked);

        if created {
            local_sessions
                .add_invalidation_listener(local_session_handle, self.listener())
                .await?;
        }
        Ok(session_index)
    }

    /// Registers a federation a remote IdP asserted for a local session.
    ///
    /// ## Errors
    ///
    /// Fails if the meta alias is not a hosted SP, the local session is
    /// unknown, or the record cannot be stored.
    pub async fn record_sp_federation(
        &self,
        meta_alias: &str,
        local_session_handle: &str,
        idp_entity_id: &str,
        name_id: NameId,
        idp_session_index: Option<&str>,
    ) -> SamlResult<FederationKey> {
        let inner = &self.inner;
        let local = self
            .resolve_local(meta_alias, EntityRole::ServiceProvider)
            .await?;
        let local_sessions = &inner.ports.sessions;
        let user_id = local_sessions.principal_name(local_session_handle).await?;

        let record = NameIdInfo::new(
            &local.entity_id,
            idp_entity_id,
            name_id,
            EntityRole::ServiceProvider,
        );
        let key = record.federation_key();
        let guard = inner.bindings.lock(&[&key]).await;
        if !record.name_id.is_transient() {
            inner.records.put(&record, &user_id).await?;
        }
        let added = guard.add(
            &key,
            SpSession::new(
                local_session_handle,
                idp_session_index.map(str::to_string),
                meta_alias,
            ),
        )?;
        drop(guard);

        if let Some(idx) = idp_session_index {
            local_sessions
                .set_property(local_session_handle, SP_SESSION_INDEX_PROPERTY, idx)
                .await?;
        }
        if added {
            local_sessions
                .add_invalidation_listener(local_session_handle, self.listener())
                .await?;
        }
        Ok(key)
    }

    /// Listener registered with the local session provider.
    ///
    /// It holds the engine weakly; the provider is owned by the engine.
    fn listener(&self) -> Arc<dyn SessionInvalidationListener> {
        Arc::new(EngineListener {
            inner: Arc::downgrade(&self.inner),
        })
    }

    /// Returns the pending logout response of a front-channel request
    /// without consuming it.
    pub async fn pending_response(&self, request_id: &str) -> Option<SamlMessage> {
        self.inner.pending.peek(request_id).await
    }

    /// Consumes the pending logout response of a front-channel request.
    pub async fn complete_pending_response(&self, request_id: &str) -> Option<SamlMessage> {
        self.inner.pending.take(request_id).await
    }

    /// Removes expired cache entries on this node; returns how many.
    pub fn sweep(&self) -> usize {
        let inner = &self.inner;
        inner.artifacts.sweep() + inner.pending.sweep() + inner.transient.purge_expired()
    }

    /// Starts the background sweep.
    ///
    /// Every `interval` the node's caches are swept and the repository is
    /// asked to purge expired entries. The task ends when `shutdown`
    /// turns true or its sender is dropped.
    pub fn spawn_sweeper(
        &self,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tracing::info!(interval_secs = interval.as_secs(), "sweeper started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let swept = engine.sweep();
                        let purged = match engine.inner.repository.delete_expired().await {
                            Ok(purged) => purged,
                            Err(e) => {
                                tracing::warn!(error = %e, "repository purge failed");
                                0
                            }
                        };
                        if swept > 0 || purged > 0 {
                            tracing::debug!(swept, purged, "sweep finished");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("sweeper stopped");
        })
    }

    /// Returns the session index cache.
    #[must_use]
    pub fn sessions(&self) -> &SessionIndexCache {
        &self.inner.sessions
    }

    /// Returns the SP session bindings.
    #[must_use]
    pub fn bindings(&self) -> &SpSessionBindings {
        &self.inner.bindings
    }

    /// Returns the federation record store.
    #[must_use]
    pub fn records(&self) -> &FederationRecordStore {
        &self.inner.records
    }

    /// Returns the transient NameID cache.
    #[must_use]
    pub fn transient_name_ids(&self) -> &TransientNameIdCache {
        &self.inner.transient
    }

    /// Returns the artifact cache.
    #[must_use]
    pub fn artifacts(&self) -> &ResponseCache<SamlMessage> {
        &self.inner.artifacts
    }

    /// Returns the logout coordinator.
    #[must_use]
    pub fn logout(&self) -> &LogoutCoordinator {
        &self.inner.logout
    }

    /// Returns the NameID management coordinator.
    #[must_use]
    pub fn name_ids(&self) -> &ManageNameIdCoordinator {
        &self.inner.name_ids
    }

    async fn idp_sessions_of(&self, handle: &str) -> Vec<String> {
        match self
            .inner
            .ports
            .sessions
            .property(handle, IDP_SESSION_INDEX_PROPERTY)
            .await
        {
            Ok(Some(idx)) => vec![idx],
            Ok(None) | Err(_) => self.inner.sessions.find_by_handle(handle).await,
        }
    }
}

#[async_trait]
impl SessionInvalidationListener for FederationEngine {
    async fn session_invalidated(&self, handle: &str) {
        let released = self.inner.logout.release_sp_session(handle).await;
        if released > 0 {
            tracing::debug!(bindings = released, "SP session bindings released");
        }

        for idx in self.idp_sessions_of(handle).await {
            let Some(session) = self.inner.sessions.get(&idx).await else {
                continue;
            };
            let local = match self
                .inner
                .ports
                .metadata
                .resolve_meta_alias(&session.meta_alias)
                .await
            {
                Ok(local) => local,
                Err(e) => {
                    tracing::warn!(meta_alias = %session.meta_alias, error = %e, "cannot log out session");
                    continue;
                }
            };
            let outcome = self
                .inner
                .logout
                .fan_out(FanoutRequest::new(&local.realm, &local.entity_id, &idx))
                .await;
            tracing::info!(session_index = %idx, status = %outcome.status, "session invalidation logged out");
        }
    }
}

/// Forwards invalidations to an engine that is still alive.
struct EngineListener {
    inner: Weak<EngineInner>,
}

#[async_trait]
impl SessionInvalidationListener for EngineListener {
    async fn session_invalidated(&self, handle: &str) {
        match self.inner.upgrade() {
            Some(inner) => FederationEngine { inner }.session_invalidated(handle).await,
            None => tracing::debug!("engine dropped, ignoring session invalidation"),
        }
    }
}

impl std::fmt::Debug for FederationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederationEngine")
            .field("sessions", &self.inner.sessions)
            .field("bindings", &self.inner.bindings.len())
            .field("artifacts", &self.inner.artifacts)
            .finish_non_exhaustive()
    }
}
