//! Single Logout coordination.
//!
//! A fan-out runs entirely under the lock of the session being logged out:
//! every remote party of the session is sent a logout request, each
//! dispatch is bounded by a timeout, the results are aggregated and the
//! local state is torn down whatever the remote parties answered.

use std::sync::Arc;

use fed_account::{FederationRecordStore, TransientNameIdCache};
use fed_core::config::LogoutConfig;
use fed_core::event::{Event, EventType};
use fed_model::{EntityRole, FederationKey, MessageKind, NameId, NameIdInfo, SamlBinding, ServiceKind};
use fed_session::{IdpSession, NameIdPair, SessionIndexCache, SpSession, SpSessionBindings};
use fed_spi::{CryptoService, MetadataProvider};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::binding;
use crate::error::{SamlError, SamlResult};
use crate::gate::SignatureGate;
use crate::outcome::FederationStatus;
use crate::transport::{OutboundMessage, Transport};
use crate::types::{Identifier, LogoutRequest, SamlMessage};

/// Terminal state of one fan-out target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum TargetOutcome {
    /// The party confirmed the logout, or the message was handed off.
    Acked,
    /// The party could not be reached or refused.
    Failed(String),
    /// No answer within the dispatch timeout.
    TimedOut,
}

/// Result of dispatching to one remote party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetResult {
    /// Remote entity ID.
    pub sp_entity_id: String,
    /// Binding used, if an endpoint was found.
    pub binding: Option<SamlBinding>,
    /// Terminal state.
    pub outcome: TargetOutcome,
}

impl TargetResult {
    /// Returns true unless the party acknowledged.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.outcome != TargetOutcome::Acked
    }
}

/// Progress of a fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanoutState {
    /// Targets enumerated, nothing sent yet.
    Initiated,
    /// Requests are in flight.
    Dispatching,
    /// Every target reached a terminal state.
    Aggregated,
}

/// One logout fan-out. Never persisted.
#[derive(Debug, Clone)]
pub struct LogoutFanoutJob {
    session_index: String,
    remaining: Vec<NameIdPair>,
    completed: Vec<TargetResult>,
    state: FanoutState,
    status: Option<FederationStatus>,
}

impl LogoutFanoutJob {
    /// Creates a job for the given targets.
    #[must_use]
    pub fn new(session_index: impl Into<String>, targets: Vec<NameIdPair>) -> Self {
        Self {
            session_index: session_index.into(),
            remaining: targets,
            completed: Vec::new(),
            state: FanoutState::Initiated,
            status: None,
        }
    }

    /// Marks the job as dispatching.
    pub fn begin(&mut self) {
        if self.state == FanoutState::Initiated {
            self.state = FanoutState::Dispatching;
        }
    }

    /// Records the terminal state of one target.
    pub fn record(&mut self, result: TargetResult) {
        self.remaining
            .retain(|p| p.sp_entity_id != result.sp_entity_id);
        self.completed.push(result);
    }

    /// Aggregates the job.
    ///
    /// Targets that never reported are recorded as timed out. The status
    /// is `Success` only if every target acknowledged.
    pub fn aggregate(&mut self) -> FederationStatus {
        if let Some(status) = &self.status {
            return status.clone();
        }
        for pair in std::mem::take(&mut self.remaining) {
            self.completed.push(TargetResult {
                sp_entity_id: pair.sp_entity_id,
                binding: None,
                outcome: TargetOutcome::TimedOut,
            });
        }

        let failed = self.failed();
        let status = if failed.is_empty() {
            FederationStatus::Success
        } else {
            FederationStatus::PartialFailure { failed }
        };
        self.state = FanoutState::Aggregated;
        self.status = Some(status.clone());
        status
    }

    /// Returns the entity IDs of the targets that did not acknowledge.
    #[must_use]
    pub fn failed(&self) -> Vec<String> {
        self.completed
            .iter()
            .filter(|r| r.is_failure())
            .map(|r| r.sp_entity_id.clone())
            .collect()
    }

    /// Returns the session index being logged out.
    #[must_use]
    pub fn session_index(&self) -> &str {
        &self.session_index
    }

    /// Returns the targets without a terminal state yet.
    #[must_use]
    pub fn remaining(&self) -> &[NameIdPair] {
        &self.remaining
    }

    /// Returns the targets with a terminal state.
    #[must_use]
    pub fn completed(&self) -> &[TargetResult] {
        &self.completed
    }

    /// Returns the job state.
    #[must_use]
    pub const fn state(&self) -> FanoutState {
        self.state
    }

    /// Returns the aggregate status once aggregated.
    #[must_use]
    pub const fn status(&self) -> Option<&FederationStatus> {
        self.status.as_ref()
    }
}

/// What triggered a fan-out and for which session.
#[derive(Debug, Clone)]
pub struct FanoutRequest {
    /// Realm of the hosted IdP.
    pub realm: String,
    /// Entity ID of the hosted IdP.
    pub local_entity_id: String,
    /// Session to log out.
    pub session_index: String,
    /// Binding the logout arrived with; `None` when no user agent is
    /// involved.
    pub initiating_binding: Option<SamlBinding>,
    /// SP that initiated the logout; it is torn down but not notified.
    pub initiator: Option<String>,
    /// Logout reason sent to the parties.
    pub reason: String,
}

impl FanoutRequest {
    /// Creates a back-channel fan-out request with the user reason.
    #[must_use]
    pub fn new(
        realm: impl Into<String>,
        local_entity_id: impl Into<String>,
        session_index: impl Into<String>,
    ) -> Self {
        Self {
            realm: realm.into(),
            local_entity_id: local_entity_id.into(),
            session_index: session_index.into(),
            initiating_binding: None,
            initiator: None,
            reason: LogoutRequest::REASON_USER.to_string(),
        }
    }

    /// Sets the binding the logout arrived with.
    #[must_use]
    pub fn with_binding(mut self, binding: Option<SamlBinding>) -> Self {
        self.initiating_binding = binding;
        self
    }

    /// Excludes the initiating SP from the dispatch.
    #[must_use]
    pub fn with_initiator(mut self, sp_entity_id: impl Into<String>) -> Self {
        self.initiator = Some(sp_entity_id.into());
        self
    }

    /// Sets the logout reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}

/// Result of a fan-out.
#[derive(Debug, Clone)]
pub struct FanoutOutcome {
    /// The aggregated job.
    pub job: LogoutFanoutJob,
    /// Aggregate status.
    pub status: FederationStatus,
    /// The session that was removed, if it existed.
    pub session: Option<IdpSession>,
}

/// Logout coordinator.
pub struct LogoutCoordinator {
    sessions: Arc<SessionIndexCache>,
    bindings: Arc<SpSessionBindings>,
    records: Arc<FederationRecordStore>,
    transient: Arc<TransientNameIdCache>,
    metadata: Arc<dyn MetadataProvider>,
    crypto: Arc<dyn CryptoService>,
    gate: SignatureGate,
    transport: Arc<dyn Transport>,
    config: LogoutConfig,
}

impl LogoutCoordinator {
    /// Creates a coordinator.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        sessions: Arc<SessionIndexCache>,
        bindings: Arc<SpSessionBindings>,
        records: Arc<FederationRecordStore>,
        transient: Arc<TransientNameIdCache>,
        metadata: Arc<dyn MetadataProvider>,
        crypto: Arc<dyn CryptoService>,
        transport: Arc<dyn Transport>,
        config: LogoutConfig,
    ) -> Self {
        let gate = SignatureGate::new(metadata.clone(), crypto.clone());
        Self {
            sessions,
            bindings,
            records,
            transient,
            metadata,
            crypto,
            gate,
            transport,
            config,
        }
    }

    /// Logs a hosted IdP session out of every remote party.
    ///
    /// The session lock is held from enumeration until the session and its
    /// federation records are gone, so a concurrent NameID change or
    /// re-authentication cannot interleave. Records of parties that failed
    /// are removed as well.
    pub async fn fan_out(&self, request: FanoutRequest) -> FanoutOutcome {
        let locked = self.sessions.lock(&request.session_index).await;
        let Some(session) = locked.get().await else {
            tracing::debug!(session_index = %request.session_index, "no session to log out");
            return FanoutOutcome {
                job: LogoutFanoutJob::new(&request.session_index, Vec::new()),
                status: FederationStatus::UnknownPrincipal,
                session: None,
            };
        };

        let targets: Vec<NameIdPair> = session
            .logout_targets()
            .into_iter()
            .filter(|p| request.initiator.as_deref() != Some(p.sp_entity_id.as_str()))
            .collect();
        let mut job = LogoutFanoutJob::new(&request.session_index, targets.clone());
        tracing::info!(
            session_index = %request.session_index,
            targets = targets.len(),
            binding = ?request.initiating_binding,
            "logout fan-out started"
        );

        job.begin();
        let results = if self.config.concurrent_dispatch {
            join_all(targets.iter().map(|p| self.dispatch_target(&request, p))).await
        } else {
            let mut results = Vec::with_capacity(targets.len());
            for pair in &targets {
                results.push(self.dispatch_target(&request, pair).await);
            }
            results
        };
        for result in results {
            job.record(result);
        }
        let status = job.aggregate();

        for pair in session.pairs() {
            self.purge_federation(&request.realm, &request.local_entity_id, pair)
                .await;
        }
        locked.remove().await;
        drop(locked);

        tracing::info!(
            session_index = %request.session_index,
            status = %status,
            "logout fan-out aggregated"
        );
        let event = Event::builder(EventType::LogoutCompleted)
            .realm(&request.realm)
            .local(&request.local_entity_id)
            .session(&request.session_index)
            .detail("targets", targets.len().to_string());
        match &status {
            FederationStatus::PartialFailure { failed } => event
                .failure(format!("{} parties did not confirm", failed.len()))
                .detail("failed", failed.join(","))
                .emit(),
            _ => event.emit(),
        }

        FanoutOutcome {
            job,
            status,
            session: Some(session),
        }
    }

    async fn dispatch_target(&self, request: &FanoutRequest, pair: &NameIdPair) -> TargetResult {
        let mut binding = None;
        let outcome = match tokio::time::timeout(
            self.config.dispatch_timeout(),
            self.send_logout(request, pair, &mut binding),
        )
        .await
        {
            Ok(Ok(())) => TargetOutcome::Acked,
            Ok(Err(e)) => TargetOutcome::Failed(e.to_string()),
            Err(_) => TargetOutcome::TimedOut,
        };

        match &outcome {
            TargetOutcome::Acked => {
                tracing::debug!(sp = %pair.sp_entity_id, binding = ?binding, "logout acknowledged");
                Event::builder(EventType::LogoutDispatched)
                    .local(&request.local_entity_id)
                    .remote(&pair.sp_entity_id)
                    .session(&request.session_index)
                    .emit();
            }
            failed => {
                tracing::warn!(sp = %pair.sp_entity_id, outcome = ?failed, "logout not confirmed");
                Event::builder(EventType::LogoutTargetFailed)
                    .failure(format!("{failed:?}"))
                    .local(&request.local_entity_id)
                    .remote(&pair.sp_entity_id)
                    .session(&request.session_index)
                    .emit();
            }
        }

        TargetResult {
            sp_entity_id: pair.sp_entity_id.clone(),
            binding,
            outcome,
        }
    }

    async fn send_logout(
        &self,
        request: &FanoutRequest,
        pair: &NameIdPair,
        selected: &mut Option<SamlBinding>,
    ) -> SamlResult<()> {
        let realm = request.realm.as_str();
        let sp = pair.sp_entity_id.as_str();
        let endpoints = self
            .metadata
            .endpoints(realm, sp, EntityRole::ServiceProvider, ServiceKind::SingleLogout)
            .await?;
        let endpoint = binding::select_slo(&endpoints, request.initiating_binding).ok_or_else(
            || SamlError::NoEndpoint {
                entity: sp.to_string(),
                service: "single logout".into(),
            },
        )?;
        *selected = Some(endpoint.binding);

        let mut message = LogoutRequest::new(&request.local_entity_id, pair.name_id.clone())
            .with_destination(&endpoint.location)
            .with_session_index(&request.session_index)
            .with_reason(&request.reason)
            .valid_for(self.config.request_validity());
        if self.metadata.wants_encrypted_name_id(realm, sp).await? {
            let certificate = self
                .metadata
                .encryption_certificate(realm, sp)
                .await?
                .ok_or_else(|| SamlError::Crypto(format!("no encryption certificate for {sp}")))?;
            message.identifier =
                Identifier::encrypt(&pair.name_id, self.crypto.as_ref(), &certificate).await?;
        }
        self.gate
            .sign_outbound(
                realm,
                &request.local_entity_id,
                sp,
                MessageKind::LogoutRequest,
                &mut message,
            )
            .await?;

        let request_id = message.id.clone();
        let reply = self
            .transport
            .dispatch(OutboundMessage {
                binding: endpoint.binding,
                destination: endpoint.location.clone(),
                message: SamlMessage::LogoutRequest(message),
                relay_state: None,
            })
            .await?;

        match reply {
            None => Ok(()),
            Some(SamlMessage::LogoutResponse(response)) => {
                response.validate()?;
                if response.in_response_to.as_deref() != Some(request_id.as_str()) {
                    return Err(SamlError::InvalidResponse(
                        "response does not answer the request".into(),
                    ));
                }
                self.gate
                    .check(
                        realm,
                        &request.local_entity_id,
                        MessageKind::LogoutResponse,
                        &response,
                    )
                    .await?;
                if response.is_success() {
                    if response.status.is_partial_logout() {
                        tracing::debug!(sp = %sp, "party reported a partial logout");
                    }
                    Ok(())
                } else {
                    Err(SamlError::InvalidResponse(format!(
                        "status {}",
                        response.status.status_code.value
                    )))
                }
            }
            Some(other) => Err(SamlError::InvalidResponse(format!(
                "unexpected {:?}",
                other.kind()
            ))),
        }
    }

    /// Removes the federation record behind one pair. Transient NameIDs
    /// only live in the reverse-lookup cache.
    async fn purge_federation(&self, realm: &str, local_entity_id: &str, pair: &NameIdPair) {
        let name_id = &pair.name_id;
        if name_id.is_transient() {
            self.transient.remove(&name_id.value);
            return;
        }

        let (remote, scoped) = match self
            .records
            .remote_scope(realm, &pair.sp_entity_id, name_id.sp_name_qualifier.as_deref())
            .await
        {
            Ok(scope) => scope,
            Err(e) => {
                tracing::warn!(sp = %pair.sp_entity_id, error = %e, "affiliation lookup failed");
                (pair.sp_entity_id.clone(), false)
            }
        };
        let key = FederationKey::derive(&name_id.value, local_entity_id, &remote);
        match self.records.find_user(&key).await {
            Ok(Some(user_id)) => {
                let record = NameIdInfo::new(
                    local_entity_id,
                    remote,
                    name_id.clone(),
                    EntityRole::IdentityProvider,
                )
                .with_affiliation(scoped);
                self.records.remove(&record, &user_id).await;
            }
            Ok(None) => {
                tracing::debug!(sp = %pair.sp_entity_id, "no federation record to remove");
            }
            Err(e) => {
                tracing::warn!(sp = %pair.sp_entity_id, error = %e, "federation lookup failed");
            }
        }
    }

    /// Unbinds the local SP sessions a remote IdP logs out.
    ///
    /// Only sessions whose IdP session index is listed are unbound; an
    /// empty list unbinds every session of the federation.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::UnknownPrincipal`] if no session matched.
    pub async fn terminate_sp_sessions(
        &self,
        local_entity_id: &str,
        idp_entity_id: &str,
        name_id: &NameId,
        session_indexes: &[String],
    ) -> SamlResult<Vec<SpSession>> {
        let key = FederationKey::derive(&name_id.value, idp_entity_id, local_entity_id);
        let guard = self.bindings.lock(&[&key]).await;
        let taken = guard.take_matching(&key, session_indexes)?;
        drop(guard);

        if taken.is_empty() {
            return Err(SamlError::UnknownPrincipal(format!(
                "no session bound for {idp_entity_id}"
            )));
        }
        tracing::info!(
            idp = %idp_entity_id,
            sessions = taken.len(),
            "SP sessions logged out by IdP"
        );
        Ok(taken)
    }

    /// Unbinds a local SP session that ended; returns how many federation
    /// keys it was bound under.
    pub async fn release_sp_session(&self, handle: &str) -> usize {
        let mut released = 0;
        for key in self.bindings.keys_for_handle(handle) {
            match self.bindings.remove(&key, handle).await {
                Ok(true) => released += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(error = %e, "failed to unbind SP session"),
            }
        }
        released
    }
}

impl std::fmt::Debug for LogoutCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogoutCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
