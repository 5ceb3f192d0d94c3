//! Common test utilities and fixtures.
//!
//! Every port of the engine has an in-memory fake here. Remote parties
//! are simulated by [`ScriptedTransport`], which answers SOAP logout
//! requests the way each party is scripted to.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fed_account::InMemoryAccountStore;
use fed_cache::InMemoryTokenRepository;
use fed_core::Config;
use fed_model::{EntityRole, Endpoint, MessageKind, NameId, SamlBinding, ServiceKind};
use fed_protocol_saml::{
    DispatchError, FederationEngine, OutboundMessage, SamlMessage, SignedMessage, Status,
    StatusResponse, Transport,
};
use fed_spi::{
    Certificate, CryptoService, KeyReference, LocalEntity, LocalSessionProvider, MetadataProvider,
    Ports, SessionInvalidationListener, SpiError, SpiResult,
};
use parking_lot::{Mutex, RwLock};

pub const REALM: &str = "test";
pub const IDP_ALIAS: &str = "/idp";
pub const SP_ALIAS: &str = "/sp";
pub const IDP: &str = "https://idp.example.org";
pub const HOSTED_SP: &str = "https://app.example.org";
pub const PARTNER_IDP: &str = "https://partner.example.net";
pub const SP1: &str = "https://sp1.example.com";
pub const SP2: &str = "https://sp2.example.com";
pub const SP3: &str = "https://sp3.example.com";
pub const AFFILIATION: &str = "https://affiliation.example.com";

/// Endpoint URL of an entity for a service and binding.
pub fn endpoint_url(entity_id: &str, service: ServiceKind, binding: SamlBinding) -> String {
    let service = match service {
        ServiceKind::SingleLogout => "slo",
        ServiceKind::ManageNameId => "mni",
        ServiceKind::SingleSignOn => "sso",
        ServiceKind::ArtifactResolution => "ars",
    };
    let binding = match binding {
        SamlBinding::HttpPost => "post",
        SamlBinding::HttpRedirect => "redirect",
        SamlBinding::HttpArtifact => "artifact",
        SamlBinding::Soap => "soap",
        SamlBinding::Paos => "paos",
    };
    format!("{entity_id}/{service}/{binding}")
}

fn entity_of(destination: &str) -> &str {
    ["/slo/", "/mni/", "/sso/", "/ars/"]
        .iter()
        .find_map(|s| destination.rsplit_once(s).map(|(entity, _)| entity))
        .unwrap_or(destination)
}

/// Signing key of an entity; its certificate carries the same name.
pub fn key_of(entity_id: &str) -> KeyReference {
    KeyReference(format!("key:{entity_id}"))
}

fn certificate_of(entity_id: &str) -> Certificate {
    Certificate(format!("key:{entity_id}").into_bytes())
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Metadata with mutable per-entity policy.
#[derive(Default)]
pub struct FakeMetadata {
    endpoints: RwLock<HashMap<(String, ServiceKind), Vec<Endpoint>>>,
    signed: RwLock<HashSet<(String, MessageKind)>>,
    encrypted: RwLock<HashSet<String>>,
    affiliations: RwLock<HashMap<String, Vec<String>>>,
}

impl FakeMetadata {
    /// Declares endpoints of an entity for a service, first one default.
    pub fn set_endpoints(&self, entity_id: &str, service: ServiceKind, bindings: &[SamlBinding]) {
        let endpoints = bindings
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let endpoint = Endpoint::new(*b, endpoint_url(entity_id, service, *b));
                if i == 0 {
                    endpoint.as_default()
                } else {
                    endpoint
                }
            })
            .collect();
        self.endpoints
            .write()
            .insert((entity_id.to_string(), service), endpoints);
    }

    /// Declares a remote party with SOAP and Redirect logout and SOAP
    /// NameID management.
    pub fn add_party(&self, entity_id: &str) {
        self.set_endpoints(
            entity_id,
            ServiceKind::SingleLogout,
            &[SamlBinding::Soap, SamlBinding::HttpRedirect],
        );
        self.set_endpoints(entity_id, ServiceKind::ManageNameId, &[SamlBinding::Soap]);
    }

    /// Makes `entity_id` require signed messages of `kind`.
    pub fn require_signed(&self, entity_id: &str, kind: MessageKind) {
        self.signed.write().insert((entity_id.to_string(), kind));
    }

    /// Makes `entity_id` want encrypted NameIDs.
    pub fn require_encrypted(&self, entity_id: &str) {
        self.encrypted.write().insert(entity_id.to_string());
    }

    /// Declares an affiliation and its members.
    pub fn add_affiliation(&self, affiliation: &str, members: &[&str]) {
        self.affiliations.write().insert(
            affiliation.to_string(),
            members.iter().map(|m| (*m).to_string()).collect(),
        );
    }
}

#[async_trait]
impl MetadataProvider for FakeMetadata {
    async fn resolve_meta_alias(&self, meta_alias: &str) -> SpiResult<LocalEntity> {
        let (entity_id, role) = match meta_alias {
            IDP_ALIAS => (IDP, EntityRole::IdentityProvider),
            SP_ALIAS => (HOSTED_SP, EntityRole::ServiceProvider),
            other => return Err(SpiError::NotFound(other.to_string())),
        };
        Ok(LocalEntity {
            realm: REALM.to_string(),
            entity_id: entity_id.to_string(),
            role,
        })
    }

    async fn endpoints(
        &self,
        _realm: &str,
        entity_id: &str,
        _role: EntityRole,
        service: ServiceKind,
    ) -> SpiResult<Vec<Endpoint>> {
        Ok(self
            .endpoints
            .read()
            .get(&(entity_id.to_string(), service))
            .cloned()
            .unwrap_or_default())
    }

    async fn wants_signed(&self, _realm: &str, entity_id: &str, kind: MessageKind) -> SpiResult<bool> {
        Ok(self.signed.read().contains(&(entity_id.to_string(), kind)))
    }

    async fn wants_encrypted_name_id(&self, _realm: &str, entity_id: &str) -> SpiResult<bool> {
        Ok(self.encrypted.read().contains(entity_id))
    }

    async fn is_affiliation(&self, _realm: &str, id: &str) -> SpiResult<bool> {
        Ok(self.affiliations.read().contains_key(id))
    }

    async fn is_affiliation_member(
        &self,
        _realm: &str,
        affiliation: &str,
        entity_id: &str,
    ) -> SpiResult<bool> {
        Ok(self
            .affiliations
            .read()
            .get(affiliation)
            .is_some_and(|members| members.iter().any(|m| m == entity_id)))
    }

    async fn signing_certificates(&self, _realm: &str, entity_id: &str) -> SpiResult<Vec<Certificate>> {
        Ok(vec![certificate_of(entity_id)])
    }

    async fn encryption_certificate(
        &self,
        _realm: &str,
        entity_id: &str,
    ) -> SpiResult<Option<Certificate>> {
        Ok(Some(certificate_of(entity_id)))
    }

    async fn decryption_keys(&self, _realm: &str, entity_id: &str) -> SpiResult<Vec<KeyReference>> {
        Ok(vec![key_of(entity_id)])
    }

    async fn signing_credential(
        &self,
        _realm: &str,
        entity_id: &str,
    ) -> SpiResult<Option<KeyReference>> {
        Ok(Some(key_of(entity_id)))
    }
}

// ---------------------------------------------------------------------------
// Crypto
// ---------------------------------------------------------------------------

/// Keyed digests instead of real signatures, prefix tagging instead of
/// real encryption.
#[derive(Debug, Default)]
pub struct FakeCrypto;

fn tag(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut signature = key.to_vec();
    signature.push(b'|');
    signature.extend(fed_crypto::sha384(message));
    signature
}

fn envelope(key: &[u8]) -> Vec<u8> {
    let mut prefix = b"enc|".to_vec();
    prefix.extend_from_slice(key);
    prefix.push(b'|');
    prefix
}

#[async_trait]
impl CryptoService for FakeCrypto {
    async fn sign(&self, message: &[u8], credential: &KeyReference) -> SpiResult<Vec<u8>> {
        Ok(tag(credential.0.as_bytes(), message))
    }

    async fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
        candidates: &[Certificate],
    ) -> SpiResult<bool> {
        Ok(candidates.iter().any(|c| tag(&c.0, message) == signature))
    }

    async fn encrypt(&self, plaintext: &[u8], recipient: &Certificate) -> SpiResult<Vec<u8>> {
        let mut blob = envelope(&recipient.0);
        blob.extend_from_slice(plaintext);
        Ok(blob)
    }

    async fn decrypt(&self, blob: &[u8], candidates: &[KeyReference]) -> SpiResult<Vec<u8>> {
        candidates
            .iter()
            .find_map(|k| blob.strip_prefix(envelope(k.0.as_bytes()).as_slice()))
            .map(<[u8]>::to_vec)
            .ok_or_else(|| SpiError::Policy("no matching decryption key".into()))
    }
}

// ---------------------------------------------------------------------------
// Local sessions
// ---------------------------------------------------------------------------

struct FakeSession {
    user: String,
    properties: HashMap<String, String>,
    listeners: Vec<Arc<dyn SessionInvalidationListener>>,
    time_left: Option<Duration>,
}

/// Local authentication sessions.
#[derive(Default)]
pub struct FakeSessions {
    sessions: Mutex<HashMap<String, FakeSession>>,
}

impl FakeSessions {
    /// Opens a local session for a user.
    pub fn login(&self, handle: &str, user: &str) {
        self.sessions.lock().insert(
            handle.to_string(),
            FakeSession {
                user: user.to_string(),
                properties: HashMap::new(),
                listeners: Vec::new(),
                time_left: Some(Duration::from_secs(1800)),
            },
        );
    }

    /// Returns true while the session has not been invalidated.
    pub fn is_active(&self, handle: &str) -> bool {
        self.sessions.lock().contains_key(handle)
    }

    /// Returns the number of listeners registered for a session.
    pub fn listener_count(&self, handle: &str) -> usize {
        self.sessions
            .lock()
            .get(handle)
            .map_or(0, |s| s.listeners.len())
    }

    fn with_session<T>(&self, handle: &str, f: impl FnOnce(&mut FakeSession) -> T) -> SpiResult<T> {
        self.sessions
            .lock()
            .get_mut(handle)
            .map(f)
            .ok_or_else(|| SpiError::NotFound(format!("local session {handle}")))
    }
}

#[async_trait]
impl LocalSessionProvider for FakeSessions {
    async fn principal_name(&self, handle: &str) -> SpiResult<String> {
        self.with_session(handle, |s| s.user.clone())
    }

    async fn property(&self, handle: &str, name: &str) -> SpiResult<Option<String>> {
        self.with_session(handle, |s| s.properties.get(name).cloned())
    }

    async fn set_property(&self, handle: &str, name: &str, value: &str) -> SpiResult<()> {
        self.with_session(handle, |s| {
            s.properties.insert(name.to_string(), value.to_string());
        })
    }

    async fn add_invalidation_listener(
        &self,
        handle: &str,
        listener: Arc<dyn SessionInvalidationListener>,
    ) -> SpiResult<()> {
        self.with_session(handle, |s| s.listeners.push(listener))
    }

    async fn time_left(&self, handle: &str) -> SpiResult<Option<Duration>> {
        self.with_session(handle, |s| s.time_left)
    }

    /// Listeners run while the session's properties are still readable,
    /// then the session is dropped.
    async fn invalidate(&self, handle: &str) -> SpiResult<()> {
        let listeners = self.with_session(handle, |s| std::mem::take(&mut s.listeners))?;
        for listener in listeners {
            listener.session_invalidated(handle).await;
        }
        self.sessions.lock().remove(handle);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// How a remote party reacts to a logout request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Answers SOAP requests with a success response.
    Respond,
    /// Answers SOAP requests with a Responder error.
    Reject,
    /// Cannot be reached.
    Unreachable,
    /// Never answers.
    Hang,
}

/// Outbound transport simulating remote parties.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: RwLock<HashMap<String, Script>>,
    sent: Mutex<Vec<OutboundMessage>>,
}

impl ScriptedTransport {
    /// Scripts a party; unscripted parties respond with success.
    pub fn script(&self, entity_id: &str, script: Script) {
        self.scripts.write().insert(entity_id.to_string(), script);
    }

    /// Returns every message dispatched so far.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().clone()
    }

    /// Returns the messages dispatched to one party.
    pub fn sent_to(&self, entity_id: &str) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|m| entity_of(&m.destination) == entity_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn dispatch(&self, outbound: OutboundMessage) -> Result<Option<SamlMessage>, DispatchError> {
        self.sent.lock().push(outbound.clone());
        let entity = entity_of(&outbound.destination).to_string();
        let script = self
            .scripts
            .read()
            .get(&entity)
            .copied()
            .unwrap_or(Script::Respond);

        let status = match script {
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                return Ok(None);
            }
            Script::Unreachable => return Err(DispatchError::Unreachable(entity)),
            Script::Respond => Status::success(),
            Script::Reject => Status::responder_error("logout failed"),
        };

        if !outbound.binding.is_synchronous() {
            return Ok(None);
        }
        let SamlMessage::LogoutRequest(request) = &outbound.message else {
            return Ok(None);
        };
        Ok(Some(SamlMessage::LogoutResponse(
            StatusResponse::new(entity, status).in_response_to(&request.id),
        )))
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Engine configuration with short timeouts.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.logout.dispatch_timeout_ms = 300;
    config
}

fn assemble(
    config: &Config,
    metadata: &Arc<FakeMetadata>,
    crypto: &Arc<FakeCrypto>,
    sessions: &Arc<FakeSessions>,
    repository: &Arc<InMemoryTokenRepository>,
    accounts: &Arc<InMemoryAccountStore>,
    transport: &Arc<ScriptedTransport>,
) -> FederationEngine {
    FederationEngine::new(
        config.clone(),
        Ports::new(metadata.clone(), crypto.clone(), sessions.clone()),
        repository.clone(),
        accounts.clone(),
        transport.clone(),
    )
}

/// Test environment: one engine and handles on all its collaborators.
pub struct TestEnv {
    pub engine: FederationEngine,
    pub metadata: Arc<FakeMetadata>,
    pub crypto: Arc<FakeCrypto>,
    pub sessions: Arc<FakeSessions>,
    pub transport: Arc<ScriptedTransport>,
    pub accounts: Arc<InMemoryAccountStore>,
    pub repository: Arc<InMemoryTokenRepository>,
    config: Config,
}

impl TestEnv {
    /// Creates an environment with the test configuration.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Creates an environment with a custom configuration.
    pub fn with_config(config: Config) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("info")
            .with_test_writer()
            .try_init();

        let metadata = Arc::new(FakeMetadata::default());
        for party in [SP1, SP2, SP3, PARTNER_IDP] {
            metadata.add_party(party);
        }
        let crypto = Arc::new(FakeCrypto);
        let sessions = Arc::new(FakeSessions::default());
        let transport = Arc::new(ScriptedTransport::default());
        let accounts = Arc::new(InMemoryAccountStore::new());
        let repository = Arc::new(InMemoryTokenRepository::new());

        Self {
            engine: assemble(
                &config,
                &metadata,
                &crypto,
                &sessions,
                &repository,
                &accounts,
                &transport,
            ),
            metadata,
            crypto,
            sessions,
            transport,
            accounts,
            repository,
            config,
        }
    }

    /// Builds another engine over the same collaborators and repository,
    /// as a second cluster node would be.
    pub fn node(&self) -> FederationEngine {
        assemble(
            &self.config,
            &self.metadata,
            &self.crypto,
            &self.sessions,
            &self.repository,
            &self.accounts,
            &self.transport,
        )
    }

    /// Opens a local session and federates it with each SP at the hosted
    /// IdP. The NameID of `user` at `sp` is [`name_id_value`].
    pub async fn idp_login(&self, handle: &str, user: &str, sps: &[&str]) -> String {
        self.sessions.login(handle, user);
        let mut session_index = String::new();
        for sp in sps {
            session_index = self
                .engine
                .record_idp_federation(
                    IDP_ALIAS,
                    handle,
                    NameId::persistent(name_id_value(user, sp)),
                    sp,
                    None,
                )
                .await
                .expect("federation recorded");
        }
        session_index
    }

    /// Signs a message with the key of its issuer.
    pub async fn sign<M: SignedMessage>(&self, message: &mut M) {
        let input = message.signing_input().expect("signing input");
        let signature = self
            .crypto
            .sign(&input, &key_of(message.issuer()))
            .await
            .expect("signed");
        message.set_signature(Some(signature));
    }
}

/// NameID value issued to a user for an SP.
pub fn name_id_value(user: &str, sp: &str) -> String {
    let host = sp.trim_start_matches("https://");
    format!("{user}@{host}")
}
