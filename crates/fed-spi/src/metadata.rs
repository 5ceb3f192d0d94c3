//! Metadata port.

use async_trait::async_trait;
use fed_model::{EntityRole, Endpoint, MessageKind, ServiceKind};

use crate::crypto::{Certificate, KeyReference};
use crate::error::SpiResult;

/// A hosted entity resolved from its meta alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntity {
    /// Realm the entity belongs to.
    pub realm: String,
    /// Entity ID.
    pub entity_id: String,
    /// Role the entity is hosted in.
    pub role: EntityRole,
}

/// Provider for entity metadata and per-entity policy flags.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Resolves a meta alias to the hosted entity it designates.
    async fn resolve_meta_alias(&self, meta_alias: &str) -> SpiResult<LocalEntity>;

    /// Returns the endpoints `entity_id`, acting in `role`, declares for a
    /// service, in declaration order.
    async fn endpoints(
        &self,
        realm: &str,
        entity_id: &str,
        role: EntityRole,
        service: ServiceKind,
    ) -> SpiResult<Vec<Endpoint>>;

    /// Returns whether `entity_id` requires messages of `kind` it receives
    /// to be signed.
    async fn wants_signed(&self, realm: &str, entity_id: &str, kind: MessageKind)
        -> SpiResult<bool>;

    /// Returns whether `entity_id` wants NameIDs sent to it encrypted.
    async fn wants_encrypted_name_id(&self, realm: &str, entity_id: &str) -> SpiResult<bool>;

    /// Returns whether `id` names an affiliation rather than an entity.
    async fn is_affiliation(&self, realm: &str, id: &str) -> SpiResult<bool>;

    /// Returns whether `entity_id` is a declared member of `affiliation`.
    async fn is_affiliation_member(
        &self,
        realm: &str,
        affiliation: &str,
        entity_id: &str,
    ) -> SpiResult<bool>;

    /// Returns the signing certificates of a remote entity.
    async fn signing_certificates(&self, realm: &str, entity_id: &str)
        -> SpiResult<Vec<Certificate>>;

    /// Returns the encryption certificate of a remote entity.
    async fn encryption_certificate(
        &self,
        realm: &str,
        entity_id: &str,
    ) -> SpiResult<Option<Certificate>>;

    /// Returns the decryption keys of a hosted entity.
    async fn decryption_keys(&self, realm: &str, entity_id: &str) -> SpiResult<Vec<KeyReference>>;

    /// Returns the signing credential of a hosted entity.
    async fn signing_credential(
        &self,
        realm: &str,
        entity_id: &str,
    ) -> SpiResult<Option<KeyReference>>;
}
