//! Signature policy gate.
//!
//! Inbound requests pass the gate before any state is read or written.
//! Outbound messages are signed here when the recipient asks for it.

use std::sync::Arc;

use fed_core::event::{Event, EventType};
use fed_model::MessageKind;
use fed_spi::{CryptoService, MetadataProvider};

use crate::error::{SamlError, SamlResult};
use crate::types::SignedMessage;

/// Applies the signing policy of the hosted entities.
#[derive(Clone)]
pub struct SignatureGate {
    metadata: Arc<dyn MetadataProvider>,
    crypto: Arc<dyn CryptoService>,
}

impl SignatureGate {
    /// Creates a gate.
    #[must_use]
    pub fn new(metadata: Arc<dyn MetadataProvider>, crypto: Arc<dyn CryptoService>) -> Self {
        Self { metadata, crypto }
    }

    /// Checks an inbound message against the hosted entity's policy.
    ///
    /// A signature that is present is always verified; a missing one is
    /// only an error when `local_entity_id` wants this kind signed.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::SignatureInvalid`] for a missing or bad
    /// signature.
    pub async fn check<M: SignedMessage + Sync>(
        &self,
        realm: &str,
        local_entity_id: &str,
        kind: MessageKind,
        message: &M,
    ) -> SamlResult<()> {
        let result = self.verify(realm, local_entity_id, kind, message).await;
        if let Err(e) = &result {
            tracing::warn!(
                issuer = %message.issuer(),
                kind = ?kind,
                error = %e,
                "inbound message rejected"
            );
            Event::builder(EventType::RequestRejected)
                .failure(e.to_string())
                .realm(realm)
                .local(local_entity_id)
                .remote(message.issuer())
                .detail("kind", format!("{kind:?}"))
                .emit();
        }
        result
    }

    async fn verify<M: SignedMessage + Sync>(
        &self,
        realm: &str,
        local_entity_id: &str,
        kind: MessageKind,
        message: &M,
    ) -> SamlResult<()> {
        let Some(signature) = message.signature() else {
            if self
                .metadata
                .wants_signed(realm, local_entity_id, kind)
                .await?
            {
                return Err(SamlError::SignatureInvalid("message is not signed".into()));
            }
            return Ok(());
        };

        let certificates = self
            .metadata
            .signing_certificates(realm, message.issuer())
            .await?;
        if certificates.is_empty() {
            return Err(SamlError::SignatureInvalid(format!(
                "no signing certificate for {}",
                message.issuer()
            )));
        }

        let input = message.signing_input()?;
        let valid = self
            .crypto
            .verify(&input, signature, &certificates)
            .await
            .map_err(|e| SamlError::SignatureInvalid(e.to_string()))?;
        if valid {
            Ok(())
        } else {
            Err(SamlError::SignatureInvalid("signature does not verify".into()))
        }
    }

    /// Signs an outbound message if `remote_entity_id` wants it signed.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::SignatureCreation`] if signing is required but
    /// no credential is configured or the crypto service fails.
    pub async fn sign_outbound<M: SignedMessage + Send>(
        &self,
        realm: &str,
        local_entity_id: &str,
        remote_entity_id: &str,
        kind: MessageKind,
        message: &mut M,
    ) -> SamlResult<()> {
        if !self
            .metadata
            .wants_signed(realm, remote_entity_id, kind)
            .await?
        {
            return Ok(());
        }

        let credential = self
            .metadata
            .signing_credential(realm, local_entity_id)
            .await?
            .ok_or_else(|| {
                SamlError::SignatureCreation(format!("no signing key for {local_entity_id}"))
            })?;
        let input = message.signing_input()?;
        let signature = self
            .crypto
            .sign(&input, &credential)
            .await
            .map_err(|e| SamlError::SignatureCreation(e.to_string()))?;
        message.set_signature(Some(signature));
        Ok(())
    }
}

impl std::fmt::Debug for SignatureGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureGate").finish_non_exhaustive()
    }
}
