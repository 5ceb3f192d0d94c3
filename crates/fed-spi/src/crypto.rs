//! Signing and encryption port.

use async_trait::async_trait;

use crate::error::SpiResult;

/// Reference to a private key held by the crypto service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyReference(pub String);

/// A DER encoded certificate published in metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate(pub Vec<u8>);

/// Crypto and signing service.
///
/// Algorithms and key formats are owned by the implementation; the engine
/// only decides when a message is signed, verified, encrypted or
/// decrypted and with which keys.
#[async_trait]
pub trait CryptoService: Send + Sync {
    /// Signs a serialized message and returns the signature.
    async fn sign(&self, message: &[u8], credential: &KeyReference) -> SpiResult<Vec<u8>>;

    /// Verifies a signature against any of the candidate certificates.
    async fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
        candidates: &[Certificate],
    ) -> SpiResult<bool>;

    /// Encrypts a payload for a recipient.
    async fn encrypt(&self, plaintext: &[u8], recipient: &Certificate) -> SpiResult<Vec<u8>>;

    /// Decrypts a payload with the first candidate key that fits.
    async fn decrypt(&self, blob: &[u8], candidates: &[KeyReference]) -> SpiResult<Vec<u8>>;
}
