//! Subject identifiers carried by logout and NameID management requests.

use fed_model::NameId;
use fed_spi::{Certificate, CryptoService, KeyReference};
use serde::{Deserialize, Serialize};

use crate::error::{SamlError, SamlResult};

/// A NameID in the clear or encrypted for the recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identifier {
    /// Plain NameID.
    NameId(NameId),
    /// Encrypted NameID.
    EncryptedId(Vec<u8>),
}

impl Identifier {
    /// Encrypts a NameID for `recipient`.
    pub async fn encrypt(
        name_id: &NameId,
        crypto: &dyn CryptoService,
        recipient: &Certificate,
    ) -> SamlResult<Self> {
        let plaintext = serde_json::to_vec(name_id)?;
        let blob = crypto
            .encrypt(&plaintext, recipient)
            .await
            .map_err(|e| SamlError::Crypto(e.to_string()))?;
        Ok(Self::EncryptedId(blob))
    }

    /// Returns the NameID, decrypting it with one of `keys` if needed.
    ///
    /// ## Errors
    ///
    /// Returns [`SamlError::InvalidRequest`] if the identifier cannot be
    /// decrypted with any key.
    pub async fn resolve(
        &self,
        crypto: &dyn CryptoService,
        keys: &[KeyReference],
    ) -> SamlResult<NameId> {
        match self {
            Self::NameId(name_id) => Ok(name_id.clone()),
            Self::EncryptedId(blob) => decrypt_value(blob, crypto, keys).await,
        }
    }

    /// Returns the plain NameID, if not encrypted.
    #[must_use]
    pub fn as_name_id(&self) -> Option<&NameId> {
        match self {
            Self::NameId(name_id) => Some(name_id),
            Self::EncryptedId(_) => None,
        }
    }

    /// Returns true if the identifier is encrypted.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        matches!(self, Self::EncryptedId(_))
    }
}

impl From<NameId> for Identifier {
    fn from(name_id: NameId) -> Self {
        Self::NameId(name_id)
    }
}

/// Decrypts a JSON-encoded value with the first key that works.
pub(crate) async fn decrypt_value<T: serde::de::DeserializeOwned>(
    blob: &[u8],
    crypto: &dyn CryptoService,
    keys: &[KeyReference],
) -> SamlResult<T> {
    if keys.is_empty() {
        return Err(SamlError::Crypto("no decryption key configured".into()));
    }
    let plaintext = crypto
        .decrypt(blob, keys)
        .await
        .map_err(|e| SamlError::InvalidRequest(format!("undecryptable identifier: {e}")))?;
    serde_json::from_slice(&plaintext)
        .map_err(|e| SamlError::InvalidRequest(format!("malformed identifier: {e}")))
}
