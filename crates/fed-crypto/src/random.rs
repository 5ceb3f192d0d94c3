//! Cryptographically secure random identifiers.
//!
//! All functions use the thread-local generator, which is seeded from the
//! operating system and suitable for security-sensitive values.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::distr::{Alphanumeric, SampleString};
use rand::Rng;

/// Length in bytes of a SAML artifact message handle.
pub const ARTIFACT_HANDLE_LEN: usize = 20;

/// Generates `len` random bytes.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);
    bytes
}

/// Generates a random string of `len` alphanumeric characters.
#[must_use]
pub fn random_alphanumeric(len: usize) -> String {
    let mut rng = rand::rng();
    Alphanumeric.sample_string(&mut rng, len)
}

/// Generates a URL-safe base64 string from `byte_len` random bytes.
#[must_use]
pub fn random_base64url(byte_len: usize) -> String {
    URL_SAFE_NO_PAD.encode(random_bytes(byte_len))
}

/// Generates a session index.
///
/// The `s` prefix keeps the value a valid XML NCName, which a bare
/// alphanumeric string starting with a digit is not.
#[must_use]
pub fn generate_session_index() -> String {
    format!("s{}", random_alphanumeric(32))
}

/// Generates a protocol message ID.
#[must_use]
pub fn generate_message_id() -> String {
    format!("_{}", random_alphanumeric(40))
}

/// Generates an opaque artifact handle.
#[must_use]
pub fn generate_artifact_handle() -> String {
    random_base64url(ARTIFACT_HANDLE_LEN)
}
