//! Hash functions.

use aws_lc_rs::digest;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Computes a SHA-384 hash of the input data.
#[must_use]
pub fn sha384(data: &[u8]) -> Vec<u8> {
    digest::digest(&digest::SHA384, data).as_ref().to_vec()
}

/// Derives a stable, URL-safe digest over an ordered list of parts.
///
/// Each part is prefixed with its big-endian length so that
/// `["ab", "c"]` and `["a", "bc"]` never collide.
#[must_use]
pub fn federation_digest<S: AsRef<str>>(parts: &[S]) -> String {
    let mut ctx = digest::Context::new(&digest::SHA384);
    for part in parts {
        let bytes = part.as_ref().as_bytes();
        let len = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        ctx.update(&len.to_be_bytes());
        ctx.update(bytes);
    }
    URL_SAFE_NO_PAD.encode(ctx.finish().as_ref())
}
