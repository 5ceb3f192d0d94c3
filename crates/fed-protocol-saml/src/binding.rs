//! Endpoint and binding selection.
//!
//! Shared by every exchange that has to reach a remote party: pick the
//! caller's preferred binding when the party supports it, else the
//! party's default endpoint, else its first endpoint.

use fed_model::{Endpoint, SamlBinding};

/// Selects an endpoint from a remote party's declared endpoints.
#[must_use]
pub fn select(endpoints: &[Endpoint], preferred: Option<SamlBinding>) -> Option<&Endpoint> {
    if let Some(binding) = preferred {
        if let Some(endpoint) = find(endpoints, binding) {
            return Some(endpoint);
        }
    }
    endpoints
        .iter()
        .find(|e| e.is_default)
        .or_else(|| endpoints.first())
}

/// Selects a single logout endpoint during a fan-out.
///
/// The binding the logout was initiated with is kept when the party
/// supports it. After an asynchronous initiation the other asynchronous
/// binding is tried before SOAP; a synchronous initiation, or a logout
/// triggered without any user agent, only continues over SOAP.
#[must_use]
pub fn select_slo(endpoints: &[Endpoint], initiating: Option<SamlBinding>) -> Option<&Endpoint> {
    fallback_order(initiating)
        .iter()
        .find_map(|binding| find(endpoints, *binding))
}

fn fallback_order(initiating: Option<SamlBinding>) -> &'static [SamlBinding] {
    use SamlBinding::{HttpArtifact, HttpPost, HttpRedirect, Soap};

    match initiating {
        Some(HttpRedirect) => &[HttpRedirect, HttpPost, Soap],
        Some(HttpPost) => &[HttpPost, HttpRedirect, Soap],
        Some(HttpArtifact) => &[HttpArtifact, HttpRedirect, HttpPost, Soap],
        Some(SamlBinding::Soap | SamlBinding::Paos) | None => &[Soap],
    }
}

fn find(endpoints: &[Endpoint], binding: SamlBinding) -> Option<&Endpoint> {
    endpoints
        .iter()
        .find(|e| e.binding == binding && e.is_default)
        .or_else(|| endpoints.iter().find(|e| e.binding == binding))
}
