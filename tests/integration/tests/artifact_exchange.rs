//! Artifact binding: responses parked under a handle and resolved once.

use fed_model::{EntityRole, NameId, SamlBinding, ServiceKind};
use fed_protocol_saml::{
    FederationReply, FederationRequest, FederationStatus, LogoutRequest, ProtocolVerb,
    ResponseBody, SamlMessage, StatusResponse,
};

use crate::common::*;

async fn resolve(engine: &fed_protocol_saml::FederationEngine, handle: &str) -> FederationReply {
    engine
        .handle(FederationRequest::new(
            ProtocolVerb::ResolveArtifact {
                handle: handle.to_string(),
            },
            EntityRole::IdentityProvider,
            IDP_ALIAS,
        ))
        .await
}

#[tokio::test]
async fn artifact_resolves_exactly_once() {
    let env = TestEnv::new();
    let message = SamlMessage::LogoutResponse(StatusResponse::success(IDP));

    let handle = env.engine.artifacts().store(message.clone()).await.unwrap();

    assert_eq!(env.engine.artifacts().take(&handle).await, Some(message));
    assert_eq!(env.engine.artifacts().take(&handle).await, None);
}

#[tokio::test]
async fn logout_response_is_delivered_by_artifact() {
    let env = TestEnv::new();
    env.metadata.set_endpoints(
        SP1,
        ServiceKind::SingleLogout,
        &[SamlBinding::HttpArtifact],
    );
    let idx = env.idp_login("h1", "alice", &[SP1]).await;
    let request = LogoutRequest::new(SP1, NameId::persistent(name_id_value("alice", SP1)))
        .with_session_index(&idx);
    let request_id = request.id.clone();

    let reply = env
        .engine
        .handle(
            FederationRequest::new(
                ProtocolVerb::LogoutRequest(request),
                EntityRole::IdentityProvider,
                IDP_ALIAS,
            )
            .with_binding(SamlBinding::HttpArtifact)
            .with_relay_state("rs-1"),
        )
        .await;

    assert!(reply.status.is_success());
    let delivery = reply.response.expect("artifact delivery");
    assert_eq!(delivery.binding, SamlBinding::HttpArtifact);
    assert_eq!(
        delivery.destination.as_deref(),
        Some(endpoint_url(SP1, ServiceKind::SingleLogout, SamlBinding::HttpArtifact).as_str())
    );
    assert_eq!(delivery.relay_state.as_deref(), Some("rs-1"));
    let ResponseBody::Artifact(handle) = delivery.body else {
        panic!("expected an artifact, got {:?}", delivery.body);
    };

    let resolved = resolve(&env.engine, &handle).await;
    assert_eq!(resolved.status, FederationStatus::Success);
    let response = resolved.response.unwrap();
    assert_eq!(response.binding, SamlBinding::Soap);
    assert!(response.destination.is_none());
    let ResponseBody::Message(SamlMessage::LogoutResponse(logout_response)) = response.body else {
        panic!("expected the parked logout response");
    };
    assert!(logout_response.is_success());
    assert_eq!(
        logout_response.in_response_to.as_deref(),
        Some(request_id.as_str())
    );

    let second = resolve(&env.engine, &handle).await;
    assert!(matches!(second.status, FederationStatus::RequesterError { .. }));
    assert!(second.response.is_none());
}

#[tokio::test]
async fn artifact_issued_on_one_node_is_consumed_cluster_wide() {
    let env = TestEnv::new();
    let handle = env
        .engine
        .artifacts()
        .store(SamlMessage::LogoutResponse(StatusResponse::success(IDP)))
        .await
        .unwrap();
    let other = env.node();

    let resolved = resolve(&other, &handle).await;
    assert!(resolved.status.is_success());

    assert!(env.engine.artifacts().take(&handle).await.is_none());
    assert!(resolve(&env.engine, &handle).await.status != FederationStatus::Success);
}

#[tokio::test]
async fn unknown_artifact_is_a_requester_error() {
    let env = TestEnv::new();
    let reply = resolve(&env.engine, "AAQAAMFbLinlXaCM").await;

    assert!(matches!(reply.status, FederationStatus::RequesterError { .. }));
}
