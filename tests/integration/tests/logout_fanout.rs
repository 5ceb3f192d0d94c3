//! IdP-side logout fan-out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use fed_model::{EntityRole, MessageKind, NameId, SamlBinding, ServiceKind};
use fed_protocol_saml::{
    status_codes, sub_status_codes, FederationReply, FederationRequest, FederationStatus,
    LogoutRequest, ManageNameIdRequest, ProtocolVerb, ResponseBody, SamlMessage, SignedMessage,
};
use fed_spi::{CryptoService, LocalSessionProvider, MetadataProvider};

use crate::common::*;

async fn initiate(env: &TestEnv, session_index: &str, binding: Option<SamlBinding>) -> FederationReply {
    let mut request = FederationRequest::new(
        ProtocolVerb::InitiateLogout {
            session_index: session_index.to_string(),
            reason: None,
        },
        EntityRole::IdentityProvider,
        IDP_ALIAS,
    );
    request.binding = binding;
    env.engine.handle(request).await
}

async fn record_of(env: &TestEnv, user: &str, sp: &str) -> Option<fed_model::NameIdInfo> {
    env.engine.records().get(user, IDP, sp).await.unwrap()
}

fn logout_request(message: &SamlMessage) -> &LogoutRequest {
    match message {
        SamlMessage::LogoutRequest(request) => request,
        other => panic!("expected a logout request, got {other:?}"),
    }
}

#[tokio::test]
async fn invalidating_the_local_session_logs_out_every_sp() {
    let env = TestEnv::new();
    let idx = env.idp_login("s1", "alice", &[SP1, SP2]).await;
    assert!(record_of(&env, "alice", SP1).await.is_some());

    env.sessions.invalidate("s1").await.unwrap();

    let sent = env.transport.sent();
    assert_eq!(sent.len(), 2);
    for sp in [SP1, SP2] {
        let outbound = env.transport.sent_to(sp);
        assert_eq!(outbound.len(), 1, "{sp} notified once");
        assert_eq!(outbound[0].binding, SamlBinding::Soap);
        let request = logout_request(&outbound[0].message);
        assert_eq!(request.issuer, IDP);
        assert_eq!(request.session_indexes, vec![idx.clone()]);
        assert_eq!(
            request.identifier.as_name_id().unwrap().value,
            name_id_value("alice", sp)
        );
        assert_eq!(request.reason.as_deref(), Some(LogoutRequest::REASON_USER));
        assert!(request.not_on_or_after.is_some());
        assert!(record_of(&env, "alice", sp).await.is_none());
    }
    assert!(env.engine.sessions().get(&idx).await.is_none());
    assert_eq!(env.engine.sessions().active_locks(), 0);
}

#[tokio::test]
async fn timed_out_target_yields_partial_failure_and_local_cleanup() {
    let env = TestEnv::new();
    env.transport.script(SP2, Script::Hang);
    let idx = env.idp_login("h1", "alice", &[SP1, SP2, SP3]).await;

    let started = Instant::now();
    let reply = initiate(&env, &idx, None).await;

    assert!(started.elapsed() < Duration::from_secs(5), "fan-out must not wait for SP2");
    assert_eq!(
        reply.status,
        FederationStatus::PartialFailure {
            failed: vec![SP2.to_string()]
        }
    );
    for sp in [SP1, SP2, SP3] {
        assert!(record_of(&env, "alice", sp).await.is_none(), "{sp} record left");
    }
    assert!(env.engine.sessions().get(&idx).await.is_none());
    assert!(!env.sessions.is_active("h1"));
}

#[tokio::test]
async fn rekey_during_a_running_fan_out_leaves_no_record_behind() {
    let env = TestEnv::new();
    env.transport.script(SP1, Script::Hang);
    let idx = env.idp_login("h1", "alice", &[SP1, SP2]).await;
    let rekey = ManageNameIdRequest::new_id(
        SP2,
        NameId::persistent(name_id_value("alice", SP2)),
        "alice-v2",
    );

    let (logout, rekeyed) = tokio::join!(initiate(&env, &idx, None), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        env.engine
            .handle(
                FederationRequest::new(
                    ProtocolVerb::ManageNameId(rekey),
                    EntityRole::IdentityProvider,
                    IDP_ALIAS,
                )
                .with_binding(SamlBinding::Soap),
            )
            .await
    });

    assert_eq!(
        logout.status,
        FederationStatus::PartialFailure {
            failed: vec![SP1.to_string()]
        }
    );
    assert_eq!(rekeyed.status, FederationStatus::UnknownPrincipal);
    assert!(env.engine.sessions().get(&idx).await.is_none());
    assert!(record_of(&env, "alice", SP2).await.is_none());
    assert!(record_of(&env, "alice", SP1).await.is_none());
}

#[tokio::test]
async fn local_sessions_do_not_keep_a_dropped_engine_alive() {
    let env = TestEnv::new();
    env.idp_login("h1", "alice", &[SP1]).await;
    let TestEnv {
        engine,
        sessions,
        repository,
        transport,
        ..
    } = env;
    assert_eq!(sessions.listener_count("h1"), 1);

    drop(engine);

    assert_eq!(Arc::strong_count(&repository), 1);
    sessions.invalidate("h1").await.unwrap();
    assert!(!sessions.is_active("h1"));
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn sequential_dispatch_collects_every_failure() {
    let mut config = test_config();
    config.logout.concurrent_dispatch = false;
    let env = TestEnv::with_config(config);
    env.transport.script(SP1, Script::Unreachable);
    env.transport.script(SP3, Script::Reject);
    let idx = env.idp_login("h1", "alice", &[SP1, SP2, SP3]).await;

    let reply = initiate(&env, &idx, None).await;

    assert_eq!(
        reply.status,
        FederationStatus::PartialFailure {
            failed: vec![SP1.to_string(), SP3.to_string()]
        }
    );
    let status = reply.status.to_status();
    assert_eq!(status.status_code.value, status_codes::SUCCESS);
    assert_eq!(
        status.status_code.sub_status_value(),
        Some(sub_status_codes::PARTIAL_LOGOUT)
    );
    assert_eq!(env.transport.sent().len(), 3);
}

#[tokio::test]
async fn party_without_logout_endpoint_counts_as_failed() {
    let env = TestEnv::new();
    env.metadata
        .set_endpoints(SP3, ServiceKind::SingleLogout, &[]);
    let idx = env.idp_login("h1", "alice", &[SP1, SP3]).await;

    let reply = initiate(&env, &idx, None).await;

    assert_eq!(
        reply.status,
        FederationStatus::PartialFailure {
            failed: vec![SP3.to_string()]
        }
    );
    assert!(env.transport.sent_to(SP3).is_empty());
}

#[tokio::test]
async fn unknown_session_index_is_unknown_principal() {
    let env = TestEnv::new();
    let reply = initiate(&env, "s-does-not-exist", None).await;

    assert_eq!(reply.status, FederationStatus::UnknownPrincipal);
    assert!(env.transport.sent().is_empty());
}

#[tokio::test]
async fn front_channel_initiation_falls_back_across_bindings() {
    let env = TestEnv::new();
    env.metadata.set_endpoints(
        SP1,
        ServiceKind::SingleLogout,
        &[SamlBinding::Soap],
    );
    env.metadata.set_endpoints(
        SP2,
        ServiceKind::SingleLogout,
        &[SamlBinding::Soap, SamlBinding::HttpPost],
    );
    let idx = env.idp_login("h1", "alice", &[SP1, SP2, SP3]).await;

    let reply = initiate(&env, &idx, Some(SamlBinding::HttpRedirect)).await;

    assert!(reply.status.is_success());
    assert_eq!(env.transport.sent_to(SP1)[0].binding, SamlBinding::Soap);
    assert_eq!(env.transport.sent_to(SP2)[0].binding, SamlBinding::HttpPost);
    assert_eq!(env.transport.sent_to(SP3)[0].binding, SamlBinding::HttpRedirect);
    assert_eq!(
        env.transport.sent_to(SP3)[0].destination,
        endpoint_url(SP3, ServiceKind::SingleLogout, SamlBinding::HttpRedirect)
    );
}

#[tokio::test]
async fn outbound_request_is_encrypted_and_signed_on_demand() {
    let env = TestEnv::new();
    env.metadata.require_encrypted(SP1);
    env.metadata.require_signed(SP1, MessageKind::LogoutRequest);
    let idx = env.idp_login("h1", "alice", &[SP1, SP2]).await;

    let reply = initiate(&env, &idx, None).await;
    assert!(reply.status.is_success());

    let to_sp1 = env.transport.sent_to(SP1);
    let request = logout_request(&to_sp1[0].message);
    assert!(request.identifier.is_encrypted());
    let name_id = request
        .identifier
        .resolve(env.crypto.as_ref(), &[key_of(SP1)])
        .await
        .unwrap();
    assert_eq!(name_id.value, name_id_value("alice", SP1));

    let signature = request.signature.clone().expect("signed");
    let certificates = env.metadata.signing_certificates(REALM, IDP).await.unwrap();
    let input = request.signing_input().unwrap();
    assert!(env.crypto.verify(&input, &signature, &certificates).await.unwrap());

    let to_sp2 = env.transport.sent_to(SP2);
    let plain = logout_request(&to_sp2[0].message);
    assert!(!plain.identifier.is_encrypted());
    assert!(plain.signature.is_none());
}

#[tokio::test]
async fn rekeyed_federation_is_logged_out_with_the_new_name_id() {
    let env = TestEnv::new();
    let idx = env.idp_login("h1", "alice", &[SP1]).await;
    let request = fed_protocol_saml::ManageNameIdRequest::new_id(
        SP1,
        NameId::persistent(name_id_value("alice", SP1)),
        "alice-v2",
    );
    let reply = env
        .engine
        .handle(
            FederationRequest::new(
                ProtocolVerb::ManageNameId(request),
                EntityRole::IdentityProvider,
                IDP_ALIAS,
            )
            .with_binding(SamlBinding::Soap),
        )
        .await;
    assert!(reply.status.is_success());

    let reply = initiate(&env, &idx, None).await;
    assert!(reply.status.is_success());
    let to_sp1 = env.transport.sent_to(SP1);
    assert_eq!(to_sp1.len(), 1);
    assert_eq!(
        logout_request(&to_sp1[0].message)
            .identifier
            .as_name_id()
            .unwrap()
            .value,
        "alice-v2"
    );
    assert!(record_of(&env, "alice", SP1).await.is_none());
}

#[tokio::test]
async fn sp_initiated_logout_notifies_the_others_and_answers_the_initiator() {
    let env = TestEnv::new();
    let idx = env.idp_login("h1", "alice", &[SP1, SP2, SP3]).await;
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
            .with_binding(SamlBinding::HttpRedirect)
            .with_relay_state("return-to"),
        )
        .await;

    assert!(reply.status.is_success());
    assert!(env.transport.sent_to(SP1).is_empty(), "initiator is not notified");
    assert_eq!(env.transport.sent_to(SP2).len(), 1);
    assert_eq!(env.transport.sent_to(SP3).len(), 1);
    for sp in [SP1, SP2, SP3] {
        assert!(record_of(&env, "alice", sp).await.is_none());
    }
    assert!(!env.sessions.is_active("h1"));

    let delivery = reply.response.expect("response to the initiator");
    assert_eq!(delivery.binding, SamlBinding::HttpRedirect);
    assert_eq!(
        delivery.destination.as_deref(),
        Some(endpoint_url(SP1, ServiceKind::SingleLogout, SamlBinding::HttpRedirect).as_str())
    );
    assert_eq!(delivery.relay_state.as_deref(), Some("return-to"));
    let ResponseBody::Message(SamlMessage::LogoutResponse(response)) = &delivery.body else {
        panic!("expected a logout response, got {:?}", delivery.body);
    };
    assert!(response.is_success());
    assert_eq!(response.in_response_to.as_deref(), Some(request_id.as_str()));
    assert_eq!(response.issuer, IDP);

    assert!(env.engine.pending_response(&request_id).await.is_some());
    assert!(env.engine.complete_pending_response(&request_id).await.is_some());
    assert!(env.engine.complete_pending_response(&request_id).await.is_none());
}

#[tokio::test]
async fn sp_initiated_logout_without_session_index_finds_the_session() {
    let env = TestEnv::new();
    let idx = env.idp_login("h1", "alice", &[SP1, SP2]).await;
    let request = LogoutRequest::new(SP2, NameId::persistent(name_id_value("alice", SP2)));

    let reply = env
        .engine
        .handle(
            FederationRequest::new(
                ProtocolVerb::LogoutRequest(request),
                EntityRole::IdentityProvider,
                IDP_ALIAS,
            )
            .with_binding(SamlBinding::Soap),
        )
        .await;

    assert!(reply.status.is_success());
    assert_eq!(env.transport.sent_to(SP1).len(), 1);
    assert!(env.engine.sessions().get(&idx).await.is_none());
    let delivery = reply.response.unwrap();
    assert_eq!(delivery.binding, SamlBinding::Soap);
    assert!(delivery.destination.is_none());
}

#[tokio::test]
async fn logout_for_unknown_name_id_is_unknown_principal() {
    let env = TestEnv::new();
    env.idp_login("h1", "alice", &[SP1, SP2]).await;
    let request = LogoutRequest::new(SP1, NameId::persistent("mallory@sp1"));

    let reply = env
        .engine
        .handle(
            FederationRequest::new(
                ProtocolVerb::LogoutRequest(request),
                EntityRole::IdentityProvider,
                IDP_ALIAS,
            )
            .with_binding(SamlBinding::Soap),
        )
        .await;

    assert_eq!(reply.status, FederationStatus::UnknownPrincipal);
    assert!(env.transport.sent().is_empty());
    assert!(env.sessions.is_active("h1"));
    let ResponseBody::Message(message) = reply.response.unwrap().body else {
        panic!("expected an inline response");
    };
    let status = &message.as_status_response().unwrap().status;
    assert_eq!(status.status_code.value, status_codes::REQUESTER);
    assert_eq!(
        status.status_code.sub_status_value(),
        Some(sub_status_codes::UNKNOWN_PRINCIPAL)
    );
}

#[tokio::test]
async fn unsigned_logout_request_is_rejected_without_side_effects() {
    let env = TestEnv::new();
    env.metadata.require_signed(IDP, MessageKind::LogoutRequest);
    let idx = env.idp_login("h1", "alice", &[SP1, SP2]).await;
    let unsigned = LogoutRequest::new(SP1, NameId::persistent(name_id_value("alice", SP1)))
        .with_session_index(&idx);

    let reply = env
        .engine
        .handle(
            FederationRequest::new(
                ProtocolVerb::LogoutRequest(unsigned.clone()),
                EntityRole::IdentityProvider,
                IDP_ALIAS,
            )
            .with_binding(SamlBinding::Soap),
        )
        .await;

    assert!(matches!(reply.status, FederationStatus::RequesterError { .. }));
    assert!(env.transport.sent().is_empty());
    assert!(env.engine.sessions().get(&idx).await.is_some());
    assert!(env.sessions.is_active("h1"));

    let mut signed = unsigned;
    env.sign(&mut signed).await;
    let reply = env
        .engine
        .handle(
            FederationRequest::new(
                ProtocolVerb::LogoutRequest(signed),
                EntityRole::IdentityProvider,
                IDP_ALIAS,
            )
            .with_binding(SamlBinding::Soap),
        )
        .await;
    assert!(reply.status.is_success());
}

#[tokio::test]
async fn expired_logout_request_is_rejected() {
    let env = TestEnv::new();
    let idx = env.idp_login("h1", "alice", &[SP1]).await;
    let mut request = LogoutRequest::new(SP1, NameId::persistent(name_id_value("alice", SP1)))
        .with_session_index(&idx);
    request.not_on_or_after = Some(chrono::Utc::now() - chrono::Duration::minutes(1));

    let reply = env
        .engine
        .handle(
            FederationRequest::new(
                ProtocolVerb::LogoutRequest(request),
                EntityRole::IdentityProvider,
                IDP_ALIAS,
            )
            .with_binding(SamlBinding::Soap),
        )
        .await;

    assert!(matches!(reply.status, FederationStatus::RequesterError { .. }));
    assert!(env.engine.sessions().get(&idx).await.is_some());
}
