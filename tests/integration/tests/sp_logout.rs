//! Logout requests received by a hosted SP.

use fed_model::{EntityRole, FederationKey, NameId, SamlBinding};
use fed_protocol_saml::{FederationReply, FederationRequest, FederationStatus, LogoutRequest, ProtocolVerb};
use fed_spi::LocalSessionProvider;

use crate::common::*;

const BOB: &str = "bob@partner";

async fn sp_login(env: &TestEnv, handle: &str, idp_session_index: &str) -> FederationKey {
    env.sessions.login(handle, "bob");
    env.engine
        .record_sp_federation(
            SP_ALIAS,
            handle,
            PARTNER_IDP,
            NameId::persistent(BOB),
            Some(idp_session_index),
        )
        .await
        .unwrap()
}

async fn receive(env: &TestEnv, request: LogoutRequest) -> FederationReply {
    env.engine
        .handle(
            FederationRequest::new(
                ProtocolVerb::LogoutRequest(request),
                EntityRole::ServiceProvider,
                SP_ALIAS,
            )
            .with_binding(SamlBinding::Soap),
        )
        .await
}

#[tokio::test]
async fn idp_logout_ends_only_the_listed_session() {
    let env = TestEnv::new();
    let key = sp_login(&env, "h1", "idx-a").await;
    let same_key = sp_login(&env, "h2", "idx-b").await;
    assert_eq!(key, same_key);
    assert_eq!(env.engine.bindings().get(&key).len(), 2);

    let request = LogoutRequest::new(PARTNER_IDP, NameId::persistent(BOB)).with_session_index("idx-a");
    let reply = receive(&env, request.clone()).await;

    assert!(reply.status.is_success());
    assert!(!env.sessions.is_active("h1"));
    assert!(env.sessions.is_active("h2"));
    let left: Vec<String> = env
        .engine
        .bindings()
        .get(&key)
        .into_iter()
        .map(|s| s.handle)
        .collect();
    assert_eq!(left, vec!["h2".to_string()]);
    assert!(
        env.engine
            .records()
            .get("bob", HOSTED_SP, PARTNER_IDP)
            .await
            .unwrap()
            .is_some(),
        "SP logout keeps the federation"
    );

    let response = reply.response.expect("SOAP answer");
    assert_eq!(response.binding, SamlBinding::Soap);
    assert!(response.destination.is_none());

    let again = receive(&env, request).await;
    assert_eq!(again.status, FederationStatus::UnknownPrincipal);
}

#[tokio::test]
async fn idp_logout_without_session_index_ends_every_session() {
    let env = TestEnv::new();
    let key = sp_login(&env, "h1", "idx-a").await;
    sp_login(&env, "h2", "idx-b").await;

    let reply = receive(&env, LogoutRequest::new(PARTNER_IDP, NameId::persistent(BOB))).await;

    assert!(reply.status.is_success());
    assert!(!env.sessions.is_active("h1"));
    assert!(!env.sessions.is_active("h2"));
    assert!(env.engine.bindings().get(&key).is_empty());
    assert!(env.engine.bindings().is_empty());
}

#[tokio::test]
async fn local_session_end_releases_its_binding() {
    let env = TestEnv::new();
    let key = sp_login(&env, "h1", "idx-a").await;
    sp_login(&env, "h2", "idx-b").await;

    env.sessions.invalidate("h2").await.unwrap();

    let left: Vec<String> = env
        .engine
        .bindings()
        .get(&key)
        .into_iter()
        .map(|s| s.handle)
        .collect();
    assert_eq!(left, vec!["h1".to_string()]);
    assert!(env.engine.bindings().keys_for_handle("h2").is_empty());
    assert!(env.transport.sent().is_empty(), "an SP session end sends nothing");
}

#[tokio::test]
async fn hosted_sp_rejects_idp_only_verbs() {
    let env = TestEnv::new();
    sp_login(&env, "h1", "idx-a").await;

    let wrong_role = env
        .engine
        .handle(
            FederationRequest::new(
                ProtocolVerb::LogoutRequest(LogoutRequest::new(
                    PARTNER_IDP,
                    NameId::persistent(BOB),
                )),
                EntityRole::IdentityProvider,
                SP_ALIAS,
            )
            .with_binding(SamlBinding::Soap),
        )
        .await;
    assert!(matches!(
        wrong_role.status,
        FederationStatus::RequesterError { .. }
    ));
    assert!(wrong_role.response.is_none());

    let fan_out = env
        .engine
        .handle(FederationRequest::new(
            ProtocolVerb::InitiateLogout {
                session_index: "idx-a".into(),
                reason: None,
            },
            EntityRole::ServiceProvider,
            SP_ALIAS,
        ))
        .await;
    assert!(matches!(fan_out.status, FederationStatus::RequesterError { .. }));
    assert!(env.sessions.is_active("h1"));
}

#[tokio::test]
async fn unknown_meta_alias_is_a_requester_error() {
    let env = TestEnv::new();
    let reply = env
        .engine
        .handle(FederationRequest::new(
            ProtocolVerb::ResolveArtifact {
                handle: "AAEC".into(),
            },
            EntityRole::IdentityProvider,
            "/nowhere",
        ))
        .await;

    assert!(!reply.status.is_success());
    assert!(reply.response.is_none());
}
