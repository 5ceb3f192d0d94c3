//! IdP session registration under concurrency.

use std::collections::HashSet;

use fed_model::{EntityRole, NameId};
use fed_protocol_saml::{FederationRequest, ProtocolVerb, SamlError};
use futures::future::join_all;

use crate::common::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_federations_with_one_sp_keep_one_pair() {
    let env = TestEnv::new();
    env.sessions.login("h1", "alice");

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let engine = env.engine.clone();
            tokio::spawn(async move {
                engine
                    .record_idp_federation(
                        IDP_ALIAS,
                        "h1",
                        NameId::persistent(name_id_value("alice", SP1)),
                        SP1,
                        None,
                    )
                    .await
            })
        })
        .collect();
    let indexes: HashSet<String> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    assert_eq!(indexes.len(), 1, "one local session maps to one IdP session");
    let idx = indexes.into_iter().next().unwrap();
    let session = env.engine.sessions().get(&idx).await.unwrap();
    assert_eq!(session.pairs().len(), 1);
    assert_eq!(session.pairs()[0].sp_entity_id, SP1);
    assert_eq!(env.sessions.listener_count("h1"), 1);
    assert_eq!(env.engine.sessions().active_locks(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_federations_with_different_sps_are_all_kept() {
    let env = TestEnv::new();
    env.sessions.login("h1", "alice");
    let sps: Vec<String> = (0..8).map(|i| format!("https://sp{i}.example.net")).collect();

    let tasks: Vec<_> = sps
        .iter()
        .cloned()
        .map(|sp| {
            let engine = env.engine.clone();
            tokio::spawn(async move {
                engine
                    .record_idp_federation(
                        IDP_ALIAS,
                        "h1",
                        NameId::persistent(name_id_value("alice", &sp)),
                        &sp,
                        None,
                    )
                    .await
            })
        })
        .collect();
    let mut indexes: Vec<String> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();
    indexes.sort();
    indexes.dedup();
    assert_eq!(indexes.len(), 1);

    let session = env.engine.sessions().get(&indexes[0]).await.unwrap();
    let federated: HashSet<&str> = session
        .pairs()
        .iter()
        .map(|p| p.sp_entity_id.as_str())
        .collect();
    assert_eq!(federated.len(), sps.len());
    for sp in &sps {
        assert!(federated.contains(sp.as_str()), "{sp} lost");
    }
}

#[tokio::test]
async fn second_node_rehydrates_session_from_repository() {
    let env = TestEnv::new();
    let idx = env.idp_login("h1", "alice", &[SP1, SP2]).await;

    let other = env.node();
    let session = other.sessions().get(&idx).await.expect("rehydrated");
    assert_eq!(session.local_session_handle, "h1");
    assert!(session.has_sp(SP1));
    assert!(session.has_sp(SP2));
}

#[tokio::test]
async fn transient_name_id_is_cached_not_stored() {
    let env = TestEnv::new();
    env.sessions.login("h1", "alice");
    let idx = env
        .engine
        .record_idp_federation(IDP_ALIAS, "h1", NameId::transient("t-4711"), SP1, None)
        .await
        .unwrap();

    assert_eq!(
        env.engine.transient_name_ids().user_for("t-4711").as_deref(),
        Some("alice")
    );
    assert!(env
        .engine
        .records()
        .get("alice", IDP, SP1)
        .await
        .unwrap()
        .is_none());

    let reply = env
        .engine
        .handle(FederationRequest::new(
            ProtocolVerb::InitiateLogout {
                session_index: idx,
                reason: None,
            },
            EntityRole::IdentityProvider,
            IDP_ALIAS,
        ))
        .await;
    assert!(reply.status.is_success());
    assert!(env.engine.transient_name_ids().user_for("t-4711").is_none());
}

#[tokio::test]
async fn affiliation_federation_requires_membership() {
    let env = TestEnv::new();
    env.metadata.add_affiliation(AFFILIATION, &[SP1, SP2]);
    env.sessions.login("h1", "alice");
    let name_id = NameId::persistent("aff-alice").with_sp_name_qualifier(AFFILIATION);

    env.engine
        .record_idp_federation(IDP_ALIAS, "h1", name_id.clone(), SP1, Some(AFFILIATION))
        .await
        .unwrap();
    let record = env
        .engine
        .records()
        .get("alice", IDP, AFFILIATION)
        .await
        .unwrap()
        .expect("scoped record");
    assert!(record.affiliation);

    let err = env
        .engine
        .record_idp_federation(IDP_ALIAS, "h1", name_id, SP3, Some(AFFILIATION))
        .await
        .unwrap_err();
    assert!(matches!(err, SamlError::RequestDenied(_)), "{err:?}");
}

#[tokio::test]
async fn registration_for_unknown_local_session_fails() {
    let env = TestEnv::new();
    let result = env
        .engine
        .record_idp_federation(IDP_ALIAS, "nobody", NameId::persistent("n"), SP1, None)
        .await;

    assert!(result.is_err());
    assert!(env.engine.sessions().is_empty());
}
