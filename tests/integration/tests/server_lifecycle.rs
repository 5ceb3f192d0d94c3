//! Server assembly and the background sweep.

use std::sync::Arc;
use std::time::Duration;

use fed_account::InMemoryAccountStore;
use fed_model::NameId;
use fed_protocol_saml::{LogoutRequest, SamlMessage};
use fed_server::{Server, ServerConfig};
use fed_spi::Ports;

use crate::common::*;

async fn server() -> Server {
    let ports = Ports::new(
        Arc::new(FakeMetadata::default()),
        Arc::new(FakeCrypto),
        Arc::new(FakeSessions::default()),
    );
    Server::new(
        ServerConfig::default(),
        ports,
        Arc::new(InMemoryAccountStore::new()),
        Arc::new(ScriptedTransport::default()),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn sweeper_purges_expired_artifacts_and_stops_on_shutdown() {
    let server = server().await;
    let engine = server.engine().clone();
    let short_lived = SamlMessage::LogoutRequest(
        LogoutRequest::new(SP1, NameId::persistent("n1")).valid_for(chrono::Duration::milliseconds(50)),
    );
    engine.artifacts().store(short_lived).await.unwrap();
    assert_eq!(engine.artifacts().len(), 1);
    tokio::time::sleep(Duration::from_millis(80)).await;

    let result = server
        .run_until(tokio::time::sleep(Duration::from_millis(100)))
        .await;

    assert!(result.is_ok());
    assert!(engine.artifacts().is_empty());
}

#[tokio::test]
async fn default_configuration_assembles_in_memory() {
    let server = server().await;

    assert!(server.config().engine.repository.redis_url.is_none());
    assert!(server.engine().sessions().is_empty());
    assert!(server.engine().bindings().is_empty());
}
