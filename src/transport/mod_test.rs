use super::memory::MemoryConnector;
use super::*;

#[test]
fn transport_kind_parses_config_names() {
    assert_eq!(TransportKind::parse("websocket"), Some(TransportKind::WebSocket));
    assert_eq!(TransportKind::parse(" ws "), Some(TransportKind::WebSocket));
    assert_eq!(TransportKind::parse("polling"), Some(TransportKind::Polling));
    assert_eq!(TransportKind::parse("carrier-pigeon"), None);
    assert_eq!(TransportKind::Polling.to_string(), "polling");
}

#[tokio::test]
async fn upgrade_prefers_first_available_connector() {
    let (preferred, mut preferred_peers) = MemoryConnector::new();
    let (fallback, mut fallback_peers) = MemoryConnector::new();
    let upgrade = UpgradeConnector::new(vec![preferred.clone() as Arc<dyn Connector>, fallback.clone() as Arc<dyn Connector>]);

    let link = upgrade.connect("tok").await.expect("connect");
    assert_eq!(link.connection_id, "mem-1");
    assert!(preferred_peers.try_recv().is_ok());
    assert!(fallback_peers.try_recv().is_err());
}

#[tokio::test]
async fn upgrade_falls_back_when_preferred_refuses() {
    let (preferred, _preferred_peers) = MemoryConnector::new();
    let (fallback, mut fallback_peers) = MemoryConnector::new();
    preferred.set_refusing(true);
    let upgrade = UpgradeConnector::new(vec![preferred.clone() as Arc<dyn Connector>, fallback.clone() as Arc<dyn Connector>]);

    let _link = upgrade.connect("tok").await.expect("connect via fallback");
    let peer = fallback_peers.try_recv().expect("fallback peer");
    assert_eq!(peer.token, "tok");
}

#[tokio::test]
async fn upgrade_reports_last_error_when_all_fail() {
    let (only, _peers) = MemoryConnector::new();
    only.set_refusing(true);
    let upgrade = UpgradeConnector::new(vec![only.clone() as Arc<dyn Connector>]);
    assert!(matches!(upgrade.connect("tok").await, Err(TransportError::Refused(_))));

    let empty = UpgradeConnector::new(Vec::new());
    assert!(matches!(empty.connect("tok").await, Err(TransportError::NoTransports)));
}

#[test]
fn from_config_builds_requested_chain() {
    let mut config = crate::ChatConfig::default();
    config.transports = vec![TransportKind::Polling, TransportKind::Memory, TransportKind::WebSocket];
    let upgrade = UpgradeConnector::from_config(&config);
    let kinds: Vec<_> = upgrade.connectors.iter().map(|c| c.kind()).collect();
    assert_eq!(kinds, vec![TransportKind::Polling, TransportKind::WebSocket]);
    assert_eq!(upgrade.kind(), TransportKind::Polling);
}
