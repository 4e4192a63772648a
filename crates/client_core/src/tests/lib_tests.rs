use super::*;
use crate::test_support::ScriptedTransport;
use serde_json::json;
use std::collections::HashSet;

#[tokio::test]
async fn every_kind_gets_its_own_store() {
    let transport = ScriptedTransport::new([]);
    let stores = BusinessStores::new(transport, &ClientSettings::default());

    let kinds: HashSet<EntityKind> = stores.observed().iter().map(|s| s.kind()).collect();
    assert_eq!(kinds.len(), EntityKind::ALL.len());

    for kind in EntityKind::ALL {
        assert_eq!(stores.observed_kind(kind).kind(), kind);
    }
}

#[tokio::test]
async fn stores_share_transport_but_not_state() {
    let transport = ScriptedTransport::new([
        Ok(json!({ "data": [{ "id": "c1", "name": "Ada" }] })),
        Ok(json!({ "data": [{ "id": "r1", "customer_id": "c1", "device": "phone" }] })),
    ]);
    let stores = BusinessStores::new(transport.clone(), &ClientSettings::default());

    stores.customers.list_all(ListParams::default()).await;
    stores.repairs.list_all(ListParams::default()).await;

    let paths: Vec<String> = transport.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(paths, vec!["customers", "repairs"]);
    assert_eq!(stores.customers.collection().await.len(), 1);
    assert_eq!(
        stores.repairs.collection().await[0].customer_id,
        Some("c1".into())
    );
    assert_eq!(stores.sales.phase().await, RequestPhase::Idle);

    stores.reset_all().await;
    assert!(stores.customers.collection().await.is_empty());
    assert_eq!(stores.repairs.phase().await, RequestPhase::Idle);
}

#[tokio::test]
async fn one_bridge_watches_all_stores() {
    let transport = ScriptedTransport::new([
        Ok(json!({ "data": { "id": "s1", "total": 19.5 }, "message": "Sale recorded" })),
        Err(shared::error::Fault::status(
            400,
            json!({ "errors": ["subject is required"] }),
        )),
    ]);
    let stores = BusinessStores::new(transport, &ClientSettings::default());
    let mut bridge = NotificationBridge::new(16);
    let mut notifications = bridge.subscribe();
    bridge.watch_all(stores.observed());

    stores.sales.create(&json!({ "total": 19.5 })).await;
    stores.conversations.create(&json!({})).await;

    let mut received = Vec::new();
    for _ in 0..2 {
        received.push(
            tokio::time::timeout(std::time::Duration::from_secs(2), notifications.recv())
                .await
                .expect("in time")
                .expect("notification"),
        );
    }
    received.sort_by_key(|n| n.kind.path());

    assert_eq!(received[0].kind, EntityKind::Conversation);
    assert_eq!(received[0].level, NotificationLevel::Failure);
    assert_eq!(received[0].text, "subject is required");
    assert_eq!(received[1].kind, EntityKind::Sale);
    assert_eq!(received[1].level, NotificationLevel::Success);
    assert_eq!(received[1].text, "Sale recorded");
}
