use super::*;
use crate::{
    store::EntityStore,
    test_support::{settle, GatedTransport, ScriptedTransport},
};
use serde_json::json;
use shared::{error::Fault, protocol::Customer};

fn drain(rx: &mut broadcast::Receiver<StoreEvent>) -> Vec<StoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn gated_store(ids: &[&str]) -> (Arc<EntityStore<Customer>>, Arc<GatedTransport>) {
    let transport = GatedTransport::new();
    let store = Arc::new(EntityStore::<Customer>::new(transport.clone(), 64));
    let rows: Vec<Value> = ids.iter().map(|id| json!({ "id": id })).collect();
    let list = transport.gate("customers");
    let _ = list.send(Ok(json!({ "data": rows })));
    assert!(store.list_all(ListParams::default()).await.is_fulfilled());
    (store, transport)
}

async fn wait_in_flight(store: &Arc<EntityStore<Customer>>, expected: usize) {
    settle(|| {
        let store = Arc::clone(store);
        async move { store.in_flight().await == expected }
    })
    .await;
}

#[test]
fn operations_map_to_routes() {
    let kind = EntityKind::Repair;
    let cases = [
        (Operation::List(ListParams::default()), Method::Get, "repairs"),
        (Operation::Get("7".into()), Method::Get, "repairs/7"),
        (Operation::Create(json!({})), Method::Post, "repairs"),
        (Operation::Update("7".into(), json!({})), Method::Put, "repairs/7"),
        (Operation::Delete("7".into()), Method::Delete, "repairs/7"),
        (Operation::Search("screen".into()), Method::Get, "repairs/search"),
    ];

    for (op, method, path) in cases {
        let request = op.request(kind);
        assert_eq!(request.method, method, "{}", op.name());
        assert_eq!(request.path, path, "{}", op.name());
    }
}

#[test]
fn list_params_render_filters_after_paging() {
    let params = ListParams::page(3, 25).with_filter("status", "open");
    assert_eq!(
        params.to_query(),
        vec![
            ("page".to_string(), "3".to_string()),
            ("limit".to_string(), "25".to_string()),
            ("status".to_string(), "open".to_string()),
        ]
    );
}

#[test]
fn only_mutations_are_writes() {
    assert!(Operation::List(ListParams::default()).is_read());
    assert!(Operation::Search("x".into()).is_read());
    assert!(Operation::Get("1".into()).is_read());
    assert!(!Operation::Create(json!({})).is_read());
    assert!(!Operation::Update("1".into(), json!({})).is_read());
    assert!(!Operation::Delete("1".into()).is_read());
}

#[test]
fn page_count_rounds_up() {
    let pagination = Pagination {
        page: 1,
        limit: 5,
        total: 42,
    };
    assert_eq!(page_count(&pagination), 9);
    assert_eq!(
        page_count(&Pagination {
            page: 1,
            limit: 0,
            total: 3
        }),
        0
    );
}

#[tokio::test]
async fn every_completion_is_preceded_by_pending() {
    let transport = ScriptedTransport::new([
        Ok(json!({ "data": [{ "id": "1" }] })),
        Err(Fault::status(500, json!({ "title": "Internal Server Error" }))),
        Ok(json!({ "data": { "id": "2" }, "message": "Created" })),
    ]);
    let store = EntityStore::<Customer>::new(transport, 64);
    let mut rx = store.subscribe();

    store.list_all(ListParams::default()).await;
    store.delete("1").await;
    store.reset().await;
    store.create(&json!({ "name": "n" })).await;

    let mut pending_since_idle = false;
    let events = drain(&mut rx);
    assert_eq!(events.len(), 7);
    for event in events {
        match event.phase {
            RequestPhase::Idle => pending_since_idle = false,
            RequestPhase::Pending => pending_since_idle = true,
            RequestPhase::Fulfilled | RequestPhase::Rejected => {
                assert!(pending_since_idle, "{event:?} without prior Pending")
            }
        }
        assert!(
            event.message.is_none() || event.error.is_none(),
            "message and error both set: {event:?}"
        );
    }
}

#[tokio::test]
async fn dispatch_clears_previous_error() {
    let transport = GatedTransport::new();
    let store = Arc::new(EntityStore::<Customer>::new(transport.clone(), 64));

    let first = transport.gate("customers");
    let _ = first.send(Err(Fault::transport("offline")));
    store.list_all(ListParams::default()).await;
    assert_eq!(store.error().await.as_deref(), Some("offline"));

    let second = transport.gate("customers");
    let task = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.list_all(ListParams::default()).await }
    });
    wait_in_flight(&store, 1).await;

    assert!(store.is_loading().await);
    assert_eq!(store.error().await, None);

    let _ = second.send(Ok(json!({ "data": [] })));
    assert!(task.await.expect("join").is_fulfilled());
    assert!(!store.is_loading().await);
}

#[tokio::test]
async fn older_failure_takes_flags_once_newer_call_has_settled() {
    let (store, transport) = gated_store(&["1", "2"]).await;
    let gate_one = transport.gate("customers/1");
    let gate_two = transport.gate("customers/2");

    let older = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.update("1", &json!({ "name": "one" })).await }
    });
    wait_in_flight(&store, 1).await;
    let newer = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.update("2", &json!({ "name": "two" })).await }
    });
    wait_in_flight(&store, 2).await;

    let _ = gate_two.send(Ok(json!({ "data": { "id": "2", "name": "two" }, "message": "Saved two" })));
    let newer = newer.await.expect("join");
    assert!(newer.is_fulfilled());
    assert_eq!(newer.token(), CorrelationToken(3));
    assert_eq!(store.message().await.as_deref(), Some("Saved two"));

    let _ = gate_one.send(Err(Fault::status(409, json!({ "message": "stale version" }))));
    let older = older.await.expect("join");
    assert_eq!(
        older,
        Completion::Rejected {
            token: CorrelationToken(2),
            error: "stale version".to_string()
        }
    );

    let state = store.snapshot().await;
    assert_eq!(state.phase, RequestPhase::Rejected);
    assert_eq!(state.error.as_deref(), Some("stale version"));
    assert_eq!(state.message, None);
    assert_eq!(state.collection[1].name, "two");
    assert_eq!(store.in_flight().await, 0);
}

#[tokio::test]
async fn failed_update_after_quicker_read_is_visible_in_store() {
    let (store, transport) = gated_store(&["1", "2"]).await;
    let update_gate = transport.gate("customers/1");
    let read_gate = transport.gate("customers/2");

    let update = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.update("1", &json!({ "name": "Ada" })).await }
    });
    wait_in_flight(&store, 1).await;
    let read = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.get_by_id("2").await }
    });
    wait_in_flight(&store, 2).await;

    let _ = read_gate.send(Ok(json!({ "data": { "id": "2", "name": "Grace" } })));
    assert!(read.await.expect("join").is_fulfilled());

    let _ = update_gate.send(Err(Fault::status(422, json!({ "message": "name taken" }))));
    let completion = update.await.expect("join");
    assert_eq!(completion.token(), CorrelationToken(2));
    assert!(matches!(completion, Completion::Rejected { .. }));

    let state = store.snapshot().await;
    assert_eq!(state.phase, RequestPhase::Rejected);
    assert_eq!(state.error.as_deref(), Some("name taken"));
    assert_eq!(state.selected.map(|c| c.name).as_deref(), Some("Grace"));
    assert_eq!(store.in_flight().await, 0);
}

#[tokio::test]
async fn older_completion_applies_data_but_keeps_store_pending() {
    let (store, transport) = gated_store(&["1", "2"]).await;
    let gate_one = transport.gate("customers/1");
    let gate_two = transport.gate("customers/2");

    let older = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.update("1", &json!({ "name": "one" })).await }
    });
    wait_in_flight(&store, 1).await;
    let newer = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.update("2", &json!({ "name": "two" })).await }
    });
    wait_in_flight(&store, 2).await;

    let _ = gate_one.send(Ok(json!({ "data": { "id": "1", "name": "one" } })));
    assert!(matches!(
        older.await.expect("join"),
        Completion::Superseded { error: None, .. }
    ));

    let state = store.snapshot().await;
    assert_eq!(state.collection[0].name, "one");
    assert_eq!(state.phase, RequestPhase::Pending);
    assert_eq!(state.message, None);

    let _ = gate_two.send(Err(Fault::transport("timed out")));
    assert!(matches!(
        newer.await.expect("join"),
        Completion::Rejected { .. }
    ));
    let state = store.snapshot().await;
    assert_eq!(state.phase, RequestPhase::Rejected);
    assert_eq!(state.error.as_deref(), Some("timed out"));
    assert_eq!(state.collection[0].name, "one");
}

#[tokio::test]
async fn reset_discards_calls_still_in_flight() {
    let (store, transport) = gated_store(&["1"]).await;
    let gate = transport.gate("customers/1");

    let pending = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.delete("1").await }
    });
    wait_in_flight(&store, 1).await;

    store.reset().await;
    let _ = gate.send(Ok(json!({ "message": "Deleted" })));

    assert!(matches!(
        pending.await.expect("join"),
        Completion::Discarded { .. }
    ));
    let state = store.snapshot().await;
    assert_eq!(state.phase, RequestPhase::Idle);
    assert!(state.collection.is_empty());
    assert_eq!(state.message, None);
    assert_eq!(store.in_flight().await, 0);
}
