//! The background worker end to end: sink in, view and notifications out

use chrono::Utc;
use isy_api::HubSnapshot;
use isy_parser::{
    EventKind, FixedPoint, HubEvent, NodeDescriptor, NodeProperty, NodeTree, ProgramList,
    PropertyUpdate, Protocol,
};
use isy_state::{
    AttributeValue, ChangeKind, ChangeNotification, HubId, HubSettings, ReconcileMode,
    StateWorker, StoreConfig,
};
use isy_stream::{ConnectionState, EventSink};
use parking_lot::Mutex;
use std::sync::Arc;

fn hub() -> HubId {
    HubId::new("00:21:b9:02:1a:2b")
}

fn snapshot() -> HubSnapshot {
    HubSnapshot {
        nodes: NodeTree {
            nodes: vec![NodeDescriptor {
                address: "1A 2B 3C 1".to_string(),
                name: "Porch".to_string(),
                parent: None,
                primary: None,
                family: None,
                protocol: Protocol::Insteon,
                node_def_id: None,
                type_code: Some("2.42.67.0".to_string()),
                zwave_category: None,
                enabled: true,
                flag: 128,
                properties: vec![NodeProperty {
                    id: "ST".to_string(),
                    value: Some(FixedPoint::integer(0)),
                    formatted: None,
                    uom: Some("100".to_string()),
                    precision: 0,
                }],
            }],
            ..Default::default()
        },
        programs: ProgramList::default(),
        variables: Vec::new(),
        network_resources: Vec::new(),
        fetched_at: Utc::now(),
    }
}

fn porch_on() -> HubEvent {
    HubEvent::new(EventKind::Property(PropertyUpdate {
        address: "1A 2B 3C 1".to_string(),
        property: "ST".to_string(),
        value: Some(FixedPoint::integer(255)),
        uom: Some("100".to_string()),
        precision: Some(0),
        formatted: None,
    }))
}

#[tokio::test(start_paused = true)]
async fn test_sink_events_reach_view_and_subscribers() {
    let worker = StateWorker::spawn(StoreConfig::default()).unwrap();
    worker.register_hub(hub(), HubSettings::default()).unwrap();
    let report = worker
        .reconcile(hub(), snapshot(), ReconcileMode::Full)
        .await
        .unwrap();
    assert_eq!(report.added.len(), 1);

    let seen: Arc<Mutex<Vec<ChangeNotification>>> = Arc::default();
    let sink_seen = Arc::clone(&seen);
    worker.add_listener(move |change: &ChangeNotification| sink_seen.lock().push(change.clone()));
    let mut changes = worker.subscribe();

    let sink = worker.sink();
    sink.state_changed(&hub(), ConnectionState::Streaming);
    sink.event(&hub(), porch_on());
    worker.flush().await.unwrap();

    let view = worker.view();
    let porch = view.entity_by_address(&hub(), "1A 2B 3C 1").unwrap();
    assert_eq!(porch.state(), Some(&AttributeValue::text("on")));
    assert_eq!(view.connection_state(&hub()), Some(ConnectionState::Streaming));

    let change = changes.recv().await.unwrap();
    assert_eq!(change.kind, ChangeKind::Updated);
    assert_eq!(seen.lock().len(), 1);

    worker.shutdown().await;
    assert!(worker.register_hub(hub(), HubSettings::default()).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_remove_hub_reports_removed_entities() {
    let worker = StateWorker::spawn(StoreConfig::default()).unwrap();
    worker.register_hub(hub(), HubSettings::default()).unwrap();
    worker
        .reconcile(hub(), snapshot(), ReconcileMode::Full)
        .await
        .unwrap();

    assert_eq!(worker.remove_hub(hub()).await.unwrap(), 1);
    assert!(worker.view().entities(None).is_empty());
    worker.shutdown().await;
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let config = StoreConfig::default().with_queue_capacity(0);
    assert!(StateWorker::spawn(config).is_err());
}
