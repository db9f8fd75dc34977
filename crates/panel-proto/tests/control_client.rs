//! ControlClient against the in-process mock control server.
//!
//! Run with: cargo test -p panel-proto --test control_client

mod common;

use std::time::Duration;

use panel_proto::client::{run_event_stream, Backoff, ControlClient, StreamEvent};
use panel_proto::error::ClientError;
use panel_proto::protocol::{
    endpoints, Command, Direction, InfoAction, PushEvent, DEFAULT_TACHOMAX,
};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use common::mock_server::MockServer;

fn client(server: &MockServer) -> ControlClient {
    ControlClient::new(&server.base_url(), Duration::from_secs(2)).unwrap()
}

fn fast_backoff() -> Backoff {
    Backoff::new(Duration::from_millis(10), Duration::from_millis(40))
}

async fn next_event(rx: &mut mpsc::Receiver<StreamEvent>) -> StreamEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for stream event")
        .expect("stream task ended early")
}

#[tokio::test]
async fn test_fetches_catalogs_and_snapshots() {
    let server = MockServer::start(vec![]).await.unwrap();
    let client = client(&server);

    let locos = client.loco_catalog().await.unwrap();
    let uids: Vec<_> = locos.iter().map(|l| l.uid).collect();
    assert_eq!(uids, vec![7, 16389]);
    assert_eq!(locos.get(16389).unwrap().tachomax(), 120);
    assert_eq!(locos.get(16389).unwrap().function_icon_id(1), 7);
    assert_eq!(locos.get(7).unwrap().tachomax(), DEFAULT_TACHOMAX);
    assert_eq!(locos.get(7).unwrap().icon_key(), "v200");

    let switches = client.switch_catalog().await.unwrap();
    assert_eq!(switches.label(0), "Einfahrt");
    assert_eq!(switches.label(1), "12");
    assert_eq!(switches.label(2), "3");

    let snap = client.loco_state(7).await.unwrap();
    assert_eq!(snap.speed, 420);
    assert_eq!(snap.direction, Direction::Reverse);
    assert!(snap.function(0));
    assert!(snap.function(3));
    assert!(!snap.function(1));

    let states = client.switch_states().await.unwrap();
    assert_eq!(states.0, vec![0, 1, 1, 0]);

    assert!(client.run_state().await.unwrap().running);
}

#[tokio::test]
async fn test_unknown_loco_is_a_status_error() {
    let server = MockServer::start(vec![]).await.unwrap();
    let err = client(&server).loco_state(99).await.unwrap_err();
    match err {
        ClientError::Status { status, url } => {
            assert_eq!(status.as_u16(), 404);
            assert!(url.ends_with(endpoints::LOCO_STATE));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unreachable_server_is_a_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = ControlClient::new(&format!("http://127.0.0.1:{port}"), Duration::from_secs(1)).unwrap();
    assert!(matches!(
        client.loco_catalog().await,
        Err(ClientError::Transport { .. })
    ));
}

#[tokio::test]
async fn test_commands_post_expected_bodies() {
    let server = MockServer::start(vec![]).await.unwrap();
    let client = client(&server);

    let cmds = vec![
        Command::set_speed(7, 640),
        Command::SetDirection {
            loco: 7,
            direction: Direction::Forward,
        },
        Command::set_function(7, 3, false).unwrap(),
        Command::set_switch(13, 1).unwrap(),
        Command::SetRunState { running: true },
        InfoAction::ImportLocos.command(),
    ];
    for cmd in &cmds {
        client.send(cmd).await.unwrap();
    }

    assert_eq!(
        server.commands(),
        vec![
            ("/api/control_event".to_string(), json!({ "loco_id": 7, "speed": 640 })),
            ("/api/control_event".to_string(), json!({ "loco_id": 7, "direction": 1 })),
            (
                "/api/control_event".to_string(),
                json!({ "loco_id": 7, "function": 3, "value": 0 })
            ),
            ("/api/keyboard_event".to_string(), json!({ "idx": 13, "value": 1 })),
            ("/api/stop_button".to_string(), json!({ "state": true })),
            (
                "/api/info_events".to_string(),
                json!({ "loco_id": 1, "function": 0, "value": 1 })
            ),
        ]
    );
}

#[tokio::test]
async fn test_asset_lookup() {
    let server = MockServer::start(vec![]).await.unwrap();
    let client = client(&server);
    let base = format!("{}/static", server.base_url());

    assert!(client
        .asset_exists(&format!("{base}/fcticons/FktIcon_a_ge_07.png"))
        .await
        .unwrap());
    assert!(client
        .asset_exists(&format!("{base}/icons/leeres Gleis.png"))
        .await
        .unwrap());
    assert!(!client
        .asset_exists(&format!("{base}/fcticons/FktIcon_a_ge_99.png"))
        .await
        .unwrap());
    let err = client
        .asset_exists(&format!("{base}/broken/FktIcon_a_ge_07.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Status { .. }));
}

#[tokio::test]
async fn test_event_stream_in_order_with_reconnect() {
    let first = vec![
        r#"{"type":"system","status":true}"#.to_string(),
        r#"{"type":"speed","loc_id":1,"value":500}"#.to_string(),
    ];
    let second = vec![r#"{"type":"switch","idx":13,"value":1}"#.to_string()];
    let server = MockServer::start(vec![first.clone(), second.clone()])
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_event_stream(
        client(&server),
        fast_backoff(),
        tx,
        cancel.clone(),
    ));

    assert_eq!(next_event(&mut rx).await, StreamEvent::Connected { resumed: false });
    assert_eq!(next_event(&mut rx).await, StreamEvent::Data(first[0].clone()));
    assert_eq!(next_event(&mut rx).await, StreamEvent::Data(first[1].clone()));
    assert_eq!(next_event(&mut rx).await, StreamEvent::Disconnected);
    assert_eq!(next_event(&mut rx).await, StreamEvent::Connected { resumed: true });
    match next_event(&mut rx).await {
        StreamEvent::Data(p) => assert_eq!(
            PushEvent::decode(&p).unwrap(),
            PushEvent::Switch {
                address: 13,
                value: 1
            }
        ),
        other => panic!("expected data, got {other:?}"),
    }
    assert_eq!(next_event(&mut rx).await, StreamEvent::Disconnected);
    // Scripts exhausted: the third subscription stays open and silent.
    assert_eq!(next_event(&mut rx).await, StreamEvent::Connected { resumed: true });

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("stream task ignored cancellation")
        .unwrap();
    assert_eq!(server.subscriptions(), 3);
}

#[tokio::test]
async fn test_event_stream_retries_until_cancelled() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = ControlClient::new(&format!("http://127.0.0.1:{port}"), Duration::from_millis(200)).unwrap();

    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_event_stream(client, fast_backoff(), tx, cancel.clone()));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(rx.try_recv().is_err());

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("stream task ignored cancellation")
        .unwrap();
}
