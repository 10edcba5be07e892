//! end to end: server broadcasting on a loopback port, watcher merging the stream

use std::time::Duration;

use sensor_stream::config::StreamConfig;
use sensor_stream::render::MemoryTarget;
use sensor_stream::server::{self, AppState, Keepalive};
use sensor_stream::{watch, ws_url, Disconnect, Sensor, Session};
use serde_json::json;
use tokio::net::TcpListener;

async fn start_server(state: AppState) -> String {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host = tcp.local_addr().unwrap().to_string();
    tokio::spawn(server::serve(tcp, state));
    host
}

#[tokio::test]
async fn watcher_merges_stream_until_server_shuts_down() {
    let state = AppState::new();
    let host = start_server(state.clone()).await;

    // stop ticking once the watcher is registered and has had time to receive
    let hub = state.hub().clone();
    let ticker = tokio::spawn(server::run_ticker(
        state.clone(),
        Duration::from_millis(5),
        async move {
            while hub.client_count() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        },
    ));

    let seed = json!({"label": "bench"});
    let mut session = Session::new(
        Sensor::with_seed(seed.as_object().unwrap()),
        MemoryTarget::new(),
    );

    let disconnect = tokio::time::timeout(
        Duration::from_secs(5),
        watch(&ws_url(&host), &mut session),
    )
    .await
    .expect("watch did not end")
    .expect("watch failed");
    ticker.await.unwrap();

    assert!(matches!(disconnect, Disconnect::Closed { .. }), "{disconnect:?}");
    assert!(session.target().renders() > 0);

    let sensor = session.sensor();
    assert_eq!(sensor.get("label"), Some(&json!("bench")));
    for key in ["x", "y", "z", "x_rotation", "y_rotation"] {
        assert!(sensor.get(key).is_some(), "missing {key}");
    }

    let rendered: serde_json::Value =
        serde_json::from_str(session.target().last().unwrap()).unwrap();
    assert_eq!(rendered, serde_json::to_value(sensor).unwrap());
}

#[tokio::test]
async fn server_mirror_matches_what_was_broadcast() {
    let state = AppState::new();
    let _host = start_server(state.clone()).await;

    state.publish(r#"{"x":1,"y":0,"z":0}"#.to_string()).await;
    state.publish(r#"{"x":2,"w":5}"#.to_string()).await;

    let snapshot = state.api_snapshot().await;
    assert_eq!(
        serde_json::to_value(&snapshot.sensor).unwrap(),
        json!({"x": 2, "y": 0, "z": 0, "w": 5})
    );
}

#[tokio::test]
async fn silent_client_is_dropped_after_pong_timeout() {
    // pings are far apart, so only the pong deadline can end the session
    let state = AppState::new().keepalive(Keepalive {
        ping_interval: Duration::from_secs(30),
        pong_timeout: Duration::from_millis(100),
    });
    let host = start_server(state.clone()).await;

    // connected but never reads, so it never answers anything
    let (_stream, _) = tokio_tungstenite::connect_async(ws_url(&host)).await.unwrap();

    let hub = state.hub().clone();
    tokio::time::timeout(Duration::from_secs(2), async {
        while hub.client_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        while hub.client_count() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("silent client was not dropped");
}

#[test]
fn shipped_config_parses() {
    let config = StreamConfig::load("config/stream.toml").unwrap();
    assert_eq!(config.server.tick_ms, 16);
    assert_eq!(ws_url(&config.client.host), "ws://127.0.0.1:3000/ws");
}
