//! End-to-end log streaming over a real listener

use std::io::Write;
use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tempfile::NamedTempFile;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use logcast::api::ApiServer;
use logcast::broadcast::{DispatcherHandle, LogBroadcaster};
use logcast::config::{ApiServerConfig, BroadcastConfig};
use logcast::models::{LogEvent, LogLevel};
use logcast::snapshot::SnapshotReader;
use logcast::PublishOutcome;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    broadcaster: LogBroadcaster,
    shutdown_tx: watch::Sender<bool>,
    dispatcher: DispatcherHandle,
    tasks: Vec<JoinHandle<()>>,
}

impl TestServer {
    async fn start(snapshot: SnapshotReader) -> Self {
        let (broadcaster, dispatcher) = LogBroadcaster::new(BroadcastConfig::default(), snapshot);
        let (dispatcher_handle, dispatcher_shutdown) = DispatcherHandle::new();
        let dispatcher_task = tokio::spawn(dispatcher.run(dispatcher_shutdown));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = ApiServer::new(
            ApiServerConfig {
                port: addr.port(),
                host: "127.0.0.1".to_string(),
                cors_origins: vec![],
            },
            broadcaster.clone(),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server_task = tokio::spawn(async move {
            server.serve(listener, shutdown_rx).await.unwrap();
        });

        Self {
            addr,
            broadcaster,
            shutdown_tx,
            dispatcher: dispatcher_handle,
            tasks: vec![dispatcher_task, server_task],
        }
    }

    async fn connect(&self) -> Client {
        let url = format!("ws://{}/api/ws/logs", self.addr);
        let (client, _) = connect_async(url).await.unwrap();
        client
    }

    async fn wait_for_connections(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.broadcaster.connection_count() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        self.dispatcher.shutdown();
        for task in self.tasks {
            let _ = tokio::time::timeout(Duration::from_secs(5), task).await;
        }
    }
}

async fn next_text(client: &mut Client) -> String {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return text;
        }
    }
}

async fn next_event(client: &mut Client) -> LogEvent {
    serde_json::from_str(&next_text(client).await).unwrap()
}

fn log_file(lines: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(lines.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_live_event_reaches_connected_client_once() {
    let file = log_file("INFO: 2024-01-02 15:04:05 service booted\n");
    let server = TestServer::start(SnapshotReader::new(file.path(), 20)).await;

    let mut client_a = server.connect().await;
    let snapshot = next_event(&mut client_a).await;
    assert_eq!(snapshot.message, "service booted");
    assert_eq!(snapshot.level, LogLevel::Info);

    server.wait_for_connections(1).await;
    let outcome = server
        .broadcaster
        .publish_log(LogLevel::Warn, "m", "x")
        .await;
    assert_eq!(outcome, PublishOutcome::Queued);

    let live = next_event(&mut client_a).await;
    assert_eq!(live.level, LogLevel::Warn);
    assert_eq!(live.message, "m");
    assert_eq!(live.source, "x");

    // Nothing else was delivered for that publish
    let extra = tokio::time::timeout(Duration::from_millis(200), client_a.next()).await;
    assert!(extra.is_err(), "unexpected extra frame: {:?}", extra);

    // A late joiner starts from the snapshot, not the earlier live event
    let mut client_b = server.connect().await;
    let first = next_event(&mut client_b).await;
    assert_eq!(first.message, "service booted");
    assert_ne!(first.message, "m");

    client_a.close(None).await.unwrap();
    client_b.close(None).await.unwrap();
    server.wait_for_connections(0).await;
    server.stop().await;
}

#[tokio::test]
async fn test_missing_log_file_sends_examples_and_answers_ping() {
    let server = TestServer::start(SnapshotReader::new("/nonexistent/logcast/app.log", 20)).await;

    let mut client = server.connect().await;
    let mut messages = Vec::new();
    for _ in 0..3 {
        messages.push(next_event(&mut client).await.message);
    }
    assert_eq!(messages[0], "Log stream ready");

    client
        .send(Message::Text(r#"{"type":"ping"}"#.to_string()))
        .await
        .unwrap();
    let reply: serde_json::Value = serde_json::from_str(&next_text(&mut client).await).unwrap();
    assert_eq!(reply["type"], "pong");
    assert!(reply["time"].as_i64().unwrap() > 0);

    client.close(None).await.unwrap();
    server.wait_for_connections(0).await;
    server.stop().await;
}
