//! End-to-end tests against a real WebSocket server on loopback.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use taskboard_connection::{
    ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionState, Endpoint,
    ReconnectPolicy, Scheme,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Echo server. Replies `echo:<text>` to every text frame and closes the
/// connection when it receives `close-me`.
struct TestServer {
    endpoint: Endpoint,
    accepted: mpsc::UnboundedReceiver<()>,
    ended: mpsc::UnboundedReceiver<()>,
}

async fn spawn_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (accepted_tx, accepted) = mpsc::unbounded_channel();
    let (ended_tx, ended) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let accepted_tx = accepted_tx.clone();
            let ended_tx = ended_tx.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
                    return;
                };
                let _ = accepted_tx.send(());

                while let Some(Ok(msg)) = ws.next().await {
                    match msg {
                        Message::Text(t) if t.as_str() == "close-me" => {
                            let _ = ws.close(None).await;
                            break;
                        }
                        Message::Text(t) => {
                            let reply = Message::text(format!("echo:{}", t.as_str()));
                            if ws.send(reply).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
                let _ = ended_tx.send(());
            });
        }
    });

    TestServer {
        endpoint: Endpoint::new(Scheme::Ws, "127.0.0.1", port, "/"),
        accepted,
        ended,
    }
}

fn fast_config() -> ConnectionConfig {
    ConnectionConfig {
        reconnect: ReconnectPolicy { delay_ms: 200 },
        ping_interval_ms: 0,
        ..Default::default()
    }
}

async fn next_message(rx: &mut mpsc::Receiver<ConnectionEvent>) -> String {
    let wait = async {
        loop {
            match rx.recv().await {
                Some(ConnectionEvent::MessageReceived(m)) => return m,
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("timed out waiting for a message")
}

async fn next_connection_change(rx: &mut mpsc::Receiver<ConnectionEvent>) -> bool {
    let wait = async {
        loop {
            match rx.recv().await {
                Some(ConnectionEvent::ConnectionChanged { connected }) => return connected,
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("timed out waiting for a connection change")
}

#[tokio::test]
async fn sends_and_receives_in_order() {
    let server = spawn_server().await;
    let mgr = ConnectionManager::new(server.endpoint.clone(), fast_config());
    let mut events = mgr.events(64);

    mgr.connect().await;
    assert_eq!(mgr.state(), ConnectionState::Connected);
    assert!(next_connection_change(&mut events).await);

    for m in ["one", "two", "three"] {
        mgr.send(m).await;
    }
    assert_eq!(next_message(&mut events).await, "echo:one");
    assert_eq!(next_message(&mut events).await, "echo:two");
    assert_eq!(next_message(&mut events).await, "echo:three");

    mgr.shutdown().await;
}

#[tokio::test]
async fn server_close_is_followed_by_reconnect() {
    let mut server = spawn_server().await;
    let mgr = ConnectionManager::new(server.endpoint.clone(), fast_config());
    let mut events = mgr.events(64);

    mgr.connect().await;
    assert!(next_connection_change(&mut events).await);

    mgr.send("close-me").await;
    assert!(!next_connection_change(&mut events).await);
    assert!(next_connection_change(&mut events).await);

    // Two accepted handshakes: the original and the reconnect.
    for _ in 0..2 {
        tokio::time::timeout(Duration::from_secs(5), server.accepted.recv())
            .await
            .expect("handshake")
            .expect("server running");
    }

    mgr.send("after reconnect").await;
    assert_eq!(next_message(&mut events).await, "echo:after reconnect");

    mgr.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_the_connection() {
    let mut server = spawn_server().await;
    let mgr = ConnectionManager::new(server.endpoint.clone(), fast_config());

    mgr.connect().await;
    assert!(mgr.is_connected());

    mgr.shutdown().await;
    assert_eq!(mgr.state(), ConnectionState::Closing);

    tokio::time::timeout(Duration::from_secs(5), server.ended.recv())
        .await
        .expect("server should see the connection end")
        .expect("server running");
}

#[tokio::test]
async fn unreachable_endpoint_stays_disconnected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let endpoint = Endpoint::new(Scheme::Ws, "127.0.0.1", port, "/");
    let mgr = ConnectionManager::new(endpoint, fast_config());
    let mut events = mgr.events(64);

    mgr.connect().await;
    assert_eq!(mgr.state(), ConnectionState::Disconnected);

    mgr.send("dropped").await;
    tokio::time::timeout(Duration::from_secs(2), mgr.shutdown())
        .await
        .expect("shutdown should not wait on retries");

    while let Ok(ev) = events.try_recv() {
        assert!(!matches!(ev, ConnectionEvent::ConnectionChanged { .. }));
    }
}
