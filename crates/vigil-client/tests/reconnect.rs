//! Viewer client against a throwaway WebSocket server.

use std::time::Duration;

use futures_util::SinkExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use vigil_client::{ClientConfig, ConnectionState, ReconnectPolicy, ViewerClient};
use vigil_core::{MonitorEvent, WireBody, WireMessage, encode_frame};

const WAIT: Duration = Duration::from_secs(5);

fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        initial: Duration::from_millis(20),
        factor: 1.5,
        max: Duration::from_millis(200),
    }
}

async fn listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/api/events", listener.local_addr().unwrap());
    (listener, url)
}

fn recovered(host: &str) -> WireMessage {
    WireMessage::from(&MonitorEvent::host_recovered(host))
}

#[tokio::test]
async fn multi_message_frames_are_split_in_order() {
    let (listener, url) = listener().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = accept_async(stream).await.unwrap();
        let frame = format!(
            "{}\n\n{}\n{}\nnot json\n",
            recovered("a").to_line(),
            WireMessage::ping().to_line(),
            recovered("b").to_line(),
        );
        socket.send(Message::Text(frame.into())).await.unwrap();
        // Hold the connection open until the client leaves.
        tokio::time::sleep(WAIT).await;
    });

    let mut client = ViewerClient::connect(ClientConfig::new(url)).unwrap();
    let first = tokio::time::timeout(WAIT, client.recv()).await.unwrap().unwrap();
    let second = tokio::time::timeout(WAIT, client.recv()).await.unwrap().unwrap();

    let hosts: Vec<_> = [first, second]
        .into_iter()
        .map(|msg| match msg.body {
            WireBody::HostRecovered(p) => p.host,
            other => panic!("unexpected message {other:?}"),
        })
        .collect();
    assert_eq!(hosts, vec!["a", "b"]);

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn dropped_connection_is_reestablished() {
    let (listener, url) = listener().await;
    let (accepted_tx, mut accepted) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        for round in 0..2 {
            let (stream, _) = listener.accept().await.unwrap();
            let mut socket = accept_async(stream).await.unwrap();
            accepted_tx.send(round).unwrap();
            let frame = encode_frame(&[recovered(&format!("round-{round}"))]);
            socket.send(Message::Text(frame.into())).await.unwrap();
            if round == 0 {
                // Unexpected close: the server goes away.
                drop(socket);
            } else {
                tokio::time::sleep(WAIT).await;
            }
        }
    });

    let config = ClientConfig::new(url).with_policy(fast_policy());
    let mut client = ViewerClient::connect(config).unwrap();

    for expected in ["round-0", "round-1"] {
        let msg = tokio::time::timeout(WAIT, client.recv()).await.unwrap().unwrap();
        assert_eq!(msg.body, recovered(expected).body);
    }
    assert_eq!(accepted.recv().await, Some(0));
    assert_eq!(accepted.recv().await, Some(1));

    let state = tokio::time::timeout(
        WAIT,
        client.wait_for_state(|s| *s == ConnectionState::Connected),
    )
    .await
    .unwrap();
    assert_eq!(state, Some(ConnectionState::Connected));

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn silent_connection_times_out_and_reconnects() {
    let (listener, url) = listener().await;
    let (accepted_tx, mut accepted) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut sockets = Vec::new();
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            sockets.push(accept_async(stream).await.unwrap());
            if accepted_tx.send(sockets.len()).is_err() {
                break;
            }
        }
    });

    let config = ClientConfig::new(url)
        .with_policy(fast_policy())
        .with_idle_timeout(Some(Duration::from_millis(100)));
    let client = ViewerClient::connect(config).unwrap();

    // The first socket never speaks, so the client must open a second.
    let second = tokio::time::timeout(WAIT, async {
        loop {
            if accepted.recv().await == Some(2) {
                break;
            }
        }
    })
    .await;
    assert!(second.is_ok());

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn disconnect_ends_message_stream() {
    let (listener, url) = listener().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let _socket = accept_async(stream).await.unwrap();
        tokio::time::sleep(WAIT).await;
    });

    let mut client = ViewerClient::connect(ClientConfig::new(url)).unwrap();
    let connected = tokio::time::timeout(
        WAIT,
        client.wait_for_state(|s| *s == ConnectionState::Connected),
    )
    .await
    .unwrap();
    assert_eq!(connected, Some(ConnectionState::Connected));
    assert_eq!(client.state(), ConnectionState::Connected);

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn disconnect_with_unread_backlog_returns() {
    let (listener, url) = listener().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = accept_async(stream).await.unwrap();
        let burst: Vec<_> = (0..10).map(|i| recovered(&format!("h{i}"))).collect();
        socket
            .send(Message::Text(encode_frame(&burst).into()))
            .await
            .unwrap();
        tokio::time::sleep(WAIT).await;
    });

    let mut config = ClientConfig::new(url);
    config.buffer = 2;
    let mut client = ViewerClient::connect(config).unwrap();
    tokio::time::timeout(
        WAIT,
        client.wait_for_state(|s| *s == ConnectionState::Connected),
    )
    .await
    .unwrap();
    // Let the session fill the buffer and stall on the third message.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let stopped = tokio::time::timeout(Duration::from_secs(3), client.disconnect()).await;
    assert!(matches!(stopped, Ok(Ok(()))));
}
