#![allow(clippy::unwrap_used)]
// Integration tests for `StompLink` against an in-process mock broker.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tokio_util::sync::CancellationToken;
use url::Url;

use liftdeck_api::stomp::{self, Decoded};
use liftdeck_api::{
    Error, Frame, FrameCommand, HeartBeat, LinkConfig, LinkEvent, LinkState, ReconnectConfig,
    StompLink,
};

const TOPIC: &str = "/topic/elevators";
const WAIT: Duration = Duration::from_secs(5);

// ── Mock broker helpers ─────────────────────────────────────────────

type BrokerSocket = WebSocketStream<TcpStream>;

async fn listen() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = Url::parse(&format!("ws://{addr}/ws/websocket")).unwrap();
    (listener, url)
}

async fn accept(listener: &TcpListener) -> BrokerSocket {
    let (stream, _) = listener.accept().await.unwrap();
    accept_async(stream).await.unwrap()
}

async fn recv_frame(ws: &mut BrokerSocket) -> Frame {
    loop {
        let msg = ws.next().await.unwrap().unwrap();
        if let Message::Text(text) = msg {
            let frame = stomp::decode(&text).unwrap().into_iter().find_map(|d| match d {
                Decoded::Frame(f) => Some(f),
                Decoded::HeartBeat => None,
            });
            if let Some(frame) = frame {
                return frame;
            }
        }
    }
}

async fn send_frame(ws: &mut BrokerSocket, frame: Frame) {
    ws.send(Message::text(frame.encode())).await.unwrap();
}

/// Accept CONNECT, answer CONNECTED, and return the SUBSCRIBE frame.
async fn handshake(ws: &mut BrokerSocket) -> Frame {
    let connect = recv_frame(ws).await;
    assert_eq!(connect.command, FrameCommand::Connect);
    send_frame(
        ws,
        Frame::new(FrameCommand::Connected)
            .header("version", "1.2")
            .header("heart-beat", "0,0"),
    )
    .await;
    recv_frame(ws).await
}

fn config(url: Url, delay: Duration) -> LinkConfig {
    LinkConfig {
        reconnect: ReconnectConfig { delay },
        heart_beat: HeartBeat::DISABLED,
        ..LinkConfig::new(url, TOPIC)
    }
}

async fn next_event(rx: &mut mpsc::Receiver<LinkEvent>) -> LinkEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for link event")
        .expect("link event channel closed")
}

async fn expect_state(rx: &mut mpsc::Receiver<LinkEvent>, expected: LinkState) {
    match next_event(rx).await {
        LinkEvent::State(state) => assert_eq!(state, expected),
        LinkEvent::Message(msg) => panic!("expected {expected:?}, got message {msg:?}"),
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn subscribes_once_relays_messages_and_publishes() {
    let (listener, url) = listen().await;

    let broker = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        let subscribe = handshake(&mut ws).await;
        assert_eq!(subscribe.command, FrameCommand::Subscribe);
        assert_eq!(subscribe.get("destination"), Some(TOPIC));
        assert_eq!(subscribe.get("id"), Some("sub-0"));

        send_frame(
            &mut ws,
            Frame::new(FrameCommand::Message)
                .header("destination", TOPIC)
                .header("subscription", "sub-0")
                .with_body("[]"),
        )
        .await;

        let send = recv_frame(&mut ws).await;
        assert_eq!(send.command, FrameCommand::Send);
        assert_eq!(send.get("destination"), Some("/app/elevator/call"));
        assert_eq!(send.get("content-type"), Some("application/json"));
        assert_eq!(send.body, r#"{"targetFloor":4}"#);
        ws
    });

    let (tx, mut rx) = mpsc::channel(16);
    let link = StompLink::spawn(config(url, Duration::from_secs(60)), tx, CancellationToken::new());

    expect_state(&mut rx, LinkState::Connecting).await;
    expect_state(&mut rx, LinkState::Connected).await;
    match next_event(&mut rx).await {
        LinkEvent::Message(msg) => {
            assert_eq!(msg.destination, TOPIC);
            assert_eq!(msg.subscription.as_deref(), Some("sub-0"));
            assert_eq!(msg.body, "[]");
        }
        LinkEvent::State(state) => panic!("expected message, got {state:?}"),
    }

    link.publisher()
        .publish("/app/elevator/call", r#"{"targetFloor":4}"#)
        .await
        .unwrap();

    let _ws = tokio::time::timeout(WAIT, broker).await.unwrap().unwrap();
    link.shutdown().await;
}

#[tokio::test]
async fn reconnects_and_resubscribes_after_close() {
    let (listener, url) = listen().await;

    let broker = tokio::spawn(async move {
        let mut first = accept(&listener).await;
        let sub = handshake(&mut first).await;
        assert_eq!(sub.get("destination"), Some(TOPIC));
        drop(first);

        let mut second = accept(&listener).await;
        let sub = handshake(&mut second).await;
        assert_eq!(sub.command, FrameCommand::Subscribe);
        second
    });

    let (tx, mut rx) = mpsc::channel(16);
    let link = StompLink::spawn(config(url, Duration::from_millis(20)), tx, CancellationToken::new());

    expect_state(&mut rx, LinkState::Connecting).await;
    expect_state(&mut rx, LinkState::Connected).await;
    expect_state(&mut rx, LinkState::Errored).await;
    expect_state(&mut rx, LinkState::Connecting).await;
    expect_state(&mut rx, LinkState::Connected).await;

    let _ws = tokio::time::timeout(WAIT, broker).await.unwrap().unwrap();
    link.shutdown().await;
    expect_state(&mut rx, LinkState::Disconnected).await;
}

#[tokio::test]
async fn error_frame_during_handshake_demotes_to_errored() {
    let (listener, url) = listen().await;

    let broker = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        let connect = recv_frame(&mut ws).await;
        assert_eq!(connect.command, FrameCommand::Connect);
        send_frame(
            &mut ws,
            Frame::new(FrameCommand::Error).header("message", "access denied"),
        )
        .await;
        ws
    });

    let (tx, mut rx) = mpsc::channel(16);
    let link = StompLink::spawn(config(url, Duration::from_secs(60)), tx, CancellationToken::new());

    expect_state(&mut rx, LinkState::Connecting).await;
    expect_state(&mut rx, LinkState::Errored).await;

    let _ws = tokio::time::timeout(WAIT, broker).await.unwrap().unwrap();
    link.shutdown().await;
}

#[tokio::test]
async fn publish_while_down_fails_fast() {
    let (listener, url) = listen().await;
    drop(listener);

    let (tx, mut rx) = mpsc::channel(16);
    let link = StompLink::spawn(config(url, Duration::from_secs(60)), tx, CancellationToken::new());

    expect_state(&mut rx, LinkState::Connecting).await;
    expect_state(&mut rx, LinkState::Errored).await;

    let result = link.publisher().publish("/app/elevator/goto", "{}").await;
    assert!(matches!(result, Err(Error::LinkDown)), "got {result:?}");

    link.shutdown().await;
}
