//! End-to-end session tests over the in-memory transport.
//!
//! The tokio clock is paused, so timer-driven behavior (ping timeout,
//! reconnect) runs deterministically: time only advances when every task
//! is idle, which lands exactly on the engine's next deadline.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use linewire_client::transport::{ChannelTransportPeer, TransportEvent, channel_pair};
use linewire_client::{ConfigSource, Session, SessionConfig, SessionListener};
use linewire_proto::{Line, Request, RequestBody, Response, Window};

/// Listener that records callback names in arrival order.
#[derive(Clone, Default)]
struct Recorder {
    log: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn entries(&self) -> Vec<String> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    fn push(&self, entry: impl Into<String>) {
        if let Ok(mut log) = self.log.lock() {
            log.push(entry.into());
        }
    }
}

impl SessionListener for Recorder {
    fn on_connect(&mut self) {
        self.push("connect");
    }

    fn on_reconnect(&mut self) {
        self.push("reconnect");
    }

    fn on_disconnect(&mut self) {
        self.push("disconnect");
    }

    fn on_version(&mut self, version: &str) {
        self.push(format!("version:{version}"));
    }

    fn on_window_list(&mut self, windows: &[Window]) {
        self.push(format!("windows:{}", windows.len()));
    }

    fn on_new_lines(&mut self, lines: &[Line]) {
        self.push(format!("new-lines:{}", lines.len()));
    }
}

/// Answers the challenge/login handshake the way a healthy server would.
async fn complete_handshake(peer: &mut ChannelTransportPeer) {
    peer.events_tx.send(TransportEvent::Connected).unwrap();

    let challenge = peer.requests_rx.recv().await.unwrap();
    assert!(matches!(challenge.body, RequestBody::Challenge(_)));
    peer.events_tx
        .send(TransportEvent::Message(Response {
            challenge: Some("server-challenge".to_string()),
            ..Response::default()
        }))
        .unwrap();

    let login = peer.requests_rx.recv().await.unwrap();
    assert!(matches!(login.body, RequestBody::Login(_)));
    peer.events_tx
        .send(TransportEvent::Message(Response { login: Some(true), ..Response::default() }))
        .unwrap();
}

/// Spins (cooperatively) until the recorder saw the given entry.
async fn wait_for(recorder: &Recorder, entry: &str) {
    while !recorder.entries().iter().any(|seen| seen == entry) {
        tokio::task::yield_now().await;
    }
}

fn session_fixture() -> (Session, ChannelTransportPeer, Recorder) {
    let (transport, peer) = channel_pair();
    let source = ConfigSource::new(SessionConfig::new("wss://relay", "secret"));
    let session = Session::spawn(transport, &source);

    let recorder = Recorder::default();
    session.register_listener("test", Box::new(recorder.clone()));
    (session, peer, recorder)
}

#[tokio::test(start_paused = true)]
async fn cold_start_handshake_and_flush() {
    let (session, mut peer, recorder) = session_fixture();

    session.request_window_list();

    // The call from the disconnected state initiates the connection
    assert_eq!(peer.connects_rx.recv().await.unwrap(), "wss://relay");

    complete_handshake(&mut peer).await;

    // The queued window list goes out right after login
    let flushed = peer.requests_rx.recv().await.unwrap();
    assert!(matches!(&flushed.body, RequestBody::Window(window) if window.get.is_some()));

    // Answer it and watch the listener fan-out
    peer.events_tx
        .send(TransportEvent::Message(Response {
            window: Some(linewire_proto::WindowPayload(vec![linewire_proto::WindowEntry {
                id: 1,
                view: 9,
                name: Some("#main".to_string()),
                activity: None,
            }])),
            ..Response::default()
        }))
        .unwrap();

    // Command and transport channels drain independently; wait until the
    // window list reached the listener before shutting down
    wait_for(&recorder, "windows:1").await;

    session.request_version();
    let version_query = peer.requests_rx.recv().await.unwrap();
    assert!(matches!(version_query.body, RequestBody::Info(_)));

    session.shutdown().await;

    let entries = recorder.entries();
    assert!(entries.contains(&"connect".to_string()));
    assert!(entries.contains(&"windows:1".to_string()));
}

#[tokio::test(start_paused = true)]
async fn ping_timeout_triggers_resubscribing_reconnect() {
    let (session, mut peer, recorder) = session_fixture();

    session.request_window_list();
    peer.connects_rx.recv().await.unwrap();
    complete_handshake(&mut peer).await;
    peer.requests_rx.recv().await.unwrap(); // flushed window list

    session.subscribe_lines(42);
    let sub = peer.requests_rx.recv().await.unwrap();
    assert!(matches!(&sub.body, RequestBody::Line(line) if line.sub_add.is_some()));

    // Send no keepalives: the paused clock jumps to the ping deadline and
    // the engine closes + immediately re-attempts (subscription is live)
    assert_eq!(peer.connects_rx.recv().await.unwrap(), "wss://relay");

    complete_handshake(&mut peer).await;

    // The subscription is restored on the new connection
    let resub = peer.requests_rx.recv().await.unwrap();
    match &resub.body {
        RequestBody::Line(line) => {
            assert_eq!(line.sub_add.as_ref().unwrap().add.view, vec![42]);
        },
        other => panic!("expected resubscription, got {other:?}"),
    }

    session.shutdown().await;

    let entries = recorder.entries();
    assert!(entries.contains(&"connect".to_string()));
    assert!(entries.contains(&"reconnect".to_string()));
}

#[tokio::test(start_paused = true)]
async fn keepalives_hold_the_connection_and_new_lines_flow() {
    let (session, mut peer, recorder) = session_fixture();

    session.subscribe_lines(7);
    peer.connects_rx.recv().await.unwrap();
    complete_handshake(&mut peer).await;
    peer.requests_rx.recv().await.unwrap(); // flushed subscription

    // Unsolicited lines reach the listener
    let mut lines = std::collections::BTreeMap::new();
    lines.insert(7, vec![linewire_proto::LineEntry { time: None, text: Some("hey".to_string()) }]);
    peer.events_tx
        .send(TransportEvent::Message(Response {
            line_added: Some(linewire_proto::LinePayload(lines)),
            ..Response::default()
        }))
        .unwrap();

    // A keepalive defers the ping deadline; the session stays quiet
    peer.events_tx.send(TransportEvent::Ping).unwrap();

    session.send_input(3, "hello there");
    let input = peer.requests_rx.recv().await.unwrap();
    assert_eq!(input, Request::input(3, "hello there"));

    wait_for(&recorder, "new-lines:1").await;
    session.shutdown().await;
    assert!(recorder.entries().contains(&"new-lines:1".to_string()));
}

#[tokio::test(start_paused = true)]
async fn config_change_reconnects_to_new_endpoint() {
    let (transport, mut peer) = channel_pair();
    let source = ConfigSource::new(SessionConfig::new("wss://relay.old", "pw"));
    let session = Session::spawn(transport, &source);

    let recorder = Recorder::default();
    session.register_listener("test", Box::new(recorder.clone()));

    session.request_window_list();
    assert_eq!(peer.connects_rx.recv().await.unwrap(), "wss://relay.old");
    complete_handshake(&mut peer).await;
    peer.requests_rx.recv().await.unwrap(); // flushed window list

    // New settings force a full disconnect
    source.update(SessionConfig::new("wss://relay.new", "pw2"));

    // Wait until the session observed the change before issuing new work
    wait_for(&recorder, "disconnect").await;

    session.request_window_list();
    assert_eq!(peer.connects_rx.recv().await.unwrap(), "wss://relay.new");

    session.shutdown().await;
}
