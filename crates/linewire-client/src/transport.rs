//! Transport collaborator boundary.
//!
//! The physical connection (socket/TLS/WebSocket establishment, framing,
//! wire serialization) lives behind the [`Transport`] trait; the engine
//! only ever sees [`TransportEvent`]s. Implementations must uphold the
//! establishment contract documented on [`Transport::connect`].
//!
//! [`ChannelTransport`] is an in-memory implementation over tokio channels,
//! used by the test suites and usable for same-process loopback wiring.

use std::future::Future;

use linewire_proto::{Request, Response};
use thiserror::Error;
use tokio::sync::mpsc;

/// Failures a transport implementation can report when losing (or failing
/// to establish) a connection.
///
/// The engine does not distinguish causes; the error only feeds logging.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Established connection broke.
    #[error("stream error: {0}")]
    Stream(String),

    /// Peer sent something the transport could not decode.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Events a transport delivers to the session, in arrival order.
#[derive(Debug)]
pub enum TransportEvent {
    /// Connection established; requests can be sent.
    Connected,

    /// Connection lost or establishment failed. The optional error is for
    /// logging only.
    Disconnected(Option<TransportError>),

    /// Inbound keepalive traffic (transport-level ping).
    Ping,

    /// One decoded server message.
    Message(Response),
}

/// The physical connection, consumed by the session driver.
///
/// All methods are non-blocking: `connect` initiates establishment,
/// `send` enqueues, `close` tears down. Outcomes and inbound traffic are
/// observed through `recv`.
pub trait Transport: Send + 'static {
    /// Initiates asynchronous establishment. After this call the transport
    /// must eventually deliver exactly one of
    /// [`TransportEvent::Connected`] / [`TransportEvent::Disconnected`],
    /// and may deliver `Disconnected` again only after a prior
    /// `Connected`.
    fn connect(&mut self, endpoint: &str, cert_fingerprint: Option<&str>);

    /// Enqueues one request. Call order is preserved on the wire. Requests
    /// sent while no connection is established may be dropped; the engine
    /// only sends after [`TransportEvent::Connected`].
    fn send(&mut self, request: Request);

    /// Tears the connection down. Idempotent.
    fn close(&mut self);

    /// Next transport event, or `None` once the transport is defunct and
    /// will never produce another event.
    fn recv(&mut self) -> impl Future<Output = Option<TransportEvent>> + Send;
}

/// In-memory transport over unbounded channels.
///
/// The peer half decides when connections "establish" or "fail" by
/// injecting events, which is exactly what deterministic tests need.
pub struct ChannelTransport {
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    requests_tx: mpsc::UnboundedSender<Request>,
    connects_tx: mpsc::UnboundedSender<String>,
}

/// Peer half of a [`ChannelTransport`]: observes outbound traffic and
/// injects transport events.
pub struct ChannelTransportPeer {
    /// Injects events the session will observe via `recv`.
    pub events_tx: mpsc::UnboundedSender<TransportEvent>,

    /// Requests the session sent, in wire order.
    pub requests_rx: mpsc::UnboundedReceiver<Request>,

    /// Endpoints the session attempted to connect to, in order.
    pub connects_rx: mpsc::UnboundedReceiver<String>,
}

/// Creates a connected transport/peer pair.
pub fn channel_pair() -> (ChannelTransport, ChannelTransportPeer) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (requests_tx, requests_rx) = mpsc::unbounded_channel();
    let (connects_tx, connects_rx) = mpsc::unbounded_channel();

    (
        ChannelTransport { events_rx, requests_tx, connects_tx },
        ChannelTransportPeer { events_tx, requests_rx, connects_rx },
    )
}

impl Transport for ChannelTransport {
    fn connect(&mut self, endpoint: &str, _cert_fingerprint: Option<&str>) {
        // The peer decides whether this attempt succeeds; failures of the
        // channel itself mean the peer is gone and recv will yield None
        let _ = self.connects_tx.send(endpoint.to_string());
    }

    fn send(&mut self, request: Request) {
        let _ = self.requests_tx.send(request);
    }

    fn close(&mut self) {
        // Nothing to tear down; the peer observes silence
    }

    fn recv(&mut self) -> impl Future<Output = Option<TransportEvent>> + Send {
        self.events_rx.recv()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_pair_moves_traffic_both_ways() {
        let (mut transport, mut peer) = channel_pair();

        transport.connect("wss://relay", None);
        assert_eq!(peer.connects_rx.recv().await.unwrap(), "wss://relay");

        peer.events_tx.send(TransportEvent::Connected).unwrap();
        assert!(matches!(transport.recv().await, Some(TransportEvent::Connected)));

        transport.send(Request::version());
        let sent = peer.requests_rx.recv().await.unwrap();
        assert_eq!(sent, Request::version());
    }

    #[tokio::test]
    async fn recv_yields_none_when_peer_is_gone() {
        let (mut transport, peer) = channel_pair();
        drop(peer);
        assert!(transport.recv().await.is_none());
    }
}
