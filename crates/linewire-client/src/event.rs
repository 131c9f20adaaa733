//! Engine events and actions.
//!
//! The engine is a sans-IO state machine: the session driver feeds it
//! [`SessionEvent`]s and executes the [`SessionAction`]s it returns. All
//! consumer-visible notifications travel as [`SessionNotice`] actions so
//! they are broadcast from the same serialized context that produced them.

use linewire_proto::{Line, LineQuery, Request, Response, Window};

use crate::config::SessionConfig;

/// Events the session driver feeds into the engine.
///
/// Consumer API calls, transport callbacks, and timer expirations all
/// arrive through this one type; the driver serializes them onto a single
/// task, which is what makes the engine's `&mut self` safe.
#[derive(Debug)]
pub enum SessionEvent {
    /// Consumer asks for the server version.
    RequestVersion,

    /// Consumer asks for the full window list.
    RequestWindowList,

    /// Consumer asks for one window. The wire protocol has no single-window
    /// fetch, so this fetches the full list.
    RequestWindow {
        /// Window of interest.
        window_id: u64,
    },

    /// Consumer clears a window's activity/highlight markers.
    ResetWindowActivity {
        /// Target window.
        window_id: u64,
    },

    /// Consumer fetches lines for a view.
    RequestLines {
        /// Target view.
        view_id: u64,
        /// Query parameters.
        query: LineQuery,
    },

    /// Consumer sends input to a window.
    SendInput {
        /// Target window.
        window_id: u64,
        /// Input text.
        text: String,
    },

    /// Consumer starts a live line subscription.
    SubscribeLines {
        /// Target view.
        view_id: u64,
    },

    /// Consumer stops a live line subscription.
    UnsubscribeLines {
        /// Target view.
        view_id: u64,
    },

    /// Consumer tears the session down.
    Disconnect,

    /// Config source published new values. Forces a full disconnect; the
    /// new values apply from the next connect attempt.
    ConfigChanged(SessionConfig),

    /// Transport established the connection.
    TransportConnected,

    /// Transport lost the connection (or never established it).
    TransportDisconnected,

    /// Transport saw inbound keepalive traffic.
    KeepaliveReceived,

    /// Transport delivered a server message.
    MessageReceived(Response),

    /// The driver's clock reached the next engine deadline.
    Tick,
}

/// Actions the engine returns for the driver to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Initiate transport establishment. The outcome comes back as
    /// [`SessionEvent::TransportConnected`] or
    /// [`SessionEvent::TransportDisconnected`].
    Connect {
        /// Server endpoint.
        url: String,
        /// Expected certificate fingerprint, when pinned.
        cert_fingerprint: Option<String>,
    },

    /// Hand one request to the transport. Wire order follows action order.
    Send(Request),

    /// Close the transport. Idempotent.
    CloseTransport,

    /// Broadcast a notice to every registered listener.
    Notify(SessionNotice),
}

/// Consumer-visible session notices.
///
/// One notice maps to one listener callback; a single server message may
/// fan out into several notices.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    /// First successful login of a connection cycle.
    Connected,

    /// Successful login after a connection loss.
    Reconnected,

    /// Session reached the disconnected state.
    Disconnected,

    /// Server version received.
    Version(String),

    /// Window list received.
    WindowList(Vec<Window>),

    /// Lines answering a line query.
    LineList(Vec<Line>),

    /// Unsolicited lines for subscribed views.
    NewLines(Vec<Line>),

    /// At least one request is awaiting its response.
    PendingRequests,

    /// No request is awaiting a response.
    NoPendingRequests,
}
