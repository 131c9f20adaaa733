//! Session state machine.
//!
//! The engine owns the connection lifecycle, the request queue, the
//! pending-request set, and the subscription bookkeeping. It is sans-IO:
//! the session driver feeds it [`SessionEvent`]s together with the current
//! time and executes the returned [`SessionAction`]s. All mutation happens
//! behind `&mut self` on a single task, so the shared collections need no
//! synchronization.
//!
//! # State Machine
//!
//! ```text
//!                    send()           login ok
//! ┌──────────────┐ ───────> ┌────────────┐ ───────> ┌───────────┐
//! │ Disconnected │          │ Connecting │          │ Connected │
//! └──────────────┘ <─────── └────────────┘          └───────────┘
//!         ^        loss with      │ ^                    │
//!         │        nothing to do  │ │ backoff            │ loss with queued
//!         │                       v │ reconnect          v work or live subs
//!         │                  (stays, retries)      ┌──────────────┐
//!         └─────────────────────────────────────── │ Reconnecting │
//!                     loss with nothing to do      └──────────────┘
//! ```
//!
//! Failures never surface to the API caller: every transport loss and
//! every timeout funnels into the one disconnect-handling path, and the
//! only externally visible effects are listener notices and the eventual
//! reconnect.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use linewire_proto::{Request, Response};
use tracing::{debug, info, warn};

use crate::auth::Authenticator;
use crate::config::SessionConfig;
use crate::env::Environment;
use crate::event::{SessionAction, SessionEvent, SessionNotice};
use crate::ids::RequestIds;
use crate::timers::{TimerKind, Timers};

/// Fixed delay between a connection loss during (re)connection and the
/// next attempt.
pub const RECONNECT_INTERVAL: Duration = Duration::from_millis(1_000);

/// Connection lifecycle state. Exactly one value at any time, owned
/// exclusively by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and nothing in flight.
    Disconnected,
    /// First connection attempt of a cycle, up to login success.
    Connecting,
    /// Logged in; requests flow directly.
    Connected,
    /// Connection lost with work outstanding; attempting to get back.
    Reconnecting,
}

/// The session state machine.
///
/// Generic over an [`Environment`] for time and challenge entropy, which
/// is what lets the whole protocol run under a virtual clock in tests.
pub struct Engine<E: Environment> {
    env: E,
    config: SessionConfig,
    state: ConnectionState,
    queue: VecDeque<Request>,
    pending: HashSet<u64>,
    line_syncs: HashSet<u64>,
    ids: RequestIds,
    auth: Authenticator,
    timers: Timers<E::Instant>,
    reconnect_at: Option<E::Instant>,
}

impl<E: Environment> Engine<E> {
    /// Engine in the disconnected state with default timeouts.
    pub fn new(env: E, config: SessionConfig) -> Self {
        Self {
            env,
            config,
            state: ConnectionState::Disconnected,
            queue: VecDeque::new(),
            pending: HashSet::new(),
            line_syncs: HashSet::new(),
            ids: RequestIds::new(),
            auth: Authenticator::new(),
            timers: Timers::new(),
            reconnect_at: None,
        }
    }

    /// Engine with custom timer periods (tests mostly).
    pub fn with_timers(env: E, config: SessionConfig, timers: Timers<E::Instant>) -> Self {
        Self { timers, ..Self::new(env, config) }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Number of sent-but-unanswered response-expecting requests.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of requests queued for the next login.
    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    /// Whether a view has a live line subscription.
    pub fn is_subscribed(&self, view_id: u64) -> bool {
        self.line_syncs.contains(&view_id)
    }

    /// Number of live line subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.line_syncs.len()
    }

    /// Whether a backoff reconnect attempt is scheduled and not yet fired.
    pub fn reconnect_scheduled(&self) -> bool {
        self.reconnect_at.is_some()
    }

    /// Whether the idle teardown timer is currently armed.
    pub fn idle_timer_armed(&self) -> bool {
        self.timers.is_armed(TimerKind::Idle)
    }

    /// Earliest instant at which [`SessionEvent::Tick`] has work to do:
    /// the nearest timer deadline or the scheduled reconnect, whichever
    /// comes first. `None` when nothing is scheduled.
    pub fn next_wakeup(&self) -> Option<E::Instant> {
        match (self.timers.next_deadline(), self.reconnect_at) {
            (Some(deadline), Some(reconnect)) => Some(deadline.min(reconnect)),
            (deadline, reconnect) => deadline.or(reconnect),
        }
    }

    /// Processes one event at the given instant and returns the actions
    /// for the driver to execute, in order.
    pub fn handle(&mut self, event: SessionEvent, now: E::Instant) -> Vec<SessionAction> {
        match event {
            SessionEvent::RequestVersion => {
                debug!("requesting version");
                self.send(Request::version(), true, now)
            },
            SessionEvent::RequestWindowList => {
                debug!("requesting window list");
                self.send(Request::window_list(), true, now)
            },
            SessionEvent::RequestWindow { window_id } => {
                // No single-window fetch on the wire; the full list answers
                // this too
                debug!(window_id, "requesting window");
                self.send(Request::window_list(), true, now)
            },
            SessionEvent::ResetWindowActivity { window_id } => {
                debug!(window_id, "resetting window activity");
                self.send(Request::dehilight(window_id), true, now)
            },
            SessionEvent::RequestLines { view_id, query } => {
                self.send(Request::line_query(view_id, query), true, now)
            },
            SessionEvent::SendInput { window_id, text } => {
                self.send(Request::input(window_id, text), true, now)
            },
            SessionEvent::SubscribeLines { view_id } => self.subscribe_lines(view_id, now),
            SessionEvent::UnsubscribeLines { view_id } => self.unsubscribe_lines(view_id, now),
            SessionEvent::Disconnect => self.disconnect(now),
            SessionEvent::ConfigChanged(config) => {
                info!("configuration changed, forcing disconnect");
                self.config = config;
                self.disconnect(now)
            },
            SessionEvent::TransportConnected => self.handle_transport_connected(now),
            SessionEvent::TransportDisconnected => self.handle_disconnect(now),
            SessionEvent::KeepaliveReceived => {
                self.timers.set(TimerKind::Ping, now);
                Vec::new()
            },
            SessionEvent::MessageReceived(response) => self.handle_message(response, now),
            SessionEvent::Tick => self.tick(now),
        }
    }

    /// Routes one request per the dispatch rules: assign an id and track
    /// pending when a response is expected, reset the idle timer on any
    /// traffic, then queue or send depending on the lifecycle state.
    fn send(&mut self, mut request: Request, wait_for_login: bool, now: E::Instant) -> Vec<SessionAction> {
        let mut actions = Vec::new();

        if request.expects_response() {
            let id = *request.id.get_or_insert_with(|| self.ids.next_id());
            self.pending.insert(id);
            actions.push(self.pending_notice());
        }

        self.timers.set(TimerKind::Idle, now);

        match self.state {
            ConnectionState::Disconnected => {
                actions.extend(self.connect(now));
                // Always queued, never sent directly: the connection is
                // not up yet
                self.queue.push_back(request);
            },
            ConnectionState::Connecting | ConnectionState::Reconnecting => {
                if wait_for_login {
                    self.queue.push_back(request);
                } else {
                    actions.extend(self.send_unqueued(request, now));
                }
            },
            ConnectionState::Connected => {
                actions.extend(self.send_unqueued(request, now));
            },
        }

        actions
    }

    /// Hands a request straight to the transport, arming the request
    /// timeout when a response is expected.
    fn send_unqueued(&mut self, request: Request, now: E::Instant) -> Vec<SessionAction> {
        if request.expects_response() {
            self.timers.set(TimerKind::Request, now);
        }
        vec![SessionAction::Send(request)]
    }

    /// Initiates a connection from the disconnected state.
    fn connect(&mut self, _now: E::Instant) -> Vec<SessionAction> {
        if self.state != ConnectionState::Disconnected {
            return Vec::new();
        }
        if self.config.url.is_empty() {
            warn!("url not configured, not connecting");
            return Vec::new();
        }

        debug!(url = %self.config.url, "connecting");
        self.state = ConnectionState::Connecting;
        vec![SessionAction::Connect {
            url: self.config.url.clone(),
            cert_fingerprint: self.config.cert_fingerprint.clone(),
        }]
    }

    /// Re-attempts the transport connection without touching lifecycle
    /// state; used by the backoff task and the immediate-reconnect branch.
    fn reconnect_now(&mut self) -> Vec<SessionAction> {
        if self.config.url.is_empty() {
            warn!("url not configured, not reconnecting");
            return Vec::new();
        }

        debug!(url = %self.config.url, "reconnecting");
        vec![SessionAction::Connect {
            url: self.config.url.clone(),
            cert_fingerprint: self.config.cert_fingerprint.clone(),
        }]
    }

    /// Transport-level establishment succeeded: arm the ping guard and
    /// open the handshake. The challenge bypasses the login queue.
    fn handle_transport_connected(&mut self, now: E::Instant) -> Vec<SessionAction> {
        match self.state {
            ConnectionState::Connecting => debug!("transport connected"),
            ConnectionState::Reconnecting => debug!("transport reconnected"),
            state => warn!(?state, "transport connected in unexpected state"),
        }

        // The establishment we were waiting for arrived; any scheduled
        // re-attempt is stale
        self.reconnect_at = None;

        self.timers.set(TimerKind::Ping, now);

        let challenge = self.auth.generate_client_challenge(&self.env);
        debug!("sending client challenge");
        self.send(Request::challenge(challenge), false, now)
    }

    /// The single disconnect-handling path shared by transport loss, all
    /// three timeouts, and explicit disconnects.
    ///
    /// Cleanup (timers, pending set, no-pending notice) completes before
    /// any reconnect attempt is scheduled, so a new connection can never
    /// observe stale pending ids.
    fn handle_disconnect(&mut self, now: E::Instant) -> Vec<SessionAction> {
        debug!(state = ?self.state, "handling disconnect");

        self.timers.cancel_all();
        self.auth.reset();
        if self.line_syncs.is_empty() {
            self.timers.clear_idle_suppression();
        }

        self.pending.clear();
        let mut actions = vec![self.pending_notice()];

        if matches!(self.state, ConnectionState::Connecting | ConnectionState::Reconnecting) {
            // Lost during an attempt: retry after the fixed backoff, but a
            // pending attempt suppresses scheduling another
            if self.reconnect_at.is_none() {
                debug!("scheduling reconnect");
                self.reconnect_at = Some(now + RECONNECT_INTERVAL);
            }
            return actions;
        }

        if !self.line_syncs.is_empty() || !self.queue.is_empty() {
            // Something is going on; get back immediately
            self.state = ConnectionState::Reconnecting;
            actions.extend(self.reconnect_now());
            return actions;
        }

        self.state = ConnectionState::Disconnected;
        actions.push(SessionAction::Notify(SessionNotice::Disconnected));
        actions
    }

    /// Explicit teardown: drop subscriptions and queued work, close the
    /// transport, and run disconnect handling. Ends disconnected whatever
    /// the prior state, so the backoff task is cancelled here.
    fn disconnect(&mut self, now: E::Instant) -> Vec<SessionAction> {
        debug!("disconnecting");
        self.line_syncs.clear();
        self.queue.clear();
        self.reconnect_at = None;
        self.state = ConnectionState::Disconnected;

        let mut actions = vec![SessionAction::CloseTransport];
        actions.extend(self.handle_disconnect(now));
        actions
    }

    /// Decomposes one server message: correlation first, then each
    /// populated field as its own event.
    fn handle_message(&mut self, response: Response, now: E::Instant) -> Vec<SessionAction> {
        let Response { id, challenge, login, info, window, item, line, line_added } = response;

        self.timers.cancel(TimerKind::Request);
        if let Some(id) = id {
            self.pending.remove(&id);
        }
        let mut actions = vec![self.pending_notice()];

        if let Some(challenge) = challenge {
            actions.extend(self.handle_challenge(challenge, now));
        }

        if let Some(login) = login {
            if login {
                actions.extend(self.handle_login(now));
            } else {
                // No automatic handshake retry; the ping timeout recycles
                // the connection eventually
                info!("login failed");
            }
        }

        if let Some(info) = info {
            if let Some(version) = info.version {
                debug!(%version, "version received");
                actions.push(SessionAction::Notify(SessionNotice::Version(version)));
            }
        }

        if let Some(window) = window {
            debug!("window list received");
            let windows = window.into_windows(item.as_ref());
            actions.push(SessionAction::Notify(SessionNotice::WindowList(windows)));
        }

        if let Some(line) = line {
            actions.push(SessionAction::Notify(SessionNotice::LineList(line.into_lines())));
        }

        if let Some(line_added) = line_added {
            actions.push(SessionAction::Notify(SessionNotice::NewLines(line_added.into_lines())));
        }

        actions
    }

    /// Server challenge received: derive the login token and send it,
    /// bypassing the login queue.
    fn handle_challenge(&mut self, challenge: String, now: E::Instant) -> Vec<SessionAction> {
        debug!("server challenge received");
        self.auth.set_server_challenge(challenge);
        let token = self.auth.login_token(&self.config.password);
        debug!("sending login token");
        self.send(Request::login(token), false, now)
    }

    /// Login succeeded: flush queued work and notify. On a reconnect,
    /// every tracked subscription is restored before the queue flush so
    /// live updates resume ahead of backlogged requests.
    fn handle_login(&mut self, now: E::Instant) -> Vec<SessionAction> {
        info!("logged in");

        match self.state {
            ConnectionState::Connecting => {
                self.state = ConnectionState::Connected;
                self.reconnect_at = None;

                let mut actions = self.flush_queue(now);
                actions.push(SessionAction::Notify(SessionNotice::Connected));
                actions
            },
            ConnectionState::Reconnecting => {
                self.state = ConnectionState::Connected;
                self.reconnect_at = None;

                let mut actions = Vec::new();
                let views: Vec<u64> = self.line_syncs.iter().copied().collect();
                for view_id in views {
                    actions.extend(self.subscribe_lines(view_id, now));
                }
                actions.extend(self.flush_queue(now));
                actions.push(SessionAction::Notify(SessionNotice::Reconnected));
                actions
            },
            state => {
                warn!(?state, "login in unexpected state");
                Vec::new()
            },
        }
    }

    /// Sends every queued request through the direct path, preserving the
    /// original enqueue order.
    fn flush_queue(&mut self, now: E::Instant) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        let queued: Vec<Request> = self.queue.drain(..).collect();
        for request in queued {
            actions.extend(self.send(request, true, now));
        }
        actions
    }

    /// Starts a live line subscription. An active subscription keeps the
    /// connection open indefinitely, so the idle guard goes quiet.
    fn subscribe_lines(&mut self, view_id: u64, now: E::Instant) -> Vec<SessionAction> {
        debug!(view_id, "subscribing to lines");
        self.line_syncs.insert(view_id);
        self.timers.disable_idle();
        self.send(Request::subscribe(view_id), true, now)
    }

    /// Stops a live line subscription and re-arms the idle guard.
    fn unsubscribe_lines(&mut self, view_id: u64, now: E::Instant) -> Vec<SessionAction> {
        debug!(view_id, "unsubscribing from lines");
        let actions = self.send(Request::unsubscribe(view_id), true, now);
        self.timers.enable_idle(now);
        self.line_syncs.remove(&view_id);
        actions
    }

    /// Timer and backoff processing. The driver calls this whenever the
    /// clock reaches [`Engine::next_wakeup`].
    fn tick(&mut self, now: E::Instant) -> Vec<SessionAction> {
        let mut actions = Vec::new();

        if let Some(kind) = self.timers.take_expired(now) {
            warn!(?kind, "timeout, closing connection");
            actions.push(SessionAction::CloseTransport);
            actions.extend(self.handle_disconnect(now));
        }

        if self.reconnect_at.is_some_and(|at| at <= now) {
            self.reconnect_at = None;
            if matches!(self.state, ConnectionState::Connecting | ConnectionState::Reconnecting) {
                actions.extend(self.reconnect_now());
            } else {
                debug!(state = ?self.state, "dropping stale reconnect attempt");
            }
        }

        actions
    }

    /// Level-triggered pending-state notice: recomputed (and re-broadcast)
    /// on every pending-set mutation, repeats included.
    fn pending_notice(&self) -> SessionAction {
        if self.pending.is_empty() {
            SessionAction::Notify(SessionNotice::NoPendingRequests)
        } else {
            SessionAction::Notify(SessionNotice::PendingRequests)
        }
    }
}
