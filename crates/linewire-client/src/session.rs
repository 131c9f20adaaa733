//! Session driver and public API.
//!
//! A [`Session`] owns one [`Engine`] on a dedicated tokio task. API calls,
//! transport events, config changes, and timer deadlines all funnel into
//! that task's `select!` loop, which is what gives the engine its
//! serialized execution context: one event at a time, no concurrent
//! mutation, listener callbacks fired from the same place.
//!
//! Every public method is non-blocking; it enqueues a command and returns.
//! Failures never reach the caller (a session whose task is gone logs and
//! drops the command), matching the engine's recover-forever contract.

use std::time::Duration;

use linewire_proto::LineQuery;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::config::{ConfigSource, SessionConfig};
use crate::engine::Engine;
use crate::env::{Environment, TokioEnv};
use crate::event::{SessionAction, SessionEvent};
use crate::listener::{ListenerRegistry, SessionListener};
use crate::transport::{Transport, TransportEvent};

/// Commands the handle sends to the session task.
enum Command {
    Event(SessionEvent),
    Register { key: String, listener: Box<dyn SessionListener> },
    RemoveListener { key: String },
    Shutdown,
}

/// Handle to a running session.
///
/// Consumers call the request methods (all non-blocking) and observe
/// results through registered [`SessionListener`]s. Dropping the handle
/// without [`Session::shutdown`] stops the task once the command channel
/// drains.
pub struct Session {
    commands: mpsc::UnboundedSender<Command>,
    task: tokio::task::JoinHandle<()>,
}

impl Session {
    /// Spawns a session over the given transport, configured from (and
    /// watching) the given source.
    pub fn spawn<T: Transport>(transport: T, config: &ConfigSource) -> Self {
        Self::spawn_with_env(transport, config, TokioEnv)
    }

    /// Spawns a session with a custom environment (virtual clocks, fixed
    /// entropy).
    pub fn spawn_with_env<T: Transport, E>(transport: T, config: &ConfigSource, env: E) -> Self
    where
        E: Environment,
    {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let config_rx = config.subscribe();
        let task = tokio::spawn(run(transport, config_rx, env, commands_rx));
        Self { commands: commands_tx, task }
    }

    /// Registers a listener under `key`, replacing any previous one with
    /// the same key.
    pub fn register_listener(&self, key: impl Into<String>, listener: Box<dyn SessionListener>) {
        self.command(Command::Register { key: key.into(), listener });
    }

    /// Removes the listener registered under `key`.
    pub fn remove_listener(&self, key: impl Into<String>) {
        self.command(Command::RemoveListener { key: key.into() });
    }

    /// Requests the server version.
    pub fn request_version(&self) {
        self.event(SessionEvent::RequestVersion);
    }

    /// Requests the full window list.
    pub fn request_window_list(&self) {
        self.event(SessionEvent::RequestWindowList);
    }

    /// Requests one window (fetches the full list; the protocol has no
    /// single-window query).
    pub fn request_window(&self, window_id: u64) {
        self.event(SessionEvent::RequestWindow { window_id });
    }

    /// Clears a window's activity/highlight markers.
    pub fn reset_window_activity(&self, window_id: u64) {
        self.event(SessionEvent::ResetWindowActivity { window_id });
    }

    /// Requests the latest `count` lines of a view.
    pub fn request_line_list(&self, view_id: u64, count: u32) {
        self.event(SessionEvent::RequestLines { view_id, query: LineQuery::latest(count) });
    }

    /// Requests lines of a view with full query control.
    pub fn request_line_list_with(&self, view_id: u64, query: LineQuery) {
        self.event(SessionEvent::RequestLines { view_id, query });
    }

    /// Sends user input to a window.
    pub fn send_input(&self, window_id: u64, text: impl Into<String>) {
        self.event(SessionEvent::SendInput { window_id, text: text.into() });
    }

    /// Starts a live line subscription for a view.
    pub fn subscribe_lines(&self, view_id: u64) {
        self.event(SessionEvent::SubscribeLines { view_id });
    }

    /// Stops the live line subscription for a view.
    pub fn unsubscribe_lines(&self, view_id: u64) {
        self.event(SessionEvent::UnsubscribeLines { view_id });
    }

    /// Tears the session down to the disconnected state, dropping queued
    /// work and subscriptions.
    pub fn disconnect(&self) {
        self.event(SessionEvent::Disconnect);
    }

    /// Stops the session task. The transport is closed on the way out.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        let _ = self.task.await;
    }

    fn event(&self, event: SessionEvent) {
        self.command(Command::Event(event));
    }

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("session task is gone, dropping command");
        }
    }
}

/// The serialized event loop.
async fn run<T: Transport, E: Environment>(
    mut transport: T,
    mut config_rx: watch::Receiver<SessionConfig>,
    env: E,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut engine = Engine::new(env.clone(), config_rx.borrow_and_update().clone());
    let mut listeners = ListenerRegistry::new();
    let mut transport_alive = true;
    let mut config_alive = true;

    loop {
        // Sleep until the nearest engine deadline (timer or backoff); no
        // deadline disables the arm entirely
        let sleep_for = engine.next_wakeup().map(|deadline| {
            let now = env.now();
            if deadline > now { deadline - now } else { Duration::ZERO }
        });

        let actions = tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Event(event)) => engine.handle(event, env.now()),
                Some(Command::Register { key, listener }) => {
                    listeners.register(key, listener);
                    Vec::new()
                },
                Some(Command::RemoveListener { key }) => {
                    listeners.remove(&key);
                    Vec::new()
                },
                Some(Command::Shutdown) | None => break,
            },

            event = transport.recv(), if transport_alive => match event {
                Some(event) => engine.handle(map_transport_event(event), env.now()),
                None => {
                    // Defunct for good: deliver the loss once, stop polling
                    warn!("transport closed its event stream");
                    transport_alive = false;
                    engine.handle(SessionEvent::TransportDisconnected, env.now())
                },
            },

            changed = config_rx.changed(), if config_alive => match changed {
                Ok(()) => {
                    let config = config_rx.borrow_and_update().clone();
                    engine.handle(SessionEvent::ConfigChanged(config), env.now())
                },
                Err(_) => {
                    // Config source dropped; keep running with the last
                    // known values
                    config_alive = false;
                    Vec::new()
                },
            },

            () = sleep(sleep_for), if sleep_for.is_some() => {
                engine.handle(SessionEvent::Tick, env.now())
            },
        };

        for action in actions {
            match action {
                SessionAction::Connect { url, cert_fingerprint } => {
                    transport.connect(&url, cert_fingerprint.as_deref());
                },
                SessionAction::Send(request) => transport.send(request),
                SessionAction::CloseTransport => transport.close(),
                SessionAction::Notify(notice) => listeners.broadcast(&notice),
            }
        }
    }

    transport.close();
}

/// Sleeps for the given duration; pends forever when there is none. Only
/// selected when `Some`, the `None` arm just keeps the future total.
async fn sleep(duration: Option<Duration>) {
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

fn map_transport_event(event: TransportEvent) -> SessionEvent {
    match event {
        TransportEvent::Connected => SessionEvent::TransportConnected,
        TransportEvent::Disconnected(error) => {
            if let Some(error) = error {
                warn!(%error, "transport disconnected");
            }
            SessionEvent::TransportDisconnected
        },
        TransportEvent::Ping => SessionEvent::KeepaliveReceived,
        TransportEvent::Message(response) => SessionEvent::MessageReceived(response),
    }
}
