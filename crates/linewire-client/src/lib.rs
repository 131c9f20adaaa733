//! Resilient session engine for the linewire relay protocol.
//!
//! Maintains a persistent, authenticated session with a line-oriented
//! relay service and keeps a local view of windows and their lines
//! synchronized across disconnects, slow networks, and partial failures.
//!
//! # Architecture
//!
//! The protocol logic lives in a sans-IO [`Engine`]: events in
//! ([`SessionEvent`]), actions out ([`SessionAction`]), time passed as a
//! parameter. A [`Session`] owns the engine on a single tokio task — the
//! serialized execution context — together with the [`Transport`]
//! collaborator and the [`SessionListener`] registry, and exposes the
//! non-blocking consumer API.
//!
//! # Components
//!
//! - [`Engine`]: connection state machine, request dispatch/queue,
//!   subscription tracking
//! - [`Authenticator`]: challenge-response handshake and login token
//! - [`Timers`]: ping/request/idle timeout supervision
//! - [`ListenerRegistry`] / [`SessionListener`]: keyed event broadcast
//! - [`Transport`] / [`ConfigSource`]: external collaborator boundaries
//! - [`Session`]: the tokio driver tying it all together
//!
//! # Example
//!
//! ```no_run
//! use linewire_client::{ConfigSource, Session, SessionConfig};
//! use linewire_client::transport::channel_pair;
//!
//! # async fn run() {
//! let (transport, _peer) = channel_pair();
//! let config = ConfigSource::new(SessionConfig::new("wss://relay.example", "secret"));
//! let session = Session::spawn(transport, &config);
//!
//! session.request_window_list();
//! session.subscribe_lines(42);
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod auth;
mod config;
mod engine;
pub mod env;
mod event;
mod ids;
mod listener;
mod session;
mod timers;
pub mod transport;

pub use auth::Authenticator;
pub use config::{ConfigSource, SessionConfig};
pub use engine::{ConnectionState, Engine, RECONNECT_INTERVAL};
pub use event::{SessionAction, SessionEvent, SessionNotice};
pub use ids::RequestIds;
pub use listener::{ListenerRegistry, SessionListener};
pub use session::Session;
pub use timers::{IDLE_TIMEOUT, PING_TIMEOUT, REQUEST_TIMEOUT, TimerKind, Timers};
pub use transport::{Transport, TransportError, TransportEvent};
