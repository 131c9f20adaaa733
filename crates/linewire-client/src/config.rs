//! Session configuration and change notification.
//!
//! The engine consumes configuration; it never stores it durably. A
//! [`ConfigSource`] owns the current values and publishes changes over a
//! watch channel; the session driver reacts to a change by forcing a full
//! disconnect, so the new values apply from the next connect attempt.

use tokio::sync::watch;

/// Connection parameters for one relay server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Server endpoint (scheme and address are the transport's concern).
    pub url: String,

    /// Relay password, used only for login token derivation.
    pub password: String,

    /// Pinned certificate fingerprint, when the transport should verify
    /// one.
    pub cert_fingerprint: Option<String>,
}

impl SessionConfig {
    /// Config with a url and password and no certificate pinning.
    pub fn new(url: impl Into<String>, password: impl Into<String>) -> Self {
        Self { url: url.into(), password: password.into(), cert_fingerprint: None }
    }
}

/// Publisher side of the configuration channel.
///
/// Cloneable; typically owned by whatever persists settings. Each
/// [`ConfigSource::update`] reaches every subscribed session.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    tx: watch::Sender<SessionConfig>,
}

impl ConfigSource {
    /// Source seeded with initial values.
    pub fn new(initial: SessionConfig) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Publishes new values to every subscriber.
    pub fn update(&self, config: SessionConfig) {
        // send_replace always stores the new value and notifies any
        // receivers; a source without sessions is legal, so unlike `send`
        // it must not discard the value when there are no receivers
        let _ = self.tx.send_replace(config);
    }

    /// Current values.
    pub fn current(&self) -> SessionConfig {
        self.tx.borrow().clone()
    }

    /// Subscribes a session to change notifications.
    pub fn subscribe(&self) -> watch::Receiver<SessionConfig> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_observe_updates() {
        let source = ConfigSource::new(SessionConfig::new("wss://relay.one", "pw"));
        let mut rx = source.subscribe();

        assert_eq!(rx.borrow().url, "wss://relay.one");

        source.update(SessionConfig::new("wss://relay.two", "pw2"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().url, "wss://relay.two");
    }

    #[test]
    fn update_without_subscribers_is_fine() {
        let source = ConfigSource::new(SessionConfig::default());
        source.update(SessionConfig::new("wss://relay", "pw"));
        assert_eq!(source.current().url, "wss://relay");
    }
}
