//! Session event listeners.
//!
//! Consumers observe the session through [`SessionListener`], a capability
//! set in which every method defaults to a no-op; a listener implements
//! only what it cares about. Listeners live in a [`ListenerRegistry`] keyed
//! by an opaque string, and every broadcast reaches every registered
//! listener. Broadcasts run on the session's serialized task, so listener
//! code must not block.

use std::collections::HashMap;

use linewire_proto::{Line, Window};

use crate::event::SessionNotice;

/// Observer of session events. Every method has a default no-op body.
pub trait SessionListener: Send {
    /// First successful login of a connection cycle.
    fn on_connect(&mut self) {}

    /// Successful login after a connection loss.
    fn on_reconnect(&mut self) {}

    /// Session reached the disconnected state.
    fn on_disconnect(&mut self) {}

    /// Server version received.
    fn on_version(&mut self, version: &str) {
        let _ = version;
    }

    /// Window list received.
    fn on_window_list(&mut self, windows: &[Window]) {
        let _ = windows;
    }

    /// Lines answering a line query.
    fn on_line_list(&mut self, lines: &[Line]) {
        let _ = lines;
    }

    /// Unsolicited lines for subscribed views.
    fn on_new_lines(&mut self, lines: &[Line]) {
        let _ = lines;
    }

    /// At least one request is awaiting its response.
    fn on_pending_requests(&mut self) {}

    /// No request is awaiting a response.
    fn on_no_pending_requests(&mut self) {}
}

/// Keyed registry of session listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: HashMap<String, Box<dyn SessionListener>>,
}

impl ListenerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener under `key`, replacing any previous listener
    /// with the same key.
    pub fn register(&mut self, key: impl Into<String>, listener: Box<dyn SessionListener>) {
        self.listeners.insert(key.into(), listener);
    }

    /// Removes the listener registered under `key`, if any.
    pub fn remove(&mut self, key: &str) {
        self.listeners.remove(key);
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Delivers one notice to every registered listener.
    pub fn broadcast(&mut self, notice: &SessionNotice) {
        for listener in self.listeners.values_mut() {
            match notice {
                SessionNotice::Connected => listener.on_connect(),
                SessionNotice::Reconnected => listener.on_reconnect(),
                SessionNotice::Disconnected => listener.on_disconnect(),
                SessionNotice::Version(version) => listener.on_version(version),
                SessionNotice::WindowList(windows) => listener.on_window_list(windows),
                SessionNotice::LineList(lines) => listener.on_line_list(lines),
                SessionNotice::NewLines(lines) => listener.on_new_lines(lines),
                SessionNotice::PendingRequests => listener.on_pending_requests(),
                SessionNotice::NoPendingRequests => listener.on_no_pending_requests(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn push(&self, entry: String) {
            if let Ok(mut log) = self.log.lock() {
                log.push(entry);
            }
        }
    }

    impl SessionListener for Recorder {
        fn on_connect(&mut self) {
            self.push("connect".into());
        }

        fn on_version(&mut self, version: &str) {
            self.push(format!("version:{version}"));
        }
    }

    #[test]
    fn broadcast_reaches_all_listeners() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        registry.register("a", Box::new(Recorder { log: Arc::clone(&log) }));
        registry.register("b", Box::new(Recorder { log: Arc::clone(&log) }));

        registry.broadcast(&SessionNotice::Connected);

        let entries = log.lock().map(|log| log.clone()).unwrap_or_default();
        assert_eq!(entries, vec!["connect".to_string(), "connect".to_string()]);
    }

    #[test]
    fn unimplemented_callbacks_are_noops() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        registry.register("a", Box::new(Recorder { log: Arc::clone(&log) }));

        // Recorder implements neither of these; nothing should be recorded
        registry.broadcast(&SessionNotice::Disconnected);
        registry.broadcast(&SessionNotice::PendingRequests);
        registry.broadcast(&SessionNotice::Version("1.2".into()));

        let entries = log.lock().map(|log| log.clone()).unwrap_or_default();
        assert_eq!(entries, vec!["version:1.2".to_string()]);
    }

    #[test]
    fn register_and_remove_by_key() {
        let mut registry = ListenerRegistry::new();
        registry.register("ui", Box::new(Recorder::default()));
        assert_eq!(registry.len(), 1);

        // Same key replaces, not duplicates
        registry.register("ui", Box::new(Recorder::default()));
        assert_eq!(registry.len(), 1);

        registry.remove("ui");
        assert!(registry.is_empty());

        // Removing an absent key is a no-op
        registry.remove("ui");
        assert!(registry.is_empty());
    }
}
