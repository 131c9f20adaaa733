//! Client request shapes.
//!
//! A [`Request`] is an envelope of an optional correlation id plus exactly
//! one [`RequestBody`] variant. The variant name doubles as the wire field
//! name (`challenge`, `login`, `info`, `window`, `line`, `input`), so the
//! serialized form matches the relay's flat-object schema while the Rust
//! side stays a proper sum type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One client message to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id. Assigned only when a response is expected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    /// The single populated request field.
    #[serde(flatten)]
    pub body: RequestBody,
}

impl Request {
    /// Wraps a body with no id assigned yet.
    pub fn new(body: RequestBody) -> Self {
        Self { id: None, body }
    }

    /// Whether the relay answers this request with a correlated response.
    ///
    /// Only line queries are answered; challenge, login, subscription and
    /// input requests are fire-and-forget.
    pub fn expects_response(&self) -> bool {
        match &self.body {
            RequestBody::Line(line) => line.get.is_some(),
            _ => false,
        }
    }

    /// Client half of the authentication handshake.
    pub fn challenge(challenge: impl Into<String>) -> Self {
        Self::new(RequestBody::Challenge(challenge.into()))
    }

    /// Login token derived from both challenges and the password.
    pub fn login(token: impl Into<String>) -> Self {
        Self::new(RequestBody::Login(token.into()))
    }

    /// Server version query.
    pub fn version() -> Self {
        Self::new(RequestBody::Info(InfoQuery::version()))
    }

    /// Full window list query.
    pub fn window_list() -> Self {
        Self::new(RequestBody::Window(WindowRequest {
            get: Some(WindowGet {}),
            dehilight: None,
        }))
    }

    /// Clears activity/highlight state for one window.
    pub fn dehilight(window_id: u64) -> Self {
        Self::new(RequestBody::Window(WindowRequest {
            get: None,
            dehilight: Some(vec![window_id]),
        }))
    }

    /// Line query for a single view.
    pub fn line_query(view_id: u64, query: LineQuery) -> Self {
        let mut get = BTreeMap::new();
        get.insert(view_id, query);
        Self::new(RequestBody::Line(Box::new(LineRequest {
            get: Some(get),
            sub_add: None,
            sub_rm: None,
        })))
    }

    /// Live line subscription for a single view.
    pub fn subscribe(view_id: u64) -> Self {
        Self::new(RequestBody::Line(Box::new(LineRequest {
            get: None,
            sub_add: Some(SubscriptionChange::for_view(view_id)),
            sub_rm: None,
        })))
    }

    /// Removes a live line subscription for a single view.
    pub fn unsubscribe(view_id: u64) -> Self {
        Self::new(RequestBody::Line(Box::new(LineRequest {
            get: None,
            sub_add: None,
            sub_rm: Some(SubscriptionChange::for_view(view_id)),
        })))
    }

    /// User input sent to a window.
    pub fn input(window_id: u64, text: impl Into<String>) -> Self {
        Self::new(RequestBody::Input(InputRequest {
            window_id,
            text: text.into(),
        }))
    }
}

/// The tagged union of request interpretations.
///
/// Exactly one variant per message; the serialized field name is the
/// lowercase variant name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestBody {
    /// Client challenge string (base64, no padding).
    Challenge(String),
    /// Login token (base64 HMAC, no padding). Empty on local crypto failure.
    Login(String),
    /// Server information query.
    Info(InfoQuery),
    /// Window list / activity operations.
    Window(WindowRequest),
    /// Line queries and subscription changes.
    Line(Box<LineRequest>),
    /// User input.
    Input(InputRequest),
}

/// Server information query. Only `version` is defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoQuery {
    /// Name of the requested attribute.
    pub query: String,
}

impl InfoQuery {
    /// The server version query.
    pub fn version() -> Self {
        Self { query: "version".to_string() }
    }
}

/// Window operations: fetch the list and/or clear activity markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRequest {
    /// Fetch the full window list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<WindowGet>,

    /// Window ids whose activity/highlight markers should be cleared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dehilight: Option<Vec<u64>>,
}

/// Marker object for the window list fetch. The relay expects an empty
/// object, not a boolean.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowGet {}

/// Line operations: per-view queries and subscription changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRequest {
    /// Line queries keyed by view id. The only request shape that expects
    /// a correlated response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<BTreeMap<u64, LineQuery>>,

    /// Subscription additions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_add: Option<SubscriptionChange>,

    /// Subscription removals. The wire schema nests removals under the same
    /// `add` key as additions; only the outer field distinguishes them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_rm: Option<SubscriptionChange>,
}

/// Parameters of a line query for one view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineQuery {
    /// Minimum line level to include.
    #[serde(rename = "lv")]
    pub level: i64,

    /// Maximum number of lines to return.
    pub count: u32,

    /// Only lines after this line id.
    #[serde(rename = "afterLine", skip_serializing_if = "Option::is_none")]
    pub after_line: Option<u64>,

    /// Only lines before this line id.
    #[serde(rename = "beforeLine", skip_serializing_if = "Option::is_none")]
    pub before_line: Option<u64>,

    /// Whether to include line text or metadata only.
    pub text: bool,
}

impl Default for LineQuery {
    fn default() -> Self {
        Self { level: 1, count: 10, after_line: None, before_line: None, text: true }
    }
}

impl LineQuery {
    /// Query for the latest `count` lines with default level and text.
    pub fn latest(count: u32) -> Self {
        Self { count, ..Self::default() }
    }
}

/// Wrapper around a subscription payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionChange {
    /// The views and options the change applies to.
    pub add: Subscription,
}

impl SubscriptionChange {
    /// Change targeting a single view with default options.
    pub fn for_view(view_id: u64) -> Self {
        Self { add: Subscription { view: vec![view_id], ..Subscription::default() } }
    }
}

/// Views and options of a subscription change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// View ids the change applies to.
    pub view: Vec<u64>,

    /// Minimum line level delivered.
    #[serde(rename = "lv")]
    pub level: i64,

    /// Whether line text is delivered.
    pub text: bool,
}

impl Default for Subscription {
    fn default() -> Self {
        Self { view: Vec::new(), level: 1, text: true }
    }
}

/// User input for a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRequest {
    /// Target window.
    #[serde(rename = "windowId")]
    pub window_id: u64,

    /// Input text, sent verbatim.
    pub text: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn only_line_get_expects_response() {
        assert!(Request::line_query(1, LineQuery::default()).expects_response());

        assert!(!Request::challenge("c").expects_response());
        assert!(!Request::login("t").expects_response());
        assert!(!Request::version().expects_response());
        assert!(!Request::window_list().expects_response());
        assert!(!Request::dehilight(3).expects_response());
        assert!(!Request::subscribe(7).expects_response());
        assert!(!Request::unsubscribe(7).expects_response());
        assert!(!Request::input(3, "hello").expects_response());
    }

    #[test]
    fn line_query_defaults() {
        let query = LineQuery::default();
        assert_eq!(query.level, 1);
        assert_eq!(query.count, 10);
        assert_eq!(query.after_line, None);
        assert_eq!(query.before_line, None);
        assert!(query.text);
    }

    #[test]
    fn subscription_change_targets_single_view() {
        let change = SubscriptionChange::for_view(42);
        assert_eq!(change.add.view, vec![42]);
        assert_eq!(change.add.level, 1);
        assert!(change.add.text);
    }
}
