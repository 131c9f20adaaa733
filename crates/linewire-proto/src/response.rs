//! Server response shapes.
//!
//! Unlike requests, responses are not a sum type: the relay may populate
//! any subset of fields in a single message, and the session engine treats
//! each populated field as an independent event. The payload types carry
//! `into_*` helpers that flatten the raw wire maps into [`Window`] and
//! [`Line`] models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Activity, Line, Window};

/// One server message.
///
/// Every field is optional; any subset may be populated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Response {
    /// Correlation id echoing a request id, when the message answers a
    /// line query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    /// Server challenge string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,

    /// Login verdict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<bool>,

    /// Server information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<InfoPayload>,

    /// Window list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowPayload>,

    /// Per-view item metadata accompanying a window list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemPayload>,

    /// Lines answering a line query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<LinePayload>,

    /// Unsolicited lines pushed for subscribed views.
    #[serde(rename = "lineAdded", skip_serializing_if = "Option::is_none")]
    pub line_added: Option<LinePayload>,
}

/// Server information fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InfoPayload {
    /// Server software version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Raw window list as sent by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowPayload(
    /// Raw entries in wire order.
    pub Vec<WindowEntry>,
);

impl WindowPayload {
    /// Flattens the raw entries into [`Window`] models, merging names from
    /// the item payload when the entry itself carries none.
    pub fn into_windows(self, items: Option<&ItemPayload>) -> Vec<Window> {
        self.0
            .into_iter()
            .map(|entry| {
                let name = entry.name.or_else(|| {
                    items
                        .and_then(|payload| payload.0.get(&entry.view))
                        .and_then(|item| item.name.clone())
                });
                Window {
                    id: entry.id,
                    view_id: entry.view,
                    name: name.unwrap_or_default(),
                    activity: Activity::from_level(entry.activity.unwrap_or(0)),
                }
            })
            .collect()
    }
}

/// One raw window entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowEntry {
    /// Window id.
    pub id: u64,

    /// View id used for line queries and subscriptions.
    pub view: u64,

    /// Window name, when the server inlines it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Numeric activity level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<i64>,
}

/// Item metadata keyed by view id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemPayload(
    /// Per-view metadata entries.
    pub BTreeMap<u64, ItemEntry>,
);

/// Metadata the relay reports per item rather than per window.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemEntry {
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Lines keyed by view id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinePayload(
    /// Per-view line lists in wire order.
    pub BTreeMap<u64, Vec<LineEntry>>,
);

impl LinePayload {
    /// Flattens per-view line lists into [`Line`] models, preserving each
    /// view's wire order.
    pub fn into_lines(self) -> Vec<Line> {
        self.0
            .into_iter()
            .flat_map(|(view_id, entries)| {
                entries.into_iter().map(move |entry| Line {
                    view_id,
                    timestamp: entry.time,
                    text: entry.text.unwrap_or_default(),
                })
            })
            .collect()
    }
}

/// One raw line entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LineEntry {
    /// Server timestamp, verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,

    /// Line text. Absent for metadata-only queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn windows_merge_names_from_items() {
        let payload = WindowPayload(vec![
            WindowEntry { id: 1, view: 10, name: Some("#rust".to_string()), activity: Some(2) },
            WindowEntry { id: 2, view: 20, name: None, activity: None },
        ]);
        let mut items = BTreeMap::new();
        items.insert(20, ItemEntry { name: Some("#async".to_string()) });
        let items = ItemPayload(items);

        let windows = payload.into_windows(Some(&items));
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].name, "#rust");
        assert_eq!(windows[0].activity, Activity::Message);
        assert_eq!(windows[1].name, "#async");
        assert_eq!(windows[1].activity, Activity::Inactive);
    }

    #[test]
    fn windows_without_items_get_empty_names() {
        let payload = WindowPayload(vec![WindowEntry { id: 1, view: 10, name: None, activity: None }]);
        let windows = payload.into_windows(None);
        assert_eq!(windows[0].name, "");
    }

    #[test]
    fn lines_flatten_preserving_view_order() {
        let mut per_view = BTreeMap::new();
        per_view.insert(
            7,
            vec![
                LineEntry { time: Some("12:00".to_string()), text: Some("first".to_string()) },
                LineEntry { time: None, text: Some("second".to_string()) },
            ],
        );
        per_view.insert(9, vec![LineEntry { time: None, text: None }]);

        let lines = LinePayload(per_view).into_lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].view_id, 7);
        assert_eq!(lines[0].text, "first");
        assert_eq!(lines[0].timestamp.as_deref(), Some("12:00"));
        assert_eq!(lines[1].text, "second");
        assert_eq!(lines[2].view_id, 9);
        assert_eq!(lines[2].text, "");
    }

    #[test]
    fn empty_response_deserializes() {
        let response: Response = serde_json::from_str("{}").unwrap();
        assert_eq!(response, Response::default());
    }
}
