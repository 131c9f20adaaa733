//! Client-side view models.
//!
//! [`Window`] and [`Line`] are the flattened shapes handed to session
//! listeners. They are assembled from the raw response payloads in
//! [`crate::response`]; nothing here touches the wire directly.

use serde::{Deserialize, Serialize};

/// Activity level of a window, ordered from quietest to loudest.
///
/// The relay reports activity as a small integer; unknown values collapse
/// to [`Activity::Inactive`] so a newer server cannot break older clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Activity {
    /// Nothing new since the window was last viewed.
    #[default]
    Inactive,
    /// Status traffic only (joins, parts, mode changes).
    Active,
    /// New messages.
    Message,
    /// Messages that highlight the user.
    Highlight,
}

impl Activity {
    /// Maps the relay's numeric activity level.
    pub fn from_level(level: i64) -> Self {
        match level {
            1 => Self::Active,
            2 => Self::Message,
            3 => Self::Highlight,
            _ => Self::Inactive,
        }
    }
}

/// A remote conversation the client can subscribe to and fetch lines from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Window identifier, unique per server.
    pub id: u64,

    /// View identifier used for line queries and subscriptions.
    ///
    /// Most servers use one view per window, but the two id spaces are
    /// distinct on the wire.
    pub view_id: u64,

    /// Human-readable window name (channel name, nick, server buffer).
    pub name: String,

    /// Current activity level.
    pub activity: Activity,
}

/// A single message/event belonging to a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// View the line belongs to.
    pub view_id: u64,

    /// Server-side timestamp, verbatim. `None` for lines the server did not
    /// stamp.
    pub timestamp: Option<String>,

    /// Line text. Empty when the query asked for metadata only.
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_levels_map_and_order() {
        assert_eq!(Activity::from_level(0), Activity::Inactive);
        assert_eq!(Activity::from_level(1), Activity::Active);
        assert_eq!(Activity::from_level(2), Activity::Message);
        assert_eq!(Activity::from_level(3), Activity::Highlight);
        // Unknown levels are quiet, not loud
        assert_eq!(Activity::from_level(42), Activity::Inactive);
        assert_eq!(Activity::from_level(-1), Activity::Inactive);

        assert!(Activity::Highlight > Activity::Message);
        assert!(Activity::Message > Activity::Active);
        assert!(Activity::Active > Activity::Inactive);
    }
}
