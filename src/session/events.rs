//! Events the session engine emits to its UI shell.

use crate::render::{HexRow, TextLine};
use crate::state::ConnectionState;
use serde::Serialize;

/// Which output view an event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Text,
    Binary,
    Both,
}

impl View {
    pub fn includes(self, other: View) -> bool {
        self == View::Both || self == other
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The connection state changed.
    State(ConnectionState),
    /// A text line was added or changed; replace by id or append.
    Text(TextLine),
    /// A hex row was added or changed; replace by id or append.
    Binary(HexRow),
    /// The given view was emptied.
    Cleared(View),
    /// A dismissible message for the user.
    Notice(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_includes() {
        assert!(View::Both.includes(View::Text));
        assert!(View::Both.includes(View::Binary));
        assert!(View::Text.includes(View::Text));
        assert!(!View::Text.includes(View::Binary));
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(SessionEvent::State(ConnectionState::Connected)).unwrap();
        assert_eq!(json, serde_json::json!({"event": "state", "data": "connected"}));

        let json = serde_json::to_value(SessionEvent::Cleared(View::Both)).unwrap();
        assert_eq!(json, serde_json::json!({"event": "cleared", "data": "both"}));
    }
}
