//! Connection state machine.
//!
//! `Disconnected -> Connecting -> Connected -> Disconnecting -> Disconnected`,
//! with `Connecting -> Disconnected` when the port fails to open. The two
//! transient states block re-entrant connect and disconnect requests.
//!
//! UI enablement is derived from the state through [`Controls`]; observers
//! subscribe with a `tokio::sync::watch` receiver instead of polling.

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl ConnectionState {
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Disconnecting)
                | (Disconnecting, Disconnected)
        )
    }

    pub fn is_transient(self) -> bool {
        matches!(self, Self::Connecting | Self::Disconnecting)
    }

    pub fn controls(self) -> Controls {
        Controls {
            write_enabled: self == Self::Connected,
            device_selection_enabled: self == Self::Disconnected,
            settings_visible: self == Self::Disconnected,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which UI actions a state allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Controls {
    pub write_enabled: bool,
    pub device_selection_enabled: bool,
    pub settings_visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid connection state transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

/// Shared holder of the current state. Transitions are atomic.
#[derive(Debug)]
pub struct StateMachine {
    tx: watch::Sender<ConnectionState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Disconnected);
        Self { tx }
    }

    pub fn current(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    pub fn controls(&self) -> Controls {
        self.current().controls()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Move to `to`, returning the state left behind.
    pub fn transition(&self, to: ConnectionState) -> Result<ConnectionState, InvalidTransition> {
        let mut outcome = Err(InvalidTransition {
            from: ConnectionState::Disconnected,
            to,
        });
        self.tx.send_if_modified(|state| {
            let from = *state;
            if from.can_transition_to(to) {
                *state = to;
                outcome = Ok(from);
                true
            } else {
                outcome = Err(InvalidTransition { from, to });
                false
            }
        });
        outcome
    }
}
