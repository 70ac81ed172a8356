//! Engine lifecycle states.

use std::fmt;

/// Where a run currently is.
///
/// `Idle → Connected → BrowserReady → {Fetching → Extracting → Writing →
/// Logged}* → Closed`. Any state may move to `Closed`, and a failed fetch
/// moves straight on to the next category's `Fetching`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    Idle,
    Connected,
    BrowserReady,
    Fetching,
    Extracting,
    Writing,
    Logged,
    Closed,
}

impl EngineState {
    pub fn can_transition_to(self, next: EngineState) -> bool {
        use EngineState::*;

        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Idle, Connected)
            | (Connected, BrowserReady)
            | (BrowserReady, Fetching)
            | (Fetching, Extracting)
            | (Fetching, Fetching)
            | (Extracting, Writing)
            | (Writing, Logged)
            | (Logged, Fetching) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connected => "connected",
            Self::BrowserReady => "browser_ready",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Writing => "writing",
            Self::Logged => "logged",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
