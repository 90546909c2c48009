//! Engine lifecycle states.
//!
//! # State Transitions
//! ```text
//! Created → Configuring → Starting → Running → ShuttingDown → Stopped
//!              │              │                     ▲
//!              └──────────────┴── failure ──────────┘
//! Created ─────────── shutdown() ───────────────────┘
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Accepting registrations.
    Created,
    Configuring,
    Starting,
    /// Every component started; the locator is published.
    Running,
    ShuttingDown,
    /// Terminal.
    Stopped,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Created => "created",
            EngineState::Configuring => "configuring",
            EngineState::Starting => "starting",
            EngineState::Running => "running",
            EngineState::ShuttingDown => "shutting_down",
            EngineState::Stopped => "stopped",
        }
    }

    /// Whether the engine has begun or finished shutting down.
    pub fn is_terminating(&self) -> bool {
        matches!(self, EngineState::ShuttingDown | EngineState::Stopped)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
