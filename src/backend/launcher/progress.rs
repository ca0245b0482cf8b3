//! Status reporting hooks for the launch flow.
//!
//! The orchestrator reports two things: a short human-readable status line
//! and every state transition. A UI hides itself on [`LaunchState::Running`]
//! and shows itself again on [`LaunchState::Idle`].

use std::fmt;
use std::sync::Arc;

use super::models::LaunchState;
use crate::utils::error::ErrorKind;

/// Status line shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Scanning,
    Ready,
    InstallingLoader,
    ValidatingFiles,
    Launching,
    Error,
}

impl Status {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scanning => "scanning",
            Self::Ready => "ready",
            Self::InstallingLoader => "installing loader",
            Self::ValidatingFiles => "validating files",
            Self::Launching => "launching",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presentation callbacks. All methods default to no-ops.
pub trait StatusListener: Send + Sync {
    fn on_status(&self, _status: Status) {}

    fn on_state(&self, _state: LaunchState) {}

    /// Called once per failed operation, with the collaborator's message.
    fn on_error(&self, _kind: ErrorKind, _message: &str) {}
}

/// Fan-out wrapper around an optional listener.
#[derive(Clone, Default)]
pub struct StatusReporter {
    listener: Option<Arc<dyn StatusListener>>,
}

impl StatusReporter {
    pub fn new(listener: Option<Arc<dyn StatusListener>>) -> Self {
        Self { listener }
    }

    /// A reporter without callbacks.
    pub fn silent() -> Self {
        Self::new(None)
    }

    pub fn status(&self, status: Status) {
        log::debug!("Status: {status}");
        if let Some(listener) = &self.listener {
            listener.on_status(status);
        }
    }

    pub fn state(&self, state: LaunchState) {
        if let Some(listener) = &self.listener {
            listener.on_state(state);
        }
    }

    pub fn error(&self, kind: ErrorKind, message: &str) {
        if let Some(listener) = &self.listener {
            listener.on_error(kind, message);
        }
    }
}
