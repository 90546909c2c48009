//! Engine error taxonomy and exit codes.

use std::process::ExitCode;

use thiserror::Error;

use crate::engine::state::EngineState;
use crate::lifecycle::{ComponentError, ComponentFailure, LocatorError};

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No configuration was resolved for the component.
    #[error("no configuration found for component '{component}'")]
    ConfigurationNotFound { component: String },

    /// The component rejected its configuration.
    #[error("component '{component}' rejected its configuration")]
    ConfigurationInvalid {
        component: String,
        #[source]
        source: ComponentError,
    },

    /// The component failed to start, synchronously or through the error channel.
    #[error("component '{component}' failed to start")]
    StartFailed {
        component: String,
        #[source]
        source: ComponentError,
    },

    /// One or more components failed to stop cleanly.
    #[error("{} component(s) failed to shut down: {}", .failures.len(), failure_names(.failures))]
    ShutdownFailed { failures: Vec<ComponentFailure> },

    #[error("component '{component}' already registered")]
    DuplicateRegistration { component: String },

    /// Registration attempted after `run` began.
    #[error("cannot register component '{component}': engine already started")]
    RegistrationClosed { component: String },

    #[error("engine already shut down")]
    AlreadyShutdown,

    #[error("engine already running")]
    AlreadyRunning,

    /// The operation is not allowed in the current state.
    #[error("engine busy ({0})")]
    Busy(EngineState),

    #[error(transparent)]
    Locator(#[from] LocatorError),

    /// Termination signal handlers could not be installed.
    #[error("failed to install signal handlers")]
    Signal(#[source] std::io::Error),
}

fn failure_names(failures: &[ComponentFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.component.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl EngineError {
    /// Process exit code for this failure class.
    pub fn exit_code(&self) -> u8 {
        match self {
            EngineError::ConfigurationNotFound { .. } | EngineError::ConfigurationInvalid { .. } => 2,
            EngineError::StartFailed { .. } => 3,
            EngineError::ShutdownFailed { .. } => 4,
            _ => 1,
        }
    }
}

impl From<&EngineError> for ExitCode {
    fn from(err: &EngineError) -> Self {
        ExitCode::from(err.exit_code())
    }
}
