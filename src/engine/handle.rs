//! Handle given to components when they start.

use crate::lifecycle::{ErrorReporter, Locator, Shutdown, ShutdownListener};

/// What a component can reach of its engine from `start` onwards.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    reporter: ErrorReporter,
    locator: Locator,
    shutdown: Shutdown,
}

impl EngineHandle {
    pub(crate) fn new(reporter: ErrorReporter, locator: Locator, shutdown: Shutdown) -> Self {
        Self {
            reporter,
            locator,
            shutdown,
        }
    }

    /// Name of the component this handle was issued to.
    pub fn component(&self) -> &str {
        self.reporter.component()
    }

    /// Reporter for failures discovered after `start` returned.
    pub fn reporter(&self) -> &ErrorReporter {
        &self.reporter
    }

    /// Locator; published once every component has started.
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Listener resolving when the engine begins shutting down.
    pub fn shutdown_listener(&self) -> ShutdownListener {
        self.shutdown.subscribe()
    }
}
