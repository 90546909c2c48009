//! Shared error channel and failure monitor.
//!
//! # Data Flow
//! ```text
//! component (inside start or a background task)
//!     → ErrorReporter::report
//!         → FailureLog (recorded synchronously, first-failure watch)
//!         → bounded mpsc (never blocks)
//!             → monitor task (structured log line, metric)
//!     → Engine::run / run_until react to the first failure
//! ```
//!
//! # Design Decisions
//! - Failures are recorded before `report` returns, in report order, so the
//!   start pass sees a failure reported from inside `start`
//! - The channel only carries the logging side; a full or closed channel
//!   logs inline on the reporting task
//! - Stopping the monitor drains whatever is still queued

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::lifecycle::component::ComponentError;
use crate::observability::metrics;

/// Lifecycle phase in which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Configure,
    Start,
    /// Reported asynchronously, after `start` returned.
    Running,
    Shutdown,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Configure => "configure",
            Phase::Start => "start",
            Phase::Running => "running",
            Phase::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure attributed to one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentFailure {
    pub component: String,
    pub phase: Phase,
    pub error: ComponentError,
}

impl ComponentFailure {
    pub fn new(component: impl Into<String>, phase: Phase, error: ComponentError) -> Self {
        Self {
            component: component.into(),
            phase,
            error,
        }
    }
}

impl fmt::Display for ComponentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.component, self.phase, self.error)
    }
}

/// Every asynchronous failure observed by the engine.
#[derive(Debug)]
pub(crate) struct FailureLog {
    entries: Mutex<Vec<ComponentFailure>>,
    first: watch::Sender<Option<ComponentFailure>>,
}

impl FailureLog {
    pub(crate) fn new() -> Self {
        let (first, _) = watch::channel(None);
        Self {
            entries: Mutex::new(Vec::new()),
            first,
        }
    }

    pub(crate) fn record(&self, failure: ComponentFailure) {
        self.first.send_if_modified(|first| {
            if first.is_some() {
                return false;
            }
            *first = Some(failure.clone());
            true
        });
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(failure);
    }

    pub(crate) fn first(&self) -> Option<ComponentFailure> {
        self.first.borrow().clone()
    }

    /// Resolve with the first failure, immediately if one was recorded already.
    pub(crate) async fn wait_first(&self) -> ComponentFailure {
        let mut first = self.first.subscribe();
        loop {
            if let Some(failure) = first.borrow_and_update().clone() {
                return failure;
            }
            // sender is owned by self
            if first.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    pub(crate) fn all(&self) -> Vec<ComponentFailure> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Handle components use to report failures discovered after `start` returned.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    component: String,
    tx: mpsc::Sender<ComponentFailure>,
    log: Arc<FailureLog>,
}

impl ErrorReporter {
    pub(crate) fn new(
        component: impl Into<String>,
        tx: mpsc::Sender<ComponentFailure>,
        log: Arc<FailureLog>,
    ) -> Self {
        Self {
            component: component.into(),
            tx,
            log,
        }
    }

    /// Name of the component this reporter is attributed to.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Report a failure to the engine without blocking.
    pub fn report(&self, error: impl Into<ComponentError>) {
        let failure = ComponentFailure::new(&self.component, Phase::Running, error.into());
        self.log.record(failure.clone());
        match self.tx.try_send(failure) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(failure)) => {
                tracing::warn!(component = %self.component, "Error channel full, logging inline");
                announce(&failure);
            }
            Err(mpsc::error::TrySendError::Closed(failure)) => announce(&failure),
        }
    }
}

fn announce(failure: &ComponentFailure) {
    tracing::error!(
        component = %failure.component,
        phase = %failure.phase,
        error = %failure.error,
        "Component reported a failure"
    );
    metrics::record_failure(failure.phase);
}

/// Running monitor task draining the error channel.
pub(crate) struct MonitorTask {
    stop: oneshot::Sender<()>,
    task: JoinHandle<usize>,
}

impl MonitorTask {
    pub(crate) fn spawn(mut rx: mpsc::Receiver<ComponentFailure>) -> Self {
        let (stop, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            tracing::debug!("Failure monitor started");
            let mut announced = 0;
            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(failure) => {
                            announce(&failure);
                            announced += 1;
                        }
                        None => break,
                    },
                    _ = &mut stop_rx => {
                        rx.close();
                        while let Some(failure) = rx.recv().await {
                            announce(&failure);
                            announced += 1;
                        }
                        break;
                    }
                }
            }
            tracing::debug!(announced, "Failure monitor stopped");
            announced
        });

        Self { stop, task }
    }

    /// Stop the monitor after draining queued failures.
    ///
    /// Returns how many failures the monitor logged.
    pub(crate) async fn stop(self) -> usize {
        let _ = self.stop.send(());
        match self.task.await {
            Ok(announced) => announced,
            Err(e) => {
                tracing::warn!(error = %e, "Failure monitor task ended abnormally");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn failure(name: &str) -> ComponentFailure {
        ComponentFailure::new(name, Phase::Running, ComponentError::failed("boom"))
    }

    #[tokio::test]
    async fn report_is_recorded_before_it_returns() {
        let log = Arc::new(FailureLog::new());
        let (tx, rx) = mpsc::channel(8);
        let monitor = MonitorTask::spawn(rx);

        let reporter = ErrorReporter::new("api", tx, log.clone());
        reporter.report(ComponentError::failed("listener died"));

        let first = log.first().unwrap();
        assert_eq!(first.component, "api");
        assert_eq!(first.phase, Phase::Running);
        let waited = tokio::time::timeout(Duration::from_secs(1), log.wait_first())
            .await
            .unwrap();
        assert_eq!(waited, first);

        assert_eq!(monitor.stop().await, 1);
        assert_eq!(log.all().len(), 1);
    }

    #[tokio::test]
    async fn full_channel_keeps_report_order() {
        let log = Arc::new(FailureLog::new());
        let (tx, _rx) = mpsc::channel(1);
        let reporter = ErrorReporter::new("db", tx, log.clone());

        reporter.report(ComponentError::failed("first"));
        reporter.report(ComponentError::failed("second"));

        let errors: Vec<_> = log.all().into_iter().map(|f| f.error).collect();
        assert_eq!(
            errors,
            vec![ComponentError::failed("first"), ComponentError::failed("second")]
        );
        assert_eq!(log.first().unwrap().error, ComponentError::failed("first"));
    }

    #[tokio::test]
    async fn closed_channel_still_records() {
        let log = Arc::new(FailureLog::new());
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let reporter = ErrorReporter::new("broker", tx, log.clone());

        reporter.report(ComponentError::failed("connection lost"));

        assert_eq!(log.first().unwrap().component, "broker");
    }

    #[tokio::test]
    async fn stop_drains_pending_failures() {
        let (tx, rx) = mpsc::channel(8);
        for name in ["a", "b", "c"] {
            tx.try_send(failure(name)).unwrap();
        }
        let monitor = MonitorTask::spawn(rx);

        assert_eq!(monitor.stop().await, 3);
    }
}
