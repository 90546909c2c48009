//! Recording component used by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::engine::EngineHandle;
use crate::lifecycle::component::{Component, ComponentBase, ComponentError};

/// Ordered log of `"<phase>:<name>"` entries shared between stubs.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub struct Stub {
    base: ComponentBase,
    tag: &'static str,
    fail_configure: bool,
    fail_start: bool,
    fail_shutdown: bool,
    start_delay: Option<Duration>,
    report_after_start: bool,
    report_during_start: bool,
    journal: Journal,
    pub configured: AtomicUsize,
    pub started: AtomicUsize,
    pub stopped: AtomicUsize,
}

impl Stub {
    pub fn new(name: &str, tag: &'static str) -> Self {
        Self {
            base: ComponentBase::new(name),
            tag,
            fail_configure: false,
            fail_start: false,
            fail_shutdown: false,
            start_delay: None,
            report_after_start: false,
            report_during_start: false,
            journal: Journal::default(),
            configured: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
            stopped: AtomicUsize::new(0),
        }
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn with_journal(mut self, journal: &Journal) -> Self {
        self.journal = journal.clone();
        self
    }

    pub fn failing_configure(mut self) -> Self {
        self.fail_configure = true;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_shutdown(mut self) -> Self {
        self.fail_shutdown = true;
        self
    }

    pub fn slow_start(mut self, delay: Duration) -> Self {
        self.start_delay = Some(delay);
        self
    }

    /// Report a failure through the engine handle once started.
    pub fn reporting_failure(mut self) -> Self {
        self.report_after_start = true;
        self
    }

    /// Report a failure from inside `start`, then return `Ok`.
    pub fn reporting_during_start(mut self) -> Self {
        self.report_during_start = true;
        self
    }

    fn record(&self, phase: &str) {
        let entry = format!("{phase}:{}", self.base_name());
        self.journal.lock().unwrap().push(entry);
    }

    fn base_name(&self) -> &str {
        Component::name(self)
    }
}

#[async_trait]
impl Component for Stub {
    type Config = toml::Value;

    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    async fn configure(&self, _config: toml::Value) -> Result<(), ComponentError> {
        self.record("configure");
        self.configured.fetch_add(1, Ordering::SeqCst);
        if self.fail_configure {
            return Err(ComponentError::invalid_config("stub rejects configuration"));
        }
        Ok(())
    }

    async fn start(&self, engine: EngineHandle) -> Result<(), ComponentError> {
        self.record("start");
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.start_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_start {
            return Err(ComponentError::failed("stub failed to start"));
        }
        if self.report_during_start {
            engine
                .reporter()
                .report(ComponentError::failed("stub could not reach its peer"));
        }
        if self.report_after_start {
            let reporter = engine.reporter().clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                reporter.report(ComponentError::failed("stub lost its connection"));
            });
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ComponentError> {
        self.record("shutdown");
        self.stopped.fetch_add(1, Ordering::SeqCst);
        if self.fail_shutdown {
            return Err(ComponentError::failed("stub failed to stop"));
        }
        Ok(())
    }
}
