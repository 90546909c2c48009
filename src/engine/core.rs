//! The engine: registration, startup sequencing and ordered shutdown.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockWriteGuard};
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tracing::{Instrument, Span};
use uuid::Uuid;

use crate::config::{ConfigSource, EngineConfig};
use crate::engine::error::EngineError;
use crate::engine::handle::EngineHandle;
use crate::engine::settings::EngineSettings;
use crate::engine::state::EngineState;
use crate::lifecycle::monitor::{FailureLog, MonitorTask};
use crate::lifecycle::{
    Component, ComponentError, ComponentFailure, ErrorReporter, Locator, Phase, Publication,
    Registry, SharedComponent, Shutdown, TerminationSignals,
};
use crate::observability::metrics;

/// Component lifecycle engine.
///
/// # Example
/// ```rust,no_run
/// use component_engine::components::{ApiComponent, DbComponent};
/// use component_engine::config::load_config;
/// use component_engine::Engine;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config("engine.toml".as_ref())?;
/// let engine = Engine::from_config(&config)
///     .with(DbComponent::new())
///     .with(ApiComponent::new());
///
/// engine.run_and_wait().await?;
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    id: Uuid,
    settings: EngineSettings,
    registry: Arc<RwLock<Registry>>,
    config_source: Arc<dyn ConfigSource>,
    logger: Span,
    state: watch::Sender<EngineState>,
    publication: watch::Sender<Publication>,
    errors_tx: mpsc::Sender<ComponentFailure>,
    errors_rx: Mutex<Option<mpsc::Receiver<ComponentFailure>>>,
    failures: Arc<FailureLog>,
    monitor: Mutex<Option<MonitorTask>>,
    shutdown: Shutdown,
}

impl Engine {
    /// Create an engine with no configuration source.
    ///
    /// Every component then fails with `ConfigurationNotFound` unless a source
    /// is attached with [`Engine::with_config_source`].
    pub fn new(settings: EngineSettings) -> Self {
        let id = Uuid::new_v4();
        let (state, _) = watch::channel(EngineState::Created);
        let (publication, _) = watch::channel(Publication::Pending);
        let (errors_tx, errors_rx) = mpsc::channel(settings.error_channel_capacity.max(1));

        Self {
            id,
            logger: tracing::info_span!("engine", engine_id = %id),
            settings,
            registry: Arc::new(RwLock::new(Registry::new())),
            config_source: Arc::new(toml::Table::new()),
            state,
            publication,
            errors_tx,
            errors_rx: Mutex::new(Some(errors_rx)),
            failures: Arc::new(FailureLog::new()),
            monitor: Mutex::new(None),
            shutdown: Shutdown::new(),
        }
    }

    /// Create an engine from a loaded configuration file.
    ///
    /// Settings come from `[engine]`, component tables from `[components.*]`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.settings()).with_config_source(config.clone())
    }

    /// Attach the source component configurations are resolved from.
    pub fn with_config_source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.config_source = Arc::new(source);
        self
    }

    /// Register a component, logging and skipping it when rejected.
    pub fn with<C: Component>(self, component: C) -> Self {
        if let Err(e) = self.register(component) {
            tracing::warn!(parent: &self.logger, error = %e, "Component not registered");
        }
        self
    }

    /// Register a component.
    ///
    /// Injects the engine logger into the component. Fails when the name is
    /// taken (the first registration is kept) or once `run` has begun.
    pub fn register<C: Component>(&self, mut component: C) -> Result<(), EngineError> {
        let name = component.name().to_string();
        let mut registry = self.write_registry();

        if self.state() != EngineState::Created {
            return Err(EngineError::RegistrationClosed { component: name });
        }
        if registry.lookup(&name).is_some() {
            return Err(EngineError::DuplicateRegistration { component: name });
        }

        component.set_logger(tracing::info_span!(parent: &self.logger, "component", component = %name));
        registry
            .register(Arc::new(component))
            .map_err(|dup| EngineError::DuplicateRegistration { component: dup.0 })?;
        metrics::set_registered(registry.len());

        tracing::info!(parent: &self.logger, component = %name, "Registering component");
        Ok(())
    }

    /// Configure then start every component, then publish the locator.
    ///
    /// The first configure or start failure aborts the sequence: remaining
    /// components are skipped, every component is shut down and the engine
    /// ends `Stopped`.
    pub async fn run(&self) -> Result<(), EngineError> {
        let components = self.begin_run()?;
        self.spawn_monitor();

        tracing::info!(parent: &self.logger, count = components.len(), "Configuring engine components");
        let phase_started = Instant::now();
        for component in &components {
            if let Err(e) = self.configure_component(component).await {
                // shutdown failures are already logged per component
                let _ = self.abort(Phase::Configure).await;
                return Err(e);
            }
        }
        metrics::record_phase_duration(Phase::Configure, phase_started.elapsed());

        self.transition(&[EngineState::Configuring], EngineState::Starting)
            .map_err(EngineError::Busy)?;

        tracing::info!(parent: &self.logger, "Starting engine components");
        let phase_started = Instant::now();
        for component in &components {
            let outcome = match self.start_component(component).await {
                Ok(()) => self.failures.first().map(|failure| EngineError::StartFailed {
                    component: failure.component,
                    source: failure.error,
                }),
                Err(e) => Some(e),
            };
            if let Some(e) = outcome {
                let _ = self.abort(Phase::Start).await;
                return Err(e);
            }
        }
        metrics::record_phase_duration(Phase::Start, phase_started.elapsed());

        self.publication.send_replace(Publication::Published);
        self.transition(&[EngineState::Starting], EngineState::Running)
            .map_err(EngineError::Busy)?;
        tracing::info!(parent: &self.logger, "Component locator published, engine running");
        Ok(())
    }

    /// Run, then wait for SIGINT or SIGTERM and shut down.
    ///
    /// After the signal the engine waits `drain_timeout` before shutting
    /// components down. An asynchronous component failure also ends the wait.
    /// A signal caught while components are still configuring or starting
    /// aborts the startup pass instead.
    pub async fn run_and_wait(&self) -> Result<(), EngineError> {
        let mut signals = TerminationSignals::install().map_err(EngineError::Signal)?;
        let logger = self.logger.clone();

        self.run_interruptible(async move {
            let signal = signals.recv().await;
            tracing::info!(parent: &logger, signal = %signal, "Caught termination signal");
        })
        .await
    }

    /// Run, then wait for `trigger` (or a component failure) and shut down.
    ///
    /// `trigger` is only polled once the engine is running.
    pub async fn run_until<F>(&self, trigger: F) -> Result<(), EngineError>
    where
        F: Future<Output = ()>,
    {
        self.run().await?;
        self.wait_then_stop(trigger).await
    }

    /// Like `run_until`, except `trigger` is watched during startup too and
    /// aborts the pass when it fires first.
    async fn run_interruptible<F>(&self, trigger: F) -> Result<(), EngineError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(trigger);

        let interrupted = tokio::select! {
            biased;
            result = self.run() => {
                result?;
                false
            }
            _ = &mut trigger => true,
        };

        if interrupted {
            tracing::warn!(
                parent: &self.logger,
                state = %self.state(),
                "Termination requested during startup"
            );
            return self.abort(Phase::Start).await;
        }
        self.wait_then_stop(trigger).await
    }

    async fn wait_then_stop<F>(&self, trigger: F) -> Result<(), EngineError>
    where
        F: Future<Output = ()>,
    {
        let failure = tokio::select! {
            _ = trigger => {
                tracing::info!(
                    parent: &self.logger,
                    drain = ?self.settings.drain_timeout,
                    "Waiting for in-flight work to finish"
                );
                tokio::time::sleep(self.settings.drain_timeout).await;
                None
            }
            failure = self.failures.wait_first() => {
                tracing::error!(
                    parent: &self.logger,
                    component = %failure.component,
                    error = %failure.error,
                    "Component failed while running, shutting down"
                );
                Some(failure)
            }
        };

        let stopped = self.shutdown().await;
        match failure {
            Some(failure) => Err(EngineError::StartFailed {
                component: failure.component,
                source: failure.error,
            }),
            None => stopped,
        }
    }

    /// Shut every component down in reverse registration order.
    ///
    /// Every component gets its turn even when others fail; failures are
    /// returned together. Calling it again after the engine stopped is a no-op.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        match self.transition(
            &[EngineState::Created, EngineState::Running],
            EngineState::ShuttingDown,
        ) {
            Ok(_) => {}
            Err(state) if state.is_terminating() => {
                tracing::debug!(parent: &self.logger, state = %state, "Engine already shutting down");
                return Ok(());
            }
            Err(state) => return Err(EngineError::Busy(state)),
        }

        tracing::info!(parent: &self.logger, "Shutting down the engine");
        let failures = self.stop_components().await;

        if failures.is_empty() {
            tracing::info!(parent: &self.logger, "Engine is down");
            Ok(())
        } else {
            for failure in &failures {
                tracing::warn!(
                    parent: &self.logger,
                    component = %failure.component,
                    error = %failure.error,
                    "Component did not stop cleanly"
                );
            }
            Err(EngineError::ShutdownFailed { failures })
        }
    }

    /// A locator handle over this engine's registry.
    pub fn locator(&self) -> Locator {
        Locator::new(self.registry.clone(), self.publication.subscribe())
    }

    /// Look a component up directly, regardless of publication.
    pub fn component(&self, name: &str) -> Option<SharedComponent> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .lookup(name)
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    /// Asynchronous failures recorded so far.
    pub fn failures(&self) -> Vec<ComponentFailure> {
        self.failures.all()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn begin_run(&self) -> Result<Vec<SharedComponent>, EngineError> {
        // Holding the write lock keeps registration out while the state flips.
        let registry = self.write_registry();
        match self.transition(&[EngineState::Created], EngineState::Configuring) {
            Ok(_) => Ok(registry.snapshot()),
            Err(state) if state.is_terminating() => Err(EngineError::AlreadyShutdown),
            Err(_) => Err(EngineError::AlreadyRunning),
        }
    }

    async fn configure_component(&self, component: &SharedComponent) -> Result<(), EngineError> {
        let name = component.name();
        tracing::info!(parent: &self.logger, component = %name, "Configuring component");

        let Some(raw) = self.config_source.resolve(name) else {
            let err = EngineError::ConfigurationNotFound {
                component: name.to_string(),
            };
            self.log_failure(name, Phase::Configure, &err);
            return Err(err);
        };

        component
            .configure_value(raw)
            .instrument(component.logger().clone())
            .await
            .map_err(|source| {
                self.log_failure(name, Phase::Configure, &source);
                EngineError::ConfigurationInvalid {
                    component: name.to_string(),
                    source,
                }
            })
    }

    async fn start_component(&self, component: &SharedComponent) -> Result<(), EngineError> {
        let name = component.name();
        tracing::info!(parent: &self.logger, component = %name, "Starting component");

        let start = component
            .start(self.handle_for(name))
            .instrument(component.logger().clone());
        let result = match self.settings.start_timeout {
            Some(limit) => tokio::time::timeout(limit, start)
                .await
                .unwrap_or(Err(ComponentError::Timeout(limit))),
            None => start.await,
        };

        result.map_err(|source| {
            self.log_failure(name, Phase::Start, &source);
            EngineError::StartFailed {
                component: name.to_string(),
                source,
            }
        })
    }

    /// Tear everything down after a failed or interrupted startup pass.
    async fn abort(&self, phase: Phase) -> Result<(), EngineError> {
        tracing::warn!(parent: &self.logger, phase = %phase, "Startup aborted, shutting down components");
        self.state.send_replace(EngineState::ShuttingDown);
        let failures = self.stop_components().await;
        if failures.is_empty() {
            Ok(())
        } else {
            Err(EngineError::ShutdownFailed { failures })
        }
    }

    async fn stop_components(&self) -> Vec<ComponentFailure> {
        self.publication.send_replace(Publication::Withdrawn);
        self.shutdown.trigger();

        let components = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot();
        let phase_started = Instant::now();

        let mut failures = Vec::new();
        for component in components.iter().rev() {
            let name = component.name();
            tracing::info!(parent: &self.logger, component = %name, "Shutting down component");

            let limit = self.settings.shutdown_timeout;
            let result = tokio::time::timeout(
                limit,
                component.shutdown().instrument(component.logger().clone()),
            )
            .await
            .unwrap_or(Err(ComponentError::Timeout(limit)));

            if let Err(e) = result {
                self.log_failure(name, Phase::Shutdown, &e);
                failures.push(ComponentFailure::new(name, Phase::Shutdown, e));
            }
        }
        metrics::record_phase_duration(Phase::Shutdown, phase_started.elapsed());

        self.stop_monitor().await;
        self.state.send_replace(EngineState::Stopped);
        failures
    }

    fn handle_for(&self, name: &str) -> EngineHandle {
        let reporter = ErrorReporter::new(name, self.errors_tx.clone(), self.failures.clone());
        EngineHandle::new(reporter, self.locator(), self.shutdown.clone())
    }

    fn spawn_monitor(&self) {
        let rx = lock(&self.errors_rx).take();
        if let Some(rx) = rx {
            *lock(&self.monitor) = Some(MonitorTask::spawn(rx));
        }
    }

    async fn stop_monitor(&self) {
        let monitor = lock(&self.monitor).take();
        if let Some(monitor) = monitor {
            monitor.stop().await;
        }
    }

    /// Move from one of `from` to `to`; on refusal returns the current state.
    fn transition(&self, from: &[EngineState], to: EngineState) -> Result<EngineState, EngineState> {
        let mut outcome = Err(to);
        self.state.send_if_modified(|state| {
            if from.contains(state) {
                outcome = Ok(*state);
                *state = to;
                true
            } else {
                outcome = Err(*state);
                false
            }
        });
        if outcome.is_ok() {
            tracing::debug!(parent: &self.logger, state = %to, "Engine state changed");
        }
        outcome
    }

    fn log_failure(&self, component: &str, phase: Phase, error: &dyn std::fmt::Display) {
        tracing::error!(
            parent: &self.logger,
            component = %component,
            phase = %phase,
            error = %error,
            "Component lifecycle operation failed"
        );
        metrics::record_failure(phase);
    }

    fn write_registry(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("settings", &self.settings)
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
