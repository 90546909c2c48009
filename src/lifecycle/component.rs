//! The component contract.
//!
//! # Responsibilities
//! - Define the lifecycle every pluggable subsystem implements
//! - Provide the embedded name/logger bookkeeping (`ComponentBase`)
//! - Erase the typed contract into `DynComponent` for the registry
//!
//! # Design Decisions
//! - Configuration is typed per component (`Component::Config`); the raw
//!   TOML table is converted once, at the erasure boundary
//! - The logger handle is a `tracing::Span` the engine injects at registration
//! - Lifecycle methods take `&self`; components keep mutable state behind
//!   their own synchronization so they can be shared through the locator

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::Span;

use crate::engine::EngineHandle;

/// Errors a component reports from one of its lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    /// The configuration value does not have the shape the component expects.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The operation failed.
    #[error("{0}")]
    Failed(String),

    /// The operation did not complete within its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl ComponentError {
    /// Build a `Failed` error from anything printable.
    pub fn failed(err: impl fmt::Display) -> Self {
        Self::Failed(err.to_string())
    }

    /// Build an `InvalidConfig` error from anything printable.
    pub fn invalid_config(err: impl fmt::Display) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

impl From<std::io::Error> for ComponentError {
    fn from(err: std::io::Error) -> Self {
        Self::Failed(err.to_string())
    }
}

/// Name and logger shared by every component implementation.
#[derive(Debug, Clone)]
pub struct ComponentBase {
    name: String,
    logger: Span,
}

impl ComponentBase {
    /// Create a base with the given unique name and a disabled logger.
    ///
    /// The engine replaces the logger when the component is registered.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            logger: Span::none(),
        }
    }
}

/// A pluggable subsystem managed by the engine.
///
/// Implementors embed a [`ComponentBase`] and expose it through `base` /
/// `base_mut`; name and logger accessors are provided on top of it.
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// Typed configuration resolved from the component's config table.
    type Config: DeserializeOwned + Send + 'static;

    fn base(&self) -> &ComponentBase;

    fn base_mut(&mut self) -> &mut ComponentBase;

    /// Unique component name within the engine.
    fn name(&self) -> &str {
        &self.base().name
    }

    fn set_name(&mut self, name: String) {
        self.base_mut().name = name;
    }

    /// Logger handle injected at registration.
    fn logger(&self) -> &Span {
        &self.base().logger
    }

    fn set_logger(&mut self, logger: Span) {
        self.base_mut().logger = logger;
    }

    /// Apply the configuration. Called exactly once, before any `start`.
    ///
    /// Must fail fast on a structurally invalid configuration.
    async fn configure(&self, config: Self::Config) -> Result<(), ComponentError>;

    /// Open resources and spawn background work.
    ///
    /// Failures discovered after this returns go through
    /// [`EngineHandle::reporter`].
    async fn start(&self, engine: EngineHandle) -> Result<(), ComponentError>;

    /// Release resources. Must be safe when `start` never ran or failed halfway.
    async fn shutdown(&self) -> Result<(), ComponentError>;
}

/// Object-safe view of a [`Component`], as stored in the registry.
#[async_trait]
pub trait DynComponent: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn logger(&self) -> &Span;

    /// Name of the concrete component type, for diagnostics.
    fn type_name(&self) -> &'static str;

    /// Convert the raw table into the typed configuration and apply it.
    async fn configure_value(&self, raw: toml::Value) -> Result<(), ComponentError>;

    async fn start(&self, engine: EngineHandle) -> Result<(), ComponentError>;

    async fn shutdown(&self) -> Result<(), ComponentError>;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

#[async_trait]
impl<T: Component> DynComponent for T {
    fn name(&self) -> &str {
        Component::name(self)
    }

    fn logger(&self) -> &Span {
        Component::logger(self)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    async fn configure_value(&self, raw: toml::Value) -> Result<(), ComponentError> {
        let config: T::Config = raw.try_into().map_err(ComponentError::invalid_config)?;
        Component::configure(self, config).await
    }

    async fn start(&self, engine: EngineHandle) -> Result<(), ComponentError> {
        Component::start(self, engine).await
    }

    async fn shutdown(&self) -> Result<(), ComponentError> {
        Component::shutdown(self).await
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Shared reference to a registered component.
pub type SharedComponent = Arc<dyn DynComponent>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::Mutex;

    #[derive(Debug, Deserialize, PartialEq)]
    struct GreeterConfig {
        greeting: String,
        #[serde(default)]
        repeat: u32,
    }

    struct Greeter {
        base: ComponentBase,
        config: Mutex<Option<GreeterConfig>>,
    }

    #[async_trait]
    impl Component for Greeter {
        type Config = GreeterConfig;

        fn base(&self) -> &ComponentBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut ComponentBase {
            &mut self.base
        }

        async fn configure(&self, config: GreeterConfig) -> Result<(), ComponentError> {
            *self.config.lock().unwrap() = Some(config);
            Ok(())
        }

        async fn start(&self, _engine: EngineHandle) -> Result<(), ComponentError> {
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), ComponentError> {
            Ok(())
        }
    }

    fn greeter() -> Greeter {
        Greeter {
            base: ComponentBase::new("greeter"),
            config: Mutex::new(None),
        }
    }

    #[tokio::test]
    async fn configure_value_converts_raw_table() {
        let component = greeter();
        let raw: toml::Value = toml::from_str("greeting = \"hello\"\nrepeat = 2").unwrap();

        component.configure_value(raw).await.unwrap();

        assert_eq!(
            *component.config.lock().unwrap(),
            Some(GreeterConfig {
                greeting: "hello".into(),
                repeat: 2
            })
        );
    }

    #[tokio::test]
    async fn configure_value_rejects_wrong_shape() {
        let component = greeter();
        let raw: toml::Value = toml::from_str("greeting = 42").unwrap();

        let err = component.configure_value(raw).await.unwrap_err();

        assert!(matches!(err, ComponentError::InvalidConfig(_)));
        assert!(component.config.lock().unwrap().is_none());
    }

    #[test]
    fn base_accessors_delegate() {
        let mut component = greeter();
        assert_eq!(Component::name(&component), "greeter");

        component.set_name("renamed".into());
        assert_eq!(DynComponent::name(&component), "renamed");
    }

    #[test]
    fn shared_component_downcasts_to_concrete_type() {
        let shared: SharedComponent = Arc::new(greeter());
        let concrete = shared.into_any().downcast::<Greeter>();
        assert!(concrete.is_ok());
    }
}
