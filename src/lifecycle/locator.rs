//! Component locator.
//!
//! # Responsibilities
//! - Resolve registered components by name for siblings and external callers
//! - Refuse every query until the engine publishes it, and after shutdown
//! - Typed resolution without unchecked casts
//!
//! # Design Decisions
//! - The `RwLock` guards the shared registry store; every clone of a locator
//!   sees the same store and the same lock
//! - Publication state lives in a `watch` channel so background tasks can
//!   await it instead of polling
//! - Reads hold the lock only long enough to clone `Arc`s out

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use thiserror::Error;
use tokio::sync::watch;

use crate::lifecycle::component::SharedComponent;
use crate::lifecycle::registry::Registry;

/// Publication state of the locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publication {
    /// The engine has not finished starting.
    Pending,
    /// Every component has started; lookups are served.
    Published,
    /// The engine shut down; components are logically removed.
    Withdrawn,
}

/// Errors returned by locator queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocatorError {
    #[error("component locator not published yet")]
    NotPublished,

    #[error("component locator withdrawn after shutdown")]
    Withdrawn,

    #[error("component '{0}' not found")]
    NotFound(String),

    #[error("component '{name}' is not a {expected}")]
    TypeMismatch { name: String, expected: &'static str },
}

/// Read-oriented, synchronized view over the engine's registry.
#[derive(Clone)]
pub struct Locator {
    registry: Arc<RwLock<Registry>>,
    publication: watch::Receiver<Publication>,
}

impl Locator {
    pub(crate) fn new(
        registry: Arc<RwLock<Registry>>,
        publication: watch::Receiver<Publication>,
    ) -> Self {
        Self {
            registry,
            publication,
        }
    }

    /// Look up a component by name.
    pub fn get(&self, name: &str) -> Result<Option<SharedComponent>, LocatorError> {
        let registry = self.read()?;
        Ok(registry.lookup(name))
    }

    /// Snapshot of every registered component, in registration order.
    ///
    /// Later registry changes do not affect the returned vector.
    pub fn get_all(&self) -> Result<Vec<SharedComponent>, LocatorError> {
        let registry = self.read()?;
        Ok(registry.snapshot())
    }

    /// Resolve a component and downcast it to its concrete type.
    pub fn get_as<T>(&self, name: &str) -> Result<Arc<T>, LocatorError>
    where
        T: Send + Sync + 'static,
    {
        let component = self
            .get(name)?
            .ok_or_else(|| LocatorError::NotFound(name.to_string()))?;

        component
            .into_any()
            .downcast::<T>()
            .map_err(|_| LocatorError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Registered component names, in registration order.
    pub fn names(&self) -> Result<Vec<String>, LocatorError> {
        let registry = self.read()?;
        Ok(registry.names())
    }

    pub fn publication(&self) -> Publication {
        *self.publication.borrow()
    }

    pub fn is_published(&self) -> bool {
        self.publication() == Publication::Published
    }

    /// Wait until the engine publishes the locator.
    ///
    /// Returns `Withdrawn` if the engine shut down (or was dropped) first.
    pub async fn published(&self) -> Result<(), LocatorError> {
        let mut publication = self.publication.clone();
        let state = publication
            .wait_for(|state| *state != Publication::Pending)
            .await
            .map(|state| *state)
            .unwrap_or(Publication::Withdrawn);

        match state {
            Publication::Published => Ok(()),
            _ => Err(LocatorError::Withdrawn),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Registry>, LocatorError> {
        match self.publication() {
            Publication::Pending => return Err(LocatorError::NotPublished),
            Publication::Withdrawn => return Err(LocatorError::Withdrawn),
            Publication::Published => {}
        }
        // Lookups never mutate, so a poisoned lock still holds a consistent map.
        Ok(self.registry.read().unwrap_or_else(PoisonError::into_inner))
    }
}

impl std::fmt::Debug for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Locator")
            .field("publication", &self.publication())
            .finish()
    }
}
