//! Component registry.
//!
//! # Responsibilities
//! - Map unique names to registered components
//! - Reject duplicate names (first registration wins)
//! - Iterate in registration order
//!
//! # Design Decisions
//! - Ordered `Vec` plus a name index: lookup by name, deterministic
//!   configure/start order by registration
//! - No removal: components leave the system only logically, at shutdown
//! - Not synchronized itself; the engine and the locator share it behind
//!   one `RwLock`

use std::collections::HashMap;

use thiserror::Error;

use crate::lifecycle::component::SharedComponent;

/// Error returned when a name is already taken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("component '{0}' already registered")]
pub struct DuplicateName(pub String);

/// Insertion-checked, registration-ordered component store.
#[derive(Default)]
pub struct Registry {
    components: Vec<SharedComponent>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a component under its name.
    ///
    /// The existing entry is kept when the name is already registered.
    pub fn register(&mut self, component: SharedComponent) -> Result<(), DuplicateName> {
        let name = component.name().to_string();
        if self.index.contains_key(&name) {
            return Err(DuplicateName(name));
        }
        self.index.insert(name, self.components.len());
        self.components.push(component);
        Ok(())
    }

    /// Look a component up by name.
    pub fn lookup(&self, name: &str) -> Option<SharedComponent> {
        self.index
            .get(name)
            .map(|&position| self.components[position].clone())
    }

    /// Apply `visitor` to every component in registration order.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&SharedComponent),
    {
        for component in &self.components {
            visitor(component);
        }
    }

    /// Ordered copy of all components.
    pub fn snapshot(&self) -> Vec<SharedComponent> {
        self.components.clone()
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.components
            .iter()
            .map(|component| component.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("components", &self.names())
            .finish()
    }
}
