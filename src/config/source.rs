//! Where component configurations come from.

use std::collections::HashMap;

use crate::config::schema::EngineConfig;

/// Resolves a component's raw configuration by component name.
pub trait ConfigSource: Send + Sync {
    /// `None` when nothing is configured under `name`.
    fn resolve(&self, name: &str) -> Option<toml::Value>;
}

impl ConfigSource for toml::Table {
    fn resolve(&self, name: &str) -> Option<toml::Value> {
        self.get(name).cloned()
    }
}

impl ConfigSource for HashMap<String, toml::Value> {
    fn resolve(&self, name: &str) -> Option<toml::Value> {
        self.get(name).cloned()
    }
}

impl ConfigSource for EngineConfig {
    fn resolve(&self, name: &str) -> Option<toml::Value> {
        self.components.resolve(name)
    }
}
