//! Component lifecycle engine.
//!
//! Hosts pluggable components (API server, database, event broker, or any
//! type implementing [`Component`]) and drives them through configure,
//! start and shutdown, exposing them to each other by name through the
//! [`Locator`].

pub mod components;
pub mod config;
pub mod engine;
pub mod lifecycle;
pub mod observability;

pub use config::EngineConfig;
pub use engine::{Engine, EngineError, EngineHandle, EngineSettings, EngineState};
pub use lifecycle::{Component, ComponentBase, ComponentError, Locator, LocatorError};
