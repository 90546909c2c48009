//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EngineConfig (validated, immutable)
//!     → engine settings + ConfigSource for component tables
//!
//! Engine::run, per component:
//!     ConfigSource::resolve(name) → raw table → Component::Config
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod source;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{EngineConfig, EngineSection, LogFormat, ObservabilityConfig};
pub use source::ConfigSource;
pub use validation::{validate_config, ValidationError};
