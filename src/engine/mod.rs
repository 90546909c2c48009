//! The lifecycle engine.
//!
//! # Responsibilities
//! - Accept component registrations until `run` begins
//! - Sequence configure and start across every component
//! - Publish the locator once everything started
//! - Shut down in reverse order on a signal, a trigger or a component failure
//!
//! # Design Decisions
//! - State lives in a `watch` channel so transitions are observable
//! - One registry behind a read/write lock, shared with every locator clone
//! - Component configuration comes from a pluggable `ConfigSource`

mod core;
mod error;
mod handle;
mod settings;
mod state;

pub use self::core::Engine;
pub use error::EngineError;
pub use handle::EngineHandle;
pub use settings::EngineSettings;
pub use state::EngineState;
