//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (registry.rs):
//!     Engine::with → inject logger → Registry (name-checked, ordered)
//!
//! Startup (engine):
//!     configure every component → start every component → publish Locator
//!
//! Running (monitor.rs, locator.rs):
//!     background failures → ErrorReporter → monitor task → failure log
//!     sibling lookups → Locator (shared read lock)
//!
//! Shutdown (signals.rs, shutdown.rs):
//!     SIGTERM/SIGINT → grace delay → Shutdown broadcast → component shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: registration order, all configures before any start
//! - Fail fast: a configure or start failure aborts the sequence
//! - Ordered shutdown: reverse registration order, every component gets a turn

pub mod component;
pub mod locator;
pub mod monitor;
pub mod registry;
pub mod shutdown;
pub mod signals;

#[cfg(test)]
pub(crate) mod testing;

pub use component::{Component, ComponentBase, ComponentError, DynComponent, SharedComponent};
pub use locator::{Locator, LocatorError, Publication};
pub use monitor::{ComponentFailure, ErrorReporter, Phase};
pub use registry::{DuplicateName, Registry};
pub use shutdown::{Shutdown, ShutdownListener};
pub use signals::{wait_for_termination, TerminationSignal, TerminationSignals};
