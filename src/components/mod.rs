//! Built-in components.
//!
//! Each one is a plain [`Component`](crate::lifecycle::Component) registered
//! under a default name (`api`, `db`, `broker`) and configured from the
//! `[components.<name>]` table of the same name.

pub mod api;
pub mod broker;
pub mod db;

pub use api::{ApiComponent, ApiConfig, CorsConfig, RestController};
pub use broker::{BrokerComponent, BrokerConfig, EventsConfig, InboundEvent, OutboundEvent};
pub use db::{DbComponent, DbConfig, DbHandle, DbKind, DbProvider, Repository};
