//! Core types and service wiring for the wastewise pickup scheduling engine.

/// Tunable business rules shared by all components.
pub mod config;
/// Date validation and enumeration of bookable collection days.
pub mod dates;
/// Typed failures and the success/error envelopes handed to clients.
pub mod error;
/// Fee calculation for the supported billing models.
pub mod fees;
/// Domain models and identifiers.
pub mod model;
/// Template-based resident notifications.
pub mod notify;
/// Bundle of collaborators a deployment plugs into the service.
pub mod plugin;
/// Traits describing collaborator interfaces.
pub mod ports;
/// High-level scheduling facade used by clients.
pub mod service;
/// In-memory booking lifecycle.
pub mod store;
/// Payload checks run before anything reaches the store.
pub mod validation;

pub use config::*;
pub use dates::*;
pub use error::*;
pub use fees::*;
pub use model::*;
pub use notify::*;
pub use plugin::*;
pub use ports::*;
pub use service::*;
pub use store::*;
pub use validation::*;
