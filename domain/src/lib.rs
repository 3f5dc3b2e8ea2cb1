//! Domain layer for regpilot
//!
//! This crate contains the value objects and pure rules of the configuration
//! engine. It has no dependencies on infrastructure or presentation concerns
//! and performs no I/O.
//!
//! # Core Concepts
//!
//! ## Configuration items
//!
//! A [`ConfigurationItem`] describes one registry value (or key) and the
//! values that mean "enabled" and "disabled". A [`LinkedConfigurationGroup`]
//! bundles several items behind one user-facing toggle, combined under a
//! [`CombinationPolicy`].
//!
//! ## Status
//!
//! [`Status`] is always re-derived from the live registry: `Applied`,
//! `NotApplied`, `Modified` (neither target), `Unknown` or `Error`.
//!
//! ## Values
//!
//! [`ConfigValue`] is a tagged union whose comparison is defined once per
//! kind ([`ConfigValue::matches`]).

pub mod core;
pub mod power;
pub mod registry;
pub mod script;
pub mod setting;
pub mod util;

// Re-export commonly used types
pub use core::error::DomainError;
pub use power::{PowerPlan, PowerPlanCatalog};
pub use registry::{
    Ace, AceType, ConfigPath, ConfigValue, Hive, KeyPath, SecurityDescriptor, Sid, ValueKind,
};
pub use script::ElevatedScript;
pub use setting::{
    ActionType, CombinationPolicy, ConfigurationItem, LinkedConfigurationGroup, Setting, Status,
    ValueChange, combine,
};
