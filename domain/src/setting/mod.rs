//! Configuration items, linked groups and status rules.
//!
//! - [`entities::ConfigurationItem`]: one setting backed by one key/value
//! - [`entities::LinkedConfigurationGroup`]: several items behind one toggle
//! - [`status::Status`]: result of comparing an item with the live system
//! - [`combinator::combine`]: group status from item statuses
//! - [`change::ValueChange`]: record published after a write

pub mod change;
pub mod combinator;
pub mod entities;
pub mod status;

pub use change::ValueChange;
pub use combinator::{combine, combine_statuses};
pub use entities::{
    ActionType, CombinationPolicy, ConfigurationItem, LinkedConfigurationGroup, Setting,
};
pub use status::Status;
