//! Registry addressing, typed values and the security-descriptor subset.
//!
//! - [`hive::Hive`]: closed set of top-level roots
//! - [`path::KeyPath`] / [`path::ConfigPath`]: key and key+value addresses
//! - [`value::ConfigValue`]: tagged union with kind-aware comparison
//! - [`security::SecurityDescriptor`]: owner + DACL used for ownership takeover

pub mod hive;
pub mod path;
pub mod security;
pub mod value;

pub use hive::Hive;
pub use path::{ConfigPath, KeyPath};
pub use security::{Ace, AceType, SecurityDescriptor, Sid};
pub use value::{ConfigValue, ValueKind};
