//! Registry backends
//!
//! [`MemoryRegistry`] is available everywhere; [`WindowsRegistry`] only on
//! Windows.

pub mod codec;
pub mod memory;
#[cfg(windows)]
pub mod windows;

pub use memory::{MemoryRegistry, RegistrySnapshot, SIMULATED_USER_SID, SnapshotError, SnapshotKey};
#[cfg(windows)]
pub use windows::WindowsRegistry;
