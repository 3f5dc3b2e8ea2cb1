//! Out-of-process scripts for privileged registry writes.

pub mod elevated;

pub use elevated::ElevatedScript;
