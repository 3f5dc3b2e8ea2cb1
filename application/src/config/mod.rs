//! Application-level configuration.
//!
//! - [`EngineParams`]: caching, write verification and privileged fallback control

pub mod engine_params;

pub use engine_params::{ElevationParams, EngineParams};
