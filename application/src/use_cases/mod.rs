//! Use cases
//!
//! Application-level operations that orchestrate the engine components.

pub mod apply_setting;
pub mod check_status;
pub mod power_plan;
