//! Core domain types shared by the registry, setting and power modules.
//!
//! - [`error::DomainError`]: parse and validation errors

pub mod error;
