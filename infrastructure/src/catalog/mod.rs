//! Settings catalog loading
//!
//! The catalog is a TOML file of `[[setting]]` entries (one item each),
//! `[[group]]` entries (linked items under one toggle) and optional
//! `[[power_plan]]` entries added to the well-known plans.

mod toml_catalog;

pub use toml_catalog::{CatalogError, TomlCatalog};
