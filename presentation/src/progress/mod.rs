//! Apply progress reporters

pub mod reporter;

pub use reporter::{ProgressReporter, SimpleProgress};
