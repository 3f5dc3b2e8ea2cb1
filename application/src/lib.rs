//! Application layer for regpilot
//!
//! This crate contains the configuration engine, use cases, port definitions
//! and application configuration. It depends only on the domain layer.

pub mod config;
pub mod engine;
pub mod ports;
pub mod use_cases;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::{ElevationParams, EngineParams};
pub use engine::{
    MemoryReadCache, OwnershipEscalator, PrivilegedWriteFallback, RegistryEngine,
    ResourceAccessor, StatusClassifier, ValueStore,
};
pub use ports::{
    apply_progress::{ApplyProgressNotifier, NoApplyProgress},
    change_notifier::{ChangeNotifier, NoChangeNotifier, NotifyError},
    command_executor::{CommandError, CommandExecutor, CommandLine, CommandOutput},
    read_cache::{CacheStats, NoReadCache, ReadCache},
    registry_backend::{KeyAccess, RegistryBackend, RegistryError, RegistryKey},
};
pub use use_cases::apply_setting::{
    ApplySettingUseCase, GroupApplyReport, GroupOutcome, ItemApplyOutcome, ItemApplyResult,
    WriteMethod,
};
pub use use_cases::check_status::{CheckStatusUseCase, ItemStatus, StatusReport};
pub use use_cases::power_plan::{PowerPlanError, PowerPlanUseCase};
