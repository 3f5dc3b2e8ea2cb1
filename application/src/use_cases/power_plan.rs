//! Power Plan use case.
//!
//! Power schemes follow the same status/apply pattern as registry items but
//! are driven through `powercfg`. Plans that are hidden on this machine are
//! duplicated on first enable; the resulting GUID is recorded in the
//! catalog owned by this use case.

use crate::ports::command_executor::{CommandError, CommandExecutor, CommandLine};
use regpilot_domain::power::{
    BALANCED, SchemeEntry, parse_active_scheme, parse_duplicated_scheme, parse_scheme_list,
};
use regpilot_domain::util::summarize_output;
use regpilot_domain::{PowerPlan, PowerPlanCatalog, Status};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

const POWERCFG: &str = "powercfg";

/// Errors that can occur while querying or switching power plans
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PowerPlanError {
    #[error("Unknown power plan: {0}")]
    UnknownPlan(String),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("{command} exited with {exit_code}: {detail}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        detail: String,
    },

    #[error("Unexpected powercfg output: {0}")]
    UnexpectedOutput(String),
}

pub struct PowerPlanUseCase {
    executor: Arc<dyn CommandExecutor>,
    catalog: Mutex<PowerPlanCatalog>,
}

impl PowerPlanUseCase {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self::with_catalog(executor, PowerPlanCatalog::well_known())
    }

    pub fn with_catalog(executor: Arc<dyn CommandExecutor>, catalog: PowerPlanCatalog) -> Self {
        Self {
            executor,
            catalog: Mutex::new(catalog),
        }
    }

    /// Snapshot of the catalog, including GUIDs learned at runtime
    pub fn catalog(&self) -> PowerPlanCatalog {
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn plan(&self, name: &str) -> Result<PowerPlan, PowerPlanError> {
        self.catalog()
            .get(name)
            .cloned()
            .ok_or_else(|| PowerPlanError::UnknownPlan(name.to_string()))
    }

    fn record_guid(&self, name: &str, guid: Uuid) {
        let mut catalog = self.catalog.lock().unwrap_or_else(PoisonError::into_inner);
        catalog.set_guid(name, guid);
    }

    async fn powercfg(&self, args: &[&str]) -> Result<String, PowerPlanError> {
        let command = CommandLine::new(POWERCFG).args(args.iter().copied());
        let output = self.executor.execute(&command).await?;
        if !output.is_success() {
            return Err(PowerPlanError::CommandFailed {
                command: command.to_string(),
                exit_code: output.exit_code,
                detail: summarize_output(&output.stderr, 200),
            });
        }
        Ok(output.stdout)
    }

    pub async fn active_scheme(&self) -> Result<SchemeEntry, PowerPlanError> {
        let stdout = self.powercfg(&["/getactivescheme"]).await?;
        parse_active_scheme(&stdout).ok_or_else(|| PowerPlanError::UnexpectedOutput(summarize_output(&stdout, 200)))
    }

    pub async fn schemes(&self) -> Result<Vec<SchemeEntry>, PowerPlanError> {
        let stdout = self.powercfg(&["/list"]).await?;
        Ok(parse_scheme_list(&stdout))
    }

    /// `Applied` when `name` is the active plan
    pub async fn try_status(&self, name: &str) -> Result<Status, PowerPlanError> {
        let plan = self.plan(name)?;
        let active = self.active_scheme().await?;
        let matches = active.guid == plan.guid
            || active
                .name
                .as_deref()
                .is_some_and(|n| plan.from_template && n.eq_ignore_ascii_case(&plan.name));
        Ok(if matches { Status::Applied } else { Status::NotApplied })
    }

    pub async fn status(&self, name: &str) -> Status {
        self.try_status(name).await.unwrap_or_else(|e| {
            warn!("Power plan status for {} failed: {}", name, e);
            Status::Error
        })
    }

    /// Activate `name`, or switch back to Balanced when disabling the
    /// active plan
    pub async fn apply(&self, name: &str, enable: bool) -> Result<(), PowerPlanError> {
        if enable {
            let guid = self.ensure_installed(name).await?;
            self.powercfg(&["/setactive", guid.to_string().as_str()]).await?;
            info!("Activated power plan {} ({})", name, guid);
            return Ok(());
        }

        if self.try_status(name).await? != Status::Applied {
            debug!("{} is not active, nothing to disable", name);
            return Ok(());
        }
        let balanced = self.plan(BALANCED)?;
        self.powercfg(&["/setactive", balanced.guid.to_string().as_str()]).await?;
        info!("Deactivated power plan {}, {} is active", name, BALANCED);
        Ok(())
    }

    /// GUID of an installed scheme for `name`, duplicating it when the plan
    /// is not listed on this machine
    async fn ensure_installed(&self, name: &str) -> Result<Uuid, PowerPlanError> {
        let plan = self.plan(name)?;
        let schemes = self.schemes().await?;

        if let Some(found) = schemes.iter().find(|s| s.guid == plan.guid && !plan.from_template) {
            return Ok(found.guid);
        }
        if let Some(found) = schemes
            .iter()
            .find(|s| s.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(&plan.name)))
        {
            self.record_guid(&plan.name, found.guid);
            return Ok(found.guid);
        }

        let stdout = self.powercfg(&["/duplicatescheme", plan.guid.to_string().as_str()]).await?;
        let guid = parse_duplicated_scheme(&stdout)
            .ok_or_else(|| PowerPlanError::UnexpectedOutput(summarize_output(&stdout, 200)))?;
        self.record_guid(&plan.name, guid);
        info!("Created power plan {} as {}", plan.name, guid);
        Ok(guid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::command_executor::CommandOutput;
    use crate::test_support::MockExecutor;
    use regpilot_domain::power::ULTIMATE_PERFORMANCE;

    const BALANCED_LINE: &str =
        "Power Scheme GUID: 381b4222-f694-41f0-9685-ff5bb260df2e  (Balanced)";
    const HIGH_LINE: &str =
        "Power Scheme GUID: 8c5e7fda-e8bf-4a96-9a85-a6e23a8c635c  (High performance)";
    const NEW_GUID: &str = "11111111-2222-3333-4444-555555555555";

    fn use_case(executor: &Arc<MockExecutor>) -> PowerPlanUseCase {
        PowerPlanUseCase::new(executor.clone())
    }

    fn args(executor: &MockExecutor, idx: usize) -> Vec<String> {
        executor.calls.lock().unwrap()[idx].1.args.clone()
    }

    #[tokio::test]
    async fn test_status_compares_active_guid() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_plain(Ok(CommandOutput::success(HIGH_LINE)));
        executor.push_plain(Ok(CommandOutput::success(HIGH_LINE)));
        let use_case = use_case(&executor);

        assert_eq!(use_case.status("High performance").await, Status::Applied);
        assert_eq!(use_case.status("Balanced").await, Status::NotApplied);
    }

    #[tokio::test]
    async fn test_status_errors() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_plain(Ok(CommandOutput::failure(1, "boom")));
        let use_case = use_case(&executor);

        assert_eq!(use_case.status("Balanced").await, Status::Error);
        assert_eq!(use_case.status("Turbo").await, Status::Error);
    }

    #[tokio::test]
    async fn test_enable_listed_plan() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_plain(Ok(CommandOutput::success(format!("{}\n{}", BALANCED_LINE, HIGH_LINE))));
        let use_case = use_case(&executor);

        use_case.apply("High performance", true).await.unwrap();
        assert_eq!(args(&executor, 1), vec!["/setactive", "8c5e7fda-e8bf-4a96-9a85-a6e23a8c635c"]);
    }

    #[tokio::test]
    async fn test_enable_ultimate_duplicates_template_once() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_plain(Ok(CommandOutput::success(BALANCED_LINE)));
        executor.push_plain(Ok(CommandOutput::success(format!(
            "Power Scheme GUID: {}  (Ultimate Performance)",
            NEW_GUID
        ))));
        let use_case = use_case(&executor);

        use_case.apply(ULTIMATE_PERFORMANCE, true).await.unwrap();
        assert_eq!(
            args(&executor, 1),
            vec!["/duplicatescheme", "e9a42b02-d5df-448d-aa00-03f14749eb61"]
        );
        assert_eq!(args(&executor, 2), vec!["/setactive", NEW_GUID]);

        let plan = use_case.catalog().get(ULTIMATE_PERFORMANCE).cloned().unwrap();
        assert_eq!(plan.guid.to_string(), NEW_GUID);
        assert!(!plan.from_template);
    }

    #[tokio::test]
    async fn test_enable_finds_existing_duplicate_by_name() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_plain(Ok(CommandOutput::success(format!(
            "{}\nPower Scheme GUID: {}  (Ultimate Performance)",
            BALANCED_LINE, NEW_GUID
        ))));
        let use_case = use_case(&executor);

        use_case.apply(ULTIMATE_PERFORMANCE, true).await.unwrap();
        assert_eq!(executor.plain_calls(), 2);
        assert_eq!(args(&executor, 1), vec!["/setactive", NEW_GUID]);
    }

    #[tokio::test]
    async fn test_disable_active_plan_restores_balanced() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_plain(Ok(CommandOutput::success(format!("{} *", HIGH_LINE))));
        let use_case = use_case(&executor);

        use_case.apply("High performance", false).await.unwrap();
        assert_eq!(args(&executor, 1), vec!["/setactive", "381b4222-f694-41f0-9685-ff5bb260df2e"]);
    }

    #[tokio::test]
    async fn test_disable_inactive_plan_is_noop() {
        let executor = Arc::new(MockExecutor::new());
        executor.push_plain(Ok(CommandOutput::success(BALANCED_LINE)));
        let use_case = use_case(&executor);

        use_case.apply("High performance", false).await.unwrap();
        assert_eq!(executor.plain_calls(), 1);
    }
}
