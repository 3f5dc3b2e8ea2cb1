//! CLI entrypoint for regpilot
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::{CommandFactory, Parser};
use regpilot_application::{
    ApplyProgressNotifier, ApplySettingUseCase, ChangeNotifier, CheckStatusUseCase, EngineParams,
    NoApplyProgress, PowerPlanUseCase, RegistryBackend, RegistryEngine,
};
use regpilot_domain::Setting;
use regpilot_infrastructure::{
    BroadcastChangeNotifier, ConfigLoader, FanoutChangeNotifier, FileConfig, JsonlChangeLog,
    MemoryRegistry, ProcessCommandExecutor, TomlCatalog,
};
use regpilot_presentation::{
    CatalogEntry, Cli, Command, OutputConfig, OutputFormat, OutputFormatter, PowerCommand,
    PowerPlanStatus, ProgressReporter, formatter_for,
};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Wired-up services for one invocation
struct App {
    catalog: TomlCatalog,
    engine: RegistryEngine,
    params: EngineParams,
    power: PowerPlanUseCase,
    notifier: Arc<dyn ChangeNotifier>,
    /// Present when running against the in-memory registry
    simulated: Option<MemoryRegistry>,
    output: OutputConfig,
    formatter: Box<dyn OutputFormatter>,
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        for line in ConfigLoader::describe_sources() {
            println!("{}", line);
        }
        return Ok(());
    }

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).map_err(|e| anyhow!("Failed to load configuration: {}", e))?
    };
    config.validate()?;

    // Keep the guard alive so the file writer flushes on exit
    let _log_guard = init_logging(cli.verbose, config.logging.directory.as_deref());
    info!("Starting regpilot");

    let Some(command) = cli.command.clone() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let app = build_app(&cli, &config)?;
    match command {
        Command::List => app.list(),
        Command::Status { ids, cache_stats } => app.status(&ids, cache_stats).await,
        Command::Apply { id, state } => app.apply(&id, state.is_enable(), cli.snapshot.as_deref()).await,
        Command::Power(PowerCommand::Status { name }) => app.power_status(name.as_deref()).await,
        Command::Power(PowerCommand::Apply { name, state }) => app.power_apply(&name, state.is_enable()).await,
    }
}

/// Initialize logging based on verbosity level, plus an optional daily
/// log file
fn init_logging(verbose: u8, directory: Option<&str>) -> Option<WorkerGuard> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };

    let Some(directory) = directory else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(level))
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
        return None;
    };

    let appender = tracing_appender::rolling::daily(directory, "regpilot.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(EnvFilter::new(level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer),
        )
        .init();
    Some(guard)
}

fn build_app(cli: &Cli, config: &FileConfig) -> Result<App> {
    // === Output ===
    let format = cli
        .output
        .or_else(|| config.output.format.as_deref().and_then(OutputFormat::from_config))
        .unwrap_or(OutputFormat::Table);
    let output = OutputConfig::default()
        .with_format(format)
        .with_color(config.output.color && !cli.no_color)
        .with_progress(config.output.show_progress && !cli.quiet);
    if !output.color {
        colored::control::set_override(false);
    }

    // === Catalog ===
    let catalog_path = cli.catalog.clone().or_else(|| config.catalog_path());
    let catalog = match &catalog_path {
        Some(path) => TomlCatalog::load(path)?,
        None => TomlCatalog::builtin()?,
    };
    debug!("Catalog has {} settings", catalog.settings().len());

    // === Dependency Injection ===
    let (backend, simulated) = registry_backend(cli)?;

    let mut params = config.to_engine_params();
    if simulated.is_some() {
        // Elevated scripts would reach the real registry
        params = params.with_elevation(false);
    }

    let executor = Arc::new(ProcessCommandExecutor::new().with_launcher(params.elevation.shell.clone()));
    let engine = RegistryEngine::new(backend, executor.clone(), &params);
    let power = PowerPlanUseCase::with_catalog(executor, catalog.power_plans().clone());

    Ok(App {
        catalog,
        engine,
        params,
        power,
        notifier: change_notifier(config),
        simulated,
        formatter: formatter_for(output.format),
        output,
        quiet: cli.quiet,
    })
}

fn registry_backend(cli: &Cli) -> Result<(Arc<dyn RegistryBackend>, Option<MemoryRegistry>)> {
    if cli.simulate || !cfg!(windows) {
        if !cli.simulate {
            warn!("The live registry is only available on Windows, using a simulated one");
        }
        let registry = match &cli.snapshot {
            Some(path) if path.exists() => MemoryRegistry::from_snapshot_file(path)?,
            _ => MemoryRegistry::new(),
        };
        return Ok((Arc::new(registry.clone()), Some(registry)));
    }
    live_backend()
}

#[cfg(windows)]
fn live_backend() -> Result<(Arc<dyn RegistryBackend>, Option<MemoryRegistry>)> {
    use regpilot_infrastructure::WindowsRegistry;

    if !WindowsRegistry::is_elevated() {
        info!("Not elevated, machine-wide writes will use the elevated fallback");
    }
    Ok((Arc::new(WindowsRegistry::new()), None))
}

#[cfg(not(windows))]
fn live_backend() -> Result<(Arc<dyn RegistryBackend>, Option<MemoryRegistry>)> {
    bail!("The live registry is only available on Windows")
}

/// Log every change, and append it to the audit file when enabled
fn change_notifier(config: &FileConfig) -> Arc<dyn ChangeNotifier> {
    let broadcast = Arc::new(BroadcastChangeNotifier::new());
    let mut changes = broadcast.subscribe();
    tokio::spawn(async move {
        while let Ok(change) = changes.recv().await {
            let new_value = change.new_value.as_ref().map_or_else(|| "(deleted)".to_string(), |v| v.to_string());
            info!("{} changed {} to {}", change.item_id, change.path, new_value);
        }
    });

    let mut fanout = FanoutChangeNotifier::new().with(broadcast);
    if let Some(path) = config.audit_path() {
        match JsonlChangeLog::new(&path) {
            Some(log) => {
                debug!("Auditing changes to {}", log.path().display());
                fanout = fanout.with(Arc::new(log));
            }
            None => warn!("Audit log {} unavailable, changes are not recorded", path.display()),
        }
    }
    Arc::new(fanout)
}

impl App {
    fn settings(&self, ids: &[String]) -> Result<Vec<Setting>> {
        if ids.is_empty() {
            return Ok(self.catalog.settings().to_vec());
        }
        ids.iter()
            .map(|id| {
                self.catalog
                    .get(id)
                    .cloned()
                    .ok_or_else(|| anyhow!("Unknown setting: {} (see `regpilot list`)", id))
            })
            .collect()
    }

    fn list(&self) -> Result<()> {
        let entries: Vec<CatalogEntry> = self.catalog.settings().iter().map(CatalogEntry::from).collect();
        print!("{}", self.formatter.catalog(&entries));
        Ok(())
    }

    async fn status(&self, ids: &[String], cache_stats: bool) -> Result<()> {
        let settings = self.settings(ids)?;
        let reports = CheckStatusUseCase::new(self.engine.classifier.clone())
            .execute_many(&settings)
            .await;
        print!("{}", self.formatter.status(&reports));
        if cache_stats {
            print!("{}", self.formatter.cache_stats(&self.engine.cache.stats()));
        }
        Ok(())
    }

    async fn apply(&self, id: &str, enable: bool, snapshot: Option<&Path>) -> Result<()> {
        let setting = self.settings(&[id.to_string()])?.remove(0);

        let progress: Arc<dyn ApplyProgressNotifier> = if self.output.wants_progress() && !self.quiet {
            Arc::new(ProgressReporter::new())
        } else {
            Arc::new(NoApplyProgress)
        };
        let use_case = ApplySettingUseCase::new(self.engine.clone(), &self.params)
            .with_change_notifier(self.notifier.clone())
            .with_progress(progress);

        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, skipping remaining items");
                on_interrupt.cancel();
            }
        });

        let report = use_case.execute(&setting, enable, &cancel).await;
        print!("{}", self.formatter.apply(&report));

        if let (Some(registry), Some(path)) = (&self.simulated, snapshot) {
            let json = serde_json::to_string_pretty(&registry.snapshot())?;
            std::fs::write(path, json).with_context(|| format!("Failed to save snapshot {}", path.display()))?;
            debug!("Saved simulated registry to {}", path.display());
        }

        if !report.is_success() {
            bail!("{} {} ({} item(s) failed)", id, report.outcome, report.failed_count());
        }
        Ok(())
    }

    async fn power_status(&self, name: Option<&str>) -> Result<()> {
        self.require_live("power plans")?;
        let catalog = self.power.catalog();
        let plans: Vec<_> = match name {
            Some(name) => vec![
                catalog
                    .get(name)
                    .cloned()
                    .ok_or_else(|| anyhow!("Unknown power plan: {}", name))?,
            ],
            None => catalog.plans().to_vec(),
        };

        let mut rows = Vec::with_capacity(plans.len());
        for plan in plans {
            let status = self.power.status(&plan.name).await;
            rows.push(PowerPlanStatus {
                guid: plan.guid.to_string(),
                name: plan.name,
                status,
            });
        }
        print!("{}", self.formatter.power(&rows));
        Ok(())
    }

    async fn power_apply(&self, name: &str, enable: bool) -> Result<()> {
        self.require_live("power plans")?;
        self.power.apply(name, enable).await?;
        if !self.quiet {
            println!("{} {}", name, if enable { "activated" } else { "deactivated" });
        }
        Ok(())
    }

    fn require_live(&self, what: &str) -> Result<()> {
        if self.simulated.is_some() {
            bail!("{} cannot be simulated", what);
        }
        Ok(())
    }
}
