//! Terminal dashboard for call records synced from Supabase.

use anyhow::Context;
use callboard_rs_config::{CallboardConfig, ReconcilePolicy};
use callboard_rs_core::{Route, SupabaseSource, SyncController};
use callboard_rs_tui::{TuiConfig, run};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Reconcile policy accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Refetch,
    Incremental,
}

impl From<PolicyArg> for ReconcilePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Refetch => ReconcilePolicy::Refetch,
            PolicyArg::Incremental => ReconcilePolicy::Incremental,
        }
    }
}

/// Command-line options for the dashboard.
#[derive(Parser)]
#[command(name = "callboard", version)]
struct Cli {
    /// Optional path to a callboard.json5 config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Route shown on startup (home, meetings, leads, calls)
    #[arg(long)]
    route: Option<String>,
    /// Override how change notifications are reconciled
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,
    /// Project URL, overriding source.url
    #[arg(long)]
    url: Option<String>,
    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;
    info!(
        "starting dashboard (config_set={}, route_set={}, policy_set={})",
        cli.config.is_some(),
        cli.route.is_some(),
        cli.policy.is_some()
    );

    let mut config = if let Some(path) = cli.config.as_ref() {
        info!("loading config from path: {}", path.display());
        CallboardConfig::load_from_path(path).context("failed to load config")?
    } else {
        let cwd = std::env::current_dir().context("cwd")?;
        info!("loading layered config from cwd: {}", cwd.display());
        let layered =
            CallboardConfig::load_layered(&cwd).context("failed to load layered config")?;
        debug!("layered config loaded (layers={})", layered.layers.len());
        layered.config
    };
    if let Some(url) = cli.url {
        config.source.url = Some(url);
    }
    if let Some(policy) = cli.policy {
        config.sync.policy = policy.into();
    }
    config.validate().context("invalid config")?;

    let source = SupabaseSource::from_config(&config.source).context("failed to configure source")?;
    let controller = Arc::new(SyncController::new(Arc::new(source), &config.sync));

    let route = cli
        .route
        .as_deref()
        .unwrap_or(&config.dashboard.initial_route);
    let tui = TuiConfig {
        initial_route: Route::parse(route),
        tick: Duration::from_millis(config.dashboard.tick_ms),
    };
    run(controller, tui).await
}

/// Logs go to stderr by default; the alternate screen hides them, so
/// `--log-file` is the way to keep them while the dashboard runs.
fn init_logging(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let mut builder = env_logger::builder();
    builder.format_timestamp_millis().parse_default_env();
    if let Some(path) = log_file {
        let file = File::create(path)
            .with_context(|| format!("failed to create log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    let _ = builder.try_init();
    Ok(())
}
