mod registered_modules;

use anyhow::Result;
use clap::{Parser, Subcommand};
use collector_core::bootstrap::{AppConfig, CliArgs, init_logging};
use collector_core::runtime::{RunOptions, ShutdownOptions, run};
use collector_core::{ConfigProvider, ModuleManager};
use mimalloc::MiMalloc;

use std::path::PathBuf;
use std::sync::Arc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// APM collector - module bootstrap and cluster naming
#[derive(Parser)]
#[command(name = "apm-collector")]
#[command(about = "APM collector - module bootstrap and cluster naming")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the collector
    Run,
    /// Validate configuration and the module graph, then exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config
        && !path.is_file()
    {
        anyhow::bail!("config file does not exist: {}", path.display());
    }

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().into_owned()),
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // Layered config:
    // 1) defaults -> 2) YAML (if provided) -> 3) env (APM__*) -> 4) CLI overrides
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    init_logging(&config.logging);

    if cli.print_config {
        println!("Effective configuration:\n{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => check_config(&config),
    }
}

fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");
    let manager = ModuleManager::assemble(registered_modules::all(), config)?;
    println!("Configuration is valid");
    println!("Module start order: {}", manager.start_order().join(" -> "));
    Ok(())
}

async fn run_server(config: AppConfig) -> Result<()> {
    tracing::info!("APM collector starting");

    let instance_id = config.server.instance_id;
    let modules_cfg: Arc<dyn ConfigProvider> = Arc::new(config);

    run(RunOptions {
        providers: registered_modules::all(),
        modules_cfg,
        shutdown: ShutdownOptions::Signals,
        instance_id,
    })
    .await
}
