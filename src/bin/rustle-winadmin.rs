use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use rustle_winadmin::cli::{
    module_args, print_documentation, print_module_list, print_run_report, print_tool_report,
    run_action, tool_report, Commands, WinAdminCli,
};
use rustle_winadmin::config::AdapterConfig;
use rustle_winadmin::modules::executor::RecordingRunner;
use rustle_winadmin::modules::ModuleRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = WinAdminCli::parse();

    // Initialize tracing
    let level = match cli.verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting rustle-winadmin v{}", env!("CARGO_PKG_VERSION"));

    let config =
        AdapterConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Run {
            module,
            action,
            args,
            dry_run,
        } => {
            let args = module_args(&action, &args);
            let report = run_action(&config, &module, &args, dry_run)
                .await
                .with_context(|| format!("{module} {action} failed"))?;

            print_run_report(&report);
            if report.result.failed {
                error!("{} {} did not succeed", module, action);
                std::process::exit(2);
            }
        }
        Commands::List => {
            let registry =
                ModuleRegistry::with_windows_modules(&config, Arc::new(RecordingRunner::new()))?;
            print_module_list(&registry.list_modules());
        }
        Commands::Doc { module } => {
            let registry =
                ModuleRegistry::with_windows_modules(&config, Arc::new(RecordingRunner::new()))?;
            let found = registry
                .get_module(&module)
                .with_context(|| format!("Unknown module: {module}"))?;
            print_documentation(found.name(), found.version(), &found.documentation());
        }
        Commands::Check => {
            let report = tool_report(&config);
            print_tool_report(&report);
            if report.iter().any(|status| !status.available()) {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
