use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::modules::interface::ModuleArgs;

/// Windows administration adapters driven from the command line
#[derive(Parser, Debug)]
#[command(name = "rustle-winadmin")]
#[command(about = "Run GoodSync, IIS, service, Subversion and firewall actions on Windows hosts")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct WinAdminCli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to the per-user config when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one module action
    Run {
        /// Module name, e.g. win_iis
        module: String,

        /// Action name, e.g. create_site
        action: String,

        /// Action argument as key=value; numbers and booleans are typed
        #[arg(short = 'a', long = "arg", value_parser = parse_key_value)]
        args: Vec<(String, serde_json::Value)>,

        /// Print the commands that would run instead of running them
        #[arg(long)]
        dry_run: bool,
    },

    /// List registered modules
    List,

    /// Show the actions and examples of one module
    Doc {
        module: String,
    },

    /// Report which external tools are available on this host
    Check,
}

/// Parse `key=value`. Numeric and boolean values are typed, anything else
/// stays a string.
pub fn parse_key_value(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }

    let value = match serde_json::from_str::<serde_json::Value>(value) {
        Ok(parsed @ (serde_json::Value::Number(_) | serde_json::Value::Bool(_))) => parsed,
        _ => serde_json::Value::String(value.to_string()),
    };
    Ok((key.to_string(), value))
}

pub fn module_args(action: &str, args: &[(String, serde_json::Value)]) -> ModuleArgs {
    args.iter()
        .fold(ModuleArgs::new(action), |acc, (key, value)| {
            acc.with(key, value.clone())
        })
}
