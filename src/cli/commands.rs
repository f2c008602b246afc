use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::AdapterConfig;
use crate::modules::{
    error::ModuleError,
    executor::{CommandRunner, ProcessRunner, RecordingRunner},
    interface::{ModuleArgs, ModuleResult},
    registry::ModuleRegistry,
};

/// Availability of one external tool
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ToolStatus {
    pub tool: String,
    pub path: Option<PathBuf>,
}

impl ToolStatus {
    pub fn available(&self) -> bool {
        self.path.is_some()
    }
}

fn locate(program: &str) -> ToolStatus {
    let path = if Path::new(program).is_absolute() {
        Some(PathBuf::from(program)).filter(|p| p.exists())
    } else {
        which::which(program).ok()
    };
    ToolStatus {
        tool: program.to_string(),
        path,
    }
}

/// Check every tool the adapters shell out to.
pub fn tool_report(config: &AdapterConfig) -> Vec<ToolStatus> {
    let appcmd = config.iis.appcmd_path();
    let goodsync = config.goodsync.executable.to_string_lossy().into_owned();

    vec![
        locate(&config.powershell.program),
        locate(&goodsync),
        locate(&appcmd.to_string_lossy()),
        locate("iisreset"),
        locate("sc"),
        locate("reg"),
        locate(&config.svn.program),
        locate(&config.firewall.netsh),
    ]
}

/// Outcome of one `run` command
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub module: String,
    pub action: String,
    pub result: ModuleResult,
    /// Commands recorded instead of run, for dry runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned: Option<Vec<String>>,
}

/// Execute one module action, or record its commands when `dry_run` is set.
pub async fn run_action(
    config: &AdapterConfig,
    module: &str,
    args: &ModuleArgs,
    dry_run: bool,
) -> Result<RunReport, ModuleError> {
    if dry_run {
        let recorder = Arc::new(RecordingRunner::dry_run());
        let registry = ModuleRegistry::with_windows_modules(config, recorder.clone())?;
        let result = registry.execute_module(module, args).await?;
        info!("Dry run recorded {} commands", recorder.invocations().len());

        return Ok(RunReport {
            module: module.to_string(),
            action: args.action.clone(),
            result,
            planned: Some(recorder.command_lines()),
        });
    }

    let runner: Arc<dyn CommandRunner> =
        Arc::new(ProcessRunner::new().with_powershell(config.powershell.program.clone()));
    let registry = ModuleRegistry::with_windows_modules(config, runner)?;
    let result = registry.execute_module(module, args).await?;

    Ok(RunReport {
        module: module.to_string(),
        action: args.action.clone(),
        result,
        planned: None,
    })
}
