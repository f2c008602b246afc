//! Windows service queries

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::modules::{
    error::{ModuleError, ValidationError},
    executor::{CommandRunner, Invocation},
    interface::{ActionSpec, ExecutionModule, ModuleArgs, ModuleDocumentation, ModuleResult},
};

const UTF8_CODE_PAGE: u16 = 65001;

const STATUS_REPORT_SCRIPT: &str = "[Console]::OutputEncoding = [System.Text.Encoding]::UTF8; Get-Service | Format-List -Property Name,Status,DisplayName";

static FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)\s*:\s*(.*?)\s*$").expect("valid field regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceEntry {
    pub name: String,
    pub status: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub enabled: Option<bool>,
    pub status: String,
}

/// Split `Format-List` output into one entry per blank-line separated block.
pub fn parse_service_list(report: &str) -> Vec<ServiceEntry> {
    let mut entries = Vec::new();
    let mut current: Option<ServiceEntry> = None;

    for line in report.lines().map(|l| l.trim_end_matches('\r')) {
        if line.trim().is_empty() {
            entries.extend(current.take());
            continue;
        }
        let Some(caps) = FIELD_RE.captures(line) else {
            continue;
        };

        let entry = current.get_or_insert_with(|| ServiceEntry {
            name: String::new(),
            status: String::new(),
            display_name: String::new(),
        });
        let value = caps[2].to_string();
        match &caps[1] {
            "Name" => entry.name = value,
            "Status" => entry.status = value,
            "DisplayName" => entry.display_name = value,
            _ => {}
        }
    }
    entries.extend(current);

    entries.retain(|entry| !entry.name.is_empty());
    entries
}

/// Combine `sc query` and `sc qc` output.
pub fn parse_sc_status(query_output: &str, config_output: &str) -> ServiceStatus {
    let running = query_output.contains("RUNNING");
    let status = if running {
        "running"
    } else if query_output.contains("STOPPED") {
        "stopped"
    } else if query_output.contains("PENDING") {
        "pending"
    } else {
        "unknown"
    };

    let enabled = if config_output.contains("AUTO_START") {
        Some(true)
    } else if config_output.contains("DEMAND_START") || config_output.contains("DISABLED") {
        Some(false)
    } else {
        None
    };

    ServiceStatus {
        running,
        enabled,
        status: status.to_string(),
    }
}

pub struct WindowsServiceModule {
    runner: Arc<dyn CommandRunner>,
}

impl WindowsServiceModule {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub async fn status_report(&self) -> Result<String, ModuleError> {
        let invocation =
            Invocation::powershell(STATUS_REPORT_SCRIPT).with_code_page(UTF8_CODE_PAGE);
        self.runner.run_checked(&invocation).await
    }

    pub async fn list_services(&self) -> Result<Vec<ServiceEntry>, ModuleError> {
        let services = parse_service_list(&self.status_report().await?);
        debug!("Found {} services", services.len());
        Ok(services)
    }

    pub async fn query(&self, name: &str) -> Result<ServiceStatus, ModuleError> {
        if name.is_empty() {
            return Err(ValidationError::missing("name").into());
        }
        let query_output = self
            .runner
            .run_checked(&Invocation::program(["sc", "query", name]))
            .await?;
        let config_output = self
            .runner
            .run_checked(&Invocation::program(["sc", "qc", name]))
            .await?;

        Ok(parse_sc_status(&query_output, &config_output))
    }
}

const ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "status_report",
        description: "Raw name, status and display name listing",
        required: &[],
    },
    ActionSpec {
        name: "list_services",
        description: "Parsed service listing",
        required: &[],
    },
    ActionSpec {
        name: "query",
        description: "Run state and start mode of one service",
        required: &["name"],
    },
];

#[async_trait]
impl ExecutionModule for WindowsServiceModule {
    fn name(&self) -> &'static str {
        "win_service"
    }

    fn version(&self) -> &'static str {
        "1.0.0"
    }

    fn actions(&self) -> &'static [ActionSpec] {
        ACTIONS
    }

    async fn execute(&self, args: &ModuleArgs) -> Result<ModuleResult, ModuleError> {
        match args.action.as_str() {
            "status_report" => Ok(ModuleResult::output(self.status_report().await?)),
            "list_services" => ModuleResult::value("services", &self.list_services().await?),
            "query" => {
                let name = args.require_str("name")?;
                ModuleResult::value("status", &self.query(&name).await?)
            }
            other => Err(ModuleError::UnsupportedAction {
                module: self.name().to_string(),
                action: other.to_string(),
            }),
        }
    }

    fn documentation(&self) -> ModuleDocumentation {
        ModuleDocumentation {
            description: "Query Windows services".to_string(),
            actions: ACTIONS.to_vec(),
            examples: vec![
                "win_service list_services".to_string(),
                "win_service query -a name=W3SVC".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::executor::RecordingRunner;

    const REPORT: &str = "\r\n\r\nName        : AppIDSvc\r\nStatus      : Stopped\r\nDisplayName : Application Identity\r\n\r\nName        : W3SVC\r\nStatus      : Running\r\nDisplayName : 万维网发布服务\r\n\r\n\r\n";

    #[test]
    fn test_parse_service_list() {
        let services = parse_service_list(REPORT);

        assert_eq!(services.len(), 2);
        assert_eq!(
            services[0],
            ServiceEntry {
                name: "AppIDSvc".to_string(),
                status: "Stopped".to_string(),
                display_name: "Application Identity".to_string(),
            }
        );
        assert_eq!(services[1].display_name, "万维网发布服务");
    }

    #[test]
    fn test_parse_service_list_without_trailing_blank() {
        let services =
            parse_service_list("Name : Spooler\nStatus : Running\nDisplayName : Print Spooler");
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].status, "Running");
    }

    #[test]
    fn test_parse_sc_status() {
        let query = "SERVICE_NAME: W3SVC\r\n        TYPE               : 20  WIN32_SHARE_PROCESS\r\n        STATE              : 4  RUNNING\r\n";
        let qc = "        START_TYPE         : 2   AUTO_START\r\n";

        let status = parse_sc_status(query, qc);
        assert!(status.running);
        assert_eq!(status.enabled, Some(true));
        assert_eq!(status.status, "running");

        let status = parse_sc_status("STATE : 1  STOPPED", "START_TYPE : 3   DEMAND_START");
        assert!(!status.running);
        assert_eq!(status.enabled, Some(false));
        assert_eq!(status.status, "stopped");
    }

    #[tokio::test]
    async fn test_status_report_requests_utf8() {
        let runner = Arc::new(RecordingRunner::new());
        runner.push_output(REPORT, 0);
        let module = WindowsServiceModule::new(runner.clone());

        let services = module.list_services().await.unwrap();

        assert_eq!(services.len(), 2);
        let invocation = &runner.invocations()[0];
        assert_eq!(invocation.code_page, Some(UTF8_CODE_PAGE));
        assert!(invocation
            .command_line()
            .contains("Get-Service | Format-List -Property Name,Status,DisplayName"));
    }

    #[tokio::test]
    async fn test_query_unknown_service_fails() {
        let runner = Arc::new(RecordingRunner::new());
        runner.push_output(
            "[SC] EnumQueryServicesStatus:OpenService FAILED 1060:\r\n\r\nThe specified service does not exist as an installed service.",
            1060,
        );
        let module = WindowsServiceModule::new(runner.clone());

        let err = module.query("nope").await.unwrap_err();
        assert!(matches!(err, ModuleError::CommandFailed { exit_code: 1060, .. }));
        assert_eq!(runner.invocations().len(), 1);
    }

    #[tokio::test]
    async fn test_query_empty_name_spawns_nothing() {
        let runner = Arc::new(RecordingRunner::new());
        let module = WindowsServiceModule::new(runner.clone());

        let err = module.query("").await.unwrap_err();
        assert!(matches!(
            err,
            ModuleError::Validation(ValidationError::MissingRequiredArg { .. })
        ));
        assert!(runner.invocations().is_empty());
    }
}
