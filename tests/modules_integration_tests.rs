//! Integration tests for the adapter modules through the registry

use serde_json::json;
use std::sync::Arc;

use rustle_winadmin::config::AdapterConfig;
use rustle_winadmin::modules::executor::{Invocation, InvocationKind, RecordingRunner};
use rustle_winadmin::modules::{ModuleArgs, ModuleError, ModuleRegistry, ValidationError};

fn registry(runner: &Arc<RecordingRunner>) -> ModuleRegistry {
    ModuleRegistry::with_windows_modules(&AdapterConfig::default(), runner.clone()).unwrap()
}

fn script_of(invocation: &Invocation) -> String {
    match &invocation.kind {
        InvocationKind::Script { script, .. } => script.clone(),
        InvocationKind::Program(tokens) => tokens.join(" "),
    }
}

#[test]
fn test_all_modules_registered() {
    let runner = Arc::new(RecordingRunner::new());
    let registry = registry(&runner);

    assert_eq!(
        registry.list_modules(),
        vec!["goodsync", "svn", "win_firewall", "win_iis", "win_service"]
    );
}

#[tokio::test]
async fn test_missing_required_arg_spawns_nothing() {
    let runner = Arc::new(RecordingRunner::new());
    let registry = registry(&runner);

    let result = registry
        .execute_module("win_iis", &ModuleArgs::new("create_site").with("name", "site1"))
        .await;

    assert!(matches!(
        result,
        Err(ModuleError::Validation(ValidationError::MissingRequiredArg { ref arg }))
            if arg == "source_path"
    ));
    assert!(runner.invocations().is_empty());
}

#[tokio::test]
async fn test_unknown_action_rejected() {
    let runner = Arc::new(RecordingRunner::new());
    let registry = registry(&runner);

    let result = registry
        .execute_module("win_firewall", &ModuleArgs::new("reset"))
        .await;

    assert!(matches!(
        result,
        Err(ModuleError::Validation(ValidationError::InvalidArgValue { .. }))
    ));
}

#[tokio::test]
async fn test_unknown_module() {
    let runner = Arc::new(RecordingRunner::new());
    let result = registry(&runner)
        .execute_module("win_dns", &ModuleArgs::new("list"))
        .await;

    assert!(matches!(result, Err(ModuleError::ModuleNotFound(ref name)) if name == "win_dns"));
}

#[tokio::test]
async fn test_iis_create_existing_site_is_noop() {
    let runner = Arc::new(RecordingRunner::new());
    runner.push_output("Default Web Site\r\nsite1\r\n", 0);

    let args = ModuleArgs::new("create_site")
        .with("name", "site1")
        .with("source_path", "C:\\stage")
        .with("port", 80)
        .with("apppool", "TestPool");
    let result = registry(&runner)
        .execute_module("win_iis", &args)
        .await
        .unwrap();

    assert!(!result.changed);
    assert!(!result.failed);
    assert_eq!(result.results["outcome"]["outcome"], json!("unchanged"));
    assert_eq!(runner.invocations().len(), 1);
}

#[tokio::test]
async fn test_iis_missing_apppool_reports_failure() {
    let runner = Arc::new(RecordingRunner::new());
    runner.push_output("DefaultAppPool\r\n", 0);

    let result = registry(&runner)
        .execute_module("win_iis", &ModuleArgs::new("restart_apppool").with("name", "TestPool"))
        .await
        .unwrap();

    assert!(result.failed);
    assert_eq!(result.msg.as_deref(), Some("application pool 'TestPool' does not exist"));
}

#[tokio::test]
async fn test_goodsync_limit_out_of_range_spawns_nothing() {
    let runner = Arc::new(RecordingRunner::new());

    let args = ModuleArgs::new("job_new")
        .with("run_as_user", "Administrator")
        .with("job_name", "web")
        .with("f1", "C:\\f1")
        .with("f2", "C:\\f2")
        .with("limit_changes_percent", 150);
    let result = registry(&runner).execute_module("goodsync", &args).await;

    assert!(matches!(result, Err(ModuleError::Validation(_))));
    assert!(runner.invocations().is_empty());
}

#[tokio::test]
async fn test_goodsync_sync_all_restores_localization() {
    let runner = Arc::new(RecordingRunner::new());
    runner
        .push_output("S-1-5-21-1-2-3-500\r\n", 0)
        .push_output(
            "ERROR: The system was unable to find the specified registry key or value.",
            1,
        )
        .push_output("", 0)
        .push_output("Sync finished", 0)
        .push_output("", 0);

    let args = ModuleArgs::new("sync").with("run_as_user", "Administrator");
    let result = registry(&runner)
        .execute_module("goodsync", &args)
        .await
        .unwrap();

    assert_eq!(result.stdout.as_deref(), Some("Sync finished"));
    let lines: Vec<String> = runner.invocations().iter().map(script_of).collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[2]
        .starts_with("reg add HKU\\S-1-5-21-1-2-3-500\\Software\\Siber Systems\\GoodSync"));
    assert!(lines[2].contains("en-english.rfi"));
    assert!(lines[3].ends_with("GoodSync.exe sync /all"));
    assert!(lines[4].starts_with("reg delete "));
}

#[tokio::test]
async fn test_goodsync_failure_still_restores() {
    let runner = Arc::new(RecordingRunner::new());
    runner
        .push_output("S-1-5-21-1-2-3-500", 0)
        .push_output("    LocalizationFile    REG_SZ    zh-chinese.rfi", 0)
        .push_output("", 0)
        .push_output("Job web not found", 1)
        .push_output("", 0);

    let args = ModuleArgs::new("analyze")
        .with("run_as_user", "Administrator")
        .with("job_name", "web");
    let err = registry(&runner)
        .execute_module("goodsync", &args)
        .await
        .unwrap_err();

    assert_eq!(err.output(), Some("Job web not found"));
    let last = script_of(runner.invocations().last().unwrap());
    assert!(last.starts_with("reg add "));
    assert!(last.contains("zh-chinese.rfi"));
}

#[tokio::test]
async fn test_svn_info_dict() {
    let runner = Arc::new(RecordingRunner::new());
    runner.push_output(
        "Path: .\r\nURL: svn://svn.example.com/repo/trunk\r\nRevision: 77\r\n\r\n",
        0,
    );

    let args = ModuleArgs::new("info")
        .with("cwd", "D:\\www\\site")
        .with("fmt", "dict")
        .with("cert_check", false);
    let result = registry(&runner)
        .execute_module("svn", &args)
        .await
        .unwrap();

    assert_eq!(result.results["info"][0]["Revision"], json!("77"));
    assert_eq!(
        script_of(&runner.invocations()[0]),
        "svn --non-interactive info --trust-server-cert D:\\www\\site"
    );
}

#[tokio::test]
async fn test_svn_add_requires_targets() {
    let runner = Arc::new(RecordingRunner::new());

    let result = registry(&runner)
        .execute_module("svn", &ModuleArgs::new("add").with("cwd", "C:\\wc"))
        .await;

    assert!(matches!(result, Err(ModuleError::Validation(_))));
    assert!(runner.invocations().is_empty());
}

#[tokio::test]
async fn test_service_query() {
    let runner = Arc::new(RecordingRunner::new());
    runner
        .push_output("SERVICE_NAME: W3SVC\r\n        STATE              : 1  STOPPED\r\n", 0)
        .push_output("        START_TYPE         : 2   AUTO_START\r\n", 0);

    let result = registry(&runner)
        .execute_module("win_service", &ModuleArgs::new("query").with("name", "W3SVC"))
        .await
        .unwrap();

    assert_eq!(
        result.results["status"],
        json!({ "running": false, "enabled": true, "status": "stopped" })
    );
    assert_eq!(runner.command_lines(), vec!["sc query W3SVC", "sc qc W3SVC"]);
}

#[tokio::test]
async fn test_firewall_get_config() {
    let runner = Arc::new(RecordingRunner::new());
    runner.push_output(
        "\r\nDomain Profile Settings:\r\n-----\r\nState                                 OFF\r\n\r\nPublic Profile Settings:\r\n-----\r\nState                                 ON\r\nOk.\r\n",
        0,
    );

    let result = registry(&runner)
        .execute_module("win_firewall", &ModuleArgs::new("get_config"))
        .await
        .unwrap();

    assert_eq!(
        result.results["profiles"],
        json!({ "Domain Profile": false, "Public Profile": true })
    );
}

#[tokio::test]
async fn test_firewall_disable_verdict() {
    let runner = Arc::new(RecordingRunner::new());
    runner
        .push_output("Domain Profile Settings:\r\n-----\r\nState    ON\r\nOk.\r\n", 0)
        .push_output(
            "An error occurred while attempting to contact the Windows Firewall service.",
            0,
        );

    let result = registry(&runner)
        .execute_module(
            "win_firewall",
            &ModuleArgs::new("disable").with("profile", "domainprofile"),
        )
        .await
        .unwrap();

    assert!(result.failed);
    assert_eq!(
        runner.command_lines(),
        vec![
            "netsh advfirewall show domainprofile state",
            "netsh advfirewall set domainprofile state off",
        ]
    );
}
