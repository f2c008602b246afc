//! Command line parsing tests

use clap::Parser;
use serde_json::json;

use rustle_winadmin::cli::{module_args, parse_key_value, Commands, WinAdminCli};

#[test]
fn test_run_command_with_args() {
    let cli = WinAdminCli::try_parse_from([
        "rustle-winadmin",
        "-vv",
        "run",
        "win_iis",
        "create_site",
        "-a",
        "name=My Test Site",
        "-a",
        "port=8080",
        "--arg",
        "source_path=C:\\stage",
        "--dry-run",
    ])
    .unwrap();

    assert_eq!(cli.verbosity, 2);
    let Commands::Run {
        module,
        action,
        args,
        dry_run,
    } = cli.command
    else {
        panic!("expected run command");
    };

    assert_eq!(module, "win_iis");
    assert_eq!(action, "create_site");
    assert!(dry_run);

    let module_args = module_args(&action, &args);
    assert_eq!(module_args.action, "create_site");
    assert_eq!(module_args.args["name"], json!("My Test Site"));
    assert_eq!(module_args.args["port"], json!(8080));
    assert_eq!(module_args.get_str("source_path").as_deref(), Some("C:\\stage"));
}

#[test]
fn test_parse_key_value_typing() {
    assert_eq!(parse_key_value("limit=50").unwrap(), ("limit".to_string(), json!(50)));
    assert_eq!(parse_key_value("cert_check=false").unwrap().1, json!(false));
    assert_eq!(parse_key_value("runtime_version=v4.0").unwrap().1, json!("v4.0"));
    assert_eq!(parse_key_value("runtime_version=").unwrap().1, json!(""));
    assert_eq!(parse_key_value("exclude=*.svn|*.tmp").unwrap().1, json!("*.svn|*.tmp"));
    assert_eq!(parse_key_value("msg=a=b").unwrap().1, json!("a=b"));
}

#[test]
fn test_parse_key_value_rejects_malformed() {
    assert!(parse_key_value("novalue").is_err());
    assert!(parse_key_value("=value").is_err());
}

#[test]
fn test_global_config_flag() {
    let cli = WinAdminCli::try_parse_from([
        "rustle-winadmin",
        "doc",
        "svn",
        "--config",
        "C:\\cfg.yaml",
    ])
    .unwrap();

    assert!(matches!(cli.command, Commands::Doc { ref module } if module == "svn"));
    assert_eq!(
        cli.config.as_deref(),
        Some(std::path::Path::new("C:\\cfg.yaml"))
    );
}

#[test]
fn test_missing_subcommand_is_an_error() {
    assert!(WinAdminCli::try_parse_from(["rustle-winadmin"]).is_err());
}
