//! Scoped acquisition of an external setting
//!
//! Some tools only produce predictable output when a per-user setting holds a
//! particular value. [`with_scoped_setting`] installs the value for the
//! duration of one operation and restores the previous value afterwards on
//! every exit path.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::modules::{
    error::ModuleError,
    executor::{CommandRunner, Invocation},
    script::renderer_with,
};

/// Location of one named value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingKey {
    pub path: String,
    pub value_name: String,
}

impl SettingKey {
    pub fn new(path: impl Into<String>, value_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value_name: value_name.into(),
        }
    }
}

#[async_trait]
pub trait SettingStore: Send + Sync {
    /// Current value, `None` when it is not set.
    async fn read(&self, key: &SettingKey) -> Result<Option<String>, ModuleError>;
    async fn write(&self, key: &SettingKey, value: &str) -> Result<(), ModuleError>;
    async fn delete(&self, key: &SettingKey) -> Result<(), ModuleError>;
}

/// Run `op` with `key` temporarily set to `value`.
///
/// The previous value is restored (or the value deleted when it did not
/// exist) whether or not `op` succeeded. If both `op` and the restore fail,
/// the error from `op` wins and the restore failure is logged.
pub async fn with_scoped_setting<F, Fut, T>(
    store: &dyn SettingStore,
    key: &SettingKey,
    value: &str,
    op: F,
) -> Result<T, ModuleError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ModuleError>>,
{
    let previous = store.read(key).await?;
    debug!(
        "Setting {}\\{} to {} (was {:?})",
        key.path, key.value_name, value, previous
    );
    store.write(key, value).await?;

    let result = op().await;

    let restored = match &previous {
        Some(previous) => store.write(key, previous).await,
        None => store.delete(key).await,
    };

    match (result, restored) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(restore_err)) => Err(restore_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(restore_err)) => {
            warn!(
                "Failed to restore {}\\{}: {}",
                key.path, key.value_name, restore_err
            );
            Err(err)
        }
    }
}

static REG_VALUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\S+)\s+(REG_\w+)\s*(.*?)\s*$").expect("valid registry value regex")
});

const SID_TEMPLATE: &str = "(New-Object System.Security.Principal.NTAccount('{{user}}')).Translate([System.Security.Principal.SecurityIdentifier]).Value";

/// Registry-backed store driven through `reg.exe`
pub struct RegistrySettingStore {
    runner: Arc<dyn CommandRunner>,
}

impl RegistrySettingStore {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Resolve a Windows account name to its string SID. A dry run gets a
    /// placeholder so the commands that follow can still be planned.
    pub async fn user_sid(&self, user: &str) -> Result<String, ModuleError> {
        let renderer = renderer_with(&[("sid", SID_TEMPLATE)])?;
        let script = renderer.render("sid", &json!({ "user": user }))?;
        let output = self
            .runner
            .run_checked(&Invocation::powershell(script))
            .await?;

        let sid = output.trim();
        if sid.is_empty() && self.runner.is_dry_run() {
            return Ok(format!("<SID of {user}>"));
        }
        if !sid.starts_with("S-") {
            return Err(ModuleError::UnexpectedOutput {
                program: "powershell".to_string(),
                reason: format!("no SID for user {user}: {sid}"),
            });
        }
        Ok(sid.to_string())
    }
}

/// Pull the data of `value_name` out of `reg query` output.
pub fn parse_reg_query(output: &str, value_name: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let caps = REG_VALUE_RE.captures(line)?;
        if caps[1].eq_ignore_ascii_case(value_name) {
            Some(caps[3].to_string())
        } else {
            None
        }
    })
}

#[async_trait]
impl SettingStore for RegistrySettingStore {
    async fn read(&self, key: &SettingKey) -> Result<Option<String>, ModuleError> {
        let invocation = Invocation::program(["reg", "query", &key.path, "/v", &key.value_name]);
        let result = self.runner.run(&invocation).await?;

        // reg exits 1 when the key or value does not exist
        if !result.success() {
            return Ok(None);
        }
        Ok(parse_reg_query(&result.output, &key.value_name))
    }

    async fn write(&self, key: &SettingKey, value: &str) -> Result<(), ModuleError> {
        let invocation = Invocation::program([
            "reg",
            "add",
            &key.path,
            "/v",
            &key.value_name,
            "/t",
            "REG_SZ",
            "/d",
            value,
            "/f",
        ]);
        self.runner.run_checked(&invocation).await.map(|_| ())
    }

    async fn delete(&self, key: &SettingKey) -> Result<(), ModuleError> {
        let invocation =
            Invocation::program(["reg", "delete", &key.path, "/v", &key.value_name, "/f"]);
        self.runner.run_checked(&invocation).await.map(|_| ())
    }
}
