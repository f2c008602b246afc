//! Subversion working copy operations through the `svn` command line client

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::SvnConfig;
use crate::modules::{
    error::{ModuleError, ValidationError},
    executor::{join_argv_line, CommandRunner, Invocation},
    interface::{ActionSpec, ExecutionModule, ModuleArgs, ModuleDocumentation, ModuleResult},
};

static INFO_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^:]+):\s+(\S.*)$").expect("valid svn info regex"));

/// Account the svn process is started as through `runas`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunAs {
    pub user: String,
    pub password: Option<String>,
}

/// Options shared by every svn operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvnOptions {
    pub cwd: PathBuf,
    pub run_as: Option<RunAs>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// When false the server certificate is trusted without checking
    pub cert_check: bool,
    pub opts: Vec<String>,
}

impl SvnOptions {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            run_as: None,
            username: None,
            password: None,
            cert_check: true,
            opts: Vec::new(),
        }
    }

    pub fn from_args(args: &ModuleArgs) -> Result<Self, ModuleError> {
        let run_as = args
            .get_str("runas_username")
            .filter(|user| !user.is_empty())
            .map(|user| RunAs {
                user,
                password: args.get_str("runas_password").filter(|p| !p.is_empty()),
            });

        Ok(Self {
            cwd: PathBuf::from(args.require_str("cwd")?),
            run_as,
            username: args.get_str("username").filter(|u| !u.is_empty()),
            password: args.get_str("password").filter(|p| !p.is_empty()),
            cert_check: args.get_bool("cert_check")?.unwrap_or(true),
            opts: split_targets(args.get_str("opts").as_deref())?,
        })
    }

    fn cwd_str(&self) -> String {
        self.cwd.to_string_lossy().into_owned()
    }
}

/// Output shape of `svn info`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoFormat {
    Str,
    Xml,
    List,
    Dict,
}

impl InfoFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "str" => Some(InfoFormat::Str),
            "xml" => Some(InfoFormat::Xml),
            "list" => Some(InfoFormat::List),
            "dict" => Some(InfoFormat::Dict),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SvnInfo {
    Text(String),
    Entries(Vec<Vec<(String, String)>>),
    Records(Vec<BTreeMap<String, String>>),
}

/// One `(key, value)` list per blank-line separated block.
pub fn parse_info(output: &str) -> Vec<Vec<(String, String)>> {
    let normalized = output.replace("\r\n", "\n");
    normalized
        .split("\n\n")
        .map(|block| {
            block
                .lines()
                .filter_map(|line| {
                    let caps = INFO_FIELD_RE.captures(line)?;
                    Some((caps[1].to_string(), caps[2].trim_end().to_string()))
                })
                .collect::<Vec<_>>()
        })
        .filter(|entries| !entries.is_empty())
        .collect()
}

fn split_targets(targets: Option<&str>) -> Result<Vec<String>, ModuleError> {
    match targets {
        Some(targets) if !targets.trim().is_empty() => Ok(shell_words::split(targets)?),
        _ => Ok(Vec::new()),
    }
}

fn require_targets(targets: Option<&str>) -> Result<Vec<String>, ModuleError> {
    let targets = split_targets(targets)?;
    if targets.is_empty() {
        return Err(ValidationError::missing("targets").into());
    }
    Ok(targets)
}

pub struct SvnModule {
    runner: Arc<dyn CommandRunner>,
    config: SvnConfig,
}

impl SvnModule {
    pub fn new(runner: Arc<dyn CommandRunner>, config: SvnConfig) -> Self {
        Self { runner, config }
    }

    /// Build the invocation for one svn subcommand.
    pub fn invocation(
        &self,
        subcommand: &str,
        options: &SvnOptions,
        revision: Option<&str>,
        extra: &[String],
        positional: &[String],
    ) -> Invocation {
        let mut tokens = vec![
            self.config.program.clone(),
            "--non-interactive".to_string(),
            subcommand.to_string(),
        ];

        if let Some(revision) = revision.filter(|r| !r.is_empty()) {
            tokens.extend(["-r".to_string(), revision.to_string()]);
        }
        if let Some(username) = &options.username {
            tokens.extend(["--username".to_string(), username.clone()]);
        }
        if let Some(password) = &options.password {
            tokens.extend(["--password".to_string(), password.clone()]);
        }
        if !options.cert_check {
            tokens.push("--trust-server-cert".to_string());
        }
        tokens.extend(options.opts.iter().cloned());
        tokens.extend(extra.iter().cloned());
        tokens.extend(positional.iter().cloned());

        let invocation = match &options.run_as {
            Some(run_as) => {
                // runas starts svn directly, so the inner line only needs argv quoting
                let svn_line = join_argv_line(&tokens);
                let invocation = Invocation::console([
                    "runas".to_string(),
                    format!("/user:{}", run_as.user),
                    svn_line,
                ]);
                match &run_as.password {
                    Some(password) => invocation.with_stdin(format!("{password}\n")),
                    None => invocation,
                }
            }
            None => Invocation::console(&tokens),
        };

        invocation
            .with_code_page(self.config.code_page)
            .in_dir(&options.cwd)
    }

    async fn run_svn(
        &self,
        subcommand: &str,
        options: &SvnOptions,
        revision: Option<&str>,
        extra: &[String],
        positional: &[String],
    ) -> Result<String, ModuleError> {
        let invocation = self.invocation(subcommand, options, revision, extra, positional);
        debug!("svn {} in {}", subcommand, options.cwd.display());
        self.runner.run_checked(&invocation).await
    }

    /// Targets, or the working copy itself when none are given.
    fn paths_or_cwd(
        options: &SvnOptions,
        targets: Option<&str>,
    ) -> Result<Vec<String>, ModuleError> {
        let targets = split_targets(targets)?;
        if targets.is_empty() {
            Ok(vec![options.cwd_str()])
        } else {
            Ok(targets)
        }
    }

    fn remote_and_target(
        options: &SvnOptions,
        remote: &str,
        target: Option<&str>,
    ) -> Result<Vec<String>, ModuleError> {
        if remote.is_empty() {
            return Err(ValidationError::missing("remote").into());
        }
        let target = target
            .filter(|t| !t.is_empty())
            .map(String::from)
            .unwrap_or_else(|| options.cwd_str());
        Ok(vec![remote.to_string(), target])
    }

    pub async fn update(
        &self,
        options: &SvnOptions,
        targets: Option<&str>,
        revision: Option<&str>,
    ) -> Result<String, ModuleError> {
        let paths = Self::paths_or_cwd(options, targets)?;
        self.run_svn("update", options, revision, &[], &paths).await
    }

    pub async fn checkout(
        &self,
        options: &SvnOptions,
        remote: &str,
        target: Option<&str>,
        revision: Option<&str>,
    ) -> Result<String, ModuleError> {
        let positional = Self::remote_and_target(options, remote, target)?;
        ensure_dir(&options.cwd).await?;
        info!("Checking out {} into {}", remote, positional[1]);
        self.run_svn("checkout", options, revision, &[], &positional)
            .await
    }

    pub async fn info(
        &self,
        options: &SvnOptions,
        targets: Option<&str>,
        format: InfoFormat,
    ) -> Result<SvnInfo, ModuleError> {
        let extra = if format == InfoFormat::Xml {
            vec!["--xml".to_string()]
        } else {
            Vec::new()
        };
        let paths = Self::paths_or_cwd(options, targets)?;
        let output = self.run_svn("info", options, None, &extra, &paths).await?;

        Ok(match format {
            InfoFormat::Str | InfoFormat::Xml => SvnInfo::Text(output),
            InfoFormat::List => SvnInfo::Entries(parse_info(&output)),
            InfoFormat::Dict => SvnInfo::Records(
                parse_info(&output)
                    .into_iter()
                    .map(|entries| entries.into_iter().collect())
                    .collect(),
            ),
        })
    }

    pub async fn switch(
        &self,
        options: &SvnOptions,
        remote: &str,
        target: Option<&str>,
    ) -> Result<String, ModuleError> {
        let positional = Self::remote_and_target(options, remote, target)?;
        self.run_svn("switch", options, None, &[], &positional).await
    }

    pub async fn diff(
        &self,
        options: &SvnOptions,
        targets: Option<&str>,
    ) -> Result<String, ModuleError> {
        let paths = Self::paths_or_cwd(options, targets)?;
        self.run_svn("diff", options, None, &[], &paths).await
    }

    pub async fn commit(
        &self,
        options: &SvnOptions,
        targets: Option<&str>,
        msg: Option<&str>,
    ) -> Result<String, ModuleError> {
        let paths = Self::paths_or_cwd(options, targets)?;
        self.run_svn("commit", options, None, &message_opts(msg), &paths)
            .await
    }

    pub async fn add(&self, options: &SvnOptions, targets: &str) -> Result<String, ModuleError> {
        let targets = require_targets(Some(targets))?;
        self.run_svn("add", options, None, &[], &targets).await
    }

    pub async fn remove(
        &self,
        options: &SvnOptions,
        targets: &str,
        msg: Option<&str>,
    ) -> Result<String, ModuleError> {
        let targets = require_targets(Some(targets))?;
        self.run_svn("remove", options, None, &message_opts(msg), &targets)
            .await
    }

    pub async fn status(
        &self,
        options: &SvnOptions,
        targets: Option<&str>,
    ) -> Result<String, ModuleError> {
        let paths = Self::paths_or_cwd(options, targets)?;
        self.run_svn("status", options, None, &[], &paths).await
    }

    pub async fn export(
        &self,
        options: &SvnOptions,
        remote: &str,
        target: Option<&str>,
        revision: Option<&str>,
    ) -> Result<String, ModuleError> {
        let positional = Self::remote_and_target(options, remote, target)?;
        let revision = revision.filter(|r| !r.is_empty()).unwrap_or("HEAD");
        self.run_svn("export", options, Some(revision), &[], &positional)
            .await
    }
}

fn message_opts(msg: Option<&str>) -> Vec<String> {
    match msg {
        Some(msg) if !msg.is_empty() => vec!["-m".to_string(), msg.to_string()],
        _ => Vec::new(),
    }
}

async fn ensure_dir(path: &Path) -> Result<(), ModuleError> {
    if tokio::fs::metadata(path).await.is_ok() {
        return Ok(());
    }
    debug!("Creating working directory {}", path.display());
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| ModuleError::ExecutionFailed {
            message: format!("failed to create {}: {e}", path.display()),
        })
}

const ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "update",
        description: "Update the working copy or the given targets",
        required: &["cwd"],
    },
    ActionSpec {
        name: "checkout",
        description: "Check out a repository URL",
        required: &["cwd", "remote"],
    },
    ActionSpec {
        name: "info",
        description: "Working copy information as str, xml, list or dict",
        required: &["cwd"],
    },
    ActionSpec {
        name: "switch",
        description: "Switch the working copy to another URL",
        required: &["cwd", "remote"],
    },
    ActionSpec {
        name: "diff",
        description: "Local modifications",
        required: &["cwd"],
    },
    ActionSpec {
        name: "commit",
        description: "Commit changes",
        required: &["cwd"],
    },
    ActionSpec {
        name: "add",
        description: "Schedule targets for addition",
        required: &["cwd", "targets"],
    },
    ActionSpec {
        name: "remove",
        description: "Schedule targets for removal",
        required: &["cwd", "targets"],
    },
    ActionSpec {
        name: "status",
        description: "Working copy status",
        required: &["cwd"],
    },
    ActionSpec {
        name: "export",
        description: "Export a clean tree, HEAD unless a revision is given",
        required: &["cwd", "remote"],
    },
];

#[async_trait]
impl ExecutionModule for SvnModule {
    fn name(&self) -> &'static str {
        "svn"
    }

    fn version(&self) -> &'static str {
        "1.0.0"
    }

    fn actions(&self) -> &'static [ActionSpec] {
        ACTIONS
    }

    async fn execute(&self, args: &ModuleArgs) -> Result<ModuleResult, ModuleError> {
        let options = SvnOptions::from_args(args)?;
        let targets = args.get_str("targets");
        let targets = targets.as_deref();
        let target = args.get_str("target");
        let target = target.as_deref();
        let revision = args.get_str("revision");
        let revision = revision.as_deref();
        let msg = args.get_str("msg");
        let msg = msg.as_deref();

        let stdout = match args.action.as_str() {
            "update" => self.update(&options, targets, revision).await?,
            "checkout" => {
                self.checkout(&options, &args.require_str("remote")?, target, revision)
                    .await?
            }
            "info" => {
                let raw = args.get_str("fmt").unwrap_or_else(|| "str".to_string());
                let format = InfoFormat::from_name(&raw).ok_or_else(|| {
                    ValidationError::invalid("fmt", &raw, "expected str, xml, list or dict")
                })?;
                return match self.info(&options, targets, format).await? {
                    SvnInfo::Text(text) => Ok(ModuleResult::output(text)),
                    parsed => ModuleResult::value("info", &parsed),
                };
            }
            "switch" => {
                self.switch(&options, &args.require_str("remote")?, target)
                    .await?
            }
            "diff" => self.diff(&options, targets).await?,
            "commit" => self.commit(&options, targets, msg).await?,
            "add" => self.add(&options, &args.require_str("targets")?).await?,
            "remove" => {
                self.remove(&options, &args.require_str("targets")?, msg)
                    .await?
            }
            "status" => self.status(&options, targets).await?,
            "export" => {
                self.export(&options, &args.require_str("remote")?, target, revision)
                    .await?
            }
            other => {
                return Err(ModuleError::UnsupportedAction {
                    module: self.name().to_string(),
                    action: other.to_string(),
                })
            }
        };

        let mutating = matches!(
            args.action.as_str(),
            "update" | "checkout" | "switch" | "commit" | "add" | "remove" | "export"
        );
        Ok(ModuleResult {
            changed: mutating,
            ..ModuleResult::output(stdout)
        })
    }

    fn documentation(&self) -> ModuleDocumentation {
        ModuleDocumentation {
            description: "Run Subversion commands against a working copy".to_string(),
            actions: ACTIONS.to_vec(),
            examples: vec![
                r#"svn checkout -a cwd=D:\www\site -a remote=svn://svn.example.com/repo/trunk"#.to_string(),
                r#"svn info -a cwd=D:\www\site -a fmt=dict"#.to_string(),
                r#"svn update -a cwd=D:\www\site -a runas_username=deploy -a runas_password=secret"#.to_string(),
            ],
        }
    }
}
