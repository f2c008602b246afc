//! IIS site, binding and application pool management
//!
//! Scripts run through the `WebAdministration` PowerShell module. Mutating
//! operations query live state first so that repeating them is harmless.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::IisConfig;
use crate::modules::{
    error::{ModuleError, ValidationError},
    executor::{CommandRunner, Invocation},
    interface::{
        ActionOutcome, ActionSpec, ExecutionModule, ModuleArgs, ModuleDocumentation, ModuleResult,
    },
    script::{renderer_with, ScriptRenderer},
};

pub const VALID_PROTOCOLS: [&str; 3] = ["ftp", "http", "https"];
pub const VALID_RUNTIME_VERSIONS: [&str; 3] = ["v2.0", "v4.0", ""];

const MODULE_PREFIX: &str = "Import-Module WebAdministration;";

const TEMPLATES: &[(&str, &str)] = &[
    (
        "list_sites",
        "Get-WebSite -ErrorAction SilentlyContinue -WarningAction SilentlyContinue | ForEach-Object { $_.Name };",
    ),
    (
        "list_sites_status",
        "Get-WebSite -ErrorAction SilentlyContinue -WarningAction SilentlyContinue | ForEach-Object { $_.Name + \"`t\" + $_.State + \"`t\" + $_.PhysicalPath };",
    ),
    (
        "site_ids",
        "Get-ChildItem IIS:\\Sites | ForEach-Object { $_.Id };",
    ),
    (
        "site_bindings",
        "Get-WebBinding -Name '{{site}}' | ForEach-Object { $_.bindingInformation };",
    ),
    (
        "new_binding",
        "New-WebBinding -Name '{{site}}' -HostHeader '{{host}}' -IPAddress '{{ip}}' -Port '{{port}}' -Protocol '{{protocol}}'",
    ),
    (
        "remove_binding",
        "Remove-WebBinding -Name '{{site}}' -HostHeader '{{host}}' -IPAddress '{{ip}}' -Port '{{port}}'",
    ),
    (
        "new_site",
        "New-Website -Name '{{name}}' -PhysicalPath '{{path}}' -ApplicationPool '{{pool}}' -Port '{{port}}' -IPAddress '{{ip}}' -HostHeader '{{host}}' -Id '{{id}}'{{#if ssl}} -Ssl{{/if}}",
    ),
    ("remove_site", "Remove-WebSite -Name '{{name}}'"),
    (
        "set_property",
        "Set-ItemProperty -Path '{{path}}' -Name '{{property}}' -Value '{{value}}';",
    ),
    (
        "list_apppools",
        "Get-ChildItem IIS:\\AppPools\\ -ErrorAction SilentlyContinue -WarningAction SilentlyContinue | ForEach-Object { $_.Name };",
    ),
    ("new_apppool", "New-WebAppPool -Name '{{name}}'"),
    ("remove_apppool", "Remove-Item -Path '{{path}}' -Recurse"),
    ("start_site", "Start-WebSite -Name '{{name}}'"),
    ("stop_site", "Stop-WebSite -Name '{{name}}'"),
    (
        "restart_site",
        "Stop-WebSite -Name '{{name}}'; Start-WebSite -Name '{{name}}'",
    ),
    ("start_apppool", "Start-WebAppPool -Name '{{name}}'"),
    ("stop_apppool", "Stop-WebAppPool -Name '{{name}}'"),
    ("restart_apppool", "Restart-WebAppPool -Name '{{name}}'"),
];

/// `ip:port:host` as IIS stores it
pub fn binding_info(host_header: &str, ip_address: &str, port: u16) -> String {
    format!("{ip_address}:{port}:{}", host_header.replace(' ', ""))
}

fn site_path(name: &str) -> String {
    format!("IIS:\\Sites\\{name}")
}

fn apppool_path(name: &str) -> String {
    format!("IIS:\\AppPools\\{name}")
}

fn output_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

fn validate_protocol(protocol: &str) -> Result<String, ValidationError> {
    let protocol = protocol.to_lowercase();
    if VALID_PROTOCOLS.contains(&protocol.as_str()) {
        Ok(protocol)
    } else {
        Err(ValidationError::invalid(
            "protocol",
            protocol,
            format!("valid protocols: {}", VALID_PROTOCOLS.join(", ")),
        ))
    }
}

fn require(value: &str, arg: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        Err(ValidationError::missing(arg))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteStatus {
    pub name: String,
    pub state: String,
    pub physical_path: String,
}

/// Parse tab separated `name state path` lines.
pub fn parse_site_status(output: &str) -> Vec<SiteStatus> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut fields = line.trim_end_matches('\r').splitn(3, '\t');
            SiteStatus {
                name: fields.next().unwrap_or_default().trim().to_string(),
                state: fields.next().unwrap_or_default().trim().to_string(),
                physical_path: fields.next().unwrap_or_default().trim().to_string(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineMode {
    Integrated,
    Classic,
}

impl PipelineMode {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_lowercase().as_str() {
            "0" | "integrated" => Some(PipelineMode::Integrated),
            "1" | "classic" => Some(PipelineMode::Classic),
            _ => None,
        }
    }

    pub fn value(self) -> &'static str {
        match self {
            PipelineMode::Integrated => "Integrated",
            PipelineMode::Classic => "Classic",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppPoolSettings {
    pub auto_start: Option<bool>,
    pub runtime_version: Option<String>,
    pub pipeline_mode: Option<PipelineMode>,
    pub enable_32bit: Option<bool>,
}

impl AppPoolSettings {
    fn properties(&self) -> Result<Vec<(&'static str, String)>, ValidationError> {
        let mut properties = Vec::new();
        if let Some(version) = &self.runtime_version {
            if !VALID_RUNTIME_VERSIONS.contains(&version.as_str()) {
                return Err(ValidationError::invalid(
                    "runtime_version",
                    version,
                    "expected v2.0, v4.0 or empty for no managed code",
                ));
            }
            properties.push(("managedRuntimeVersion", version.clone()));
        }
        if let Some(mode) = self.pipeline_mode {
            properties.push(("managedPipelineMode", mode.value().to_string()));
        }
        if let Some(auto_start) = self.auto_start {
            properties.push(("autoStart", powershell_bool(auto_start)));
        }
        if let Some(enable) = self.enable_32bit {
            properties.push(("enable32BitAppOnWin64", powershell_bool(enable)));
        }
        Ok(properties)
    }
}

fn powershell_bool(value: bool) -> String {
    if value { "True" } else { "False" }.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IisControl {
    Start,
    Stop,
    Restart,
}

impl IisControl {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(IisControl::Start),
            "stop" => Some(IisControl::Stop),
            "restart" => Some(IisControl::Restart),
            _ => None,
        }
    }

    pub fn flag(self) -> &'static str {
        match self {
            IisControl::Start => "/START",
            IisControl::Stop => "/STOP",
            IisControl::Restart => "/RESTART",
        }
    }
}

/// Parameters of `create_site`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteSpec {
    pub name: String,
    pub source_path: String,
    pub protocol: String,
    pub port: u16,
    /// Defaults to a pool named after the site
    pub apppool: Option<String>,
    pub host_header: String,
    pub ip_address: String,
}

impl SiteSpec {
    pub fn new(name: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_path: source_path.into(),
            protocol: "http".to_string(),
            port: 80,
            apppool: None,
            host_header: String::new(),
            ip_address: "*".to_string(),
        }
    }
}

pub struct IisModule {
    runner: Arc<dyn CommandRunner>,
    renderer: ScriptRenderer,
    appcmd: PathBuf,
}

impl IisModule {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &IisConfig) -> Result<Self, ModuleError> {
        Ok(Self {
            runner,
            renderer: renderer_with(TEMPLATES)?,
            appcmd: config.appcmd_path(),
        })
    }

    async fn srvmgr(
        &self,
        template: &str,
        values: serde_json::Value,
    ) -> Result<String, ModuleError> {
        let script = self.renderer.render(template, &values)?;
        self.run_script(&script).await
    }

    async fn run_script(&self, script: &str) -> Result<String, ModuleError> {
        let invocation = Invocation::powershell(format!("{MODULE_PREFIX} {script}"));
        self.runner.run_checked(&invocation).await
    }

    async fn appcmd_list(&self, object: &str) -> Result<String, ModuleError> {
        if !self.appcmd.exists() {
            return Err(ModuleError::ToolNotFound {
                tool: self.appcmd.display().to_string(),
            });
        }
        let invocation = Invocation::program([
            self.appcmd.to_string_lossy().into_owned(),
            "list".to_string(),
            object.to_string(),
            "/config".to_string(),
            "/xml".to_string(),
        ]);
        self.runner.run_checked(&invocation).await
    }

    pub async fn list_sites(&self) -> Result<Vec<String>, ModuleError> {
        Ok(output_lines(&self.srvmgr("list_sites", json!({})).await?))
    }

    pub async fn list_sites_status(&self) -> Result<Vec<SiteStatus>, ModuleError> {
        Ok(parse_site_status(
            &self.srvmgr("list_sites_status", json!({})).await?,
        ))
    }

    pub async fn list_sites_xml(&self) -> Result<String, ModuleError> {
        self.appcmd_list("site").await
    }

    pub async fn site_bindings(&self, site: &str) -> Result<Vec<String>, ModuleError> {
        require(site, "site")?;
        Ok(output_lines(
            &self.srvmgr("site_bindings", json!({ "site": site })).await?,
        ))
    }

    pub async fn create_binding(
        &self,
        site: &str,
        host_header: &str,
        ip_address: &str,
        port: u16,
        protocol: &str,
    ) -> Result<ActionOutcome, ModuleError> {
        require(site, "site")?;
        let protocol = validate_protocol(protocol)?;
        let info = binding_info(host_header, ip_address, port);

        if self.site_bindings(site).await?.contains(&info) {
            debug!("Binding already present: {}", info);
            return Ok(ActionOutcome::Unchanged {
                reason: format!("binding {info} already present"),
            });
        }

        let output = self
            .srvmgr(
                "new_binding",
                json!({
                    "site": site,
                    "host": host_header,
                    "ip": ip_address,
                    "port": port,
                    "protocol": protocol,
                }),
            )
            .await?;

        // a dry run never observes the new binding
        if self.runner.is_dry_run() || self.site_bindings(site).await?.contains(&info) {
            info!("Binding created: {}", info);
            Ok(ActionOutcome::Changed { output })
        } else {
            error!("Unable to create binding: {}", info);
            Ok(ActionOutcome::Unconfirmed { output })
        }
    }

    pub async fn remove_binding(
        &self,
        site: &str,
        host_header: &str,
        ip_address: &str,
        port: u16,
    ) -> Result<ActionOutcome, ModuleError> {
        require(site, "site")?;
        let info = binding_info(host_header, ip_address, port);

        if !self.site_bindings(site).await?.contains(&info) {
            debug!("Binding already absent: {}", info);
            return Ok(ActionOutcome::Unchanged {
                reason: format!("binding {info} already absent"),
            });
        }

        let output = self
            .srvmgr(
                "remove_binding",
                json!({
                    "site": site,
                    "host": host_header,
                    "ip": ip_address,
                    "port": port,
                }),
            )
            .await?;

        if !self.runner.is_dry_run() && self.site_bindings(site).await?.contains(&info) {
            error!("Unable to remove binding: {}", info);
            Ok(ActionOutcome::Unconfirmed { output })
        } else {
            info!("Binding removed: {}", info);
            Ok(ActionOutcome::Changed { output })
        }
    }

    /// Next free site id: one past the highest id in use.
    async fn next_site_id(&self) -> Result<u32, ModuleError> {
        let output = self.srvmgr("site_ids", json!({})).await?;
        let highest = output_lines(&output)
            .iter()
            .filter_map(|line| line.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        Ok(highest + 1)
    }

    pub async fn create_site(&self, spec: &SiteSpec) -> Result<ActionOutcome, ModuleError> {
        require(&spec.name, "name")?;
        require(&spec.source_path, "source_path")?;
        let protocol = validate_protocol(&spec.protocol)?;

        if self.list_sites().await?.contains(&spec.name) {
            debug!("Site '{}' already present", spec.name);
            return Ok(ActionOutcome::Unchanged {
                reason: format!("site '{}' already present", spec.name),
            });
        }

        let pool = spec
            .apppool
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| spec.name.clone());
        if !self.list_apppools().await?.contains(&pool) {
            info!("Creating application pool '{}' for site '{}'", pool, spec.name);
            self.srvmgr("new_apppool", json!({ "name": pool })).await?;
        }

        let id = self.next_site_id().await?;
        info!("Creating site '{}' with id {}", spec.name, id);
        let output = self
            .srvmgr(
                "new_site",
                json!({
                    "name": spec.name,
                    "path": spec.source_path,
                    "pool": pool,
                    "port": spec.port,
                    "ip": spec.ip_address,
                    "host": spec.host_header,
                    "id": id,
                    "ssl": protocol == "https",
                }),
            )
            .await?;
        Ok(ActionOutcome::Changed { output })
    }

    pub async fn remove_site(&self, name: &str) -> Result<ActionOutcome, ModuleError> {
        require(name, "name")?;
        if !self.list_sites().await?.iter().any(|s| s == name) {
            debug!("Site already absent: {}", name);
            return Ok(ActionOutcome::Unchanged {
                reason: format!("site '{name}' already absent"),
            });
        }

        let output = self.srvmgr("remove_site", json!({ "name": name })).await?;
        Ok(ActionOutcome::Changed { output })
    }

    async fn set_properties(
        &self,
        path: &str,
        properties: &[(&str, String)],
    ) -> Result<String, ModuleError> {
        let mut script = String::new();
        for (property, value) in properties {
            script.push_str(&self.renderer.render(
                "set_property",
                &json!({ "path": path, "property": property, "value": value }),
            )?);
        }
        self.run_script(&script).await
    }

    /// Point the site's log files at `path`.
    pub async fn site_log_path(&self, name: &str, path: &str) -> Result<String, ModuleError> {
        require(name, "name")?;
        require(path, "path")?;
        self.set_properties(&site_path(name), &[("logFile.directory", path.to_string())])
            .await
    }

    pub async fn site_run_as(
        &self,
        name: &str,
        username: &str,
        password: &str,
    ) -> Result<String, ModuleError> {
        require(name, "name")?;
        self.set_properties(
            &site_path(name),
            &[
                ("userName", username.to_string()),
                ("password", password.to_string()),
            ],
        )
        .await
    }

    pub async fn list_apppools(&self) -> Result<Vec<String>, ModuleError> {
        Ok(output_lines(&self.srvmgr("list_apppools", json!({})).await?))
    }

    pub async fn list_apppools_xml(&self) -> Result<String, ModuleError> {
        self.appcmd_list("apppool").await
    }

    pub async fn create_apppool(&self, name: &str) -> Result<ActionOutcome, ModuleError> {
        require(name, "name")?;
        if self.list_apppools().await?.iter().any(|p| p == name) {
            warn!("AppPool '{}' already exists", name);
            return Ok(ActionOutcome::Unchanged {
                reason: format!("application pool '{name}' already present"),
            });
        }

        let output = self.srvmgr("new_apppool", json!({ "name": name })).await?;
        Ok(ActionOutcome::Changed { output })
    }

    pub async fn remove_apppool(&self, name: &str) -> Result<ActionOutcome, ModuleError> {
        require(name, "name")?;
        if !self.list_apppools().await?.iter().any(|p| p == name) {
            warn!("AppPool '{}' already absent", name);
            return Ok(ActionOutcome::Unchanged {
                reason: format!("application pool '{name}' already absent"),
            });
        }

        let output = self
            .srvmgr("remove_apppool", json!({ "path": apppool_path(name) }))
            .await?;
        Ok(ActionOutcome::Changed { output })
    }

    /// Run `template` against an existing site, or report it missing.
    async fn site_action(&self, template: &str, name: &str) -> Result<ActionOutcome, ModuleError> {
        require(name, "name")?;
        if !self.list_sites().await?.iter().any(|s| s == name) {
            warn!("Site '{}' does not exist", name);
            return Ok(ActionOutcome::Missing {
                resource: format!("site '{name}'"),
            });
        }

        let output = self.srvmgr(template, json!({ "name": name })).await?;
        Ok(ActionOutcome::Changed { output })
    }

    async fn apppool_action(
        &self,
        template: &str,
        name: &str,
    ) -> Result<ActionOutcome, ModuleError> {
        require(name, "name")?;
        if !self.list_apppools().await?.iter().any(|p| p == name) {
            warn!("AppPool '{}' does not exist", name);
            return Ok(ActionOutcome::Missing {
                resource: format!("application pool '{name}'"),
            });
        }

        let output = self.srvmgr(template, json!({ "name": name })).await?;
        Ok(ActionOutcome::Changed { output })
    }

    pub async fn start_site(&self, name: &str) -> Result<ActionOutcome, ModuleError> {
        self.site_action("start_site", name).await
    }

    pub async fn stop_site(&self, name: &str) -> Result<ActionOutcome, ModuleError> {
        self.site_action("stop_site", name).await
    }

    pub async fn restart_site(&self, name: &str) -> Result<ActionOutcome, ModuleError> {
        self.site_action("restart_site", name).await
    }

    pub async fn start_apppool(&self, name: &str) -> Result<ActionOutcome, ModuleError> {
        self.apppool_action("start_apppool", name).await
    }

    pub async fn stop_apppool(&self, name: &str) -> Result<ActionOutcome, ModuleError> {
        self.apppool_action("stop_apppool", name).await
    }

    pub async fn restart_apppool(&self, name: &str) -> Result<ActionOutcome, ModuleError> {
        self.apppool_action("restart_apppool", name).await
    }

    pub async fn apppool_setting(
        &self,
        name: &str,
        settings: &AppPoolSettings,
    ) -> Result<ActionOutcome, ModuleError> {
        require(name, "name")?;
        let properties = settings.properties()?;

        if !self.list_apppools().await?.iter().any(|p| p == name) {
            warn!("AppPool '{}' does not exist", name);
            return Ok(ActionOutcome::Missing {
                resource: format!("application pool '{name}'"),
            });
        }

        if properties.is_empty() {
            return Ok(ActionOutcome::Unchanged {
                reason: "no settings requested".to_string(),
            });
        }

        let output = self.set_properties(&apppool_path(name), &properties).await?;
        Ok(ActionOutcome::Changed { output })
    }

    /// Start, stop or restart the whole IIS service through `iisreset`.
    pub async fn control(&self, action: IisControl) -> Result<String, ModuleError> {
        info!("iisreset {}", action.flag());
        self.runner
            .run_checked(&Invocation::program(["iisreset", action.flag()]))
            .await
    }
}

const ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "list_sites",
        description: "Names of all deployed sites",
        required: &[],
    },
    ActionSpec {
        name: "list_sites_status",
        description: "Name, state and physical path of every site",
        required: &[],
    },
    ActionSpec {
        name: "list_sites_xml",
        description: "Site configuration as appcmd XML",
        required: &[],
    },
    ActionSpec {
        name: "site_bindings",
        description: "Binding information of one site",
        required: &["site"],
    },
    ActionSpec {
        name: "create_binding",
        description: "Add a binding unless present, then verify it",
        required: &["site"],
    },
    ActionSpec {
        name: "remove_binding",
        description: "Remove a binding if present, then verify it",
        required: &["site"],
    },
    ActionSpec {
        name: "create_site",
        description: "Create a site and its application pool",
        required: &["name", "source_path"],
    },
    ActionSpec {
        name: "remove_site",
        description: "Remove a site if present",
        required: &["name"],
    },
    ActionSpec {
        name: "site_log_path",
        description: "Set the site's log directory",
        required: &["name", "path"],
    },
    ActionSpec {
        name: "site_run_as",
        description: "Set the account the site runs as",
        required: &["name"],
    },
    ActionSpec {
        name: "list_apppools",
        description: "Names of all application pools",
        required: &[],
    },
    ActionSpec {
        name: "list_apppools_xml",
        description: "Application pool configuration as appcmd XML",
        required: &[],
    },
    ActionSpec {
        name: "create_apppool",
        description: "Create an application pool unless present",
        required: &["name"],
    },
    ActionSpec {
        name: "remove_apppool",
        description: "Remove an application pool if present",
        required: &["name"],
    },
    ActionSpec {
        name: "start_site",
        description: "Start an existing site",
        required: &["name"],
    },
    ActionSpec {
        name: "stop_site",
        description: "Stop an existing site",
        required: &["name"],
    },
    ActionSpec {
        name: "restart_site",
        description: "Stop then start an existing site",
        required: &["name"],
    },
    ActionSpec {
        name: "start_apppool",
        description: "Start an existing application pool",
        required: &["name"],
    },
    ActionSpec {
        name: "stop_apppool",
        description: "Stop an existing application pool",
        required: &["name"],
    },
    ActionSpec {
        name: "restart_apppool",
        description: "Recycle an existing application pool",
        required: &["name"],
    },
    ActionSpec {
        name: "apppool_setting",
        description: "Change runtime, pipeline, auto start or 32-bit settings",
        required: &["name"],
    },
    ActionSpec {
        name: "control",
        description: "Start, stop or restart IIS through iisreset",
        required: &["command"],
    },
];

fn port_arg(args: &ModuleArgs) -> Result<u16, ValidationError> {
    match args.get_u32("port")? {
        None => Ok(80),
        Some(port) => u16::try_from(port)
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| ValidationError::invalid("port", port, "must be between 1 and 65535")),
    }
}

#[async_trait]
impl ExecutionModule for IisModule {
    fn name(&self) -> &'static str {
        "win_iis"
    }

    fn version(&self) -> &'static str {
        "1.0.0"
    }

    fn actions(&self) -> &'static [ActionSpec] {
        ACTIONS
    }

    async fn execute(&self, args: &ModuleArgs) -> Result<ModuleResult, ModuleError> {
        let name = || args.require_str("name");
        let host = args.get_str("host_header").unwrap_or_default();
        let ip = args.get_str("ip_address").unwrap_or_else(|| "*".to_string());

        match args.action.as_str() {
            "list_sites" => ModuleResult::value("sites", &self.list_sites().await?),
            "list_sites_status" => ModuleResult::value("sites", &self.list_sites_status().await?),
            "list_sites_xml" => Ok(ModuleResult::output(self.list_sites_xml().await?)),
            "site_bindings" => {
                let site = args.require_str("site")?;
                ModuleResult::value("bindings", &self.site_bindings(&site).await?)
            }
            "create_binding" => {
                let site = args.require_str("site")?;
                let protocol = args.get_str("protocol").unwrap_or_else(|| "http".to_string());
                Ok(self
                    .create_binding(&site, &host, &ip, port_arg(args)?, &protocol)
                    .await?
                    .into())
            }
            "remove_binding" => {
                let site = args.require_str("site")?;
                Ok(self
                    .remove_binding(&site, &host, &ip, port_arg(args)?)
                    .await?
                    .into())
            }
            "create_site" => {
                let spec = SiteSpec {
                    name: name()?,
                    source_path: args.require_str("source_path")?,
                    protocol: args.get_str("protocol").unwrap_or_else(|| "http".to_string()),
                    port: port_arg(args)?,
                    apppool: args.get_str("apppool"),
                    host_header: host,
                    ip_address: ip,
                };
                Ok(self.create_site(&spec).await?.into())
            }
            "remove_site" => Ok(self.remove_site(&name()?).await?.into()),
            "site_log_path" => Ok(ModuleResult::output(
                self.site_log_path(&name()?, &args.require_str("path")?)
                    .await?,
            )),
            "site_run_as" => Ok(ModuleResult::output(
                self.site_run_as(
                    &name()?,
                    &args.get_str("username").unwrap_or_default(),
                    &args.get_str("password").unwrap_or_default(),
                )
                .await?,
            )),
            "list_apppools" => ModuleResult::value("apppools", &self.list_apppools().await?),
            "list_apppools_xml" => Ok(ModuleResult::output(self.list_apppools_xml().await?)),
            "create_apppool" => Ok(self.create_apppool(&name()?).await?.into()),
            "remove_apppool" => Ok(self.remove_apppool(&name()?).await?.into()),
            "start_site" => Ok(self.start_site(&name()?).await?.into()),
            "stop_site" => Ok(self.stop_site(&name()?).await?.into()),
            "restart_site" => Ok(self.restart_site(&name()?).await?.into()),
            "start_apppool" => Ok(self.start_apppool(&name()?).await?.into()),
            "stop_apppool" => Ok(self.stop_apppool(&name()?).await?.into()),
            "restart_apppool" => Ok(self.restart_apppool(&name()?).await?.into()),
            "apppool_setting" => {
                let pipeline_mode = match args.get_str("pipeline_mode") {
                    Some(raw) => Some(PipelineMode::from_code(&raw).ok_or_else(|| {
                        ValidationError::invalid(
                            "pipeline_mode",
                            &raw,
                            "expected 0 (Integrated) or 1 (Classic)",
                        )
                    })?),
                    None => None,
                };
                let settings = AppPoolSettings {
                    auto_start: args.get_bool("auto_start")?,
                    runtime_version: args.get_str("runtime_version"),
                    pipeline_mode,
                    enable_32bit: args.get_bool("enable_32bit")?,
                };
                Ok(self.apppool_setting(&name()?, &settings).await?.into())
            }
            "control" => {
                let raw = args.require_str("command")?;
                let action = IisControl::from_name(&raw).ok_or_else(|| {
                    ValidationError::invalid("command", &raw, "expected start, stop or restart")
                })?;
                Ok(ModuleResult::output(self.control(action).await?))
            }
            other => Err(ModuleError::UnsupportedAction {
                module: self.name().to_string(),
                action: other.to_string(),
            }),
        }
    }

    fn documentation(&self) -> ModuleDocumentation {
        ModuleDocumentation {
            description: "Manage IIS sites, bindings and application pools".to_string(),
            actions: ACTIONS.to_vec(),
            examples: vec![
                r#"win_iis create_site -a name="My Test Site" -a source_path=C:\stage -a port=80 -a apppool=TestPool"#.to_string(),
                "win_iis apppool_setting -a name=TestPool -a runtime_version=v4.0 -a pipeline_mode=0".to_string(),
                "win_iis control -a command=restart".to_string(),
            ],
        }
    }
}
