//! Windows Firewall through `netsh advfirewall`

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::FirewallConfig;
use crate::modules::{
    error::{ModuleError, ValidationError},
    executor::{CommandRunner, Invocation},
    interface::{
        ActionOutcome, ActionSpec, ExecutionModule, ModuleArgs, ModuleDocumentation, ModuleResult,
    },
};

pub const PROFILES: [&str; 5] = [
    "allprofiles",
    "currentprofile",
    "domainprofile",
    "privateprofile",
    "publicprofile",
];

const OK_MARKERS: [&str; 2] = ["Ok.", "确定。"];
const NO_RULES_MARKERS: [&str; 2] = [
    "No rules match the specified criteria.",
    "没有与指定标准相匹配的规则。",
];

static PROFILE_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?)\s*(?:Settings|设置)\s*:\s*$").expect("valid profile header regex")
});

/// Profile name to enabled state, from `show allprofiles` output.
pub fn parse_profiles(output: &str) -> BTreeMap<String, bool> {
    let mut profiles = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in output.lines().map(str::trim) {
        if let Some(profile) = &current {
            if line.starts_with("State") || line.starts_with("状态") {
                let value = line.split_whitespace().nth(1).unwrap_or_default();
                profiles.insert(profile.clone(), value == "ON" || value == "打开");
                current = None;
            }
        } else if let Some(caps) = PROFILE_HEADER_RE.captures(line) {
            current = Some(caps[1].to_string());
        }
    }
    profiles
}

fn is_ok(output: &str) -> bool {
    let output = output.trim();
    OK_MARKERS.iter().any(|marker| output.ends_with(marker))
}

fn no_rules(output: &str) -> bool {
    let output = output.trim();
    NO_RULES_MARKERS.iter().any(|marker| output == *marker)
}

fn validate_profile(profile: &str) -> Result<(), ValidationError> {
    if PROFILES.contains(&profile) {
        Ok(())
    } else {
        Err(ValidationError::invalid(
            "profile",
            profile,
            format!("valid profiles: {}", PROFILES.join(", ")),
        ))
    }
}

fn is_icmp(protocol: &str) -> bool {
    let protocol = protocol.to_ascii_lowercase();
    protocol.contains("icmpv4") || protocol.contains("icmpv6")
}

/// Output of a state change with whether netsh acknowledged it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub ok: bool,
    /// False when the profile already had the requested state
    pub changed: bool,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallRule {
    pub name: String,
    pub localport: String,
    pub protocol: String,
    pub action: String,
    pub dir: String,
    pub remoteip: String,
}

impl FirewallRule {
    pub fn new(name: impl Into<String>, localport: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            localport: localport.into(),
            protocol: "tcp".to_string(),
            action: "allow".to_string(),
            dir: "in".to_string(),
            remoteip: "any".to_string(),
        }
    }

    fn from_args(args: &ModuleArgs) -> Result<Self, ValidationError> {
        let defaults = Self::new(
            args.require_str("name")?,
            args.get_str("localport").unwrap_or_default(),
        );
        Ok(Self {
            protocol: args.get_str("protocol").unwrap_or(defaults.protocol.clone()),
            action: args.get_str("rule_action").unwrap_or(defaults.action.clone()),
            dir: args.get_str("dir").unwrap_or(defaults.dir.clone()),
            remoteip: args.get_str("remoteip").unwrap_or(defaults.remoteip.clone()),
            ..defaults
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::missing("name"));
        }
        if self.localport.is_empty() && !is_icmp(&self.protocol) {
            return Err(ValidationError::missing("localport"));
        }
        Ok(())
    }

    fn selector_tokens(&self) -> Vec<String> {
        let mut tokens = vec![
            format!("name={}", self.name),
            format!("protocol={}", self.protocol),
            format!("dir={}", self.dir),
            format!("remoteip={}", self.remoteip),
        ];
        if !is_icmp(&self.protocol) {
            tokens.push(format!("localport={}", self.localport));
        }
        tokens
    }

    fn add_tokens(&self) -> Vec<String> {
        let mut tokens = vec![
            format!("name={}", self.name),
            format!("protocol={}", self.protocol),
            format!("dir={}", self.dir),
            format!("action={}", self.action),
            format!("remoteip={}", self.remoteip),
        ];
        if !is_icmp(&self.protocol) {
            tokens.push(format!("localport={}", self.localport));
        }
        tokens
    }
}

pub struct FirewallModule {
    runner: Arc<dyn CommandRunner>,
    config: FirewallConfig,
}

impl FirewallModule {
    pub fn new(runner: Arc<dyn CommandRunner>, config: FirewallConfig) -> Self {
        Self { runner, config }
    }

    /// A new `netsh advfirewall ...` invocation for every call.
    fn invocation<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tokens = vec![self.config.netsh.clone(), "advfirewall".to_string()];
        tokens.extend(args.into_iter().map(Into::into));
        Invocation::console(tokens).with_code_page(self.config.code_page)
    }

    pub async fn get_config(&self) -> Result<BTreeMap<String, bool>, ModuleError> {
        let output = self
            .runner
            .run_checked(&self.invocation(["show", "allprofiles"]))
            .await?;
        Ok(parse_profiles(&output))
    }

    async fn set_state(&self, profile: &str, state: &str) -> Result<Verdict, ModuleError> {
        validate_profile(profile)?;
        let enabled = state == "on";

        let current = self
            .runner
            .run_checked(&self.invocation(["show", profile, "state"]))
            .await?;
        let profiles = parse_profiles(&current);
        if !profiles.is_empty() && profiles.values().all(|on| *on == enabled) {
            debug!("Firewall {} already {}", profile, state);
            return Ok(Verdict {
                ok: true,
                changed: false,
                output: current,
            });
        }

        info!("Setting firewall {} state {}", profile, state);
        let output = self
            .runner
            .run_checked(&self.invocation(["set", profile, "state", state]))
            .await?;
        let ok = is_ok(&output) || self.runner.is_dry_run();
        Ok(Verdict {
            ok,
            changed: ok,
            output,
        })
    }

    pub async fn enable(&self, profile: &str) -> Result<Verdict, ModuleError> {
        self.set_state(profile, "on").await
    }

    pub async fn disable(&self, profile: &str) -> Result<Verdict, ModuleError> {
        self.set_state(profile, "off").await
    }

    /// Rule details, `None` when no rule matches.
    pub async fn get_rule(&self, name: &str) -> Result<Option<String>, ModuleError> {
        if name.is_empty() {
            return Err(ValidationError::missing("name").into());
        }
        let invocation = self.invocation([
            "firewall".to_string(),
            "show".to_string(),
            "rule".to_string(),
            format!("name={name}"),
        ]);
        // netsh exits 1 when nothing matches, so the exit code alone is not an error
        let result = self.runner.run(&invocation).await?;
        if result.output.trim().is_empty() || no_rules(&result.output) {
            debug!("No firewall rule named {}", name);
            return Ok(None);
        }
        result.into_checked(&self.config.netsh).map(Some)
    }

    pub async fn add_rule(&self, rule: &FirewallRule) -> Result<ActionOutcome, ModuleError> {
        rule.validate()?;
        if self.get_rule(&rule.name).await?.is_some() {
            debug!("Firewall rule {} already present", rule.name);
            return Ok(ActionOutcome::Unchanged {
                reason: format!("rule '{}' already present", rule.name),
            });
        }

        let mut args = vec!["firewall".to_string(), "add".to_string(), "rule".to_string()];
        args.extend(rule.add_tokens());
        let output = self.runner.run_checked(&self.invocation(args)).await?;

        if is_ok(&output) || self.runner.is_dry_run() {
            info!("Firewall rule {} added", rule.name);
            Ok(ActionOutcome::Changed { output })
        } else {
            error!("firewall add_rule failed: {}", output);
            Ok(ActionOutcome::Unconfirmed { output })
        }
    }

    pub async fn delete_rule(&self, rule: &FirewallRule) -> Result<ActionOutcome, ModuleError> {
        rule.validate()?;
        if self.get_rule(&rule.name).await?.is_none() {
            debug!("Firewall rule {} already absent", rule.name);
            return Ok(ActionOutcome::Unchanged {
                reason: format!("rule '{}' already absent", rule.name),
            });
        }

        let mut args = vec!["firewall".to_string(), "delete".to_string(), "rule".to_string()];
        args.extend(rule.selector_tokens());
        let output = self.runner.run_checked(&self.invocation(args)).await?;

        if is_ok(&output) || self.runner.is_dry_run() {
            info!("Firewall rule {} deleted", rule.name);
            Ok(ActionOutcome::Changed { output })
        } else {
            error!("firewall delete_rule failed: {}", output);
            Ok(ActionOutcome::Unconfirmed { output })
        }
    }
}

const ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "get_config",
        description: "Enabled state of every firewall profile",
        required: &[],
    },
    ActionSpec {
        name: "enable",
        description: "Turn a profile on (default allprofiles)",
        required: &[],
    },
    ActionSpec {
        name: "disable",
        description: "Turn a profile off (default allprofiles)",
        required: &[],
    },
    ActionSpec {
        name: "get_rule",
        description: "Show a rule, or all rules",
        required: &[],
    },
    ActionSpec {
        name: "add_rule",
        description: "Add a rule unless one with the name exists",
        required: &["name"],
    },
    ActionSpec {
        name: "delete_rule",
        description: "Delete a rule if it exists",
        required: &["name"],
    },
];

#[async_trait]
impl ExecutionModule for FirewallModule {
    fn name(&self) -> &'static str {
        "win_firewall"
    }

    fn version(&self) -> &'static str {
        "1.0.0"
    }

    fn actions(&self) -> &'static [ActionSpec] {
        ACTIONS
    }

    async fn execute(&self, args: &ModuleArgs) -> Result<ModuleResult, ModuleError> {
        let profile = args
            .get_str("profile")
            .unwrap_or_else(|| "allprofiles".to_string());

        match args.action.as_str() {
            "get_config" => ModuleResult::value("profiles", &self.get_config().await?),
            "enable" => {
                let verdict = self.enable(&profile).await?;
                Ok(ModuleResult::verdict(verdict.ok, verdict.changed, verdict.output))
            }
            "disable" => {
                let verdict = self.disable(&profile).await?;
                Ok(ModuleResult::verdict(verdict.ok, verdict.changed, verdict.output))
            }
            "get_rule" => {
                let name = args.get_str("name").unwrap_or_else(|| "all".to_string());
                ModuleResult::value("rule", &self.get_rule(&name).await?)
            }
            "add_rule" => Ok(self.add_rule(&FirewallRule::from_args(args)?).await?.into()),
            "delete_rule" => Ok(self
                .delete_rule(&FirewallRule::from_args(args)?)
                .await?
                .into()),
            other => Err(ModuleError::UnsupportedAction {
                module: self.name().to_string(),
                action: other.to_string(),
            }),
        }
    }

    fn documentation(&self) -> ModuleDocumentation {
        ModuleDocumentation {
            description: "Configure Windows Firewall profiles and rules".to_string(),
            actions: ACTIONS.to_vec(),
            examples: vec![
                "win_firewall get_config".to_string(),
                "win_firewall add_rule -a name=test -a localport=8080 -a protocol=tcp".to_string(),
                "win_firewall add_rule -a name=ping -a protocol=icmpv4".to_string(),
                "win_firewall disable -a profile=publicprofile".to_string(),
            ],
        }
    }
}
