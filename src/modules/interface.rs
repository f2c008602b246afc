//! Module interface traits and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::modules::error::{ModuleError, ValidationError};

/// Unified interface for all adapter modules
#[async_trait]
pub trait ExecutionModule: Send + Sync {
    /// Module name (e.g., "win_iis", "svn")
    fn name(&self) -> &'static str;

    /// Module version
    fn version(&self) -> &'static str;

    /// Actions this module understands, with their required arguments
    fn actions(&self) -> &'static [ActionSpec];

    /// Execute one action. Arguments have already been validated.
    async fn execute(&self, args: &ModuleArgs) -> Result<ModuleResult, ModuleError>;

    /// Validate module arguments before anything is spawned
    fn validate_args(&self, args: &ModuleArgs) -> Result<(), ValidationError> {
        let spec = self
            .actions()
            .iter()
            .find(|spec| spec.name == args.action)
            .ok_or_else(|| {
                ValidationError::invalid(
                    "action",
                    &args.action,
                    format!("unknown for {}", self.name()),
                )
            })?;

        for required in spec.required {
            match args.args.get(*required) {
                None | Some(serde_json::Value::Null) => {
                    return Err(ValidationError::missing(required))
                }
                Some(serde_json::Value::String(s)) if s.is_empty() => {
                    return Err(ValidationError::missing(required))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Get module documentation
    fn documentation(&self) -> ModuleDocumentation;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub required: &'static [&'static str],
}

/// Module execution arguments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleArgs {
    pub action: String,
    /// Direct module arguments
    pub args: HashMap<String, serde_json::Value>,
}

impl ModuleArgs {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            args: HashMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.args.insert(key.to_string(), value.into());
        self
    }

    /// String argument; numbers and booleans are accepted in text form.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.args.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn require_str(&self, key: &str) -> Result<String, ValidationError> {
        self.get_str(key)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ValidationError::missing(key))
    }

    pub fn get_u32(&self, key: &str) -> Result<Option<u32>, ValidationError> {
        let Some(value) = self.args.get(key) else {
            return Ok(None);
        };

        let parsed = match value {
            serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            serde_json::Value::Null => return Ok(None),
            _ => None,
        };

        parsed
            .map(Some)
            .ok_or_else(|| ValidationError::invalid(key, value, "expected a non-negative integer"))
    }

    pub fn get_u8(&self, key: &str) -> Result<Option<u8>, ValidationError> {
        match self.get_u32(key)? {
            Some(n) => u8::try_from(n)
                .map(Some)
                .map_err(|_| ValidationError::invalid(key, n, "out of range")),
            None => Ok(None),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ValidationError> {
        let Some(value) = self.args.get(key) else {
            return Ok(None);
        };

        let parsed = match value {
            serde_json::Value::Bool(b) => Some(*b),
            serde_json::Value::Number(n) => match n.as_u64() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            },
            serde_json::Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            serde_json::Value::Null => return Ok(None),
            _ => None,
        };

        parsed
            .map(Some)
            .ok_or_else(|| ValidationError::invalid(key, value, "expected a boolean"))
    }
}

/// Result of a mutating operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The mutating command ran (and any post-check confirmed it)
    Changed { output: String },
    /// A pre-check showed the desired state already holds
    Unchanged { reason: String },
    /// The target does not exist; nothing was run
    Missing { resource: String },
    /// The command ran but the post-check did not observe the change
    Unconfirmed { output: String },
}

impl ActionOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(
            self,
            ActionOutcome::Changed { .. } | ActionOutcome::Unchanged { .. }
        )
    }

    pub fn changed(&self) -> bool {
        matches!(
            self,
            ActionOutcome::Changed { .. } | ActionOutcome::Unconfirmed { .. }
        )
    }
}

/// Module execution result
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModuleResult {
    pub changed: bool,
    pub failed: bool,
    pub msg: Option<String>,
    pub stdout: Option<String>,
    pub rc: Option<i32>,
    pub results: HashMap<String, serde_json::Value>,
}

impl ModuleResult {
    /// Raw tool output from a read-only query.
    pub fn output(stdout: String) -> Self {
        Self {
            stdout: Some(stdout),
            rc: Some(0),
            ..Self::default()
        }
    }

    /// Parsed value from a read-only query.
    pub fn value<T: Serialize>(key: &str, value: &T) -> Result<Self, ModuleError> {
        let mut result = Self {
            rc: Some(0),
            ..Self::default()
        };
        result
            .results
            .insert(key.to_string(), serde_json::to_value(value)?);
        Ok(result)
    }

    /// Acknowledged state change. `changed` is only reported when the
    /// command both ran and was acknowledged.
    pub fn verdict(ok: bool, changed: bool, stdout: String) -> Self {
        Self {
            changed: ok && changed,
            failed: !ok,
            stdout: Some(stdout),
            rc: Some(0),
            ..Self::default()
        }
    }
}

impl From<ActionOutcome> for ModuleResult {
    fn from(outcome: ActionOutcome) -> Self {
        let changed = outcome.changed();
        let failed = !outcome.succeeded();
        let (msg, stdout) = match &outcome {
            ActionOutcome::Changed { output } => (None, Some(output.clone())),
            ActionOutcome::Unchanged { reason } => (Some(reason.clone()), None),
            ActionOutcome::Missing { resource } => {
                (Some(format!("{resource} does not exist")), None)
            }
            ActionOutcome::Unconfirmed { output } => (
                Some("change was not observed after running the command".to_string()),
                Some(output.clone()),
            ),
        };

        let mut results = HashMap::new();
        if let Ok(value) = serde_json::to_value(&outcome) {
            results.insert("outcome".to_string(), value);
        }

        Self {
            changed,
            failed,
            msg,
            stdout,
            rc: Some(0),
            results,
        }
    }
}

/// Module documentation
#[derive(Debug, Clone)]
pub struct ModuleDocumentation {
    pub description: String,
    pub actions: Vec<ActionSpec>,
    pub examples: Vec<String>,
}
