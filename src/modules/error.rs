use thiserror::Error;

/// Errors that can occur during module operations
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Unsupported action '{action}' for module {module}")]
    UnsupportedAction { module: String, action: String },

    #[error("Invalid arguments: {message}")]
    InvalidArgs { message: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command {program} exited with status {exit_code}: {output}")]
    CommandFailed {
        program: String,
        exit_code: i32,
        output: String,
    },

    #[error("Required tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("Unexpected output from {program}: {reason}")]
    UnexpectedOutput { program: String, reason: String },

    #[error("Script template error: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Module execution failed: {message}")]
    ExecutionFailed { message: String },
}

impl ModuleError {
    /// Captured tool output for execution failures.
    pub fn output(&self) -> Option<&str> {
        match self {
            ModuleError::CommandFailed { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// Errors raised while checking arguments, before any process is spawned
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required argument: {arg}")]
    MissingRequiredArg { arg: String },

    #[error("Invalid argument value: {arg} = {value} - {reason}")]
    InvalidArgValue {
        arg: String,
        value: String,
        reason: String,
    },
}

impl ValidationError {
    pub fn missing(arg: &str) -> Self {
        ValidationError::MissingRequiredArg {
            arg: arg.to_string(),
        }
    }

    pub fn invalid(arg: &str, value: impl ToString, reason: impl Into<String>) -> Self {
        ValidationError::InvalidArgValue {
            arg: arg.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<shell_words::ParseError> for ModuleError {
    fn from(err: shell_words::ParseError) -> Self {
        ModuleError::InvalidArgs {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ModuleError {
    fn from(err: serde_json::Error) -> Self {
        ModuleError::ExecutionFailed {
            message: format!("JSON serialization error: {err}"),
        }
    }
}

impl From<handlebars::RenderError> for ModuleError {
    fn from(err: handlebars::RenderError) -> Self {
        ModuleError::Template(err.to_string())
    }
}

impl From<handlebars::TemplateError> for ModuleError {
    fn from(err: handlebars::TemplateError) -> Self {
        ModuleError::Template(err.to_string())
    }
}

impl From<serde_yaml::Error> for ModuleError {
    fn from(err: serde_yaml::Error) -> Self {
        ModuleError::Configuration(err.to_string())
    }
}
