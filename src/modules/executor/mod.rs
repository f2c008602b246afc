//! Command executor shared by every adapter
//!
//! An [`Invocation`] describes one external command: either a token list
//! (program first) or a script handed to an interpreter. A [`CommandRunner`]
//! spawns exactly one child per invocation, waits for it, and hands back the
//! merged stdout/stderr text together with the exit status.

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

use crate::modules::error::ModuleError;

pub mod encoding;
pub mod process;
pub mod recording;

pub use encoding::decode_output;
pub use process::ProcessRunner;
pub use recording::RecordingRunner;

/// Interpreter for script invocations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Interpreter {
    /// Native shell (`cmd /C` on Windows, `sh -c` elsewhere)
    Cmd,
    PowerShell,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum InvocationKind {
    Program(Vec<String>),
    Script {
        interpreter: Interpreter,
        script: String,
    },
}

/// One external command, built fresh for every call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub kind: InvocationKind,
    /// Bytes written to the child's stdin before it is awaited. The pipe is
    /// closed after the write.
    #[serde(skip)]
    pub stdin: Option<Vec<u8>>,
    /// Console code page the tool emits in. For native shell scripts this
    /// also prefixes a `chcp` segment.
    pub code_page: Option<u16>,
    pub current_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn program<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_kind(InvocationKind::Program(
            tokens.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn script(interpreter: Interpreter, script: impl Into<String>) -> Self {
        Self::from_kind(InvocationKind::Script {
            interpreter,
            script: script.into(),
        })
    }

    pub fn powershell(script: impl Into<String>) -> Self {
        Self::script(Interpreter::PowerShell, script)
    }

    /// Token list run through the native shell, so that a code page prefix
    /// can be chained in front of it.
    pub fn console<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::script(Interpreter::Cmd, join_cmd_line(tokens))
    }

    fn from_kind(kind: InvocationKind) -> Self {
        Self {
            kind,
            stdin: None,
            code_page: None,
            current_dir: None,
        }
    }

    pub fn with_stdin(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    pub fn with_code_page(mut self, code_page: u16) -> Self {
        self.code_page = Some(code_page);
        self
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Name used in logs and error messages.
    pub fn program_name(&self) -> String {
        match &self.kind {
            InvocationKind::Program(tokens) => tokens.first().cloned().unwrap_or_default(),
            InvocationKind::Script {
                interpreter: Interpreter::PowerShell,
                ..
            } => "powershell".to_string(),
            InvocationKind::Script { script, .. } => script
                .split_whitespace()
                .next()
                .unwrap_or("cmd")
                .to_string(),
        }
    }

    /// Human readable rendering of the command line.
    pub fn command_line(&self) -> String {
        match &self.kind {
            InvocationKind::Program(tokens) => join_argv_line(tokens),
            InvocationKind::Script { script, .. } => script.clone(),
        }
    }
}

/// Merged output and exit status of one child process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionOutput {
    pub output: String,
    pub exit_code: i32,
}

impl ExecutionOutput {
    pub fn new(output: impl Into<String>, exit_code: i32) -> Self {
        Self {
            output: output.into(),
            exit_code,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Exit status 0 is the only success; anything else becomes
    /// [`ModuleError::CommandFailed`] carrying the captured output.
    pub fn into_checked(self, program: impl Into<String>) -> Result<String, ModuleError> {
        if self.success() {
            Ok(self.output)
        } else {
            Err(ModuleError::CommandFailed {
                program: program.into(),
                exit_code: self.exit_code,
                output: self.output,
            })
        }
    }
}

/// Runs invocations to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Spawn the invocation, wait for it and report output plus exit code.
    /// A non-zero exit is not an error at this level.
    async fn run(&self, invocation: &Invocation) -> Result<ExecutionOutput, ModuleError>;

    /// Like [`run`](Self::run) but maps a non-zero exit to an error.
    async fn run_checked(&self, invocation: &Invocation) -> Result<String, ModuleError> {
        let result = self.run(invocation).await?;
        result.into_checked(invocation.program_name())
    }

    /// True when invocations are recorded but never run. Queries then answer
    /// with empty output and no command has an observable effect.
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Quote a token so that `CommandLineToArgvW` splits it back unchanged.
///
/// Tokens are wrapped only when they are empty or hold whitespace or a shell
/// metacharacter. Backslashes are doubled in front of a quote and at the end.
pub fn quote_argv_token(token: &str) -> String {
    let needs_quotes = token.is_empty()
        || token
            .chars()
            .any(|c| {
                c.is_whitespace() || matches!(c, '&' | '|' | '<' | '>' | '^' | '(' | ')' | '"')
            });

    if !needs_quotes {
        return token.to_string();
    }

    let mut quoted = String::with_capacity(token.len() + 2);
    quoted.push('"');
    let mut backslashes = 0;
    for c in token.chars() {
        if c == '\\' {
            backslashes += 1;
            continue;
        }
        let run = if c == '"' { backslashes * 2 + 1 } else { backslashes };
        quoted.push_str(&"\\".repeat(run));
        quoted.push(c);
        backslashes = 0;
    }
    quoted.push_str(&"\\".repeat(backslashes * 2));
    quoted.push('"');
    quoted
}

/// Quote a token for a `cmd /S /C` command line.
///
/// cmd.exe does not honour `\"`, so a token holding `"` would end cmd's
/// quoted region early, and `%VAR%` expands even inside quotes. Such tokens
/// get every cmd metacharacter caret-escaped on top of the argv quoting.
pub fn quote_cmd_token(token: &str) -> String {
    let quoted = quote_argv_token(token);
    if !token.contains(|c| matches!(c, '"' | '%')) {
        return quoted;
    }

    let mut escaped = String::with_capacity(quoted.len() * 2);
    for c in quoted.chars() {
        if matches!(c, '^' | '&' | '|' | '<' | '>' | '(' | ')' | '"' | '%') {
            escaped.push('^');
        }
        escaped.push(c);
    }
    escaped
}

/// Program command line without any shell in between.
pub fn join_argv_line<I, S>(tokens: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens
        .into_iter()
        .map(|t| quote_argv_token(t.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn join_cmd_line<I, S>(tokens: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens
        .into_iter()
        .map(|t| quote_cmd_token(t.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_success_returns_output() {
        let result = ExecutionOutput::new("ok", 0).into_checked("echo");
        assert_eq!(result.unwrap(), "ok");
    }

    #[test]
    fn test_checked_failure_carries_output() {
        let err = ExecutionOutput::new("bad thing happened", 1)
            .into_checked("false-tool")
            .unwrap_err();

        assert_eq!(err.output(), Some("bad thing happened"));
        assert!(err.to_string().contains("bad thing happened"));
        assert!(err.to_string().contains("false-tool"));
    }

    #[test]
    fn test_quote_cmd_token() {
        assert_eq!(quote_cmd_token("plain"), "plain");
        assert_eq!(quote_cmd_token("C:\\Program Files\\x"), "\"C:\\Program Files\\x\"");
        assert_eq!(quote_cmd_token("a|b"), "\"a|b\"");
        assert_eq!(quote_cmd_token(""), "\"\"");
        assert_eq!(quote_cmd_token("say \"hi\""), "^\"say \\^\"hi\\^\"^\"");
        assert_eq!(quote_cmd_token("%PATH%"), "^%PATH^%");
    }

    #[test]
    fn test_quote_argv_token_backslashes() {
        assert_eq!(quote_argv_token("C:\\my dir\\"), "\"C:\\my dir\\\\\"");
        assert_eq!(quote_argv_token("a\\\"b c"), "\"a\\\\\\\"b c\"");
        assert_eq!(quote_argv_token("C:\\wc"), "C:\\wc");
    }

    /// Operators cmd.exe would act on: outside quotes and not caret-escaped.
    fn cmd_operators(line: &str) -> Vec<char> {
        let mut found = Vec::new();
        let mut quoted = false;
        let mut chars = line.chars();
        while let Some(c) = chars.next() {
            match c {
                '^' if !quoted => {
                    chars.next();
                }
                '"' => quoted = !quoted,
                '&' | '|' | '<' | '>' if !quoted => found.push(c),
                '%' => found.push(c),
                _ => {}
            }
        }
        found
    }

    #[test]
    fn test_embedded_quote_cannot_reach_cmd_operators() {
        let line = join_cmd_line(["svn", "commit", "-m", "x\" & whoami & \"", "C:\\wc"]);

        assert_eq!(
            line,
            "svn commit -m ^\"x\\^\" ^& whoami ^& \\^\"^\" C:\\wc"
        );
        assert!(cmd_operators(&line).is_empty());
        assert!(cmd_operators(&join_cmd_line(["echo", "50% & %USERNAME%"])).is_empty());
        assert!(cmd_operators(&join_cmd_line(["echo", "a & b|c"])).is_empty());
    }

    #[test]
    fn test_console_invocation_joins_tokens() {
        let invocation = Invocation::console(["netsh", "advfirewall", "set", "allprofiles"]);
        assert_eq!(
            invocation.kind,
            InvocationKind::Script {
                interpreter: Interpreter::Cmd,
                script: "netsh advfirewall set allprofiles".to_string(),
            }
        );
        assert_eq!(invocation.program_name(), "netsh");
    }

    #[test]
    fn test_program_name() {
        assert_eq!(Invocation::program(["svn", "info"]).program_name(), "svn");
        assert_eq!(
            Invocation::powershell("Get-Service").program_name(),
            "powershell"
        );
    }
}
