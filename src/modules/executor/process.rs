//! tokio-backed command runner

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::modules::{
    error::ModuleError,
    executor::{
        decode_output, CommandRunner, ExecutionOutput, Interpreter, Invocation, InvocationKind,
    },
};

/// Spawns real child processes
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    powershell: String,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self {
            powershell: "powershell".to_string(),
        }
    }

    pub fn with_powershell(mut self, program: impl Into<String>) -> Self {
        self.powershell = program.into();
        self
    }

    fn build_command(&self, invocation: &Invocation) -> Result<Command, ModuleError> {
        let cmd = match &invocation.kind {
            InvocationKind::Program(tokens) => {
                let (program, args) =
                    tokens
                        .split_first()
                        .ok_or_else(|| ModuleError::InvalidArgs {
                            message: "Empty command".to_string(),
                        })?;
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
            InvocationKind::Script {
                interpreter: Interpreter::Cmd,
                script,
            } => {
                let line = match invocation.code_page {
                    Some(code_page) if cfg!(windows) => {
                        format!("chcp {code_page} > nul & {script}")
                    }
                    _ => script.clone(),
                };
                shell_command(&line)
            }
            InvocationKind::Script {
                interpreter: Interpreter::PowerShell,
                script,
            } => {
                let mut cmd = Command::new(&self.powershell);
                cmd.args(["-NoProfile", "-NonInteractive", "-Command", script]);
                cmd
            }
        };
        Ok(cmd)
    }
}

#[cfg(windows)]
fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/D", "/S", "/C"]);
    cmd.raw_arg(format!("\"{line}\""));
    cmd
}

#[cfg(not(windows))]
fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", line]);
    cmd
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ExecutionOutput, ModuleError> {
        let program = invocation.program_name();
        let mut cmd = self.build_command(invocation)?;

        if let Some(dir) = &invocation.current_dir {
            cmd.current_dir(dir);
        }

        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        debug!("Running: {}", invocation.command_line());

        let mut child = cmd.spawn().map_err(|source| ModuleError::Spawn {
            program: program.clone(),
            source,
        })?;

        if let Some(payload) = &invocation.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                // A child that exits without reading closes the pipe early
                if let Err(e) = stdin.write_all(payload).await {
                    debug!("Writing stdin to {} failed: {}", program, e);
                }
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| ModuleError::Spawn {
                program: program.clone(),
                source,
            })?;

        let mut merged = output.stdout;
        merged.extend_from_slice(&output.stderr);

        let exit_code = output.status.code().unwrap_or(-1);
        debug!("{} exited with status {}", program, exit_code);

        Ok(ExecutionOutput {
            output: decode_output(&merged, invocation.code_page),
            exit_code,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_succeeds() {
        let runner = ProcessRunner::new();
        let result = runner
            .run(&Invocation::program(["echo", "ok"]))
            .await
            .unwrap();

        assert_eq!(result.output.trim(), "ok");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_failure_carries_output() {
        let runner = ProcessRunner::new();
        let invocation =
            Invocation::program(["sh", "-c", "echo 'bad thing happened'; exit 1"]);

        let err = runner.run_checked(&invocation).await.unwrap_err();
        match err {
            ModuleError::CommandFailed {
                exit_code, output, ..
            } => {
                assert_eq!(exit_code, 1);
                assert_eq!(output.trim(), "bad thing happened");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stderr_is_merged() {
        let runner = ProcessRunner::new();
        let invocation = Invocation::program(["sh", "-c", "echo out; echo err >&2"]);

        let result = runner.run(&invocation).await.unwrap();
        assert!(result.output.contains("out"));
        assert!(result.output.contains("err"));
    }

    #[tokio::test]
    async fn test_stdin_payload_is_delivered_and_closed() {
        let runner = ProcessRunner::new();
        let invocation = Invocation::program(["cat"]).with_stdin(b"secret\n".to_vec());

        let result = runner.run(&invocation).await.unwrap();
        assert_eq!(result.output, "secret\n");
        assert!(result.success());
    }

    #[tokio::test]
    async fn test_no_stdin_does_not_hang() {
        let runner = ProcessRunner::new();
        let result = runner.run(&Invocation::program(["cat"])).await.unwrap();
        assert_eq!(result.output, "");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let runner = ProcessRunner::new();
        let err = runner
            .run(&Invocation::program(["definitely-not-a-real-tool-xyz"]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ModuleError::Spawn { ref program, .. } if program == "definitely-not-a-real-tool-xyz"
        ));
    }

    #[tokio::test]
    async fn test_empty_program_rejected() {
        let runner = ProcessRunner::new();
        let tokens: Vec<String> = Vec::new();
        let err = runner.run(&Invocation::program(tokens)).await.unwrap_err();
        assert!(matches!(err, ModuleError::InvalidArgs { .. }));
    }

    #[tokio::test]
    async fn test_console_script_and_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new();
        let invocation = Invocation::console(["pwd"]).in_dir(dir.path());

        let result = runner.run(&invocation).await.unwrap();
        let reported = std::path::PathBuf::from(result.output.trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }
}
