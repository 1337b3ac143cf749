use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::iteration_types::IterationId;
use crate::logger::{sanitize_log_value, Logger};

#[derive(Debug, Clone)]
pub(crate) struct CommandEnv {
    pub(crate) cwd: Option<PathBuf>,
    pub(crate) config_path: String,
    pub(crate) iteration_id: Option<IterationId>,
}

impl CommandEnv {
    pub(crate) fn apply(&self, cmd: &mut Command) {
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd.env("RALPH_CONFIG_PATH", &self.config_path);
        match self.iteration_id {
            Some(id) => {
                cmd.env("RALPH_ITERATION_ID", id.to_string());
            }
            None => {
                cmd.env_remove("RALPH_ITERATION_ID");
            }
        }
    }
}

/// Runs one external command to completion and reports its exit code.
/// `Err` means the command could not be started at all.
pub(crate) trait CommandRunner {
    fn run(&mut self, command: &str, env: &CommandEnv, logger: &Logger) -> Result<i32, String>;
}

/// Runs commands through `bash -lc` with the terminal's stdio attached.
#[derive(Debug, Default)]
pub(crate) struct ShellCommandRunner;

impl CommandRunner for ShellCommandRunner {
    fn run(&mut self, command: &str, env: &CommandEnv, logger: &Logger) -> Result<i32, String> {
        run_shell_command_status(command, env, logger)
    }
}

pub(crate) fn run_shell_command_status(
    command: &str,
    env: &CommandEnv,
    logger: &Logger,
) -> Result<i32, String> {
    let iteration = env
        .iteration_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "none".to_string());

    logger.log_transition(&format!(
        "cmd start iteration={} mode=bash_lc command={}",
        iteration,
        sanitize_log_value(command)
    ));

    let mut cmd = Command::new("bash");
    cmd.arg("-lc").arg(command);
    cmd.stdin(Stdio::inherit());
    cmd.stdout(Stdio::inherit());
    cmd.stderr(Stdio::inherit());
    env.apply(&mut cmd);
    let status = cmd.status().map_err(|err| {
        logger.log_transition(&format!(
            "cmd spawn_failed iteration={} err={}",
            iteration,
            sanitize_log_value(&err.to_string())
        ));
        format!("Failed to run command '{}': {}", command, err)
    })?;

    // Killed by a signal: no code, report as a plain failure.
    let exit_code = status.code().unwrap_or(1);
    logger.log_transition(&format!(
        "cmd exit iteration={} exit={}",
        iteration, exit_code
    ));

    Ok(exit_code)
}
