use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{emit_config_warnings, load_config, Config};
use crate::iteration_types::IterationId;
use crate::loader::load_records;
use crate::logger::{sanitize_log_value, Logger};
use crate::select::{select_action, Action};
use crate::shell::{CommandEnv, CommandRunner};

const SLEEP_SLICE: Duration = Duration::from_millis(250);

#[derive(Debug)]
pub(crate) struct RuntimeState {
    pub(crate) config: Config,
    pub(crate) config_path: PathBuf,
    pub(crate) logger: Logger,
    pub(crate) interrupt_flag: Arc<AtomicBool>,
    pub(crate) cycles: u64,
}

#[derive(Debug)]
pub(crate) struct Quit {
    pub(crate) code: i32,
    #[allow(dead_code)]
    pub(crate) reason: String,
}

impl Quit {
    pub(crate) fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code as u8)
    }
}

pub(crate) fn quit(logger: &Logger, reason: &str, code: i32) -> Quit {
    let sanitized = if reason.trim().is_empty() {
        "unknown".to_string()
    } else {
        sanitize_log_value(reason)
    };
    logger.log_transition(&format!("quit reason={}", sanitized));
    Quit {
        code,
        reason: reason.to_string(),
    }
}

/// What a single polling cycle ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CycleOutcome {
    Idle,
    WaitingForApproval(IterationId),
    Ran {
        iteration: IterationId,
        exit_code: i32,
    },
    RunFailed {
        iteration: IterationId,
        error: String,
    },
    Skipped(String),
}

pub(crate) trait Sleeper {
    /// Blocks for `duration`, returning early once `interrupt` is set.
    fn sleep(&mut self, duration: Duration, interrupt: &AtomicBool);
}

#[derive(Debug)]
pub(crate) struct ThreadSleeper {
    slice: Duration,
}

impl Default for ThreadSleeper {
    fn default() -> Self {
        Self { slice: SLEEP_SLICE }
    }
}

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration, interrupt: &AtomicBool) {
        // An interval too large for the clock has no deadline; only the
        // interrupt ends it.
        let deadline = Instant::now().checked_add(duration);
        loop {
            if interrupt.load(Ordering::SeqCst) {
                return;
            }
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return;
                    }
                    deadline - now
                }
                None => self.slice,
            };
            thread::sleep(remaining.min(self.slice));
        }
    }
}

fn check_interrupted(state: &RuntimeState) -> Result<(), Quit> {
    if state.interrupt_flag.load(Ordering::SeqCst) {
        return Err(quit(&state.logger, "interrupted", 130));
    }
    Ok(())
}

/// Re-reads the config file. On failure the previous config stays active.
fn reload_config(state: &mut RuntimeState) {
    match load_config(&state.config_path) {
        Ok(loaded) => {
            if loaded.config != state.config {
                state.logger.log_transition(&format!(
                    "config_reloaded path={}",
                    state.config_path.display()
                ));
                emit_config_warnings(&state.logger, &loaded.warnings);
                state.config = loaded.config;
            }
        }
        Err(message) => {
            state.logger.diagnostic(
                "config_reload_failed",
                &format!("Warning: {}; keeping the previous configuration.", message),
            );
        }
    }
}

fn run_iteration<R: CommandRunner>(
    state: &RuntimeState,
    runner: &mut R,
    iteration: IterationId,
) -> CycleOutcome {
    let command = state.config.render_command(iteration);
    state.logger.status("run", &format!("Running: {}", command));
    let env = CommandEnv {
        cwd: None,
        config_path: state.config_path.display().to_string(),
        iteration_id: Some(iteration),
    };
    match runner.run(&command, &env, &state.logger) {
        Ok(0) => {
            state
                .logger
                .log_transition(&format!("iteration_finished iteration={}", iteration));
            CycleOutcome::Ran {
                iteration,
                exit_code: 0,
            }
        }
        Ok(exit_code) => {
            state.logger.diagnostic(
                "iteration_failed",
                &format!(
                    "Error running iteration {}: command exited with code {}",
                    iteration, exit_code
                ),
            );
            CycleOutcome::Ran {
                iteration,
                exit_code,
            }
        }
        Err(error) => {
            state.logger.diagnostic(
                "iteration_failed",
                &format!("Error running iteration {}: {}", iteration, error),
            );
            CycleOutcome::RunFailed { iteration, error }
        }
    }
}

/// One polling cycle: reload config, load records, select, dispatch.
/// Command failures are reported in the outcome and never abort the caller.
pub(crate) fn poll_once<R: CommandRunner>(state: &mut RuntimeState, runner: &mut R) -> CycleOutcome {
    state.cycles += 1;
    state
        .logger
        .log_transition(&format!("cycle start n={}", state.cycles));
    reload_config(state);

    let loaded = match load_records(&state.config.iterations_dir) {
        Ok(loaded) => loaded,
        Err(message) => {
            state.logger.diagnostic("records_unavailable", &message);
            return CycleOutcome::Skipped(message);
        }
    };
    for error in &loaded.parse_errors {
        state.logger.diagnostic("parse_error", error);
    }

    let records = loaded.iteration_records();
    for record in &records {
        state.logger.log_transition(&format!(
            "record name={} iteration={} state={}",
            record.name, record.iteration, record.lifecycle
        ));
    }
    let action = select_action(&records);
    state.logger.log_transition(&format!("select {}", action));

    match action {
        Action::Idle => {
            if loaded.records.is_empty() {
                state.logger.status("idle", "No iterations folder or files found.");
            } else {
                state.logger.status("idle", "No pending iterations found.");
            }
            CycleOutcome::Idle
        }
        Action::WaitForApproval(iteration) => {
            state.logger.status(
                "wait",
                &format!(
                    "Iteration {} is completed but not yet approved. Waiting for review.",
                    iteration
                ),
            );
            CycleOutcome::WaitingForApproval(iteration)
        }
        Action::RunIteration(iteration) => run_iteration(state, runner, iteration),
    }
}

/// Polls forever, sleeping between cycles. Only an interrupt ends the loop,
/// so this returns `Err` with exit code 130.
pub(crate) fn run_loop<R: CommandRunner, S: Sleeper>(
    state: &mut RuntimeState,
    runner: &mut R,
    sleeper: &mut S,
) -> Result<(), Quit> {
    loop {
        check_interrupted(state)?;
        poll_once(state, runner);
        check_interrupted(state)?;

        let interval = state.config.poll_interval_secs;
        state
            .logger
            .status("sleep", &format!("Next check in {}.", interval));
        sleeper.sleep(interval.duration(), &state.interrupt_flag);
    }
}

/// A single cycle without sleeping. Fails when the iteration command failed.
pub(crate) fn run_once<R: CommandRunner>(state: &mut RuntimeState, runner: &mut R) -> Result<(), Quit> {
    check_interrupted(state)?;
    match poll_once(state, runner) {
        CycleOutcome::Ran {
            iteration,
            exit_code,
        } if exit_code != 0 => Err(quit(
            &state.logger,
            &format!("iteration_failed:{} exit={}", iteration, exit_code),
            1,
        )),
        CycleOutcome::RunFailed { iteration, error } => Err(quit(
            &state.logger,
            &format!("iteration_failed:{} err={}", iteration, error),
            1,
        )),
        CycleOutcome::Skipped(message) => Err(quit(&state.logger, &message, 1)),
        _ => Ok(()),
    }
}
