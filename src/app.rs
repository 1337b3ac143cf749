use clap::Parser;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cli::{AppMode, Cli};
use crate::config::{
    emit_config_warnings, load_config, load_validate_settings, ValidateSettings,
    DEFAULT_CONFIG_PATH,
};
use crate::loader::load_records;
use crate::logger::Logger;
use crate::run_loop::{quit, run_loop, run_once, Quit, RuntimeState, Sleeper, ThreadSleeper};
use crate::shell::{CommandRunner, ShellCommandRunner};
use crate::validate::validate;

fn resolve_config_path(flag: Option<PathBuf>) -> (PathBuf, bool) {
    match flag {
        Some(path) => (path, true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    }
}

fn missing_config(config_path: &Path) -> Quit {
    eprintln!("Missing config file: {}", config_path.display());
    Quit {
        code: 1,
        reason: format!("missing_config:{}", config_path.display()),
    }
}

fn validate_settings(config_path: &Path, explicit: bool) -> Result<ValidateSettings, Quit> {
    if !config_path.is_file() {
        if explicit {
            return Err(missing_config(config_path));
        }
        return Ok(ValidateSettings::default());
    }
    load_validate_settings(config_path).map_err(|message| {
        eprintln!("{}", message);
        Quit {
            code: 1,
            reason: message,
        }
    })
}

pub(crate) fn run_validate(config_path: &Path, explicit: bool) -> Result<(), Quit> {
    let settings = validate_settings(config_path, explicit)?;
    let logger = Logger::new(settings.log_path.clone());

    let loaded = load_records(&settings.iterations_dir).map_err(|message| {
        logger.diagnostic("records_unavailable", &message);
        quit(&logger, &message, 1)
    })?;
    for error in &loaded.parse_errors {
        logger.diagnostic("parse_error", error);
    }
    if loaded.records.is_empty() {
        logger.status("validate", "No iteration files found to validate.");
        logger.log_transition("validate records=0 diagnostics=0");
        return Ok(());
    }

    let report = validate(&loaded.records);
    for diagnostic in &report.diagnostics {
        logger.diagnostic("invalid_record", diagnostic);
    }
    logger.log_transition(&format!(
        "validate records={} diagnostics={}",
        loaded.records.len(),
        report.diagnostics.len()
    ));
    if !report.ok() {
        return Err(quit(
            &logger,
            &format!("validation_failed:{}", report.diagnostics.len()),
            1,
        ));
    }
    logger.status("validate", "All iteration files are valid.");
    Ok(())
}

fn install_interrupt_handler() -> Arc<AtomicBool> {
    let interrupt_flag = Arc::new(AtomicBool::new(false));
    if let Err(err) = ctrlc::set_handler({
        let interrupt_flag = Arc::clone(&interrupt_flag);
        move || {
            interrupt_flag.store(true, Ordering::SeqCst);
        }
    }) {
        eprintln!("Failed to set interrupt handler: {}", err);
    }
    interrupt_flag
}

fn run_with_cli_impl<R, S>(cli: Cli, runner: &mut R, sleeper: &mut S) -> Result<(), Quit>
where
    R: CommandRunner,
    S: Sleeper,
{
    let mode = cli.mode();
    let (config_path, explicit) = resolve_config_path(cli.config);

    if mode == AppMode::Validate {
        return run_validate(&config_path, explicit);
    }

    if !config_path.is_file() {
        return Err(missing_config(&config_path));
    }
    let loaded = load_config(&config_path).map_err(|message| {
        eprintln!("{}", message);
        Quit {
            code: 1,
            reason: message,
        }
    })?;

    let logger = Logger::new(loaded.config.log_path.clone());
    logger.log_transition(&format!(
        "run_start mode={} config={} iterations_dir={}",
        mode.as_str(),
        config_path.display(),
        loaded.config.iterations_dir.display()
    ));
    emit_config_warnings(&logger, &loaded.warnings);

    let mut state = RuntimeState {
        config: loaded.config,
        config_path,
        logger,
        interrupt_flag: install_interrupt_handler(),
        cycles: 0,
    };

    match mode {
        AppMode::Once => run_once(&mut state, runner),
        _ => run_loop(&mut state, runner, sleeper),
    }
}

pub(crate) fn run_with_cli(cli: Cli) -> Result<(), Quit> {
    run_with_cli_impl(cli, &mut ShellCommandRunner, &mut ThreadSleeper::default())
}

#[cfg(test)]
pub(crate) fn run_with_cli_for_test<R, S>(cli: Cli, runner: &mut R, sleeper: &mut S) -> Result<(), Quit>
where
    R: CommandRunner,
    S: Sleeper,
{
    run_with_cli_impl(cli, runner, sleeper)
}

pub(crate) fn run_with_args(args: Vec<OsString>) -> Result<(), Quit> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            // Render the clap error ourselves so it goes through captured stdio.
            eprintln!("{err}");
            return Err(Quit {
                code: err.exit_code(),
                reason: "cli_parse".to_string(),
            });
        }
    };
    run_with_cli(cli)
}

pub(crate) fn main_with_args(args: Vec<OsString>) -> ExitCode {
    match run_with_args(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(quit) => quit.exit_code(),
    }
}

pub(crate) fn main() -> ExitCode {
    main_with_args(env::args_os().collect())
}
