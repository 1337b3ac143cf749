use std::process::ExitCode;

mod app;
mod cli;
mod config;
mod iteration_types;
mod loader;
mod logger;
mod run_loop;
mod select;
mod shell;
mod validate;


fn main() -> ExitCode {
    app::main()
}
