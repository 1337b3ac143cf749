use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "ralph",
    about = "Ralph runs your iteration plan one approved step at a time.",
    long_about = "Ralph reads iteration records (iterations/*.json), runs the configured agent command for the next pending iteration, and then waits for a human to approve the result before moving on.\n\nThe command template comes from ralph.yml; {{iterationId}} is replaced with the selected iteration number."
)]
pub(crate) struct Cli {
    /// Load configuration from PATH instead of ./ralph.yml.
    #[arg(
        short = 'c',
        long = "config",
        value_name = "PATH",
        help = "Load configuration from PATH instead of ./ralph.yml."
    )]
    pub(crate) config: Option<PathBuf>,

    /// Check every iteration record and exit.
    #[arg(
        long = "validate",
        conflicts_with = "once",
        help = "Check every iteration record and exit non-zero on any violation."
    )]
    pub(crate) validate: bool,

    /// Run a single polling cycle without sleeping, then exit.
    #[arg(
        long = "once",
        help = "Run a single polling cycle without sleeping, then exit."
    )]
    pub(crate) once: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AppMode {
    Run,
    Once,
    Validate,
}

impl AppMode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Once => "once",
            Self::Validate => "validate",
        }
    }
}

impl Cli {
    pub(crate) fn mode(&self) -> AppMode {
        if self.validate {
            AppMode::Validate
        } else if self.once {
            AppMode::Once
        } else {
            AppMode::Run
        }
    }
}
