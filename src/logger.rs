use chrono::{SecondsFormat, Utc};
use std::cell::RefCell;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// State of the transition log file. The file is opened on first use and
/// kept open; after any I/O error the log stays off for the rest of the run.
#[derive(Debug)]
enum LogFile {
    Pending(PathBuf),
    Open { path: PathBuf, file: fs::File },
    Failed,
}

/// The single place console output and the transition log meet. Status and
/// diagnostic lines are printed and recorded together so the log tells the
/// same story the terminal did.
#[derive(Debug)]
pub(crate) struct Logger {
    file: Option<RefCell<LogFile>>,
}

impl Logger {
    pub(crate) fn new(path: Option<PathBuf>) -> Self {
        Self {
            file: path.map(|path| RefCell::new(LogFile::Pending(path))),
        }
    }

    /// Prints `message` on stdout and records it as `EVENT msg=MESSAGE`.
    pub(crate) fn status(&self, event: &str, message: &str) {
        println!("{}", message);
        self.log_transition(&format!("{} msg={}", event, message));
    }

    /// Prints `message` on stderr and records it as `EVENT msg=MESSAGE`.
    pub(crate) fn diagnostic(&self, event: &str, message: &str) {
        eprintln!("{}", message);
        self.log_transition(&format!("{} msg={}", event, message));
    }

    /// Records a log-only transition. A no-op without a log path.
    pub(crate) fn log_transition(&self, message: &str) {
        let Some(cell) = &self.file else {
            return;
        };
        let mut state = cell.borrow_mut();
        let line = format!(
            "{} {}\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            sanitize_log_value(message)
        );

        let current = std::mem::replace(&mut *state, LogFile::Failed);
        *state = match current {
            LogFile::Failed => LogFile::Failed,
            LogFile::Pending(path) => match open_append(&path) {
                Ok(file) => append(path, file, &line),
                Err(err) => failed(&path, &err),
            },
            LogFile::Open { path, file } => append(path, file, &line),
        };
    }

    #[cfg(test)]
    fn is_failed(&self) -> bool {
        self.file
            .as_ref()
            .is_some_and(|cell| matches!(*cell.borrow(), LogFile::Failed))
    }
}

fn open_append(path: &Path) -> io::Result<fs::File> {
    fs::OpenOptions::new().create(true).append(true).open(path)
}

fn append(path: PathBuf, mut file: fs::File, line: &str) -> LogFile {
    match file.write_all(line.as_bytes()) {
        Ok(()) => LogFile::Open { path, file },
        Err(err) => failed(&path, &err),
    }
}

fn failed(path: &Path, err: &io::Error) -> LogFile {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(
        stderr,
        "Warning: transition logging disabled log_path={} io_error={}",
        path.display(),
        err
    );
    LogFile::Failed
}

/// Keeps every log entry on one line.
pub(crate) fn sanitize_log_value(value: &str) -> String {
    value
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn messages(contents: &str) -> Vec<&str> {
        contents
            .lines()
            .map(|line| line.split_once(' ').map(|x| x.1).unwrap_or(""))
            .collect()
    }

    #[test]
    fn sanitize_log_value_replaces_controls() {
        let value = "line\ncarriage\rtab\t";
        assert_eq!(sanitize_log_value(value), "line\\ncarriage\\rtab\\t");
    }

    #[test]
    fn log_transition_appends_timestamped_lines() {
        let temp = TempDir::new().expect("temp dir");
        let log_path = temp.path().join("ralph.log");
        let logger = Logger::new(Some(log_path.clone()));

        logger.log_transition("cycle start");
        logger.log_transition("select action=run\titeration=2");

        let contents = fs::read_to_string(&log_path).expect("read log");
        assert_eq!(
            messages(&contents),
            vec!["cycle start", "select action=run\\titeration=2"]
        );
        let first = contents.lines().next().expect("first line");
        assert!(
            first.split(' ').next().unwrap_or("").ends_with('Z'),
            "line should start with a UTC timestamp, got: {first}"
        );
    }

    #[test]
    fn log_keeps_appending_to_an_existing_file() {
        let temp = TempDir::new().expect("temp dir");
        let log_path = temp.path().join("ralph.log");
        fs::write(&log_path, "earlier run\n").expect("seed log");

        let logger = Logger::new(Some(log_path.clone()));
        logger.log_transition("cycle start n=1");

        let contents = fs::read_to_string(&log_path).expect("read log");
        assert!(contents.starts_with("earlier run\n"), "got: {contents}");
        assert!(contents.ends_with(" cycle start n=1\n"), "got: {contents}");
    }

    #[test]
    fn status_and_diagnostic_lines_are_recorded_with_their_event() {
        let temp = TempDir::new().expect("temp dir");
        let log_path = temp.path().join("ralph.log");
        let logger = Logger::new(Some(log_path.clone()));

        logger.status("idle", "No pending iterations found.");
        logger.diagnostic("parse_error", "Error parsing a.json: EOF\nat line 1");

        let contents = fs::read_to_string(&log_path).expect("read log");
        assert_eq!(
            messages(&contents),
            vec![
                "idle msg=No pending iterations found.",
                "parse_error msg=Error parsing a.json: EOF\\nat line 1",
            ]
        );
    }

    #[test]
    fn log_transition_disables_after_open_error() {
        let temp = TempDir::new().expect("temp dir");
        let log_dir = temp.path().join("missing-log-dir");
        let log_path = log_dir.join("ralph.log");
        let logger = Logger::new(Some(log_path.clone()));

        logger.log_transition("first");
        assert!(logger.is_failed());
        fs::create_dir(&log_dir).expect("create log dir");
        logger.log_transition("second");

        assert!(
            !log_path.exists(),
            "logging should stay disabled after the first error; found {}",
            log_path.display()
        );
    }

    #[test]
    fn logger_without_path_is_a_noop() {
        let logger = Logger::new(None);
        logger.log_transition("ignored");
        logger.status("idle", "still printed");
        assert!(!logger.is_failed());
    }
}
