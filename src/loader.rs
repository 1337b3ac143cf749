use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::iteration_types::{IterationId, IterationRecord};

pub(crate) const RECORD_EXTENSION: &str = ".json";

/// An unparsed record as found in the iterations directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawRecord {
    pub(crate) name: String,
    pub(crate) bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LoadedRecord {
    pub(crate) name: String,
    pub(crate) content: Value,
}

impl LoadedRecord {
    pub(crate) fn iteration(&self) -> IterationId {
        IterationId::from_content(&self.content)
    }

    pub(crate) fn to_iteration_record(&self) -> IterationRecord {
        IterationRecord::from_content(&self.name, &self.content)
    }
}

#[derive(Debug, Default)]
pub(crate) struct LoadOutcome {
    pub(crate) records: Vec<LoadedRecord>,
    pub(crate) parse_errors: Vec<String>,
}

impl LoadOutcome {
    pub(crate) fn iteration_records(&self) -> Vec<IterationRecord> {
        self.records
            .iter()
            .map(LoadedRecord::to_iteration_record)
            .collect()
    }
}

/// Parses raw records, dropping the ones that are not valid JSON, and orders
/// the rest by `iteration` (stable, so ties keep input order).
pub(crate) fn parse_records(raw: Vec<RawRecord>) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();
    for record in raw {
        match serde_json::from_slice::<Value>(&record.bytes) {
            Ok(content) => outcome.records.push(LoadedRecord {
                name: record.name,
                content,
            }),
            Err(err) => outcome
                .parse_errors
                .push(format!("Error parsing {}: {}", record.name, err)),
        }
    }
    outcome.records.sort_by_key(LoadedRecord::iteration);
    outcome
}

/// Reads every `*.json` file in `dir`, sorted by file name. A missing
/// directory is an empty source; unreadable files come back as parse errors.
pub(crate) fn read_record_dir(dir: &Path) -> Result<(Vec<RawRecord>, Vec<String>), String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok((Vec::new(), Vec::new())),
        Err(err) => {
            return Err(format!(
                "Failed to read iterations directory {}: {}",
                dir.display(),
                err
            ))
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| {
            format!(
                "Failed to read iterations directory {}: {}",
                dir.display(),
                err
            )
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(RECORD_EXTENSION) {
            continue;
        }
        if !entry.path().is_file() {
            continue;
        }
        names.push(name);
    }
    names.sort();

    let mut raw = Vec::new();
    let mut read_errors = Vec::new();
    for name in names {
        match fs::read(dir.join(&name)) {
            Ok(bytes) => raw.push(RawRecord { name, bytes }),
            Err(err) => read_errors.push(format!("Error parsing {}: {}", name, err)),
        }
    }
    Ok((raw, read_errors))
}

pub(crate) fn load_records(dir: &Path) -> Result<LoadOutcome, String> {
    let (raw, read_errors) = read_record_dir(dir)?;
    let mut outcome = parse_records(raw);
    if !read_errors.is_empty() {
        let mut parse_errors = read_errors;
        parse_errors.append(&mut outcome.parse_errors);
        outcome.parse_errors = parse_errors;
    }
    Ok(outcome)
}
