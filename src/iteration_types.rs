use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::num::NonZeroU64;
use std::time::Duration;

pub(crate) const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct IterationId(i64);

impl IterationId {
    pub(crate) fn new(value: i64) -> Self {
        Self(value)
    }

    pub(crate) fn get(self) -> i64 {
        self.0
    }

    /// Reads an `iteration` value. Only JSON integers that fit an `i64`
    /// count; floats, strings and out-of-range numbers do not.
    pub(crate) fn parse(value: &Value) -> Option<Self> {
        value.as_i64().map(Self)
    }

    /// The record's iteration, or 0 when the field is absent or not a valid
    /// integer, so such records sort first and never stand in for another id.
    pub(crate) fn from_content(content: &Value) -> Self {
        content
            .get("iteration")
            .and_then(Self::parse)
            .unwrap_or_default()
    }
}

impl fmt::Display for IterationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Where a record sits in its lifecycle, derived from the `completed` and
/// `approved_by_user` flags. Only real JSON booleans count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Pending,
    AwaitingApproval,
    Approved,
    Unrecognized,
}

impl Lifecycle {
    pub(crate) fn from_flags(completed: Option<bool>, approved_by_user: Option<bool>) -> Self {
        match (completed, approved_by_user) {
            (Some(false), Some(false)) => Self::Pending,
            (Some(true), Some(false)) => Self::AwaitingApproval,
            (Some(true), Some(true)) => Self::Approved,
            _ => Self::Unrecognized,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Approved => "approved",
            Self::Unrecognized => "unrecognized",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The view of an iteration record that selection works on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct IterationRecord {
    pub(crate) name: String,
    pub(crate) iteration: IterationId,
    pub(crate) lifecycle: Lifecycle,
}

impl IterationRecord {
    pub(crate) fn from_content(name: &str, content: &Value) -> Self {
        let completed = content.get("completed").and_then(Value::as_bool);
        let approved_by_user = content.get("approved_by_user").and_then(Value::as_bool);
        Self {
            name: name.to_string(),
            iteration: IterationId::from_content(content),
            lifecycle: Lifecycle::from_flags(completed, approved_by_user),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct PollInterval(NonZeroU64);

impl PollInterval {
    pub(crate) fn new(value: u64) -> Result<Self, String> {
        let Some(value) = NonZeroU64::new(value) else {
            return Err("must be a positive integer (got 0)".to_string());
        };
        Ok(Self(value))
    }

    pub(crate) fn secs(self) -> u64 {
        self.0.get()
    }

    pub(crate) fn duration(self) -> Duration {
        Duration::from_secs(self.secs())
    }
}

impl Default for PollInterval {
    fn default() -> Self {
        Self(NonZeroU64::MIN.saturating_add(DEFAULT_POLL_INTERVAL_SECS - 1))
    }
}

impl<'de> Deserialize<'de> for PollInterval {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u64::deserialize(deserializer)?;
        PollInterval::new(value).map_err(D::Error::custom)
    }
}

impl fmt::Display for PollInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.secs())
    }
}
