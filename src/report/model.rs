//! Typed model of the JSON execution report.
//!
//! The shape follows ansible's `json` stdout callback:
//!
//! ```json
//! {
//!   "plays": [
//!     {
//!       "play": { "name": "Configure web" },
//!       "tasks": [
//!         {
//!           "task": { "name": "Install nginx" },
//!           "hosts": { "web1": { "failed": true, "msg": "No package matching 'nginx'" } }
//!         }
//!       ]
//!     }
//!   ],
//!   "stats": { "web1": { "failures": 1, "unreachable": 0 } }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;

/// Root of a parsed execution report.
///
/// A report with no plays and no stats is a valid no-op run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Plays in execution order
    #[serde(default)]
    pub plays: Vec<Play>,
    /// Per-host run summary
    #[serde(default)]
    pub stats: BTreeMap<String, HostStat>,
}

impl ExecutionReport {
    /// True when any host summary counts a failure or an unreachable signal.
    ///
    /// This looks only at `stats`; per-task flags are not consulted.
    pub fn has_failure(&self) -> bool {
        self.stats.values().any(HostStat::is_failing)
    }

    /// Hosts whose summary counts a failure or an unreachable signal.
    pub fn failing_hosts(&self) -> impl Iterator<Item = &str> {
        self.stats
            .iter()
            .filter(|(_, stat)| stat.is_failing())
            .map(|(host, _)| host.as_str())
    }
}

/// Per-host outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostStat {
    /// Number of failed tasks
    pub failures: u64,
    /// Number of unreachable signals
    pub unreachable: u64,
    /// Number of successful tasks
    pub ok: u64,
    /// Number of tasks that changed something
    pub changed: u64,
    /// Number of skipped tasks
    pub skipped: u64,
    /// Number of rescued tasks
    pub rescued: u64,
    /// Number of failures that were ignored
    pub ignored: u64,
}

impl HostStat {
    /// `failures > 0 || unreachable > 0`
    pub fn is_failing(&self) -> bool {
        self.failures > 0 || self.unreachable > 0
    }
}

/// Name and identifier of a play or task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Header {
    /// Display name
    pub name: String,
    /// Unique identifier assigned by ansible
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// A play and its tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Play {
    /// Play header
    #[serde(default)]
    pub play: Header,
    /// Tasks in execution order
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Play {
    /// Play name
    pub fn name(&self) -> &str {
        &self.play.name
    }
}

/// A task and the result it produced on every host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Task header
    #[serde(default)]
    pub task: Header,
    /// Results keyed by host, iterated in lexical host order
    #[serde(default)]
    pub hosts: BTreeMap<String, HostResult>,
}

impl Task {
    /// Task name
    pub fn name(&self) -> &str {
        &self.task.name
    }
}

/// Result of one task on one host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostResult {
    /// The task failed on this host
    #[serde(default)]
    pub failed: bool,
    /// The host could not be reached
    #[serde(default)]
    pub unreachable: bool,
    /// Message reported by the module
    #[serde(default, rename = "msg", skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// Reason reported by the module
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Standard error of the module
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    /// Standard output of the module
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    /// Per-item results of a looping task
    ///
    /// Some modules report plain strings under `results`; only object
    /// entries are loop items.
    #[serde(
        default,
        rename = "results",
        deserialize_with = "item_results",
        skip_serializing_if = "Option::is_none"
    )]
    pub sub_results: Option<Vec<ItemResult>>,
}

impl HostResult {
    /// A host result is worth rendering when it failed or was unreachable.
    pub fn is_interesting(&self) -> bool {
        self.failed || self.unreachable
    }

    /// Failed per-item results, in loop order.
    pub fn failed_items(&self) -> impl Iterator<Item = &ItemResult> {
        self.sub_results
            .iter()
            .flatten()
            .filter(|item| item.failed)
    }
}

/// Result of one iteration of a looping task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    /// This item failed
    #[serde(default)]
    pub failed: bool,
    /// The host could not be reached for this item
    #[serde(default)]
    pub unreachable: bool,
    /// Loop item the result belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<JsonValue>,
    /// Message reported by the module
    #[serde(default, rename = "msg", skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// Reason reported by the module
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Standard error of the module
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    /// Standard output of the module
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
}

/// The `msg` field, which ansible emits as a string, a list, or now and then
/// as some other JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A single message string
    Text(String),
    /// A list of arbitrary values
    List(Vec<JsonValue>),
    /// Any other value, such as an object or a number
    Other(JsonValue),
}

impl Message {
    /// Returns the text if this is the string variant.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the entries if this is the list variant.
    pub fn as_list(&self) -> Option<&[JsonValue]> {
        match self {
            Message::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the value if this is neither a string nor a list.
    pub fn as_other(&self) -> Option<&JsonValue> {
        match self {
            Message::Other(value) => Some(value),
            _ => None,
        }
    }

    /// An empty string, list or object carries no message.
    pub fn is_empty(&self) -> bool {
        match self {
            Message::Text(text) => text.is_empty(),
            Message::List(items) => items.is_empty(),
            Message::Other(JsonValue::Object(map)) => map.is_empty(),
            Message::Other(_) => false,
        }
    }
}

impl fmt::Display for Message {
    /// Text is written as-is. List entries are written one per line, strings
    /// verbatim and everything else as compact JSON. Other values are
    /// written as compact JSON.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Text(text) => f.write_str(text),
            Message::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    match item {
                        JsonValue::String(s) => f.write_str(s)?,
                        other => write!(f, "{other}")?,
                    }
                }
                Ok(())
            }
            Message::Other(value) => write!(f, "{value}"),
        }
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // The JSON type decides the variant; strings are never re-parsed.
        Ok(match JsonValue::deserialize(deserializer)? {
            JsonValue::String(text) => Message::Text(text),
            JsonValue::Array(items) => Message::List(items),
            other => Message::Other(other),
        })
    }
}

impl Serialize for Message {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Message::Text(text) => serializer.serialize_str(text),
            Message::List(items) => items.serialize(serializer),
            Message::Other(value) => value.serialize(serializer),
        }
    }
}

/// Decode an optional string, treating `""` like an absent field.
fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// Decode `results`, keeping only the object entries as loop items.
///
/// A `results` value that is not a list at all is treated as absent.
fn item_results<'de, D>(deserializer: D) -> Result<Option<Vec<ItemResult>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(JsonValue::Array(entries)) = Option::<JsonValue>::deserialize(deserializer)? else {
        return Ok(None);
    };
    entries
        .into_iter()
        .filter(JsonValue::is_object)
        .map(|entry| ItemResult::deserialize(entry).map_err(de::Error::custom))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}
