//! Data handed to the hooks by the orchestration engine.
//!
//! These types only describe what the bridge reads. Every field has a
//! default that also stands in for an explicit `null`, and scalar identity
//! fields accept any JSON value, so a sparse or oddly typed event still
//! produces an envelope instead of a fault.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// The playbook file being run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Playbook {
    #[serde(deserialize_with = "lenient_string")]
    pub file_name: String,
}

impl Playbook {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    /// Final path component of the playbook file
    pub fn basename(&self) -> String {
        Path::new(&self.file_name)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_name.clone())
    }
}

/// A play: a named group of tasks aimed at a host pattern
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Play {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub uuid: String,
    /// Host pattern; either a single value or a list
    pub hosts: Value,
    /// Serial batch size as given by the engine (number, percentage or list)
    pub serial: Value,
}

impl Play {
    /// `hosts` as a list, wrapping a lone pattern.
    pub fn host_list(&self) -> Vec<Value> {
        match &self.hosts {
            Value::Array(hosts) => hosts.clone(),
            Value::Null => Vec::new(),
            other => vec![other.clone()],
        }
    }
}

/// A task, as seen when it starts or inside a result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Task {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    /// Stable for the task's whole run, across every host
    #[serde(deserialize_with = "lenient_string")]
    pub uuid: String,
    #[serde(deserialize_with = "lenient_string")]
    pub action: String,
    pub args: Value,
    /// `"file.yml:line"` when the engine knows where the task was defined
    pub path: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub is_handler: bool,
}

impl Task {
    pub fn new(name: impl Into<String>, uuid: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: uuid.into(),
            action: action.into(),
            ..Default::default()
        }
    }

    /// The task name, or its action when unnamed
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.action
        } else {
            &self.name
        }
    }

    /// Module arguments; anything but an object reads as empty
    pub fn args_map(&self) -> Map<String, Value> {
        match &self.args {
            Value::Object(args) => args.clone(),
            _ => Map::new(),
        }
    }
}

/// The outcome of one task on one host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskResult {
    #[serde(deserialize_with = "lenient_string")]
    pub host: String,
    #[serde(deserialize_with = "null_as_default")]
    pub task: Task,
    /// Raw module result, normally an object
    pub result: Value,
}

impl TaskResult {
    pub fn new(host: impl Into<String>, task: Task, result: Value) -> Self {
        Self {
            host: host.into(),
            task,
            result,
        }
    }

    /// A top-level field of the raw result
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.result.as_object().and_then(|result| result.get(key))
    }

    /// A top-level field, or `default` when it is missing
    pub fn field_or(&self, key: &str, default: Value) -> Value {
        self.field(key).cloned().unwrap_or(default)
    }

    pub fn changed(&self) -> bool {
        self.field("changed").map(is_truthy).unwrap_or(false)
    }
}

/// A file pulled in by an include, with the hosts it applies to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncludedFile {
    #[serde(deserialize_with = "lenient_string")]
    pub filename: String,
    #[serde(deserialize_with = "null_as_default")]
    pub hosts: Vec<String>,
}

/// End-of-run counters for one host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostStats {
    #[serde(deserialize_with = "null_as_default")]
    pub ok: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub changed: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub failures: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub unreachable: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub skipped: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub rescued: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub ignored: u64,
}

/// End-of-run counters for every processed host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybookStats {
    #[serde(deserialize_with = "null_as_default")]
    pub hosts: BTreeMap<String, HostStats>,
}

/// Truthiness as the engine's templating understands it.
///
/// `null`, `false`, zero, and empty strings, arrays and objects are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Accept any JSON scalar where a string is expected; `null` reads as empty.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Read `null` as the type's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
