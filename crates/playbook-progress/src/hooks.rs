//! Hook catalogue
//!
//! The engine finds callbacks by name, so these names are a fixed contract:
//! a hook under any other name never receives events. Each hook maps to
//! exactly one outgoing [`EventKind`]; both task-start hooks share
//! `task_start` and differ only in `is_handler`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::BridgeError;
use crate::event::EventKind;
use crate::host::{
    lenient_string, null_as_default, IncludedFile, Play, Playbook, PlaybookStats, Task,
    TaskResult,
};

/// A lifecycle hook the engine dispatches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    PlaybookOnStart,
    PlaybookOnPlayStart,
    PlaybookOnTaskStart,
    PlaybookOnHandlerTaskStart,
    RunnerOnStart,
    RunnerOnOk,
    RunnerOnFailed,
    RunnerOnSkipped,
    RunnerOnUnreachable,
    RunnerItemOnOk,
    RunnerItemOnFailed,
    RunnerItemOnSkipped,
    RunnerRetry,
    OnFileDiff,
    PlaybookOnInclude,
    PlaybookOnStats,
}

/// Hook name, hook, and the event kind it emits, in [`Hook`] declaration order
pub static HOOKS: [(&str, Hook, EventKind); 16] = [
    ("v2_playbook_on_start", Hook::PlaybookOnStart, EventKind::PlaybookStart),
    ("v2_playbook_on_play_start", Hook::PlaybookOnPlayStart, EventKind::PlayStart),
    ("v2_playbook_on_task_start", Hook::PlaybookOnTaskStart, EventKind::TaskStart),
    ("v2_playbook_on_handler_task_start", Hook::PlaybookOnHandlerTaskStart, EventKind::TaskStart),
    ("v2_runner_on_start", Hook::RunnerOnStart, EventKind::HostTaskStart),
    ("v2_runner_on_ok", Hook::RunnerOnOk, EventKind::HostOk),
    ("v2_runner_on_failed", Hook::RunnerOnFailed, EventKind::HostFailed),
    ("v2_runner_on_skipped", Hook::RunnerOnSkipped, EventKind::HostSkipped),
    ("v2_runner_on_unreachable", Hook::RunnerOnUnreachable, EventKind::HostUnreachable),
    ("v2_runner_item_on_ok", Hook::RunnerItemOnOk, EventKind::ItemOk),
    ("v2_runner_item_on_failed", Hook::RunnerItemOnFailed, EventKind::ItemFailed),
    ("v2_runner_item_on_skipped", Hook::RunnerItemOnSkipped, EventKind::ItemSkipped),
    ("v2_runner_retry", Hook::RunnerRetry, EventKind::HostRetry),
    ("v2_on_file_diff", Hook::OnFileDiff, EventKind::FileDiff),
    ("v2_playbook_on_include", Hook::PlaybookOnInclude, EventKind::Include),
    ("v2_playbook_on_stats", Hook::PlaybookOnStats, EventKind::PlaybookComplete),
];

impl Hook {
    fn entry(&self) -> &'static (&'static str, Hook, EventKind) {
        &HOOKS[*self as usize]
    }

    /// Name the engine dispatches under
    pub fn name(&self) -> &'static str {
        self.entry().0
    }

    pub fn event_kind(&self) -> EventKind {
        self.entry().2
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Hook {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HOOKS
            .iter()
            .find(|(name, _, _)| *name == s)
            .map(|(_, hook, _)| *hook)
            .ok_or_else(|| BridgeError::invalid_hook_call(format!("unknown hook: {}", s)))
    }
}

/// One hook invocation with its arguments.
///
/// Encoded as `{"hook": "<name>", "args": {...}}`, which is what the relay
/// reads from the engine-side shim. A missing or `null` `args` reads as an
/// empty object, and `null` arguments read as their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "hook", content = "args", remote = "Self")]
pub enum HookCall {
    #[serde(rename = "v2_playbook_on_start")]
    PlaybookOnStart {
        #[serde(default, deserialize_with = "null_as_default")]
        playbook: Playbook,
    },

    #[serde(rename = "v2_playbook_on_play_start")]
    PlaybookOnPlayStart {
        #[serde(default, deserialize_with = "null_as_default")]
        play: Play,
    },

    #[serde(rename = "v2_playbook_on_task_start")]
    PlaybookOnTaskStart {
        #[serde(default, deserialize_with = "null_as_default")]
        task: Task,
        #[serde(default, deserialize_with = "null_as_default")]
        is_conditional: bool,
    },

    #[serde(rename = "v2_playbook_on_handler_task_start")]
    PlaybookOnHandlerTaskStart {
        #[serde(default, deserialize_with = "null_as_default")]
        task: Task,
    },

    #[serde(rename = "v2_runner_on_start")]
    RunnerOnStart {
        #[serde(default, deserialize_with = "lenient_string")]
        host: String,
        #[serde(default, deserialize_with = "null_as_default")]
        task: Task,
    },

    #[serde(rename = "v2_runner_on_ok")]
    RunnerOnOk {
        #[serde(default, deserialize_with = "null_as_default")]
        result: TaskResult,
    },

    #[serde(rename = "v2_runner_on_failed")]
    RunnerOnFailed {
        #[serde(default, deserialize_with = "null_as_default")]
        result: TaskResult,
        #[serde(default, deserialize_with = "null_as_default")]
        ignore_errors: bool,
    },

    #[serde(rename = "v2_runner_on_skipped")]
    RunnerOnSkipped {
        #[serde(default, deserialize_with = "null_as_default")]
        result: TaskResult,
    },

    #[serde(rename = "v2_runner_on_unreachable")]
    RunnerOnUnreachable {
        #[serde(default, deserialize_with = "null_as_default")]
        result: TaskResult,
    },

    #[serde(rename = "v2_runner_item_on_ok")]
    RunnerItemOnOk {
        #[serde(default, deserialize_with = "null_as_default")]
        result: TaskResult,
    },

    #[serde(rename = "v2_runner_item_on_failed")]
    RunnerItemOnFailed {
        #[serde(default, deserialize_with = "null_as_default")]
        result: TaskResult,
    },

    #[serde(rename = "v2_runner_item_on_skipped")]
    RunnerItemOnSkipped {
        #[serde(default, deserialize_with = "null_as_default")]
        result: TaskResult,
    },

    #[serde(rename = "v2_runner_retry")]
    RunnerRetry {
        #[serde(default, deserialize_with = "null_as_default")]
        result: TaskResult,
    },

    #[serde(rename = "v2_on_file_diff")]
    OnFileDiff {
        #[serde(default, deserialize_with = "null_as_default")]
        result: TaskResult,
    },

    #[serde(rename = "v2_playbook_on_include")]
    PlaybookOnInclude {
        #[serde(default, deserialize_with = "null_as_default")]
        included_file: IncludedFile,
    },

    #[serde(rename = "v2_playbook_on_stats")]
    PlaybookOnStats {
        #[serde(default, deserialize_with = "null_as_default")]
        stats: PlaybookStats,
    },
}

impl Serialize for HookCall {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        HookCall::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for HookCall {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut call = Value::deserialize(deserializer)?;
        if let Value::Object(fields) = &mut call {
            if fields.get("args").map_or(true, Value::is_null) {
                fields.insert("args".to_string(), Value::Object(Map::new()));
            }
        }
        HookCall::deserialize(call).map_err(D::Error::custom)
    }
}

impl HookCall {
    /// Parse one relayed invocation
    pub fn from_json(line: &str) -> Result<Self, BridgeError> {
        serde_json::from_str(line).map_err(|e| BridgeError::invalid_hook_call(e.to_string()))
    }

    pub fn hook(&self) -> Hook {
        match self {
            HookCall::PlaybookOnStart { .. } => Hook::PlaybookOnStart,
            HookCall::PlaybookOnPlayStart { .. } => Hook::PlaybookOnPlayStart,
            HookCall::PlaybookOnTaskStart { .. } => Hook::PlaybookOnTaskStart,
            HookCall::PlaybookOnHandlerTaskStart { .. } => Hook::PlaybookOnHandlerTaskStart,
            HookCall::RunnerOnStart { .. } => Hook::RunnerOnStart,
            HookCall::RunnerOnOk { .. } => Hook::RunnerOnOk,
            HookCall::RunnerOnFailed { .. } => Hook::RunnerOnFailed,
            HookCall::RunnerOnSkipped { .. } => Hook::RunnerOnSkipped,
            HookCall::RunnerOnUnreachable { .. } => Hook::RunnerOnUnreachable,
            HookCall::RunnerItemOnOk { .. } => Hook::RunnerItemOnOk,
            HookCall::RunnerItemOnFailed { .. } => Hook::RunnerItemOnFailed,
            HookCall::RunnerItemOnSkipped { .. } => Hook::RunnerItemOnSkipped,
            HookCall::RunnerRetry { .. } => Hook::RunnerRetry,
            HookCall::OnFileDiff { .. } => Hook::OnFileDiff,
            HookCall::PlaybookOnInclude { .. } => Hook::PlaybookOnInclude,
            HookCall::PlaybookOnStats { .. } => Hook::PlaybookOnStats,
        }
    }

    pub fn event_kind(&self) -> EventKind {
        self.hook().event_kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_every_kind_has_a_hook() {
        let emitted: HashSet<EventKind> = HOOKS.iter().map(|(_, _, kind)| *kind).collect();
        for kind in EventKind::ALL {
            assert!(emitted.contains(&kind), "no hook emits {}", kind);
        }
    }

    #[test]
    fn test_names_are_unique_and_roundtrip() {
        let names: HashSet<&str> = HOOKS.iter().map(|(name, _, _)| *name).collect();
        assert_eq!(names.len(), HOOKS.len());

        for (index, &(name, hook, kind)) in HOOKS.iter().enumerate() {
            assert_eq!(hook as usize, index);
            assert_eq!(hook.name(), name);
            assert_eq!(hook.event_kind(), kind);
            assert_eq!(name.parse::<Hook>().unwrap(), hook);
        }
        assert!("v2_runner_on_exploded".parse::<Hook>().is_err());
    }

    #[test]
    fn test_parse_hook_call() {
        let call = HookCall::from_json(
            r#"{"hook":"v2_runner_on_failed","args":{"result":{"host":"web1","task":{"uuid":"t1"},"result":{"msg":"boom"}},"ignore_errors":true}}"#,
        )
        .unwrap();

        assert_eq!(call.hook(), Hook::RunnerOnFailed);
        assert_eq!(call.event_kind(), EventKind::HostFailed);
        match call {
            HookCall::RunnerOnFailed {
                result,
                ignore_errors,
            } => {
                assert!(ignore_errors);
                assert_eq!(result.host, "web1");
                assert_eq!(result.task.uuid, "t1");
                assert_eq!(result.result, json!({"msg": "boom"}));
            }
            other => panic!("unexpected call: {:?}", other),
        }
    }

    #[test]
    fn test_parse_hook_call_with_missing_args_fields() {
        let call = HookCall::from_json(r#"{"hook":"v2_playbook_on_stats","args":{}}"#).unwrap();
        assert_eq!(
            call,
            HookCall::PlaybookOnStats {
                stats: PlaybookStats::default()
            }
        );
    }

    #[test]
    fn test_parse_unknown_hook_fails() {
        let err = HookCall::from_json(r#"{"hook":"v2_on_lunch","args":{}}"#).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidHookCall(_)));

        assert!(HookCall::from_json("not json").is_err());
    }

    #[test]
    fn test_null_arguments_read_as_defaults() {
        let call = HookCall::from_json(
            r#"{"hook":"v2_runner_on_start","args":{"host":null,"task":{"uuid":"t1","is_handler":null}}}"#,
        )
        .unwrap();
        match call {
            HookCall::RunnerOnStart { host, task } => {
                assert_eq!(host, "");
                assert_eq!(task.uuid, "t1");
                assert!(!task.is_handler);
            }
            other => panic!("unexpected call: {:?}", other),
        }

        let call = HookCall::from_json(
            r#"{"hook":"v2_runner_on_failed","args":{"result":{"host":"web1"},"ignore_errors":null}}"#,
        )
        .unwrap();
        assert!(matches!(
            call,
            HookCall::RunnerOnFailed {
                ignore_errors: false,
                ..
            }
        ));

        let call = HookCall::from_json(
            r#"{"hook":"v2_playbook_on_task_start","args":{"task":null,"is_conditional":null}}"#,
        )
        .unwrap();
        assert_eq!(
            call,
            HookCall::PlaybookOnTaskStart {
                task: Task::default(),
                is_conditional: false,
            }
        );

        let call = HookCall::from_json(
            r#"{"hook":"v2_playbook_on_include","args":{"included_file":{"filename":"x.yml","hosts":null}}}"#,
        )
        .unwrap();
        assert_eq!(
            call,
            HookCall::PlaybookOnInclude {
                included_file: IncludedFile {
                    filename: "x.yml".to_string(),
                    hosts: Vec::new(),
                }
            }
        );
    }

    #[test]
    fn test_missing_or_null_args() {
        let expected = HookCall::PlaybookOnStats {
            stats: PlaybookStats::default(),
        };
        assert_eq!(
            HookCall::from_json(r#"{"hook":"v2_playbook_on_stats"}"#).unwrap(),
            expected
        );
        assert_eq!(
            HookCall::from_json(r#"{"hook":"v2_playbook_on_stats","args":null}"#).unwrap(),
            expected
        );
        assert!(HookCall::from_json(r#"{"args":{}}"#).is_err());
    }

    #[test]
    fn test_serialized_call_parses_back() {
        let call = HookCall::RunnerOnFailed {
            result: TaskResult::new("web1", Task::new("Install", "t1", "apt"), json!({"rc": 1})),
            ignore_errors: true,
        };
        let line = serde_json::to_string(&call).unwrap();
        assert!(line.starts_with(r#"{"hook":"v2_runner_on_failed","args":{"#));
        assert_eq!(HookCall::from_json(&line).unwrap(), call);
    }
}
