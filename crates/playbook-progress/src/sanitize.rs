//! Result sanitizer
//!
//! Reduces a raw per-task result to something small and safe to put on the
//! wire. Each top-level key gets at most one treatment, checked in order:
//!
//! 1. keys in the omit list are dropped entirely
//! 2. strings longer than `max_string_chars` are cut and marked
//! 3. objects and arrays whose JSON form is longer than
//!    `max_structure_chars` are replaced by a marker
//!
//! Everything else passes through untouched. Lengths are counted in
//! characters, not bytes. A structure is measured the way the engine prints
//! it, with a space after every `,` and `:` separator.

use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::{Map, Serializer, Value};
use std::collections::BTreeSet;
use std::io;

/// Appended to strings cut at `max_string_chars`
pub const TRUNCATION_MARKER: &str = "\n... [truncated]";

/// Replaces structures whose JSON form exceeds `max_structure_chars`
pub const OMISSION_MARKER: &str = "[large data omitted]";

/// Keys dropped by default: gathered facts and captured environments
pub const DEFAULT_OMIT_KEYS: [&str; 2] = ["ansible_facts", "ansible_env"];

pub const DEFAULT_MAX_STRING_CHARS: usize = 5000;
pub const DEFAULT_MAX_STRUCTURE_CHARS: usize = 10_000;

/// Size and sensitivity thresholds applied to each result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizePolicy {
    /// Keys never transmitted, not even truncated
    pub omit_keys: BTreeSet<String>,

    /// Longest string passed through verbatim
    pub max_string_chars: usize,

    /// Longest JSON encoding of a nested value passed through verbatim
    pub max_structure_chars: usize,
}

impl Default for SanitizePolicy {
    fn default() -> Self {
        Self {
            omit_keys: DEFAULT_OMIT_KEYS.iter().map(|k| k.to_string()).collect(),
            max_string_chars: DEFAULT_MAX_STRING_CHARS,
            max_structure_chars: DEFAULT_MAX_STRUCTURE_CHARS,
        }
    }
}

impl SanitizePolicy {
    /// Sanitize a result. Non-object input comes back unchanged.
    pub fn sanitize(&self, result: &Value) -> Value {
        match result {
            Value::Object(map) => Value::Object(self.sanitize_map(map)),
            other => other.clone(),
        }
    }

    /// Sanitize the top-level entries of an object.
    pub fn sanitize_map(&self, map: &Map<String, Value>) -> Map<String, Value> {
        let mut sanitized = Map::new();

        for (key, value) in map {
            if self.omit_keys.contains(key) {
                continue;
            }

            let value = match value {
                Value::String(s) => match truncate_chars(s, self.max_string_chars) {
                    Some(truncated) => Value::String(truncated),
                    None => value.clone(),
                },
                Value::Object(_) | Value::Array(_)
                    if json_exceeds_chars(value, self.max_structure_chars) =>
                {
                    Value::String(OMISSION_MARKER.to_string())
                }
                _ => value.clone(),
            };

            sanitized.insert(key.clone(), value);
        }

        sanitized
    }
}

/// Sanitize with the default policy.
pub fn sanitize_result(result: &Value) -> Value {
    SanitizePolicy::default().sanitize(result)
}

/// Cut `s` to `max` characters plus the marker, or `None` if it already fits.
fn truncate_chars(s: &str, max: usize) -> Option<String> {
    let (cut, _) = s.char_indices().nth(max)?;
    let mut truncated = String::with_capacity(cut + TRUNCATION_MARKER.len());
    truncated.push_str(&s[..cut]);
    truncated.push_str(TRUNCATION_MARKER);
    Some(truncated)
}

/// Whether the printed form of `value` is longer than `limit` chars.
///
/// Stops rendering as soon as the limit is crossed.
fn json_exceeds_chars(value: &Value, limit: usize) -> bool {
    let mut counter = CharCounter { seen: 0, limit };
    let mut serializer = Serializer::with_formatter(&mut counter, SpacedFormatter);
    value.serialize(&mut serializer).is_err()
}

/// JSON with `", "` and `": "` separators
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

/// Writer that counts UTF-8 characters and fails once past its limit.
struct CharCounter {
    seen: usize,
    limit: usize,
}

impl io::Write for CharCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Continuation bytes (0b10xxxxxx) do not start a character.
        self.seen += buf.iter().filter(|b| (**b & 0xC0) != 0x80).count();
        if self.seen > self.limit {
            return Err(io::Error::new(io::ErrorKind::Other, "size limit exceeded"));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_omits_facts_and_keeps_msg() {
        let facts: Map<String, Value> = (0..500)
            .map(|i| (format!("fact_{}", i), json!("x".repeat(100))))
            .collect();
        let result = json!({
            "ansible_facts": facts,
            "ansible_env": {"HOME": "/root"},
            "msg": "ok",
        });

        let sanitized = sanitize_result(&result);
        let object = sanitized.as_object().unwrap();

        assert!(!object.contains_key("ansible_facts"));
        assert!(!object.contains_key("ansible_env"));
        assert_eq!(object["msg"], json!("ok"));
        assert_eq!(object.len(), 1);
    }

    #[test]
    fn test_long_string_is_truncated() {
        let long = "a".repeat(6000);
        let sanitized = sanitize_result(&json!({"stdout": long}));
        let stdout = sanitized["stdout"].as_str().unwrap();

        assert_eq!(
            stdout.chars().count(),
            DEFAULT_MAX_STRING_CHARS + TRUNCATION_MARKER.chars().count()
        );
        assert_eq!(stdout.chars().count(), 5016);
        assert!(stdout.starts_with(&"a".repeat(5000)));
        assert!(stdout.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_string_at_limit_is_untouched() {
        let exact = "b".repeat(DEFAULT_MAX_STRING_CHARS);
        let sanitized = sanitize_result(&json!({"stdout": exact.clone()}));
        assert_eq!(sanitized["stdout"], json!(exact));
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        // 4999 single-byte chars followed by multibyte ones
        let mixed = format!("{}{}", "a".repeat(4999), "é".repeat(10));
        let sanitized = sanitize_result(&json!({"stdout": mixed}));
        let stdout = sanitized["stdout"].as_str().unwrap();

        assert!(stdout.starts_with(&format!("{}é\n", "a".repeat(4999))));
        assert_eq!(stdout.chars().count(), 5000 + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn test_large_structure_is_omitted() {
        let lines: Vec<String> = (0..2000).map(|i| format!("line {}", i)).collect();
        let sanitized = sanitize_result(&json!({
            "stdout_lines": lines,
            "results": [{"rc": 0}],
        }));

        assert_eq!(sanitized["stdout_lines"], json!(OMISSION_MARKER));
        assert_eq!(sanitized["results"], json!([{"rc": 0}]));
    }

    #[test]
    fn test_structure_measured_with_spaced_separators() {
        // 4000 zeros print as "[0, 0, ...]": 11999 chars, 8001 when compact
        let sanitized = sanitize_result(&json!({"rc_list": vec![0; 4000]}));
        assert_eq!(sanitized["rc_list"], json!(OMISSION_MARKER));

        let policy = SanitizePolicy {
            max_structure_chars: 16,
            ..Default::default()
        };
        // {"a": 1, "b": 2} is 16 chars printed, 13 compact
        let kept = policy.sanitize(&json!({"pair": {"a": 1, "b": 2}}));
        assert_eq!(kept["pair"], json!({"a": 1, "b": 2}));

        let policy = SanitizePolicy {
            max_structure_chars: 15,
            ..Default::default()
        };
        let omitted = policy.sanitize(&json!({"pair": {"a": 1, "b": 2}}));
        assert_eq!(omitted["pair"], json!(OMISSION_MARKER));
    }

    #[test]
    fn test_structure_at_limit_is_kept() {
        // ["xxx..."] prints as 4 chars of framing plus the string
        let at_limit = json!(["x".repeat(DEFAULT_MAX_STRUCTURE_CHARS - 4)]);
        let sanitized = sanitize_result(&json!({"lines": at_limit.clone()}));
        assert_eq!(sanitized["lines"], at_limit);

        let over_limit = json!(["x".repeat(DEFAULT_MAX_STRUCTURE_CHARS - 3)]);
        let sanitized = sanitize_result(&json!({"lines": over_limit}));
        assert_eq!(sanitized["lines"], json!(OMISSION_MARKER));
    }

    #[test]
    fn test_structure_limit_counts_characters() {
        // Each "é" is two bytes but one character
        let at_limit = json!({"k": "é".repeat(DEFAULT_MAX_STRUCTURE_CHARS - 9)});
        let sanitized = sanitize_result(&json!({"nested": at_limit.clone()}));
        assert_eq!(sanitized["nested"], at_limit);
    }

    #[test]
    fn test_non_object_passes_through() {
        assert_eq!(sanitize_result(&json!("plain")), json!("plain"));
        assert_eq!(sanitize_result(&json!([1, 2])), json!([1, 2]));
        assert_eq!(sanitize_result(&Value::Null), Value::Null);
    }

    #[test]
    fn test_custom_policy() {
        let policy = SanitizePolicy {
            omit_keys: ["secret".to_string()].into_iter().collect(),
            max_string_chars: 3,
            max_structure_chars: 8,
        };
        let sanitized = policy.sanitize(&json!({
            "secret": "hunter2",
            "ansible_facts": {"a": 1},
            "word": "abcdef",
            "list": [1, 2, 3, 4, 5],
            "number": 12345678901u64,
        }));

        assert_eq!(
            sanitized,
            json!({
                "ansible_facts": {"a": 1},
                "word": format!("abc{}", TRUNCATION_MARKER),
                "list": OMISSION_MARKER,
                "number": 12345678901u64,
            })
        );
    }

    #[test]
    fn test_only_first_matching_rule_applies() {
        // A long string under an omitted key is dropped, not truncated.
        let sanitized = sanitize_result(&json!({"ansible_env": "x".repeat(20_000)}));
        assert_eq!(sanitized, json!({}));
    }

    fn small_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z ]{0,64}".prop_map(Value::String),
            prop::collection::vec(any::<u8>(), 0..16).prop_map(|v| json!(v)),
        ]
    }

    proptest! {
        #[test]
        fn prop_omitted_keys_never_appear(
            extra in prop::collection::btree_map("[a-z_]{1,12}", small_value(), 0..8),
            facts in small_value(),
        ) {
            let mut map: Map<String, Value> = extra.into_iter().collect();
            map.insert("ansible_facts".to_string(), facts.clone());
            map.insert("ansible_env".to_string(), facts);

            let sanitized = sanitize_result(&Value::Object(map));
            let object = sanitized.as_object().unwrap();
            prop_assert!(!object.contains_key("ansible_facts"));
            prop_assert!(!object.contains_key("ansible_env"));
        }

        #[test]
        fn prop_small_values_are_identical(
            map in prop::collection::btree_map("[a-z]{1,12}", small_value(), 0..8),
        ) {
            let input = Value::Object(map.into_iter().collect());
            prop_assert_eq!(sanitize_result(&input), input);
        }

        #[test]
        fn prop_long_strings_have_exact_length(extra in 1usize..3000, ch in "[a-zé€]") {
            let long = ch.repeat(DEFAULT_MAX_STRING_CHARS + extra);
            let sanitized = sanitize_result(&json!({"out": long}));
            let out = sanitized["out"].as_str().unwrap();
            prop_assert_eq!(
                out.chars().count(),
                DEFAULT_MAX_STRING_CHARS + TRUNCATION_MARKER.chars().count()
            );
            prop_assert!(out.ends_with(TRUNCATION_MARKER));
        }

        #[test]
        fn prop_large_structures_become_marker(
            numbers in prop::collection::vec(any::<u16>(), 3400..4000),
            as_object in any::<bool>(),
        ) {
            // At least 3 chars per element once printed, so always over the limit
            let nested = if as_object {
                let map: Map<String, Value> = numbers
                    .iter()
                    .enumerate()
                    .map(|(i, n)| (i.to_string(), json!(n)))
                    .collect();
                Value::Object(map)
            } else {
                json!(numbers)
            };

            let sanitized = sanitize_result(&json!({"nested": nested, "msg": "ok"}));
            prop_assert_eq!(&sanitized["nested"], &json!(OMISSION_MARKER));
            prop_assert_eq!(&sanitized["msg"], &json!("ok"));
        }
    }
}
