//! `ExportToJSON`: a human-readable dump of every entry, current value and
//! retained history included.
//!
//! Byte strings are not valid JSON object keys or values on their own, so
//! every `Bytes` is rendered via `String::from_utf8_lossy` — this is a
//! diagnostic dump, not a format meant to round-trip back into the store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::Version;
use crate::entry::{Entry, Value};

#[derive(Serialize)]
struct JsonValue {
    #[serde(rename = "type")]
    value_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hash: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    set: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    zset: Option<Vec<(String, f64)>>,
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn to_json_value(value: &Value) -> JsonValue {
    let mut out = JsonValue {
        value_type: value.value_type().to_string(),
        string: None,
        list: None,
        hash: None,
        set: None,
        zset: None,
    };
    match value {
        Value::String(b) => {
            out.string = Some(lossy(b));
        }
        Value::List(items) => {
            out.list = Some(items.iter().map(|b| lossy(b)).collect());
        }
        Value::Hash(fields) => {
            out.hash = Some(fields.iter().map(|(k, v)| (lossy(k), lossy(v))).collect());
        }
        Value::Set(members) => {
            let mut members: Vec<String> = members.iter().map(|m| lossy(m)).collect();
            members.sort();
            out.set = Some(members);
        }
        Value::ZSet(z) => {
            out.zset = Some(z.iter_ascending().map(|(m, s)| (lossy(m), s)).collect());
        }
    }
    out
}

#[derive(Serialize)]
struct JsonHistoryFrame {
    value: JsonValue,
    version: Version,
    created: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}

#[derive(Serialize)]
struct JsonEntry {
    key: String,
    value: JsonValue,
    version: Version,
    created: DateTime<Utc>,
    last_updated: DateTime<Utc>,
    history: Vec<JsonHistoryFrame>,
}

pub(crate) fn render(entries: &[(Vec<u8>, Entry)]) -> serde_json::Result<String> {
    let dto: Vec<JsonEntry> = entries
        .iter()
        .map(|(key, entry)| JsonEntry {
            key: lossy(key),
            value: to_json_value(&entry.value),
            version: entry.version,
            created: entry.created,
            last_updated: entry.last_updated,
            history: entry
                .history
                .iter()
                .map(|f| JsonHistoryFrame {
                    value: to_json_value(&f.value),
                    version: f.version,
                    created: f.created,
                    last_updated: f.last_updated,
                })
                .collect(),
        })
        .collect();
    serde_json::to_string_pretty(&dto)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(0, 0).unwrap()
    }

    #[test]
    fn renders_a_string_entry() {
        let entry = Entry::apply_write(None, Value::String(Bytes::from_static(b"Ada")), 1, now(), 0, false);
        let json = render(&[(b"user:1:name".to_vec(), entry)]).unwrap();
        assert!(json.contains("\"STRING\""));
        assert!(json.contains("\"Ada\""));
        assert!(json.contains("user:1:name"));
    }
}
