//! Structured JSON envelope every subcommand prints to stdout (spec §6):
//! `{status, data?, error?, timestamp, ...context}`, exit code 0 on
//! success, non-zero otherwise.

use autoscorer_core::ErrorBlock;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum Status {
    Success,
    Error,
}

/// Render and print a successful envelope, returning exit code 0.
pub fn success(data: Value, context: Map<String, Value>) -> i32 {
    print(Status::Success, Some(data), None, context);
    0
}

/// Render and print a failing envelope, returning exit code 1.
pub fn error(error: ErrorBlock, context: Map<String, Value>) -> i32 {
    print(Status::Error, None, Some(error), context);
    1
}

fn print(status: Status, data: Option<Value>, error: Option<ErrorBlock>, context: Map<String, Value>) {
    let mut envelope = Map::new();
    envelope.insert("status".to_string(), serde_json::to_value(&status).unwrap());
    if let Some(data) = data {
        envelope.insert("data".to_string(), data);
    }
    if let Some(error) = error {
        envelope.insert("error".to_string(), serde_json::to_value(&error).unwrap());
    }
    envelope.insert("timestamp".to_string(), Value::String(chrono::Utc::now().to_rfc3339()));
    envelope.extend(context);

    match serde_json::to_string_pretty(&Value::Object(envelope)) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("failed to serialize output envelope: {e}"),
    }
}

/// Build a single-key context map, the common case (`{"workspace": ...}`).
pub fn ctx(key: &str, value: impl Into<Value>) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value.into());
    map
}
