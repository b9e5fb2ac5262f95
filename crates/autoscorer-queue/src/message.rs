//! Wire types for the task-queue messages and callback envelopes (spec §4.5
//! / §7): `JobMessage` is what flows through the broker (or, in-process,
//! through the task table); the result envelope is what gets POSTed to a
//! `callback_url`.

use autoscorer_core::ErrorBlock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Which Scheduler operation a submitted task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Run,
    Score,
    Pipeline,
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "run" => Ok(Action::Run),
            "score" => Ok(Action::Score),
            "pipeline" => Ok(Action::Pipeline),
            other => Err(format!("unknown action {other:?}")),
        }
    }
}

/// A task-queue envelope, as defined in spec §7: `action`, `workspace`,
/// `params`, `executor`, `callback_url`, `task_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    pub task_id: Uuid,
    pub workspace: PathBuf,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

/// The envelope POSTed to `callback_url` on terminal state (spec §7):
/// `{ ok, data?, error?, meta: { task_id, timestamp, version } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackEnvelope {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBlock>,
    pub meta: CallbackMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackMeta {
    pub task_id: Uuid,
    pub timestamp: String,
    pub version: String,
}

impl CallbackEnvelope {
    pub fn success(task_id: Uuid, data: serde_json::Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            meta: CallbackMeta {
                task_id,
                timestamp: chrono::Utc::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    pub fn failure(task_id: Uuid, error: ErrorBlock) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error),
            meta: CallbackMeta {
                task_id,
                timestamp: chrono::Utc::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_roundtrips_lowercase() {
        let json = serde_json::to_string(&Action::Pipeline).unwrap();
        assert_eq!(json, "\"pipeline\"");
        assert_eq!("pipeline".parse::<Action>().unwrap(), Action::Pipeline);
        assert!("bogus".parse::<Action>().is_err());
    }

    #[test]
    fn success_envelope_has_ok_true_and_no_error() {
        let envelope = CallbackEnvelope::success(Uuid::nil(), serde_json::json!({"score": 1.0}));
        assert!(envelope.ok);
        assert!(envelope.error.is_none());
        assert!(envelope.data.is_some());
    }
}
