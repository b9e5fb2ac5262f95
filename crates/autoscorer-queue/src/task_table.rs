//! In-process task table (spec §4.5): tracks tasks this adapter personally
//! submitted, enough to dedupe concurrent submissions and answer `status` —
//! not a durable store (spec.md §2: the persistent result store is an
//! external collaborator).

use crate::message::Action;
use autoscorer_core::ErrorBlock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TaskRecord {
    pub task_id: Uuid,
    pub workspace: PathBuf,
    pub action: Action,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBlock>,
    pub submitted_at: String,
}

#[derive(Default)]
pub struct TaskTable {
    tasks: Mutex<HashMap<Uuid, TaskRecord>>,
    in_flight: Mutex<HashMap<(PathBuf, Action), Uuid>>,
}

/// Outcome of a submission attempt against the table.
pub enum Admission {
    /// A new task was admitted and should be dispatched.
    New(Uuid),
    /// An in-flight task already covers this `(workspace, action)`.
    Deduped(Uuid),
}

impl TaskTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `(workspace, action)`, returning the existing task if one is
    /// already in flight for the same key, else registering a new one as
    /// `Queued`.
    pub fn admit(&self, workspace: PathBuf, action: Action, task_id: Uuid) -> Admission {
        let mut in_flight = self.in_flight.lock().unwrap();
        let key = (workspace.clone(), action);
        if let Some(existing) = in_flight.get(&key) {
            return Admission::Deduped(*existing);
        }
        in_flight.insert(key, task_id);
        drop(in_flight);

        self.tasks.lock().unwrap().insert(
            task_id,
            TaskRecord {
                task_id,
                workspace,
                action,
                status: TaskStatus::Queued,
                data: None,
                error: None,
                submitted_at: chrono::Utc::now().to_rfc3339(),
            },
        );
        Admission::New(task_id)
    }

    pub fn mark_running(&self, task_id: Uuid) {
        if let Some(record) = self.tasks.lock().unwrap().get_mut(&task_id) {
            record.status = TaskStatus::Running;
        }
    }

    /// Record a terminal outcome and release the `(workspace, action)` slot
    /// so a future submission is no longer deduped against it.
    pub fn complete(&self, task_id: Uuid, outcome: Result<serde_json::Value, ErrorBlock>) {
        let mut tasks = self.tasks.lock().unwrap();
        let Some(record) = tasks.get_mut(&task_id) else { return };
        match outcome {
            Ok(data) => {
                record.status = TaskStatus::Succeeded;
                record.data = Some(data);
            }
            Err(error) => {
                record.status = TaskStatus::Failed;
                record.error = Some(error);
            }
        }
        let key = (record.workspace.clone(), record.action);
        drop(tasks);
        self.in_flight.lock().unwrap().remove(&key);
    }

    pub fn status(&self, task_id: Uuid) -> Option<TaskRecord> {
        self.tasks.lock().unwrap().get(&task_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_admission_for_same_key_is_deduped() {
        let table = TaskTable::new();
        let ws = PathBuf::from("/tmp/ws-a");
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        match table.admit(ws.clone(), Action::Pipeline, first) {
            Admission::New(id) => assert_eq!(id, first),
            Admission::Deduped(_) => panic!("first admission should be new"),
        }

        match table.admit(ws, Action::Pipeline, second) {
            Admission::Deduped(id) => assert_eq!(id, first),
            Admission::New(_) => panic!("second admission should dedupe to the first"),
        }
    }

    #[test]
    fn completing_a_task_frees_its_slot_for_resubmission() {
        let table = TaskTable::new();
        let ws = PathBuf::from("/tmp/ws-b");
        let first = Uuid::new_v4();
        table.admit(ws.clone(), Action::Run, first);
        table.complete(first, Ok(serde_json::json!({"ok": true})));

        let second = Uuid::new_v4();
        match table.admit(ws, Action::Run, second) {
            Admission::New(id) => assert_eq!(id, second),
            Admission::Deduped(_) => panic!("slot should have been freed"),
        }
    }

    #[test]
    fn status_reflects_terminal_outcome() {
        let table = TaskTable::new();
        let ws = PathBuf::from("/tmp/ws-c");
        let id = Uuid::new_v4();
        table.admit(ws, Action::Score, id);
        table.mark_running(id);
        assert_eq!(table.status(id).unwrap().status, TaskStatus::Running);

        table.complete(id, Ok(serde_json::json!({"score": 0.5})));
        let record = table.status(id).unwrap();
        assert_eq!(record.status, TaskStatus::Succeeded);
        assert!(record.data.is_some());
    }
}
