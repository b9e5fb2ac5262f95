//! AutoScorer Async Task Adapter (spec §4.5) - submit/status/callback
//! bridge between the Scheduler and an external task queue.

pub mod adapter;
pub mod callback;
pub mod message;
pub mod task_table;

pub use adapter::{JetStreamProducer, QueueAdapter, SubmitRequest, SubmitResponse, JOB_STREAM, JOB_SUBJECT};
pub use callback::CallbackClient;
pub use message::{Action, CallbackEnvelope, CallbackMeta, JobMessage};
pub use task_table::{Admission, TaskRecord, TaskStatus, TaskTable};
