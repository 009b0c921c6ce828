//! Pipeline domain types.
//!
//! Stages, task identifiers and the messages exchanged with stage workers.

pub mod messages;
pub mod stage;
pub mod task_id;

pub use messages::{AckMessage, StagePayload, TaskMessage};
pub use stage::{AckStatus, MeetingStatus, StageSummary, StageType, TaskStatus};
pub use task_id::{stage_in_task_id, TaskId};
