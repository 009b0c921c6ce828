//! Stage, task and meeting status types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One phase of the meeting pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageType {
    Transcription,
    Ocr,
    Summary,
    Report,
    #[serde(alias = "email")]
    Notification,
}

impl StageType {
    pub const ALL: [StageType; 5] = [
        Self::Transcription,
        Self::Ocr,
        Self::Summary,
        Self::Report,
        Self::Notification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transcription => "transcription",
            Self::Ocr => "ocr",
            Self::Summary => "summary",
            Self::Report => "report",
            Self::Notification => "notification",
        }
    }

    pub fn parse(s: &str) -> Option<StageType> {
        match s {
            "transcription" => Some(Self::Transcription),
            "ocr" => Some(Self::Ocr),
            "summary" => Some(Self::Summary),
            "report" => Some(Self::Report),
            "notification" | "email" => Some(Self::Notification),
            _ => None,
        }
    }

    /// Stages fed by uploaded media rather than by a cascade.
    pub fn is_media_stage(&self) -> bool {
        matches!(self, Self::Transcription | Self::Ocr)
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a task as stored in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<TaskStatus> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Completed and failed both count as terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Status a worker may report. `pending` is not a valid ack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Completed,
    Failed,
}

impl AckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl From<AckStatus> for TaskStatus {
    fn from(status: AckStatus) -> Self {
        match status {
            AckStatus::Completed => TaskStatus::Completed,
            AckStatus::Failed => TaskStatus::Failed,
        }
    }
}

/// Lifecycle status of a meeting. Transitions once, started → ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    Started,
    Ended,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Ended => "ended",
        }
    }

    pub fn parse(s: &str) -> Option<MeetingStatus> {
        match s {
            "started" => Some(Self::Started),
            "ended" => Some(Self::Ended),
            _ => None,
        }
    }
}

/// Per-stage task counts for one meeting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageSummary {
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StageSummary {
    pub fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
        }
    }

    /// Vacuously true when the stage has no tasks.
    pub fn all_terminal(&self) -> bool {
        self.pending == 0
    }

    /// A stage is in flight or done once any task is pending or completed.
    /// Stages whose tasks all failed may be dispatched again.
    pub fn blocks_redispatch(&self) -> bool {
        self.pending > 0 || self.completed > 0
    }
}
