//! Wire messages exchanged with stage workers.
//!
//! Acks are decoded into a closed schema: unknown `task_type` or `status`
//! values are rejected at decode time instead of being mis-routed.

use serde::{Deserialize, Serialize};

use super::stage::{AckStatus, StageType};
use super::task_id::TaskId;
use crate::error::{OrchestratorError, Result};

/// Completion signal published by a worker onto the ack queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckMessage {
    #[serde(alias = "meetingId")]
    pub meeting_id: String,
    #[serde(alias = "taskId")]
    pub task_id: TaskId,
    #[serde(alias = "taskType")]
    pub task_type: StageType,
    pub status: AckStatus,
}

impl AckMessage {
    /// Decode and validate a raw ack body.
    pub fn decode(body: &[u8]) -> Result<AckMessage> {
        let ack: AckMessage = serde_json::from_slice(body)?;
        ack.validate()?;
        Ok(ack)
    }

    fn validate(&self) -> Result<()> {
        if self.meeting_id.trim().is_empty() {
            return Err(OrchestratorError::decode("ack has an empty meeting_id"));
        }

        match self.task_id.stage_for(&self.meeting_id) {
            Some(stage) if stage == self.task_type => Ok(()),
            Some(stage) => Err(OrchestratorError::Decode(format!(
                "task {} encodes stage {} but ack reports {}",
                self.task_id, stage, self.task_type
            ))),
            None => Err(OrchestratorError::Decode(format!(
                "task {} does not belong to meeting {}",
                self.task_id, self.meeting_id
            ))),
        }
    }
}

/// Stage-specific fields carried by a task message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StagePayload {
    Transcription { file_path: String },
    Ocr { file_path: String },
    Summary {},
    Report {},
    Notification { file_path: String, email: String },
}

impl StagePayload {
    pub fn stage(&self) -> StageType {
        match self {
            Self::Transcription { .. } => StageType::Transcription,
            Self::Ocr { .. } => StageType::Ocr,
            Self::Summary {} => StageType::Summary,
            Self::Report {} => StageType::Report,
            Self::Notification { .. } => StageType::Notification,
        }
    }

    /// Payload for a media stage registered with an already-stored file.
    pub fn for_media(stage: StageType, file_path: String) -> Result<StagePayload> {
        match stage {
            StageType::Transcription => Ok(Self::Transcription { file_path }),
            StageType::Ocr => Ok(Self::Ocr { file_path }),
            other => Err(OrchestratorError::InvalidInput(format!(
                "{} tasks are dispatched by the pipeline, not from media",
                other
            ))),
        }
    }
}

/// Task published to a stage queue. The task id doubles as correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskMessage {
    pub meeting_id: String,
    pub task_id: TaskId,
    #[serde(flatten)]
    pub payload: StagePayload,
}

impl TaskMessage {
    pub fn stage(&self) -> StageType {
        self.payload.stage()
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| OrchestratorError::Publish(format!("failed to encode task: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_decode_valid_ack() {
        let body = br#"{"meeting_id":"M1","task_id":"M1-transcription-1","task_type":"transcription","status":"completed"}"#;
        let ack = AckMessage::decode(body).unwrap();

        assert_eq!(ack.meeting_id, "M1");
        assert_eq!(ack.task_id.as_str(), "M1-transcription-1");
        assert_eq!(ack.task_type, StageType::Transcription);
        assert_eq!(ack.status, AckStatus::Completed);
    }

    #[test]
    fn test_decode_accepts_camel_case_and_email_alias() {
        let body = br#"{"meetingId":"M1","taskId":"M1-notification-9","taskType":"email","status":"completed"}"#;
        let ack = AckMessage::decode(body).unwrap();
        assert_eq!(ack.task_type, StageType::Notification);
    }

    #[test]
    fn test_decode_rejects_unknown_task_type() {
        let body = br#"{"meeting_id":"M1","task_id":"M1-video-1","task_type":"video","status":"completed"}"#;
        let err = AckMessage::decode(body).unwrap_err();
        assert!(matches!(err, OrchestratorError::Decode(_)));
    }

    #[test]
    fn test_decode_rejects_pending_status() {
        let body = br#"{"meeting_id":"M1","task_id":"M1-ocr-1","task_type":"ocr","status":"pending"}"#;
        assert!(matches!(
            AckMessage::decode(body),
            Err(OrchestratorError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_stage_mismatch() {
        let body = br#"{"meeting_id":"M1","task_id":"M1-ocr-1","task_type":"summary","status":"completed"}"#;
        let err = AckMessage::decode(body).unwrap_err();
        assert!(err.to_string().contains("encodes stage ocr"));
    }

    #[test]
    fn test_decode_rejects_foreign_task_id() {
        let body = br#"{"meeting_id":"M1","task_id":"M2-ocr-1","task_type":"ocr","status":"failed"}"#;
        let err = AckMessage::decode(body).unwrap_err();
        assert!(err.to_string().contains("does not belong to meeting M1"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            AckMessage::decode(b"not json"),
            Err(OrchestratorError::Decode(_))
        ));
    }

    #[test]
    fn test_task_message_wire_shape() {
        let message = TaskMessage {
            meeting_id: "M1".to_string(),
            task_id: TaskId::from("M1-notification-5"),
            payload: StagePayload::Notification {
                file_path: "/shared-report/M1/meeting_report_M1.pdf".to_string(),
                email: "owner@example.com".to_string(),
            },
        };

        let value: Value = serde_json::from_slice(&message.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "meeting_id": "M1",
                "task_id": "M1-notification-5",
                "file_path": "/shared-report/M1/meeting_report_M1.pdf",
                "email": "owner@example.com",
            })
        );
    }

    #[test]
    fn test_task_message_without_stage_fields() {
        let message = TaskMessage {
            meeting_id: "M1".to_string(),
            task_id: TaskId::from("M1-summary-5"),
            payload: StagePayload::Summary {},
        };

        let value: Value = serde_json::from_slice(&message.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"meeting_id": "M1", "task_id": "M1-summary-5"}));
        assert_eq!(message.stage(), StageType::Summary);
    }

    #[test]
    fn test_for_media_only_accepts_media_stages() {
        let payload = StagePayload::for_media(StageType::Ocr, "/shared-ocr/M1/a.png".into()).unwrap();
        assert_eq!(payload.stage(), StageType::Ocr);

        assert!(matches!(
            StagePayload::for_media(StageType::Report, "x".into()),
            Err(OrchestratorError::InvalidInput(_))
        ));
    }
}
