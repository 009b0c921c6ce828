//! Composite task identifiers: `{meeting_id}-{stage}-{creation_nanos}`.
//!
//! The stage segment is the only link between a task and its stage. No
//! separate index is kept in the ledger.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use super::stage::StageType;

static LAST_NANOS: AtomicI64 = AtomicI64::new(0);

/// Wall-clock nanos, bumped so two ids minted in the same nanosecond differ.
fn creation_nanos() -> i64 {
    let now = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| chrono::Utc::now().timestamp_micros() * 1_000);

    let mut last = LAST_NANOS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_NANOS.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(current) => last = current,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn generate(meeting_id: &str, stage: StageType) -> Self {
        Self(format!("{}-{}-{}", meeting_id, stage.as_str(), creation_nanos()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Stage encoded in this id, if it belongs to `meeting_id`.
    pub fn stage_for(&self, meeting_id: &str) -> Option<StageType> {
        stage_in_task_id(&self.0, meeting_id)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse the stage segment of a raw task id.
///
/// The segment after the `{meeting_id}-` prefix, up to the next hyphen.
/// For hyphen-free meeting ids this is the second hyphen-delimited segment.
pub fn stage_in_task_id(task_id: &str, meeting_id: &str) -> Option<StageType> {
    let rest = task_id.strip_prefix(meeting_id)?.strip_prefix('-')?;
    let segment = rest.split('-').next()?;
    StageType::parse(segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_encodes_meeting_and_stage() {
        let id = TaskId::generate("M1", StageType::Summary);
        let parts: Vec<&str> = id.as_str().split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "M1");
        assert_eq!(parts[1], "summary");
        assert!(parts[2].parse::<i64>().unwrap() > 0);
        assert_eq!(id.stage_for("M1"), Some(StageType::Summary));
    }

    #[test]
    fn test_generate_is_unique_in_tight_loop() {
        let ids: std::collections::HashSet<TaskId> = (0..1000)
            .map(|_| TaskId::generate("M1", StageType::Ocr))
            .collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_stage_in_task_id() {
        assert_eq!(
            stage_in_task_id("M1-transcription-1", "M1"),
            Some(StageType::Transcription)
        );
        assert_eq!(stage_in_task_id("M1-ocr-42", "M1"), Some(StageType::Ocr));
        assert_eq!(stage_in_task_id("M1-email-42", "M1"), Some(StageType::Notification));
    }

    #[test]
    fn test_stage_in_task_id_rejects_other_meetings() {
        assert_eq!(stage_in_task_id("M2-ocr-1", "M1"), None);
        // Prefix match alone is not enough; the meeting id must end at a hyphen.
        assert_eq!(stage_in_task_id("M10-ocr-1", "M1"), None);
    }

    #[test]
    fn test_stage_in_task_id_malformed() {
        assert_eq!(stage_in_task_id("M1", "M1"), None);
        assert_eq!(stage_in_task_id("M1-", "M1"), None);
        assert_eq!(stage_in_task_id("M1-video-1", "M1"), None);
    }
}
