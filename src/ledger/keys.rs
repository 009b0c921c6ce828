//! Ledger key layout.
//!
//! `meeting:{id}:tasks`  task id → status map
//! `meeting:{id}:status` lifecycle status scalar
//! `meeting:{id}:email`  notify address scalar

const NAMESPACE: &str = "meeting";

pub fn meeting_prefix(meeting_id: &str) -> String {
    format!("{}:{}:", NAMESPACE, meeting_id)
}

/// Whether `key` is one of this meeting's own keys.
///
/// Meeting ids may contain `:`, so `meeting:team:` is also a prefix of
/// `meeting:team:42:status`. Only keys with a single segment after the
/// prefix belong to the meeting.
pub fn belongs_to(key: &str, meeting_id: &str) -> bool {
    key.strip_prefix(&meeting_prefix(meeting_id))
        .map_or(false, |rest| !rest.is_empty() && !rest.contains(':'))
}

pub fn tasks(meeting_id: &str) -> String {
    format!("{}tasks", meeting_prefix(meeting_id))
}

pub fn status(meeting_id: &str) -> String {
    format!("{}status", meeting_prefix(meeting_id))
}

pub fn notify_address(meeting_id: &str) -> String {
    format!("{}email", meeting_prefix(meeting_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(tasks("M1"), "meeting:M1:tasks");
        assert_eq!(status("M1"), "meeting:M1:status");
        assert_eq!(notify_address("M1"), "meeting:M1:email");
        assert!(tasks("M1").starts_with(&meeting_prefix("M1")));
        assert!(!tasks("M10").starts_with(&meeting_prefix("M1")));
    }

    #[test]
    fn test_belongs_to_stops_at_segment() {
        assert!(belongs_to("meeting:team:status", "team"));
        assert!(belongs_to("meeting:team:42:status", "team:42"));
        assert!(!belongs_to("meeting:team:42:status", "team"));
        assert!(!belongs_to("meeting:team:", "team"));
        assert!(!belongs_to("meeting:teams:status", "team"));
    }
}
