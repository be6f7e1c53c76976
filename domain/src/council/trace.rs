//! Trace event (§3, §6.7, C7): the append-only, totally-ordered record of
//! everything that happened in a session.

use super::stage::Stage;
use serde::{Deserialize, Serialize};

/// The closed set of trace event types (§3). Serializes to the exact
/// kebab-case strings listed in §3's event table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    SessionStart,
    SessionEnd,
    StageStart,
    StageEnd,
    MemberRequest,
    MemberResponse,
    VoteCast,
    VotingComplete,
    CorrectionTriggered,
    BackupActivated,
    MemoryCompressed,
    IterationStart,
    IterationEnd,
    Error,
    Narration,
    PlanReady,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::SessionStart => "session-start",
            EventType::SessionEnd => "session-end",
            EventType::StageStart => "stage-start",
            EventType::StageEnd => "stage-end",
            EventType::MemberRequest => "member-request",
            EventType::MemberResponse => "member-response",
            EventType::VoteCast => "vote-cast",
            EventType::VotingComplete => "voting-complete",
            EventType::CorrectionTriggered => "correction-triggered",
            EventType::BackupActivated => "backup-activated",
            EventType::MemoryCompressed => "memory-compressed",
            EventType::IterationStart => "iteration-start",
            EventType::IterationEnd => "iteration-end",
            EventType::Error => "error",
            EventType::Narration => "narration",
            EventType::PlanReady => "plan-ready",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in a session's trace (§3, §6.7).
///
/// `id` is globally unique (invariant 7); `timestamp` is milliseconds since
/// the session's `createdAt` instant, matching [`super::response::MemberResponse::timestamp`]
/// so ordering invariants can be checked without wall-clock dependence in tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub id: u64,
    pub session_id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEvent {
    pub fn new(id: u64, session_id: impl Into<String>, event_type: EventType, timestamp: u64) -> Self {
        Self {
            id,
            session_id: session_id.into(),
            event_type,
            timestamp,
            stage: None,
            member_id: None,
            member_name: None,
            duration_ms: None,
            data: None,
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_member(mut self, member_id: impl Into<String>, member_name: impl Into<String>) -> Self {
        self.member_id = Some(member_id.into());
        self.member_name = Some(member_name.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Checks invariant 7 (§3) over a full session trace: events must be
/// non-decreasing in timestamp and every id must be unique.
pub fn trace_is_well_ordered(events: &[TraceEvent]) -> bool {
    let mut ids = std::collections::HashSet::new();
    let mut last_ts = 0u64;
    for e in events {
        if e.timestamp < last_ts {
            return false;
        }
        if !ids.insert(e.id) {
            return false;
        }
        last_ts = e.timestamp;
    }
    true
}

/// Checks invariant 1 (§3): every `member-request` for a member has exactly
/// one terminal `member-response` or `error` for that same member, at a
/// later timestamp, within the session.
pub fn every_request_has_terminal_response(events: &[TraceEvent]) -> bool {
    use std::collections::HashMap;

    let mut requests: HashMap<&str, u64> = HashMap::new();
    let mut terminals: HashMap<&str, usize> = HashMap::new();

    for e in events {
        let Some(member_id) = e.member_id.as_deref() else { continue };
        match e.event_type {
            EventType::MemberRequest => {
                requests.insert(member_id, e.timestamp);
            }
            EventType::MemberResponse | EventType::Error => {
                *terminals.entry(member_id).or_insert(0) += 1;
            }
            _ => {}
        }
    }

    requests.keys().all(|m| terminals.get(m).copied().unwrap_or(0) == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_strings_match_spec() {
        assert_eq!(EventType::SessionStart.as_str(), "session-start");
        assert_eq!(EventType::MemberResponse.as_str(), "member-response");
        assert_eq!(EventType::PlanReady.as_str(), "plan-ready");
    }

    #[test]
    fn well_ordered_trace_passes() {
        let events = vec![
            TraceEvent::new(1, "s1", EventType::SessionStart, 0),
            TraceEvent::new(2, "s1", EventType::StageStart, 1),
            TraceEvent::new(3, "s1", EventType::StageEnd, 1),
        ];
        assert!(trace_is_well_ordered(&events));
    }

    #[test]
    fn out_of_order_timestamp_fails() {
        let events = vec![
            TraceEvent::new(1, "s1", EventType::SessionStart, 5),
            TraceEvent::new(2, "s1", EventType::StageStart, 1),
        ];
        assert!(!trace_is_well_ordered(&events));
    }

    #[test]
    fn duplicate_id_fails() {
        let events =
            vec![TraceEvent::new(1, "s1", EventType::SessionStart, 0), TraceEvent::new(1, "s1", EventType::StageStart, 1)];
        assert!(!trace_is_well_ordered(&events));
    }

    #[test]
    fn request_with_matching_response_satisfies_invariant() {
        let events = vec![
            TraceEvent::new(1, "s1", EventType::MemberRequest, 0).with_member("m1", "Claude"),
            TraceEvent::new(2, "s1", EventType::MemberResponse, 5).with_member("m1", "Claude"),
        ];
        assert!(every_request_has_terminal_response(&events));
    }

    #[test]
    fn request_without_response_fails_invariant() {
        let events = vec![TraceEvent::new(1, "s1", EventType::MemberRequest, 0).with_member("m1", "Claude")];
        assert!(!every_request_has_terminal_response(&events));
    }

    #[test]
    fn request_with_error_terminal_satisfies_invariant() {
        let events = vec![
            TraceEvent::new(1, "s1", EventType::MemberRequest, 0).with_member("m1", "Claude"),
            TraceEvent::new(2, "s1", EventType::Error, 5).with_member("m1", "Claude"),
        ];
        assert!(every_request_has_terminal_response(&events));
    }
}
