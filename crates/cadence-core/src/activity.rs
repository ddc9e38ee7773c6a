//! The Activity domain model: a common envelope plus a kind-specific
//! payload selected by `ActivityKind`.
//!
//! Fields that only make sense for one kind (meeting attendees, ticket SLA
//! state) live on the payload variant, so the type system enforces which
//! fields are meaningful for which kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ActivityId, ChecklistItemId, OrganizationId, UserId};
use crate::ticket::TicketStatus;

/// Closed set of activity kinds. Behavior branches per kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Note,
    Call,
    Email,
    Meeting,
    Task,
    Demo,
    Proposal,
    SupportTicket,
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Note => "note",
            Self::Call => "call",
            Self::Email => "email",
            Self::Meeting => "meeting",
            Self::Task => "task",
            Self::Demo => "demo",
            Self::Proposal => "proposal",
            Self::SupportTicket => "support_ticket",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ActivityKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "note" => Ok(Self::Note),
            "call" => Ok(Self::Call),
            "email" => Ok(Self::Email),
            "meeting" => Ok(Self::Meeting),
            "task" => Ok(Self::Task),
            "demo" => Ok(Self::Demo),
            "proposal" => Ok(Self::Proposal),
            "support_ticket" => Ok(Self::SupportTicket),
            other => Err(format!("unknown activity kind: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Urgent => write!(f, "urgent"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// Support-ticket severity. Absent severity deserializes as `Low`, which
/// keeps the 24h default SLA window for tickets filed without one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendeeStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
    Tentative,
}

impl std::str::FromStr for AttendeeStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "declined" => Ok(Self::Declined),
            "tentative" => Ok(Self::Tentative),
            other => Err(format!("unknown attendee status: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attendee {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: AttendeeStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: ChecklistItemId,
    pub text: String,
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ChecklistItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: ChecklistItemId::new(),
            text: text.into(),
            completed: false,
            completed_at: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl std::fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
            Self::Yearly => write!(f, "yearly"),
        }
    }
}

impl std::str::FromStr for RecurrencePattern {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(format!("unknown recurrence pattern: {other}")),
        }
    }
}

/// Recurrence sub-state. Present iff the activity repeats.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recurrence {
    pub pattern: RecurrencePattern,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_occurrence: Option<DateTime<Utc>>,
}

fn default_interval() -> u32 {
    1
}

/// Kind-specific payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityDetail {
    Note,
    Call,
    Email,
    Demo,
    Proposal,
    Meeting {
        #[serde(default)]
        attendees: Vec<Attendee>,
    },
    Task {
        #[serde(default)]
        estimated_hours: Option<f64>,
        #[serde(default)]
        actual_hours: Option<f64>,
    },
    SupportTicket {
        ticket_number: String,
        #[serde(default)]
        severity: Severity,
        #[serde(default)]
        status: TicketStatus,
        #[serde(default)]
        sla_due_at: Option<DateTime<Utc>>,
        #[serde(default)]
        sla_breached: bool,
        #[serde(default)]
        resolution_time_minutes: Option<i64>,
    },
}

impl ActivityDetail {
    pub fn kind(&self) -> ActivityKind {
        match self {
            Self::Note => ActivityKind::Note,
            Self::Call => ActivityKind::Call,
            Self::Email => ActivityKind::Email,
            Self::Demo => ActivityKind::Demo,
            Self::Proposal => ActivityKind::Proposal,
            Self::Meeting { .. } => ActivityKind::Meeting,
            Self::Task { .. } => ActivityKind::Task,
            Self::SupportTicket { .. } => ActivityKind::SupportTicket,
        }
    }
}

/// One unit of work or interaction, scoped to an organization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    /// Owning tenant. Set once at creation, never changed; every store
    /// query is scoped by it.
    pub organization_id: OrganizationId,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub escalated_to: Option<UserId>,
    #[serde(default)]
    pub escalated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    /// Derived from checklist completion ratio; forced to 100 on completion.
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub snoozed_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminder_sent: bool,
    /// Parent activity, if any. Plain adjacency reference; never loaded
    /// eagerly.
    #[serde(default)]
    pub parent_id: Option<ActivityId>,
    #[serde(default)]
    pub custom_fields: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub detail: ActivityDetail,
}

impl Activity {
    pub fn kind(&self) -> ActivityKind {
        self.detail.kind()
    }

    /// Completion ratio of a checklist as 0-100, 0 when empty.
    pub fn checklist_progress(items: &[ChecklistItem]) -> u8 {
        if items.is_empty() {
            return 0;
        }
        let completed = items.iter().filter(|i| i.completed).count();
        ((completed as f64 / items.len() as f64) * 100.0).round() as u8
    }

    /// Re-derive `progress` from the checklist. Called after every
    /// checklist mutation.
    pub fn recompute_progress(&mut self) {
        self.progress = Self::checklist_progress(&self.checklist);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(completed: bool) -> ChecklistItem {
        ChecklistItem {
            completed,
            completed_at: completed.then(Utc::now),
            ..ChecklistItem::new("item")
        }
    }

    #[test]
    fn empty_checklist_is_zero_progress() {
        assert_eq!(Activity::checklist_progress(&[]), 0);
    }

    #[test]
    fn half_completed_checklist_is_fifty() {
        let items = vec![item(true), item(true), item(false), item(false)];
        assert_eq!(Activity::checklist_progress(&items), 50);
    }

    #[test]
    fn one_of_three_rounds() {
        let items = vec![item(true), item(false), item(false)];
        assert_eq!(Activity::checklist_progress(&items), 33);
    }

    #[test]
    fn two_of_three_rounds_up() {
        let items = vec![item(true), item(true), item(false)];
        assert_eq!(Activity::checklist_progress(&items), 67);
    }

    #[test]
    fn all_completed_is_hundred() {
        let items = vec![item(true), item(true)];
        assert_eq!(Activity::checklist_progress(&items), 100);
    }

    #[test]
    fn kind_display_matches_from_str() {
        for kind in [
            ActivityKind::Note,
            ActivityKind::Call,
            ActivityKind::Email,
            ActivityKind::Meeting,
            ActivityKind::Task,
            ActivityKind::Demo,
            ActivityKind::Proposal,
            ActivityKind::SupportTicket,
        ] {
            let parsed: ActivityKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn unknown_kind_fails_to_parse() {
        assert!("sms".parse::<ActivityKind>().is_err());
    }

    #[test]
    fn detail_kind_matches_variant() {
        assert_eq!(ActivityDetail::Note.kind(), ActivityKind::Note);
        assert_eq!(
            ActivityDetail::Meeting { attendees: vec![] }.kind(),
            ActivityKind::Meeting
        );
        let ticket = ActivityDetail::SupportTicket {
            ticket_number: "TKT-X-ABCD".into(),
            severity: Severity::High,
            status: TicketStatus::Open,
            sla_due_at: None,
            sla_breached: false,
            resolution_time_minutes: None,
        };
        assert_eq!(ticket.kind(), ActivityKind::SupportTicket);
    }

    #[test]
    fn detail_serde_is_kind_tagged() {
        let detail = ActivityDetail::Task {
            estimated_hours: Some(2.0),
            actual_hours: None,
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["kind"], "task");
        assert_eq!(json["estimated_hours"], 2.0);

        let back: ActivityDetail = serde_json::from_value(json).unwrap();
        assert_eq!(back, detail);
    }

    #[test]
    fn severity_defaults_to_low() {
        let json = serde_json::json!({
            "kind": "support_ticket",
            "ticket_number": "TKT-1-AAAA"
        });
        let detail: ActivityDetail = serde_json::from_value(json).unwrap();
        match detail {
            ActivityDetail::SupportTicket { severity, status, .. } => {
                assert_eq!(severity, Severity::Low);
                assert_eq!(status, TicketStatus::Open);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn recurrence_interval_defaults_to_one() {
        let json = serde_json::json!({"pattern": "weekly"});
        let rec: Recurrence = serde_json::from_value(json).unwrap();
        assert_eq!(rec.interval, 1);
        assert!(rec.end_date.is_none());
    }

    #[test]
    fn unrecognized_pattern_fails_to_parse() {
        assert!("biweekly".parse::<RecurrencePattern>().is_err());
    }
}
