//! The Activity Lifecycle Controller.
//!
//! The only component with side effects: it applies the pure policies
//! (SLA, recurrence, ticket numbering) before persistence, so every
//! generated field is computed explicitly here rather than in a storage
//! hook. Tenancy is the caller's concern; every method takes the
//! organization id the authorization layer resolved.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use cadence_core::activity::{
    Activity, ActivityDetail, ActivityKind, Attendee, AttendeeStatus, ChecklistItem, Priority,
    Recurrence, Severity,
};
use cadence_core::clock::Clock;
use cadence_core::ids::{ActivityId, ChecklistItemId, OrganizationId, UserId};
use cadence_core::ticket::{generate_ticket_number, TicketStatus};
use cadence_core::{recurrence, sla};
use cadence_store::{ActivityFilter, ActivityRepo, Database, StoreError};

use crate::error::EngineError;
use crate::notify::Notifier;

/// Result of a mutating operation. `warnings` carries notification
/// soft-failures; they never fail the operation itself.
#[derive(Debug, Serialize)]
pub struct Outcome {
    pub activity: Activity,
    pub warnings: Vec<String>,
}

/// Result of `complete`: the completed activity plus the next occurrence,
/// if one was spawned.
#[derive(Debug, Serialize)]
pub struct CompleteOutcome {
    pub activity: Activity,
    pub spawned: Option<Activity>,
    pub warnings: Vec<String>,
}

/// Fields accepted at creation. Kind-specific fields are read only when the
/// kind matches.
#[derive(Clone, Debug, Deserialize)]
pub struct NewActivity {
    pub kind: ActivityKind,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
    #[serde(default)]
    pub checklist: Vec<String>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub ticket_number: Option<String>,
    #[serde(default)]
    pub parent_id: Option<ActivityId>,
    #[serde(default)]
    pub custom_fields: serde_json::Map<String, serde_json::Value>,
}

/// Partial update. Absent fields are left unchanged; `custom_fields`
/// entries are merged over the existing bag.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ActivityPatch {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
    #[serde(default)]
    pub ticket_status: Option<TicketStatus>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub custom_fields: Option<serde_json::Map<String, serde_json::Value>>,
}

/// One checklist mutation: toggle/rename an existing item, or append a new
/// one when `item_id` does not match and `text` is provided.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChecklistUpdate {
    #[serde(default)]
    pub item_id: Option<ChecklistItemId>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub text: Option<String>,
}

pub struct LifecycleController {
    repo: ActivityRepo,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl LifecycleController {
    pub fn new(db: Database, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo: ActivityRepo::new(db),
            notifier,
            clock,
        }
    }

    #[instrument(skip(self, new), fields(organization_id = %org, kind = %new.kind))]
    pub async fn create(
        &self,
        org: &OrganizationId,
        new: NewActivity,
    ) -> Result<Outcome, EngineError> {
        if new.subject.trim().is_empty() {
            return Err(EngineError::Validation("subject must not be empty".into()));
        }
        if let Some(rec) = &new.recurrence {
            if rec.interval == 0 {
                return Err(EngineError::Validation(
                    "recurrence interval must be at least 1".into(),
                ));
            }
        }

        let now = self.clock.now();
        let detail = self.build_detail(&new, now);
        let checklist: Vec<ChecklistItem> =
            new.checklist.into_iter().map(ChecklistItem::new).collect();

        let mut activity = Activity {
            id: ActivityId::new(),
            organization_id: org.clone(),
            subject: new.subject,
            description: new.description,
            scheduled_at: new.scheduled_at,
            due_date: new.due_date,
            completed_at: None,
            is_completed: false,
            priority: new.priority,
            assigned_to: new.assigned_to,
            escalated_to: None,
            escalated_at: None,
            recurrence: new.recurrence,
            checklist,
            progress: 0,
            rating: None,
            snoozed_until: None,
            reminder_sent: false,
            parent_id: new.parent_id,
            custom_fields: new.custom_fields,
            created_at: now,
            updated_at: now,
            detail,
        };
        activity.recompute_progress();

        self.repo.create(&activity)?;

        let mut warnings = Vec::new();
        if let Some(assignee) = activity.assigned_to.clone() {
            self.notify_assignment(&mut activity, &assignee, &mut warnings)
                .await;
        }

        Ok(Outcome { activity, warnings })
    }

    pub fn get(&self, org: &OrganizationId, id: &ActivityId) -> Result<Activity, EngineError> {
        Ok(self.repo.get(id, org)?)
    }

    pub fn list(
        &self,
        org: &OrganizationId,
        filter: &ActivityFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Activity>, EngineError> {
        Ok(self.repo.list(org, filter, limit, offset)?)
    }

    pub fn delete(&self, org: &OrganizationId, id: &ActivityId) -> Result<(), EngineError> {
        Ok(self.repo.delete(id, org)?)
    }

    /// Complete an activity. Exactly one of two concurrent calls wins the
    /// conditional write; the loser gets `AlreadyCompleted`, so a recurring
    /// activity never double-spawns its next occurrence.
    #[instrument(skip(self), fields(organization_id = %org, activity_id = %id))]
    pub async fn complete(
        &self,
        org: &OrganizationId,
        id: &ActivityId,
    ) -> Result<CompleteOutcome, EngineError> {
        let mut activity = self.repo.get(id, org)?;
        if activity.is_completed {
            return Err(EngineError::AlreadyCompleted(format!("activity {id}")));
        }

        let now = self.clock.now();
        activity.is_completed = true;
        activity.completed_at = Some(now);
        activity.progress = 100;
        activity.updated_at = now;

        match &mut activity.detail {
            ActivityDetail::Task {
                estimated_hours,
                actual_hours,
            } => {
                if estimated_hours.is_some() {
                    let hours = (now - activity.created_at).num_seconds() as f64 / 3600.0;
                    *actual_hours = Some((hours * 100.0).round() / 100.0);
                }
            }
            ActivityDetail::SupportTicket {
                status,
                sla_due_at,
                sla_breached,
                resolution_time_minutes,
                ..
            } => {
                *status = TicketStatus::Resolved;
                if resolution_time_minutes.is_none() {
                    let minutes =
                        (now - activity.created_at).num_milliseconds() as f64 / 60_000.0;
                    *resolution_time_minutes = Some(minutes.round() as i64);
                }
                if let Some(due) = sla_due_at {
                    if now > *due {
                        *sla_breached = true;
                    }
                }
            }
            _ => {}
        }

        self.repo.mark_completed(&activity).map_err(|e| match e {
            StoreError::Conflict(_) => EngineError::AlreadyCompleted(format!("activity {id}")),
            other => other.into(),
        })?;

        let spawned = match self.spawn_next_occurrence(&activity, now)? {
            Some(child) => {
                self.repo.create(&child)?;
                Some(child)
            }
            None => None,
        };

        Ok(CompleteOutcome {
            activity,
            spawned,
            warnings: Vec::new(),
        })
    }

    #[instrument(skip(self, patch), fields(organization_id = %org, activity_id = %id))]
    pub async fn update(
        &self,
        org: &OrganizationId,
        id: &ActivityId,
        patch: ActivityPatch,
    ) -> Result<Outcome, EngineError> {
        let mut activity = self.repo.get(id, org)?;
        let now = self.clock.now();
        let previous_assignee = activity.assigned_to.clone();

        if let Some(next_status) = patch.ticket_status {
            let ActivityDetail::SupportTicket { status, .. } = &mut activity.detail else {
                return Err(EngineError::Validation(format!(
                    "ticket_status only applies to support tickets, not {}",
                    activity.kind()
                )));
            };
            // Resolution happens through `complete`, which also computes
            // resolution time; a generic patch must not shortcut it.
            if next_status == TicketStatus::Resolved && *status != TicketStatus::Resolved {
                return Err(EngineError::Validation(
                    "tickets are resolved by completing the activity".into(),
                ));
            }
            if !status.can_transition_to(next_status) {
                return Err(EngineError::InvalidTransition {
                    from: *status,
                    to: next_status,
                });
            }
            *status = next_status;
        }

        if let Some(subject) = patch.subject {
            if subject.trim().is_empty() {
                return Err(EngineError::Validation("subject must not be empty".into()));
            }
            activity.subject = subject;
        }
        if let Some(description) = patch.description {
            activity.description = Some(description);
        }
        if let Some(scheduled_at) = patch.scheduled_at {
            activity.scheduled_at = Some(scheduled_at);
        }
        if let Some(due_date) = patch.due_date {
            activity.due_date = Some(due_date);
        }
        if let Some(priority) = patch.priority {
            activity.priority = priority;
        }
        if let Some(assignee) = patch.assigned_to {
            activity.assigned_to = Some(assignee);
        }
        if let Some(rec) = patch.recurrence {
            if rec.interval == 0 {
                return Err(EngineError::Validation(
                    "recurrence interval must be at least 1".into(),
                ));
            }
            activity.recurrence = Some(rec);
        }
        if let Some(hours) = patch.estimated_hours {
            if let ActivityDetail::Task {
                estimated_hours, ..
            } = &mut activity.detail
            {
                *estimated_hours = Some(hours);
            }
        }
        if let Some(fields) = patch.custom_fields {
            for (k, v) in fields {
                activity.custom_fields.insert(k, v);
            }
        }

        // Every update of an incomplete support ticket rechecks the SLA
        // deadline; the breach flag only ever goes false -> true.
        if !activity.is_completed {
            apply_sla_breach(&mut activity.detail, now);
        }

        activity.updated_at = now;
        self.repo.update(&activity)?;

        let mut warnings = Vec::new();
        if let Some(assignee) = activity.assigned_to.clone() {
            if previous_assignee.as_ref() != Some(&assignee) {
                self.notify_assignment(&mut activity, &assignee, &mut warnings)
                    .await;
            }
        }

        Ok(Outcome { activity, warnings })
    }

    #[instrument(skip(self, update), fields(organization_id = %org, activity_id = %id))]
    pub fn update_checklist(
        &self,
        org: &OrganizationId,
        id: &ActivityId,
        update: ChecklistUpdate,
    ) -> Result<Outcome, EngineError> {
        let mut activity = self.repo.get(id, org)?;
        let now = self.clock.now();

        let existing = update.item_id.as_ref().and_then(|item_id| {
            activity.checklist.iter_mut().find(|i| &i.id == item_id)
        });

        match existing {
            Some(item) => {
                if let Some(completed) = update.completed {
                    item.completed = completed;
                    item.completed_at = completed.then_some(now);
                }
                if let Some(text) = update.text {
                    item.text = text;
                }
            }
            None => {
                let Some(text) = update.text else {
                    return Err(EngineError::Validation(
                        "text is required to add a checklist item".into(),
                    ));
                };
                activity.checklist.push(ChecklistItem::new(text));
            }
        }

        activity.recompute_progress();
        if !activity.is_completed {
            apply_sla_breach(&mut activity.detail, now);
        }
        activity.updated_at = now;
        self.repo.update(&activity)?;

        Ok(Outcome {
            activity,
            warnings: Vec::new(),
        })
    }

    #[instrument(skip(self), fields(organization_id = %org, activity_id = %id, email))]
    pub fn update_attendee_status(
        &self,
        org: &OrganizationId,
        id: &ActivityId,
        email: &str,
        status: AttendeeStatus,
    ) -> Result<Outcome, EngineError> {
        let mut activity = self.repo.get(id, org)?;
        let now = self.clock.now();

        let ActivityDetail::Meeting { attendees } = &mut activity.detail else {
            return Err(EngineError::Validation(format!(
                "attendees only apply to meetings, not {}",
                activity.kind()
            )));
        };

        let Some(attendee) = attendees.iter_mut().find(|a| a.email == email) else {
            return Err(EngineError::NotFound(format!("attendee {email}")));
        };
        attendee.status = status;

        activity.updated_at = now;
        self.repo.update(&activity)?;

        Ok(Outcome {
            activity,
            warnings: Vec::new(),
        })
    }

    #[instrument(skip(self, reason), fields(organization_id = %org, activity_id = %id, escalate_to = %escalate_to))]
    pub async fn escalate(
        &self,
        org: &OrganizationId,
        id: &ActivityId,
        escalate_to: UserId,
        reason: String,
    ) -> Result<Outcome, EngineError> {
        let mut activity = self.repo.get(id, org)?;
        let now = self.clock.now();

        let ActivityDetail::SupportTicket { status, .. } = &mut activity.detail else {
            return Err(EngineError::NotFound(format!(
                "support ticket {id} (found a {})",
                activity.kind()
            )));
        };
        if !status.can_transition_to(TicketStatus::Escalated) {
            return Err(EngineError::InvalidTransition {
                from: *status,
                to: TicketStatus::Escalated,
            });
        }
        *status = TicketStatus::Escalated;

        activity.escalated_to = Some(escalate_to.clone());
        activity.escalated_at = Some(now);
        activity
            .custom_fields
            .insert("escalation_reason".into(), serde_json::json!(reason));

        if !activity.is_completed {
            apply_sla_breach(&mut activity.detail, now);
        }

        activity.updated_at = now;
        self.repo.update(&activity)?;

        let mut warnings = Vec::new();
        if let Err(e) = self
            .notifier
            .escalated(&activity, &escalate_to, &reason)
            .await
        {
            warn!(activity_id = %activity.id, error = %e, "escalation notification failed");
            warnings.push(format!("escalation notification failed: {e}"));
            self.record_notification_error(&mut activity, &e.to_string());
        }

        Ok(Outcome { activity, warnings })
    }

    #[instrument(skip(self), fields(organization_id = %org, activity_id = %id))]
    pub fn snooze(
        &self,
        org: &OrganizationId,
        id: &ActivityId,
        minutes: Option<i64>,
    ) -> Result<Outcome, EngineError> {
        let minutes = minutes.unwrap_or(15);
        if minutes <= 0 {
            return Err(EngineError::Validation(
                "snooze minutes must be positive".into(),
            ));
        }

        let mut activity = self.repo.get(id, org)?;
        let now = self.clock.now();
        activity.snoozed_until = Some(now + Duration::minutes(minutes));
        activity.reminder_sent = false;
        if !activity.is_completed {
            apply_sla_breach(&mut activity.detail, now);
        }
        activity.updated_at = now;
        self.repo.update(&activity)?;

        Ok(Outcome {
            activity,
            warnings: Vec::new(),
        })
    }

    #[instrument(skip(self), fields(organization_id = %org, activity_id = %id, rating))]
    pub fn rate(
        &self,
        org: &OrganizationId,
        id: &ActivityId,
        rating: u8,
    ) -> Result<Outcome, EngineError> {
        if !(1..=5).contains(&rating) {
            return Err(EngineError::Validation(format!(
                "rating must be between 1 and 5, got {rating}"
            )));
        }

        let mut activity = self.repo.get(id, org)?;
        let now = self.clock.now();
        activity.rating = Some(rating);
        if !activity.is_completed {
            apply_sla_breach(&mut activity.detail, now);
        }
        activity.updated_at = now;
        self.repo.update(&activity)?;

        Ok(Outcome {
            activity,
            warnings: Vec::new(),
        })
    }

    fn build_detail(&self, new: &NewActivity, now: DateTime<Utc>) -> ActivityDetail {
        match new.kind {
            ActivityKind::Note => ActivityDetail::Note,
            ActivityKind::Call => ActivityDetail::Call,
            ActivityKind::Email => ActivityDetail::Email,
            ActivityKind::Demo => ActivityDetail::Demo,
            ActivityKind::Proposal => ActivityDetail::Proposal,
            ActivityKind::Meeting => ActivityDetail::Meeting {
                attendees: new.attendees.clone(),
            },
            ActivityKind::Task => ActivityDetail::Task {
                estimated_hours: new.estimated_hours,
                actual_hours: None,
            },
            ActivityKind::SupportTicket => {
                let severity = new.severity.unwrap_or_default();
                let ticket_number = new
                    .ticket_number
                    .clone()
                    .unwrap_or_else(|| generate_ticket_number(now.timestamp_millis()));
                ActivityDetail::SupportTicket {
                    ticket_number,
                    severity,
                    status: TicketStatus::Open,
                    // Computed exactly once, here; never recomputed.
                    sla_due_at: Some(sla::sla_due_at(now, severity)),
                    sla_breached: false,
                    resolution_time_minutes: None,
                }
            }
        }
    }

    /// The next occurrence of a completed recurring activity, or None when
    /// the activity does not repeat, the pattern yields nothing, or the end
    /// date has been reached.
    fn spawn_next_occurrence(
        &self,
        activity: &Activity,
        now: DateTime<Utc>,
    ) -> Result<Option<Activity>, EngineError> {
        let Some(rec) = &activity.recurrence else {
            return Ok(None);
        };

        let base = activity.scheduled_at.unwrap_or(now);
        let Some(next) = recurrence::next_occurrence(base, rec.pattern, rec.interval) else {
            return Ok(None);
        };
        if let Some(end) = rec.end_date {
            if next > end {
                return Ok(None);
            }
        }

        let checklist = activity
            .checklist
            .iter()
            .map(|item| ChecklistItem::new(item.text.clone()))
            .collect();

        let detail = match &activity.detail {
            ActivityDetail::Task {
                estimated_hours, ..
            } => ActivityDetail::Task {
                estimated_hours: *estimated_hours,
                actual_hours: None,
            },
            ActivityDetail::SupportTicket { severity, .. } => {
                // A fresh occurrence is a fresh ticket: new number, new SLA
                // window, workflow restarted.
                ActivityDetail::SupportTicket {
                    ticket_number: generate_ticket_number(now.timestamp_millis()),
                    severity: *severity,
                    status: TicketStatus::Open,
                    sla_due_at: Some(sla::sla_due_at(now, *severity)),
                    sla_breached: false,
                    resolution_time_minutes: None,
                }
            }
            ActivityDetail::Meeting { attendees } => ActivityDetail::Meeting {
                attendees: attendees
                    .iter()
                    .map(|a| Attendee {
                        email: a.email.clone(),
                        name: a.name.clone(),
                        status: AttendeeStatus::Pending,
                    })
                    .collect(),
            },
            other => other.clone(),
        };

        Ok(Some(Activity {
            id: ActivityId::new(),
            organization_id: activity.organization_id.clone(),
            subject: activity.subject.clone(),
            description: activity.description.clone(),
            scheduled_at: Some(next),
            due_date: Some(next),
            completed_at: None,
            is_completed: false,
            priority: activity.priority,
            assigned_to: activity.assigned_to.clone(),
            escalated_to: None,
            escalated_at: None,
            recurrence: Some(Recurrence {
                pattern: rec.pattern,
                interval: rec.interval,
                end_date: rec.end_date,
                next_occurrence: None,
            }),
            checklist,
            progress: 0,
            rating: None,
            snoozed_until: None,
            reminder_sent: false,
            parent_id: Some(activity.id.clone()),
            custom_fields: activity.custom_fields.clone(),
            created_at: now,
            updated_at: now,
            detail,
        }))
    }

    async fn notify_assignment(
        &self,
        activity: &mut Activity,
        assignee: &UserId,
        warnings: &mut Vec<String>,
    ) {
        if let Err(e) = self.notifier.assignment_changed(activity, assignee).await {
            warn!(activity_id = %activity.id, error = %e, "assignment notification failed");
            warnings.push(format!("assignment notification failed: {e}"));
            self.record_notification_error(activity, &e.to_string());
        }
    }

    /// Breadcrumb for failed notifications. Best effort: a failure to
    /// persist the breadcrumb is logged, never surfaced.
    fn record_notification_error(&self, activity: &mut Activity, message: &str) {
        let entry = activity
            .custom_fields
            .entry("notification_errors".to_string())
            .or_insert_with(|| serde_json::json!([]));
        if let Some(list) = entry.as_array_mut() {
            list.push(serde_json::json!(message));
        }
        if let Err(e) = self.repo.update(activity) {
            warn!(activity_id = %activity.id, error = %e, "failed to record notification error");
        }
    }
}

/// SLA breach check: flips `sla_breached` to true when the deadline has
/// passed on an incomplete ticket. Never flips it back.
fn apply_sla_breach(detail: &mut ActivityDetail, now: DateTime<Utc>) {
    if let ActivityDetail::SupportTicket {
        sla_due_at: Some(due),
        sla_breached,
        ..
    } = detail
    {
        if now > *due {
            *sla_breached = true;
        }
    }
}
