use chrono::Utc;
use rusqlite::params;
use tracing::instrument;

use cadence_core::activity::{
    Activity, ActivityDetail, ActivityKind, ChecklistItem, Recurrence,
};
use cadence_core::ids::{ActivityId, OrganizationId, UserId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// Filters for listing activities within an organization.
#[derive(Clone, Debug, Default)]
pub struct ActivityFilter {
    pub kind: Option<ActivityKind>,
    pub is_completed: Option<bool>,
    pub assigned_to: Option<UserId>,
}

const COLUMNS: &str = "id, organization_id, kind, subject, description, scheduled_at, due_date, \
     completed_at, is_completed, priority, assigned_to, escalated_to, escalated_at, \
     recurrence, checklist, progress, rating, snoozed_until, reminder_sent, parent_id, \
     custom_fields, ticket_number, detail, created_at, updated_at";

/// Persistence for activities. Every read and write is scoped by
/// `organization_id`; a row from another tenant is indistinguishable from a
/// missing row.
pub struct ActivityRepo {
    db: Database,
}

impl ActivityRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a fully-built activity. A duplicate ticket number maps to
    /// `Conflict` via the UNIQUE column.
    #[instrument(skip(self, activity), fields(activity_id = %activity.id, organization_id = %activity.organization_id, kind = %activity.kind()))]
    pub fn create(&self, activity: &Activity) -> Result<(), StoreError> {
        let recurrence_json = activity
            .recurrence
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let checklist_json = serde_json::to_string(&activity.checklist)?;
        let custom_fields_json = serde_json::to_string(&activity.custom_fields)?;
        let detail_json = serde_json::to_string(&activity.detail)?;
        let ticket_number = match &activity.detail {
            ActivityDetail::SupportTicket { ticket_number, .. } => Some(ticket_number.clone()),
            _ => None,
        };

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO activities (id, organization_id, kind, subject, description, \
                 scheduled_at, due_date, completed_at, is_completed, priority, assigned_to, \
                 escalated_to, escalated_at, recurrence, checklist, progress, rating, \
                 snoozed_until, reminder_sent, parent_id, custom_fields, ticket_number, detail, \
                 created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
                 ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)",
                params![
                    activity.id.as_str(),
                    activity.organization_id.as_str(),
                    activity.kind().to_string(),
                    activity.subject,
                    activity.description,
                    activity.scheduled_at.map(|t| t.to_rfc3339()),
                    activity.due_date.map(|t| t.to_rfc3339()),
                    activity.completed_at.map(|t| t.to_rfc3339()),
                    activity.is_completed,
                    activity.priority.to_string(),
                    activity.assigned_to.as_ref().map(|u| u.as_str()),
                    activity.escalated_to.as_ref().map(|u| u.as_str()),
                    activity.escalated_at.map(|t| t.to_rfc3339()),
                    recurrence_json,
                    checklist_json,
                    i64::from(activity.progress),
                    activity.rating.map(i64::from),
                    activity.snoozed_until.map(|t| t.to_rfc3339()),
                    activity.reminder_sent,
                    activity.parent_id.as_ref().map(|p| p.as_str()),
                    custom_fields_json,
                    ticket_number,
                    detail_json,
                    activity.created_at.to_rfc3339(),
                    activity.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    /// Get an activity by id within an organization.
    #[instrument(skip(self), fields(activity_id = %id, organization_id = %org))]
    pub fn get(&self, id: &ActivityId, org: &OrganizationId) -> Result<Activity, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM activities WHERE id = ?1 AND organization_id = ?2"
            ))?;
            let mut rows = stmt.query([id.as_str(), org.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_activity(row),
                None => Err(StoreError::NotFound(format!("activity {id}"))),
            }
        })
    }

    /// List activities for an organization, newest first.
    #[instrument(skip(self, filter), fields(organization_id = %org))]
    pub fn list(
        &self,
        org: &OrganizationId,
        filter: &ActivityFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Activity>, StoreError> {
        self.db.with_conn(|conn| {
            let mut sql = format!("SELECT {COLUMNS} FROM activities WHERE organization_id = ?1");
            let mut sql_params: Vec<Box<dyn rusqlite::types::ToSql>> =
                vec![Box::new(org.as_str().to_string())];

            if let Some(kind) = filter.kind {
                sql.push_str(&format!(" AND kind = ?{}", sql_params.len() + 1));
                sql_params.push(Box::new(kind.to_string()));
            }
            if let Some(completed) = filter.is_completed {
                sql.push_str(&format!(" AND is_completed = ?{}", sql_params.len() + 1));
                sql_params.push(Box::new(completed));
            }
            if let Some(assigned) = &filter.assigned_to {
                sql.push_str(&format!(" AND assigned_to = ?{}", sql_params.len() + 1));
                sql_params.push(Box::new(assigned.as_str().to_string()));
            }

            sql.push_str(&format!(
                " ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
                sql_params.len() + 1,
                sql_params.len() + 2
            ));
            sql_params.push(Box::new(i64::from(limit)));
            sql_params.push(Box::new(i64::from(offset)));

            let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                sql_params.iter().map(|p| p.as_ref()).collect();
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(param_refs.as_slice())?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_activity(row)?);
            }
            Ok(results)
        })
    }

    /// Full update of the mutable columns; `id`, `organization_id`, `kind`,
    /// `ticket_number`, and `created_at` never change after insert.
    #[instrument(skip(self, activity), fields(activity_id = %activity.id, organization_id = %activity.organization_id))]
    pub fn update(&self, activity: &Activity) -> Result<(), StoreError> {
        let recurrence_json = activity
            .recurrence
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let checklist_json = serde_json::to_string(&activity.checklist)?;
        let custom_fields_json = serde_json::to_string(&activity.custom_fields)?;
        let detail_json = serde_json::to_string(&activity.detail)?;

        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE activities SET subject = ?1, description = ?2, scheduled_at = ?3, \
                 due_date = ?4, priority = ?5, assigned_to = ?6, escalated_to = ?7, \
                 escalated_at = ?8, recurrence = ?9, checklist = ?10, progress = ?11, \
                 rating = ?12, snoozed_until = ?13, reminder_sent = ?14, parent_id = ?15, \
                 custom_fields = ?16, detail = ?17, updated_at = ?18
                 WHERE id = ?19 AND organization_id = ?20",
                params![
                    activity.subject,
                    activity.description,
                    activity.scheduled_at.map(|t| t.to_rfc3339()),
                    activity.due_date.map(|t| t.to_rfc3339()),
                    activity.priority.to_string(),
                    activity.assigned_to.as_ref().map(|u| u.as_str()),
                    activity.escalated_to.as_ref().map(|u| u.as_str()),
                    activity.escalated_at.map(|t| t.to_rfc3339()),
                    recurrence_json,
                    checklist_json,
                    i64::from(activity.progress),
                    activity.rating.map(i64::from),
                    activity.snoozed_until.map(|t| t.to_rfc3339()),
                    activity.reminder_sent,
                    activity.parent_id.as_ref().map(|p| p.as_str()),
                    custom_fields_json,
                    detail_json,
                    activity.updated_at.to_rfc3339(),
                    activity.id.as_str(),
                    activity.organization_id.as_str(),
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("activity {}", activity.id)));
            }
            Ok(())
        })
    }

    /// Conditional completion write: flips `is_completed` 0 → 1 atomically.
    ///
    /// Exactly one of two concurrent completions wins; the loser sees the
    /// row already completed and gets `Conflict`. This is the guard that
    /// keeps recurring activities from double-spawning their next
    /// occurrence.
    #[instrument(skip(self, activity), fields(activity_id = %activity.id, organization_id = %activity.organization_id))]
    pub fn mark_completed(&self, activity: &Activity) -> Result<(), StoreError> {
        let detail_json = serde_json::to_string(&activity.detail)?;

        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE activities SET is_completed = 1, completed_at = ?1, progress = ?2, \
                 detail = ?3, updated_at = ?4
                 WHERE id = ?5 AND organization_id = ?6 AND is_completed = 0",
                params![
                    activity.completed_at.map(|t| t.to_rfc3339()),
                    i64::from(activity.progress),
                    detail_json,
                    activity.updated_at.to_rfc3339(),
                    activity.id.as_str(),
                    activity.organization_id.as_str(),
                ],
            )?;
            if changed == 1 {
                return Ok(());
            }

            let exists: bool = conn
                .query_row(
                    "SELECT 1 FROM activities WHERE id = ?1 AND organization_id = ?2",
                    [activity.id.as_str(), activity.organization_id.as_str()],
                    |_| Ok(true),
                )
                .unwrap_or(false);

            if exists {
                Err(StoreError::Conflict(format!(
                    "activity {} already completed",
                    activity.id
                )))
            } else {
                Err(StoreError::NotFound(format!("activity {}", activity.id)))
            }
        })
    }

    /// Explicit hard delete.
    #[instrument(skip(self), fields(activity_id = %id, organization_id = %org))]
    pub fn delete(&self, id: &ActivityId, org: &OrganizationId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM activities WHERE id = ?1 AND organization_id = ?2",
                [id.as_str(), org.as_str()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("activity {id}")));
            }
            Ok(())
        })
    }
}

fn row_to_activity(row: &rusqlite::Row<'_>) -> Result<Activity, StoreError> {
    let recurrence: Option<Recurrence> =
        match row_helpers::get_opt::<String>(row, 13, "activities", "recurrence")? {
            Some(raw) => Some(row_helpers::parse_json(&raw, "activities", "recurrence")?),
            None => None,
        };
    let checklist: Vec<ChecklistItem> = row_helpers::parse_json(
        &row_helpers::get::<String>(row, 14, "activities", "checklist")?,
        "activities",
        "checklist",
    )?;
    let custom_fields: serde_json::Map<String, serde_json::Value> = row_helpers::parse_json(
        &row_helpers::get::<String>(row, 20, "activities", "custom_fields")?,
        "activities",
        "custom_fields",
    )?;
    let detail: ActivityDetail = row_helpers::parse_json(
        &row_helpers::get::<String>(row, 22, "activities", "detail")?,
        "activities",
        "detail",
    )?;

    Ok(Activity {
        id: ActivityId::from_raw(row_helpers::get::<String>(row, 0, "activities", "id")?),
        organization_id: OrganizationId::from_raw(row_helpers::get::<String>(
            row, 1, "activities", "organization_id",
        )?),
        subject: row_helpers::get(row, 3, "activities", "subject")?,
        description: row_helpers::get_opt(row, 4, "activities", "description")?,
        scheduled_at: row_helpers::parse_ts_opt(
            row_helpers::get_opt(row, 5, "activities", "scheduled_at")?,
            "activities",
            "scheduled_at",
        )?,
        due_date: row_helpers::parse_ts_opt(
            row_helpers::get_opt(row, 6, "activities", "due_date")?,
            "activities",
            "due_date",
        )?,
        completed_at: row_helpers::parse_ts_opt(
            row_helpers::get_opt(row, 7, "activities", "completed_at")?,
            "activities",
            "completed_at",
        )?,
        is_completed: row_helpers::get(row, 8, "activities", "is_completed")?,
        priority: row_helpers::parse_enum(
            &row_helpers::get::<String>(row, 9, "activities", "priority")?,
            "activities",
            "priority",
        )?,
        assigned_to: row_helpers::get_opt::<String>(row, 10, "activities", "assigned_to")?
            .map(UserId::from_raw),
        escalated_to: row_helpers::get_opt::<String>(row, 11, "activities", "escalated_to")?
            .map(UserId::from_raw),
        escalated_at: row_helpers::parse_ts_opt(
            row_helpers::get_opt(row, 12, "activities", "escalated_at")?,
            "activities",
            "escalated_at",
        )?,
        recurrence,
        checklist,
        progress: row_helpers::get::<i64>(row, 15, "activities", "progress")? as u8,
        rating: row_helpers::get_opt::<i64>(row, 16, "activities", "rating")?.map(|r| r as u8),
        snoozed_until: row_helpers::parse_ts_opt(
            row_helpers::get_opt(row, 17, "activities", "snoozed_until")?,
            "activities",
            "snoozed_until",
        )?,
        reminder_sent: row_helpers::get(row, 18, "activities", "reminder_sent")?,
        parent_id: row_helpers::get_opt::<String>(row, 19, "activities", "parent_id")?
            .map(ActivityId::from_raw),
        custom_fields,
        created_at: row_helpers::parse_ts(
            &row_helpers::get::<String>(row, 23, "activities", "created_at")?,
            "activities",
            "created_at",
        )?,
        updated_at: row_helpers::parse_ts(
            &row_helpers::get::<String>(row, 24, "activities", "updated_at")?,
            "activities",
            "updated_at",
        )?,
        detail,
    })
}
