//! REST handlers for the activity lifecycle API.
//!
//! Tenancy comes from the `x-organization-id` header on every `/api` route;
//! the gateway in front of this service resolves the caller to an
//! organization before the request gets here.

use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use cadence_core::activity::{Activity, ActivityKind, AttendeeStatus};
use cadence_core::ids::{ActivityId, OrganizationId, UserId};
use cadence_engine::{
    ActivityPatch, ChecklistUpdate, CompleteOutcome, NewActivity, Outcome,
};
use cadence_store::ActivityFilter;

use crate::error::ApiError;
use crate::server::AppState;

const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 200;

/// Tenant extractor. Missing header rejects the request with 400.
pub struct Org(pub OrganizationId);

impl<S: Send + Sync> FromRequestParts<S> for Org {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get("x-organization-id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ApiError::bad_request(
                    "missing_organization",
                    "x-organization-id header is required",
                )
            })?;
        Ok(Org(OrganizationId::from_raw(value)))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub kind: Option<ActivityKind>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AttendeeBody {
    pub email: String,
    pub status: AttendeeStatus,
}

#[derive(Debug, Deserialize)]
pub struct EscalateBody {
    pub escalate_to: UserId,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SnoozeBody {
    #[serde(default)]
    pub minutes: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RatingBody {
    pub rating: u8,
}

pub async fn create_activity(
    State(state): State<AppState>,
    Org(org): Org,
    Json(new): Json<NewActivity>,
) -> Result<(StatusCode, Json<Outcome>), ApiError> {
    let outcome = state.controller.create(&org, new).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn list_activities(
    State(state): State<AppState>,
    Org(org): Org,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Activity>>, ApiError> {
    let filter = ActivityFilter {
        kind: query.kind,
        is_completed: query.completed,
        assigned_to: query.assigned_to,
    };
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);
    let activities = state.controller.list(&org, &filter, limit, offset)?;
    Ok(Json(activities))
}

pub async fn get_activity(
    State(state): State<AppState>,
    Org(org): Org,
    Path(id): Path<ActivityId>,
) -> Result<Json<Activity>, ApiError> {
    Ok(Json(state.controller.get(&org, &id)?))
}

pub async fn patch_activity(
    State(state): State<AppState>,
    Org(org): Org,
    Path(id): Path<ActivityId>,
    Json(patch): Json<ActivityPatch>,
) -> Result<Json<Outcome>, ApiError> {
    Ok(Json(state.controller.update(&org, &id, patch).await?))
}

pub async fn delete_activity(
    State(state): State<AppState>,
    Org(org): Org,
    Path(id): Path<ActivityId>,
) -> Result<StatusCode, ApiError> {
    state.controller.delete(&org, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn complete_activity(
    State(state): State<AppState>,
    Org(org): Org,
    Path(id): Path<ActivityId>,
) -> Result<Json<CompleteOutcome>, ApiError> {
    Ok(Json(state.controller.complete(&org, &id).await?))
}

pub async fn update_checklist(
    State(state): State<AppState>,
    Org(org): Org,
    Path(id): Path<ActivityId>,
    Json(update): Json<ChecklistUpdate>,
) -> Result<Json<Outcome>, ApiError> {
    Ok(Json(state.controller.update_checklist(&org, &id, update)?))
}

pub async fn update_attendee(
    State(state): State<AppState>,
    Org(org): Org,
    Path(id): Path<ActivityId>,
    Json(body): Json<AttendeeBody>,
) -> Result<Json<Outcome>, ApiError> {
    Ok(Json(state.controller.update_attendee_status(
        &org,
        &id,
        &body.email,
        body.status,
    )?))
}

pub async fn escalate_activity(
    State(state): State<AppState>,
    Org(org): Org,
    Path(id): Path<ActivityId>,
    Json(body): Json<EscalateBody>,
) -> Result<Json<Outcome>, ApiError> {
    Ok(Json(
        state
            .controller
            .escalate(&org, &id, body.escalate_to, body.reason)
            .await?,
    ))
}

pub async fn snooze_activity(
    State(state): State<AppState>,
    Org(org): Org,
    Path(id): Path<ActivityId>,
    Json(body): Json<SnoozeBody>,
) -> Result<Json<Outcome>, ApiError> {
    Ok(Json(state.controller.snooze(&org, &id, body.minutes)?))
}

pub async fn rate_activity(
    State(state): State<AppState>,
    Org(org): Org,
    Path(id): Path<ActivityId>,
    Json(body): Json<RatingBody>,
) -> Result<Json<Outcome>, ApiError> {
    Ok(Json(state.controller.rate(&org, &id, body.rating)?))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}
