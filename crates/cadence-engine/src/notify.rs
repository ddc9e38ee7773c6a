//! Notification collaborator: assignment and escalation alerts.
//!
//! Delivery is fire-and-forget from the lifecycle controller's point of
//! view: a failed notification never rolls back the activity mutation. The
//! controller logs the failure and surfaces it as a soft warning in the
//! operation outcome.

use std::time::Duration;

use async_trait::async_trait;
use cadence_core::activity::Activity;
use cadence_core::ids::UserId;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),

    #[error("notifier misconfigured: {0}")]
    Config(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// An activity was assigned or re-assigned.
    async fn assignment_changed(
        &self,
        activity: &Activity,
        assignee: &UserId,
    ) -> Result<(), NotifyError>;

    /// A support ticket was escalated.
    async fn escalated(
        &self,
        activity: &Activity,
        escalated_to: &UserId,
        reason: &str,
    ) -> Result<(), NotifyError>;
}

/// No-op notifier for tests and headless deployments.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn assignment_changed(
        &self,
        _activity: &Activity,
        _assignee: &UserId,
    ) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn escalated(
        &self,
        _activity: &Activity,
        _escalated_to: &UserId,
        _reason: &str,
    ) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Posts notification events as JSON to a configured webhook endpoint
/// (the email/alerting service sits behind it).
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| NotifyError::Config(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn post(&self, payload: serde_json::Value) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(NotifyError::Delivery(format!(
                "webhook returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn assignment_changed(
        &self,
        activity: &Activity,
        assignee: &UserId,
    ) -> Result<(), NotifyError> {
        tracing::debug!(activity_id = %activity.id, assignee = %assignee, "sending assignment notification");
        self.post(serde_json::json!({
            "event": "activity.assigned",
            "activity_id": activity.id,
            "organization_id": activity.organization_id,
            "kind": activity.kind().to_string(),
            "subject": activity.subject,
            "assignee": assignee,
        }))
        .await
    }

    async fn escalated(
        &self,
        activity: &Activity,
        escalated_to: &UserId,
        reason: &str,
    ) -> Result<(), NotifyError> {
        tracing::debug!(activity_id = %activity.id, escalated_to = %escalated_to, "sending escalation notification");
        self.post(serde_json::json!({
            "event": "ticket.escalated",
            "activity_id": activity.id,
            "organization_id": activity.organization_id,
            "subject": activity.subject,
            "escalated_to": escalated_to,
            "reason": reason,
        }))
        .await
    }
}
