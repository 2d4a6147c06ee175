use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::ApiError;

pub const DEFAULT_ICON: &str = "notifications-outline";
pub const DEFAULT_LIFETIME: Duration = Duration::days(30);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    General,
    Appointment,
    Medication,
    Health,
    System,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::General => "general",
            NotificationKind::Appointment => "appointment",
            NotificationKind::Medication => "medication",
            NotificationKind::Health => "health",
            NotificationKind::System => "system",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown notification type `{0}`")]
pub struct UnknownKind(String);

impl TryFrom<String> for NotificationKind {
    type Error = UnknownKind;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        match raw.as_str() {
            "general" => Ok(NotificationKind::General),
            "appointment" => Ok(NotificationKind::Appointment),
            "medication" => Ok(NotificationKind::Medication),
            "health" => Ok(NotificationKind::Health),
            "system" => Ok(NotificationKind::System),
            _ => Err(UnknownKind(raw)),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub is_read: bool,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub kind: NotificationKind,
    pub action_data: Option<Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Wire shape: the stored record plus a display-ready age.
#[derive(Debug, Serialize)]
pub struct NotificationView {
    #[serde(flatten)]
    pub notification: Notification,
    pub time: String,
}

impl NotificationView {
    pub fn at(notification: Notification, now: OffsetDateTime) -> Self {
        let time = relative_time(notification.created_at, now);
        Self { notification, time }
    }
}

/// "3d ago", "2h ago", "5m ago" or "Just now", using the largest whole unit.
pub fn relative_time(created_at: OffsetDateTime, now: OffsetDateTime) -> String {
    let elapsed = (now - created_at).abs();
    let days = elapsed.whole_days();
    let hours = elapsed.whole_hours() % 24;
    let minutes = elapsed.whole_minutes() % 60;

    if days > 0 {
        format!("{days}d ago")
    } else if hours > 0 {
        format!("{hours}h ago")
    } else if minutes > 0 {
        format!("{minutes}m ago")
    } else {
        "Just now".to_string()
    }
}

/// Notification fields as submitted by a client.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationInput {
    pub user_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<NotificationKind>,
    pub action_data: Option<Value>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

/// Fully-defaulted notification ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub kind: NotificationKind,
    pub action_data: Option<Value>,
    pub expires_at: OffsetDateTime,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl NotificationInput {
    /// Resolves defaults for a recipient chosen by the caller. `user_id` in the
    /// body is ignored when `recipient` is given.
    pub fn resolve(
        self,
        recipient: Option<Uuid>,
        now: OffsetDateTime,
        missing: &'static str,
    ) -> Result<NewNotification, ApiError> {
        let user_id = recipient.or(self.user_id);
        let (Some(user_id), Some(title), Some(description)) =
            (user_id, non_blank(self.title), non_blank(self.description))
        else {
            return Err(ApiError::bad_request(missing));
        };

        Ok(NewNotification {
            user_id,
            title,
            description,
            icon: non_blank(self.icon).unwrap_or_else(|| DEFAULT_ICON.to_string()),
            kind: self.kind.unwrap_or_default(),
            action_data: self.action_data.filter(|v| !v.is_null()),
            expires_at: self.expires_at.unwrap_or(now + DEFAULT_LIFETIME),
        })
    }
}
