use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    model::{Notification, NotificationInput, NotificationView},
    repo,
};
use crate::{
    auth::{
        guard::{ensure_admin, ensure_owner},
        Identity, MessageResponse,
    },
    error::ApiError,
    state::AppState,
};

const NOT_FOUND: &str = "Notification not found";
const ADMIN_FIELDS_REQUIRED: &str = "userId, title and description are required";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create).delete(remove_all))
        .route("/unread", get(unread))
        .route("/self", post(create_for_self))
        .route("/bulk", post(create_bulk))
        .route("/read-all", put(mark_all_read))
        .route("/:id/read", put(mark_read))
        .route("/:id", delete(remove))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadResponse {
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct BatchResult {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BulkCreated {
    pub success: bool,
    pub count: usize,
    pub notifications: Vec<NotificationView>,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub notifications: Option<Vec<NotificationInput>>,
}

fn views(rows: Vec<Notification>) -> Vec<NotificationView> {
    let now = OffsetDateTime::now_utc();
    rows.into_iter()
        .map(|n| NotificationView::at(n, now))
        .collect()
}

fn parse_body<T>(body: Result<Json<T>, JsonRejection>, message: &'static str) -> Result<T, ApiError> {
    body.map(|Json(b)| b).map_err(|e| {
        warn!(error = %e, "notification body rejected");
        ApiError::bad_request(message)
    })
}

/// Loads a notification and checks it belongs to the caller.
async fn load_owned(
    state: &AppState,
    identity: &Identity,
    raw_id: &str,
    denied: &str,
) -> Result<Notification, ApiError> {
    let id = Uuid::parse_str(raw_id).map_err(|_| ApiError::not_found(NOT_FOUND))?;
    let notification = repo::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    ensure_owner(notification.user_id, identity, denied)?;
    Ok(notification)
}

#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<NotificationView>>, ApiError> {
    let rows = repo::list_by_user(&state.db, identity.user_id).await?;
    Ok(Json(views(rows)))
}

#[instrument(skip(state))]
pub async fn unread(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<UnreadResponse>, ApiError> {
    let unread_count = repo::unread_count(&state.db, identity.user_id).await?;
    Ok(Json(UnreadResponse { unread_count }))
}

/// Admin only: notify any user.
#[instrument(skip(state, body))]
pub async fn create(
    State(state): State<AppState>,
    identity: Identity,
    body: Result<Json<NotificationInput>, JsonRejection>,
) -> Result<(StatusCode, Json<NotificationView>), ApiError> {
    ensure_admin(&identity, "Not authorized to create notifications")?;
    let now = OffsetDateTime::now_utc();
    let new = parse_body(body, ADMIN_FIELDS_REQUIRED)?.resolve(None, now, ADMIN_FIELDS_REQUIRED)?;

    let created = repo::insert(&state.db, &new).await?;
    info!(admin = %identity.user_id, recipient = %created.user_id, "notification created");
    Ok((StatusCode::CREATED, Json(NotificationView::at(created, now))))
}

#[instrument(skip(state, body))]
pub async fn create_for_self(
    State(state): State<AppState>,
    identity: Identity,
    body: Result<Json<NotificationInput>, JsonRejection>,
) -> Result<(StatusCode, Json<NotificationView>), ApiError> {
    const REQUIRED: &str = "Title and description are required";
    let now = OffsetDateTime::now_utc();
    let new = parse_body(body, REQUIRED)?.resolve(Some(identity.user_id), now, REQUIRED)?;

    let created = repo::insert(&state.db, &new).await?;
    Ok((StatusCode::CREATED, Json(NotificationView::at(created, now))))
}

/// Admin only: one statement for the whole batch.
#[instrument(skip(state, body))]
pub async fn create_bulk(
    State(state): State<AppState>,
    identity: Identity,
    body: Result<Json<BulkRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BulkCreated>), ApiError> {
    const REQUIRED: &str = "Valid notifications array is required";
    ensure_admin(&identity, "Not authorized to create bulk notifications")?;

    let inputs = parse_body(body, REQUIRED)?
        .notifications
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::bad_request(REQUIRED))?;
    let now = OffsetDateTime::now_utc();
    let batch = inputs
        .into_iter()
        .map(|input| input.resolve(None, now, ADMIN_FIELDS_REQUIRED))
        .collect::<Result<Vec<_>, _>>()?;

    let created = repo::insert_many(&state.db, &batch).await?;
    info!(admin = %identity.user_id, count = created.len(), "bulk notifications created");
    Ok((
        StatusCode::CREATED,
        Json(BulkCreated {
            success: true,
            count: created.len(),
            notifications: views(created),
        }),
    ))
}

#[instrument(skip(state))]
pub async fn mark_read(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<NotificationView>, ApiError> {
    let notification =
        load_owned(&state, &identity, &id, "Not authorized to update this notification").await?;
    let updated = repo::mark_read(&state.db, notification.id).await?;
    Ok(Json(NotificationView::at(updated, OffsetDateTime::now_utc())))
}

#[instrument(skip(state))]
pub async fn mark_all_read(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<BatchResult>, ApiError> {
    let count = repo::mark_all_read(&state.db, identity.user_id).await?;
    Ok(Json(BatchResult {
        success: true,
        message: format!("Marked {count} notifications as read"),
    }))
}

#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let notification =
        load_owned(&state, &identity, &id, "Not authorized to delete this notification").await?;
    repo::delete(&state.db, notification.id).await?;
    Ok(Json(MessageResponse::new("Notification deleted successfully")))
}

#[instrument(skip(state))]
pub async fn remove_all(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<BatchResult>, ApiError> {
    let count = repo::delete_all(&state.db, identity.user_id).await?;
    Ok(Json(BatchResult {
        success: true,
        message: format!("Deleted {count} notifications"),
    }))
}
