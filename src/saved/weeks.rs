use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tracing::{instrument, warn};
use uuid::Uuid;

use super::text_id;
use crate::{
    auth::{Identity, MessageResponse},
    error::{ApiError, StoreError},
    state::AppState,
};

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SavedWeek {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user_id: Uuid,
    pub week: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub saved_at: OffsetDateTime,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(save))
        .route("/:week", delete(remove))
}

/// Week numbers arrive as JSON numbers or numeric strings.
fn parse_week(value: Option<&Value>) -> Result<i32, ApiError> {
    let raw = text_id(value).ok_or_else(|| ApiError::bad_request("Week number is required"))?;
    match raw.parse::<i32>() {
        Ok(0) => Err(ApiError::bad_request("Week number is required")),
        Ok(week) if week > 0 => Ok(week),
        _ => Err(ApiError::bad_request("Week must be a positive number")),
    }
}

#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<SavedWeek>>, ApiError> {
    let rows = sqlx::query_as::<_, SavedWeek>(
        r#"
        SELECT id, user_id, week, saved_at
        FROM saved_weeks
        WHERE user_id = $1
        ORDER BY week ASC
        "#,
    )
    .bind(identity.user_id)
    .fetch_all(&state.db)
    .await
    .map_err(StoreError::from)?;
    Ok(Json(rows))
}

async fn insert(db: &PgPool, user_id: Uuid, week: i32) -> Result<Option<SavedWeek>, StoreError> {
    let row = sqlx::query_as::<_, SavedWeek>(
        r#"
        INSERT INTO saved_weeks (id, user_id, week)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, week) DO NOTHING
        RETURNING id, user_id, week, saved_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(week)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

#[instrument(skip(state, body))]
pub async fn save(
    State(state): State<AppState>,
    identity: Identity,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<SavedWeek>), ApiError> {
    let Json(body) = body?;
    let week = parse_week(body.get("week"))?;
    let saved = insert(&state.db, identity.user_id, week)
        .await?
        .ok_or_else(|| {
            warn!(user_id = %identity.user_id, week, "week already saved");
            ApiError::conflict("Week already saved")
        })?;
    Ok((StatusCode::CREATED, Json(saved)))
}

#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    identity: Identity,
    Path(week): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let not_found = || ApiError::not_found("Saved week not found");
    let week: i32 = week.trim().parse().map_err(|_| not_found())?;

    let res = sqlx::query("DELETE FROM saved_weeks WHERE user_id = $1 AND week = $2")
        .bind(identity.user_id)
        .bind(week)
        .execute(&state.db)
        .await
        .map_err(StoreError::from)?;
    if res.rows_affected() == 0 {
        return Err(not_found());
    }
    Ok(Json(MessageResponse::new("Week removed from saved items")))
}
