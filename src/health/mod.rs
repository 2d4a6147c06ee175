//! `/healthInfo`: one vitals record per user.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json as SqlJson, FromRow, PgPool};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::Identity,
    error::{ApiError, StoreError},
    state::AppState,
};

const ALREADY_EXISTS: &str = "Health info already exists for this user";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDetails {
    pub blood_pressure: String,
    pub blood_sugar: String,
    pub weight: String,
    pub symptoms: String,
}

/// Submitted vitals; missing or null fields are stored as empty strings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDetailsInput {
    pub blood_pressure: Option<String>,
    pub blood_sugar: Option<String>,
    pub weight: Option<String>,
    pub symptoms: Option<String>,
}

impl From<HealthDetailsInput> for HealthDetails {
    fn from(input: HealthDetailsInput) -> Self {
        Self {
            blood_pressure: input.blood_pressure.unwrap_or_default(),
            blood_sugar: input.blood_sugar.unwrap_or_default(),
            weight: input.weight.unwrap_or_default(),
            symptoms: input.symptoms.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthInfoBody {
    pub health_info: Option<HealthDetailsInput>,
}

impl HealthInfoBody {
    fn into_details(self) -> Result<HealthDetails, ApiError> {
        self.health_info
            .map(HealthDetails::from)
            .ok_or_else(|| ApiError::bad_request("Health info data is required"))
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HealthInfo {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user_id: Uuid,
    pub health_info: SqlJson<HealthDetails>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_health).post(create_health).put(update_health))
}

async fn find_by_user(db: &PgPool, user_id: Uuid) -> Result<Option<HealthInfo>, StoreError> {
    let row = sqlx::query_as::<_, HealthInfo>(
        r#"
        SELECT id, user_id, health_info, created_at, updated_at
        FROM health_info
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

async fn insert(db: &PgPool, user_id: Uuid, details: &HealthDetails) -> Result<HealthInfo, StoreError> {
    let row = sqlx::query_as::<_, HealthInfo>(
        r#"
        INSERT INTO health_info (id, user_id, health_info)
        VALUES ($1, $2, $3)
        RETURNING id, user_id, health_info, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(SqlJson(details))
    .fetch_one(db)
    .await?;
    Ok(row)
}

async fn upsert(db: &PgPool, user_id: Uuid, details: &HealthDetails) -> Result<HealthInfo, StoreError> {
    let row = sqlx::query_as::<_, HealthInfo>(
        r#"
        INSERT INTO health_info (id, user_id, health_info)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id)
        DO UPDATE SET health_info = EXCLUDED.health_info, updated_at = now()
        RETURNING id, user_id, health_info, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(SqlJson(details))
    .fetch_one(db)
    .await?;
    Ok(row)
}

#[instrument(skip(state))]
pub async fn get_health(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<HealthInfo>, ApiError> {
    find_by_user(&state.db, identity.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Health info not found"))
}

#[instrument(skip(state, body))]
pub async fn create_health(
    State(state): State<AppState>,
    identity: Identity,
    body: Result<Json<HealthInfoBody>, JsonRejection>,
) -> Result<(StatusCode, Json<HealthInfo>), ApiError> {
    let Json(body) = body?;
    let details = body.into_details()?;

    if find_by_user(&state.db, identity.user_id).await?.is_some() {
        warn!(user_id = %identity.user_id, "health info already exists");
        return Err(ApiError::conflict(ALREADY_EXISTS));
    }
    let created = insert(&state.db, identity.user_id, &details)
        .await
        .map_err(|e| match e {
            StoreError::Duplicate { .. } => ApiError::conflict(ALREADY_EXISTS),
            other => other.into(),
        })?;

    info!(user_id = %identity.user_id, "health info created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Replaces the stored vitals, creating the record when absent.
#[instrument(skip(state, body))]
pub async fn update_health(
    State(state): State<AppState>,
    identity: Identity,
    body: Result<Json<HealthInfoBody>, JsonRejection>,
) -> Result<Json<HealthInfo>, ApiError> {
    let Json(body) = body?;
    let details = body.into_details()?;
    let saved = upsert(&state.db, identity.user_id, &details).await?;
    Ok(Json(saved))
}
