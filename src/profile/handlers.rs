use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::{
    model::{merge_details, renamed_to, PersonalDetails, PersonalInfo},
    repo,
};
use crate::{
    auth::{repo::User, Identity, MeResponse},
    error::{ApiError, StoreError},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/", get(get_info).post(create_info).put(update_info))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfoBody {
    #[serde(default)]
    pub personal_info: Option<Value>,
}

async fn load_user(state: &AppState, identity: &Identity) -> Result<User, ApiError> {
    state
        .users
        .find_by_id(identity.user_id)
        .await?
        .ok_or_else(|| {
            warn!(user_id = %identity.user_id, "token subject has no account");
            ApiError::not_found("User not found")
        })
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<MeResponse>, ApiError> {
    let user = load_user(&state, &identity).await?;
    Ok(Json(MeResponse {
        user,
        role: identity.role,
    }))
}

/// Stored profile, seeded from the account when the user has none yet.
async fn ensure_info(state: &AppState, identity: &Identity) -> Result<PersonalInfo, ApiError> {
    if let Some(info) = repo::find_by_user(&state.db, identity.user_id).await? {
        return Ok(info);
    }
    let user = load_user(state, identity).await?;
    let info =
        repo::find_or_create(&state.db, identity.user_id, &PersonalDetails::default_for(&user))
            .await?;
    info!(user_id = %identity.user_id, "default personal info created");
    Ok(info)
}

#[instrument(skip(state))]
pub async fn get_info(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<PersonalInfo>, ApiError> {
    Ok(Json(ensure_info(&state, &identity).await?))
}

#[instrument(skip(state, body))]
pub async fn create_info(
    State(state): State<AppState>,
    identity: Identity,
    body: Result<Json<PersonalInfoBody>, JsonRejection>,
) -> Result<(StatusCode, Json<PersonalInfo>), ApiError> {
    let Json(body) = body?;
    let raw = body
        .personal_info
        .ok_or_else(|| ApiError::bad_request("Missing required fields"))?;
    let details = PersonalDetails::from_submitted(raw)?;

    let info = repo::create(&state.db, identity.user_id, &details)
        .await
        .map_err(|e| match e {
            StoreError::Duplicate { .. } => {
                ApiError::conflict("Personal info already exists for this user")
            }
            other => other.into(),
        })?;
    Ok((StatusCode::CREATED, Json(info)))
}

/// Merges the submitted fields into the stored profile and mirrors a new
/// fullName onto the account.
#[instrument(skip(state, body))]
pub async fn update_info(
    State(state): State<AppState>,
    identity: Identity,
    body: Result<Json<PersonalInfoBody>, JsonRejection>,
) -> Result<Json<PersonalInfo>, ApiError> {
    let Json(body) = body?;
    let patch = body
        .personal_info
        .filter(Value::is_object)
        .ok_or_else(|| ApiError::bad_request("Missing personal info data"))?;

    ensure_info(&state, &identity).await?;

    // Row lock serializes concurrent merges for one user.
    let mut tx = state.db.begin().await.map_err(StoreError::from)?;
    let current = repo::lock_by_user(&mut *tx, identity.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?
        .personal_info
        .0;
    let merged = merge_details(&current, &patch)?;
    let info = repo::upsert(&mut *tx, identity.user_id, &merged).await?;
    tx.commit().await.map_err(StoreError::from)?;

    if let Some(name) = renamed_to(&patch) {
        state.users.update_name(identity.user_id, name).await?;
        info!(user_id = %identity.user_id, "account name updated from profile");
    }
    Ok(Json(info))
}
