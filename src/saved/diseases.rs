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
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::text_id;
use crate::{
    auth::{Identity, MessageResponse},
    error::{ApiError, StoreError},
    state::AppState,
};

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SavedDisease {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user_id: Uuid,
    pub disease_id: String,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub saved_at: OffsetDateTime,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(save))
        .route("/:id", delete(remove))
}

async fn list_by_user(db: &PgPool, user_id: Uuid) -> Result<Vec<SavedDisease>, StoreError> {
    let rows = sqlx::query_as::<_, SavedDisease>(
        r#"
        SELECT id, user_id, disease_id, name, saved_at
        FROM saved_diseases
        WHERE user_id = $1
        ORDER BY saved_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// `None` when the disease is already saved for this user.
async fn insert(
    db: &PgPool,
    user_id: Uuid,
    disease_id: &str,
    name: &str,
) -> Result<Option<SavedDisease>, StoreError> {
    let row = sqlx::query_as::<_, SavedDisease>(
        r#"
        INSERT INTO saved_diseases (id, user_id, disease_id, name)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, disease_id) DO NOTHING
        RETURNING id, user_id, disease_id, name, saved_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(disease_id)
    .bind(name)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

async fn delete_one(db: &PgPool, user_id: Uuid, disease_id: &str) -> Result<bool, StoreError> {
    let res = sqlx::query("DELETE FROM saved_diseases WHERE user_id = $1 AND disease_id = $2")
        .bind(user_id)
        .bind(disease_id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<SavedDisease>>, ApiError> {
    Ok(Json(list_by_user(&state.db, identity.user_id).await?))
}

#[instrument(skip(state, body))]
pub async fn save(
    State(state): State<AppState>,
    identity: Identity,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<SavedDisease>), ApiError> {
    let Json(body) = body?;
    let disease_id = text_id(body.get("diseaseId"));
    let name = body
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    let (Some(disease_id), Some(name)) = (disease_id, name) else {
        return Err(ApiError::bad_request("Disease ID and name are required"));
    };

    match insert(&state.db, identity.user_id, &disease_id, name).await? {
        Some(saved) => {
            info!(user_id = %identity.user_id, %disease_id, "disease saved");
            Ok((StatusCode::CREATED, Json(saved)))
        }
        None => {
            warn!(user_id = %identity.user_id, %disease_id, "disease already saved");
            Err(ApiError::conflict("Disease already saved"))
        }
    }
}

#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    identity: Identity,
    Path(disease_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !delete_one(&state.db, identity.user_id, &disease_id).await? {
        return Err(ApiError::not_found("Saved disease not found"));
    }
    Ok(Json(MessageResponse::new("Disease removed from saved items")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{claims::Role, jwt::JwtKeys, require_identity};
    use axum::{
        body::Body,
        extract::FromRef,
        http::{header, Request},
        middleware::from_fn_with_state,
    };
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn save_requires_id_and_name() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state)
            .issue(Uuid::new_v4(), Role::User)
            .unwrap();
        let app = router()
            .route_layer(from_fn_with_state(state.clone(), require_identity))
            .with_state(state);

        for body in [json!({ "diseaseId": "flu" }), json!({ "name": "Influenza" })] {
            let req = Request::builder()
                .method("POST")
                .uri("/")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap();
            let res = app.clone().oneshot(req).await.unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn serializes_with_client_field_names() {
        let row = SavedDisease {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            disease_id: "flu".into(),
            name: "Influenza".into(),
            saved_at: OffsetDateTime::UNIX_EPOCH,
        };
        let value = serde_json::to_value(row).unwrap();
        assert_eq!(value["diseaseId"], "flu");
        assert_eq!(value["savedAt"], "1970-01-01T00:00:00Z");
        assert!(value.get("_id").is_some());
    }
}
