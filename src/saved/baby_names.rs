use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json as SqlJson, Executor, FromRow, Postgres};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{Identity, MessageResponse},
    error::{ApiError, StoreError},
    state::AppState,
};

const LETTER_AND_NAMES_REQUIRED: &str = "Letter and names array are required";
const LETTER_NOT_FOUND: &str = "Saved letter not found";
const LETTER_REMOVED: &str = "Letter removed from saved items";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    M,
    F,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BabyName {
    pub name: String,
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meaning: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SavedBabyNames {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user_id: Uuid,
    pub letter: String,
    pub names: SqlJson<Vec<BabyName>>,
    #[serde(with = "time::serde::rfc3339")]
    pub saved_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct LetterNames {
    pub letter: Option<String>,
    pub names: Option<Vec<BabyName>>,
}

impl LetterNames {
    fn parse(body: Result<Json<LetterNames>, JsonRejection>) -> Result<(String, Vec<BabyName>), ApiError> {
        let Json(body) = body.map_err(|e| {
            warn!(error = %e, "baby names body rejected");
            ApiError::bad_request(LETTER_AND_NAMES_REQUIRED)
        })?;
        match (body.letter.filter(|l| !l.is_empty()), body.names) {
            (Some(letter), Some(names)) => Ok((letter, names)),
            _ => Err(ApiError::bad_request(LETTER_AND_NAMES_REQUIRED)),
        }
    }
}

/// Appends incoming names not already present (matched by `name`) and returns
/// how many were added.
pub fn merge_names(existing: &mut Vec<BabyName>, incoming: Vec<BabyName>) -> usize {
    let before = existing.len();
    for candidate in incoming {
        if !existing.iter().any(|n| n.name == candidate.name) {
            existing.push(candidate);
        }
    }
    existing.len() - before
}

/// Drops `name` from the list; false when it was not there.
pub fn remove_name(names: &mut Vec<BabyName>, name: &str) -> bool {
    let before = names.len();
    names.retain(|n| n.name != name);
    names.len() != before
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(save))
        .route("/update", put(replace))
        .route("/:letter", delete(remove_letter))
        .route("/:letter/:name", delete(remove_one))
}

const COLUMNS: &str = "id, user_id, letter, names, saved_at";

/// Reads the letter row and locks it until the transaction ends.
async fn lock_letter<'e, E>(
    executor: E,
    user_id: Uuid,
    letter: &str,
) -> Result<Option<SavedBabyNames>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!(
        "SELECT {COLUMNS} FROM saved_baby_names WHERE user_id = $1 AND letter = $2 FOR UPDATE"
    );
    let row = sqlx::query_as::<_, SavedBabyNames>(&sql)
        .bind(user_id)
        .bind(letter)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

/// `None` when the letter already exists for this user.
async fn insert_letter<'e, E>(
    executor: E,
    user_id: Uuid,
    letter: &str,
    names: &[BabyName],
) -> Result<Option<SavedBabyNames>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!(
        r#"
        INSERT INTO saved_baby_names (id, user_id, letter, names)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, letter) DO NOTHING
        RETURNING {COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, SavedBabyNames>(&sql)
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(letter)
        .bind(SqlJson(names))
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

async fn set_names<'e, E>(executor: E, id: Uuid, names: &[BabyName]) -> Result<SavedBabyNames, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!(
        "UPDATE saved_baby_names SET names = $2, saved_at = now() WHERE id = $1 RETURNING {COLUMNS}"
    );
    let row = sqlx::query_as::<_, SavedBabyNames>(&sql)
        .bind(id)
        .bind(SqlJson(names))
        .fetch_one(executor)
        .await?;
    Ok(row)
}

async fn delete_letter<'e, E>(executor: E, user_id: Uuid, letter: &str) -> Result<bool, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let res = sqlx::query("DELETE FROM saved_baby_names WHERE user_id = $1 AND letter = $2")
        .bind(user_id)
        .bind(letter)
        .execute(executor)
        .await?;
    Ok(res.rows_affected() > 0)
}

#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<SavedBabyNames>>, ApiError> {
    let sql = format!("SELECT {COLUMNS} FROM saved_baby_names WHERE user_id = $1 ORDER BY letter ASC");
    let rows = sqlx::query_as::<_, SavedBabyNames>(&sql)
        .bind(identity.user_id)
        .fetch_all(&state.db)
        .await
        .map_err(StoreError::from)?;
    Ok(Json(rows))
}

/// Creates the letter (201) or merges new names into it (200).
#[instrument(skip(state, body))]
pub async fn save(
    State(state): State<AppState>,
    identity: Identity,
    body: Result<Json<LetterNames>, JsonRejection>,
) -> Result<(StatusCode, Json<SavedBabyNames>), ApiError> {
    let (letter, names) = LetterNames::parse(body)?;
    if names.is_empty() {
        return Err(ApiError::bad_request(LETTER_AND_NAMES_REQUIRED));
    }

    let mut tx = state.db.begin().await.map_err(StoreError::from)?;
    if let Some(created) = insert_letter(&mut *tx, identity.user_id, &letter, &names).await? {
        tx.commit().await.map_err(StoreError::from)?;
        info!(user_id = %identity.user_id, %letter, "baby names saved");
        return Ok((StatusCode::CREATED, Json(created)));
    }

    let mut current = lock_letter(&mut *tx, identity.user_id, &letter)
        .await?
        .ok_or(StoreError::NotFound)?;
    let added = merge_names(&mut current.names.0, names);
    if added == 0 {
        return Ok((StatusCode::OK, Json(current)));
    }
    let updated = set_names(&mut *tx, current.id, &current.names.0).await?;
    tx.commit().await.map_err(StoreError::from)?;
    info!(user_id = %identity.user_id, %letter, added, "baby names merged");
    Ok((StatusCode::OK, Json(updated)))
}

/// Replaces the list for a letter. An empty list removes the letter.
#[instrument(skip(state, body))]
pub async fn replace(
    State(state): State<AppState>,
    identity: Identity,
    body: Result<Json<LetterNames>, JsonRejection>,
) -> Result<Response, ApiError> {
    let (letter, names) = LetterNames::parse(body)?;

    let mut tx = state.db.begin().await.map_err(StoreError::from)?;
    let response = match lock_letter(&mut *tx, identity.user_id, &letter).await? {
        Some(_) if names.is_empty() => {
            delete_letter(&mut *tx, identity.user_id, &letter).await?;
            Json(MessageResponse::new(LETTER_REMOVED)).into_response()
        }
        Some(current) => Json(set_names(&mut *tx, current.id, &names).await?).into_response(),
        None if names.is_empty() => Json(MessageResponse::new("No changes needed")).into_response(),
        None => match insert_letter(&mut *tx, identity.user_id, &letter, &names).await? {
            Some(created) => (StatusCode::CREATED, Json(created)).into_response(),
            // A concurrent create won; overwrite it.
            None => {
                let current = lock_letter(&mut *tx, identity.user_id, &letter)
                    .await?
                    .ok_or(StoreError::NotFound)?;
                Json(set_names(&mut *tx, current.id, &names).await?).into_response()
            }
        },
    };
    tx.commit().await.map_err(StoreError::from)?;
    Ok(response)
}

#[instrument(skip(state))]
pub async fn remove_letter(
    State(state): State<AppState>,
    identity: Identity,
    Path(letter): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !delete_letter(&state.db, identity.user_id, &letter).await? {
        return Err(ApiError::not_found(LETTER_NOT_FOUND));
    }
    Ok(Json(MessageResponse::new(LETTER_REMOVED)))
}

/// Removes one name; the letter goes with its last name.
#[instrument(skip(state))]
pub async fn remove_one(
    State(state): State<AppState>,
    identity: Identity,
    Path((letter, name)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut tx = state.db.begin().await.map_err(StoreError::from)?;
    let mut current = lock_letter(&mut *tx, identity.user_id, &letter)
        .await?
        .ok_or_else(|| ApiError::not_found(LETTER_NOT_FOUND))?;

    if !remove_name(&mut current.names.0, &name) {
        return Err(ApiError::not_found("Name not found in saved names"));
    }
    if current.names.0.is_empty() {
        delete_letter(&mut *tx, identity.user_id, &letter).await?;
    } else {
        set_names(&mut *tx, current.id, &current.names.0).await?;
    }
    tx.commit().await.map_err(StoreError::from)?;
    Ok(Json(MessageResponse::new("Name removed from saved items")))
}


#[cfg(test)]
mod store_tests {
    use super::*;
    use crate::{
        app::build_app,
        auth::claims::Role,
        test_support::{call, pg_state, seed_user},
    };
    use serde_json::{json, Value};
    use tokio::task::JoinSet;

    const URI: &str = "/api/savedBabyNames";

    fn stored_names(list: &Value, letter: &str) -> Vec<String> {
        list.as_array()
            .unwrap()
            .iter()
            .find(|row| row["letter"] == letter)
            .map(|row| {
                row["names"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|n| n["name"].as_str().unwrap().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_saves_keep_every_name() {
        let Some(state) = pg_state().await else { return };
        let app = build_app(state.clone());
        for _ in 0..10 {
            let (_, token) = seed_user(&state, Role::User).await;
            let seed = json!({ "letter": "A", "names": [{ "name": "Adam", "gender": "M" }] });
            let (status, _) = call(&app, "POST", URI, &token, Some(seed)).await;
            assert_eq!(status, StatusCode::CREATED);

            let mut tasks = JoinSet::new();
            for i in 0..8 {
                let app = app.clone();
                let token = token.clone();
                tasks.spawn(async move {
                    let body = json!({ "letter": "A", "names": [{ "name": format!("Amira{i}"), "gender": "F" }] });
                    call(&app, "POST", URI, &token, Some(body)).await.0
                });
            }
            while let Some(joined) = tasks.join_next().await {
                assert_eq!(joined.unwrap(), StatusCode::OK);
            }

            let (_, list) = call(&app, "GET", URI, &token, None).await;
            assert_eq!(stored_names(&list, "A").len(), 9);
        }
    }

    #[tokio::test]
    async fn removing_last_name_drops_the_letter() {
        let Some(state) = pg_state().await else { return };
        let app = build_app(state.clone());
        let (_, token) = seed_user(&state, Role::User).await;
        let body = json!({
            "letter": "B",
            "names": [{ "name": "Bea", "gender": "F" }, { "name": "Ben", "gender": "M" }]
        });
        call(&app, "POST", URI, &token, Some(body)).await;

        let (status, body) = call(&app, "DELETE", "/api/savedBabyNames/B/Bea", &token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Name removed from saved items");

        let (status, body) = call(&app, "DELETE", "/api/savedBabyNames/B/Bea", &token, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Name not found in saved names");

        call(&app, "DELETE", "/api/savedBabyNames/B/Ben", &token, None).await;
        let (_, list) = call(&app, "GET", URI, &token, None).await;
        assert_eq!(list, json!([]));

        let (status, body) = call(&app, "DELETE", "/api/savedBabyNames/B", &token, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], LETTER_NOT_FOUND);
    }

    #[tokio::test]
    async fn replace_with_empty_list_removes_letter() {
        let Some(state) = pg_state().await else { return };
        let app = build_app(state.clone());
        let (_, token) = seed_user(&state, Role::User).await;
        let update = "/api/savedBabyNames/update";

        let (status, body) =
            call(&app, "PUT", update, &token, Some(json!({ "letter": "C", "names": [] }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "No changes needed");

        let names = json!({ "letter": "C", "names": [{ "name": "Cleo", "gender": "F" }] });
        let (status, _) = call(&app, "PUT", update, &token, Some(names)).await;
        assert_eq!(status, StatusCode::CREATED);

        let names = json!({ "letter": "C", "names": [{ "name": "Cyrus", "gender": "M" }] });
        let (status, body) = call(&app, "PUT", update, &token, Some(names)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["names"], json!([{ "name": "Cyrus", "gender": "M" }]));

        let (_, body) =
            call(&app, "PUT", update, &token, Some(json!({ "letter": "C", "names": [] }))).await;
        assert_eq!(body["message"], LETTER_REMOVED);
    }
}
