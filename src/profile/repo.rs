use sqlx::{types::Json, Executor, PgPool, Postgres};
use uuid::Uuid;

use super::model::{PersonalDetails, PersonalInfo};
use crate::error::StoreError;

pub async fn find_by_user(db: &PgPool, user_id: Uuid) -> Result<Option<PersonalInfo>, StoreError> {
    let row = sqlx::query_as::<_, PersonalInfo>(
        r#"
        SELECT id, user_id, personal_info
        FROM personal_info
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Same as `find_by_user` but holds the row lock until the surrounding
/// transaction ends.
pub async fn lock_by_user<'e, E>(executor: E, user_id: Uuid) -> Result<Option<PersonalInfo>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = sqlx::query_as::<_, PersonalInfo>(
        r#"
        SELECT id, user_id, personal_info
        FROM personal_info
        WHERE user_id = $1
        FOR UPDATE
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

/// Plain insert; a second record for the same user is `StoreError::Duplicate`.
pub async fn create(
    db: &PgPool,
    user_id: Uuid,
    details: &PersonalDetails,
) -> Result<PersonalInfo, StoreError> {
    let row = sqlx::query_as::<_, PersonalInfo>(
        r#"
        INSERT INTO personal_info (id, user_id, personal_info)
        VALUES ($1, $2, $3)
        RETURNING id, user_id, personal_info
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(Json(details))
    .fetch_one(db)
    .await?;
    Ok(row)
}

/// Inserts `details` unless the user already has a record, and returns
/// whichever record ends up stored.
///
/// The no-op `DO UPDATE` returns the committed row on conflict, even one
/// committed after this statement started, and locks it inside a transaction.
pub async fn find_or_create<'e, E>(
    executor: E,
    user_id: Uuid,
    details: &PersonalDetails,
) -> Result<PersonalInfo, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = sqlx::query_as::<_, PersonalInfo>(
        r#"
        INSERT INTO personal_info (id, user_id, personal_info)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
        RETURNING id, user_id, personal_info
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(Json(details))
    .fetch_one(executor)
    .await?;
    Ok(row)
}

pub async fn upsert<'e, E>(
    executor: E,
    user_id: Uuid,
    details: &PersonalDetails,
) -> Result<PersonalInfo, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = sqlx::query_as::<_, PersonalInfo>(
        r#"
        INSERT INTO personal_info (id, user_id, personal_info)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id)
        DO UPDATE SET personal_info = EXCLUDED.personal_info, updated_at = now()
        RETURNING id, user_id, personal_info
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(Json(details))
    .fetch_one(executor)
    .await?;
    Ok(row)
}
