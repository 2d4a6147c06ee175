use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::model::{NewNotification, Notification};
use crate::error::StoreError;

const COLUMNS: &str = "id, user_id, title, description, icon, is_read, kind, action_data, \
                       expires_at, created_at, updated_at";

pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> Result<Vec<Notification>, StoreError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM notifications WHERE user_id = $1 ORDER BY created_at DESC"
    );
    let rows = sqlx::query_as::<_, Notification>(&sql)
        .bind(user_id)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn unread_count(db: &PgPool, user_id: Uuid) -> Result<i64, StoreError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = false",
    )
    .bind(user_id)
    .fetch_one(db)
    .await?;
    Ok(count)
}

pub async fn find(db: &PgPool, id: Uuid) -> Result<Option<Notification>, StoreError> {
    let sql = format!("SELECT {COLUMNS} FROM notifications WHERE id = $1");
    let row = sqlx::query_as::<_, Notification>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

/// Inserts every notification in one statement; an unknown recipient fails
/// the whole batch with `StoreError::MissingReference`.
pub async fn insert_many(
    db: &PgPool,
    batch: &[NewNotification],
) -> Result<Vec<Notification>, StoreError> {
    if batch.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO notifications \
         (id, user_id, title, description, icon, kind, action_data, expires_at) ",
    );
    qb.push_values(batch, |mut row, n| {
        row.push_bind(Uuid::new_v4())
            .push_bind(n.user_id)
            .push_bind(&n.title)
            .push_bind(&n.description)
            .push_bind(&n.icon)
            .push_bind(n.kind.as_str())
            .push_bind(&n.action_data)
            .push_bind(n.expires_at);
    });
    qb.push(" RETURNING ").push(COLUMNS);

    let rows = qb
        .build_query_as::<Notification>()
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn insert(db: &PgPool, new: &NewNotification) -> Result<Notification, StoreError> {
    insert_many(db, std::slice::from_ref(new))
        .await?
        .pop()
        .ok_or(StoreError::NotFound)
}

pub async fn mark_read(db: &PgPool, id: Uuid) -> Result<Notification, StoreError> {
    let sql = format!(
        "UPDATE notifications SET is_read = true, updated_at = now() WHERE id = $1 RETURNING {COLUMNS}"
    );
    let row = sqlx::query_as::<_, Notification>(&sql)
        .bind(id)
        .fetch_one(db)
        .await?;
    Ok(row)
}

pub async fn mark_all_read(db: &PgPool, user_id: Uuid) -> Result<u64, StoreError> {
    let res = sqlx::query(
        "UPDATE notifications SET is_read = true, updated_at = now() \
         WHERE user_id = $1 AND is_read = false",
    )
    .bind(user_id)
    .execute(db)
    .await?;
    Ok(res.rows_affected())
}

pub async fn delete(db: &PgPool, id: Uuid) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM notifications WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn delete_all(db: &PgPool, user_id: Uuid) -> Result<u64, StoreError> {
    let res = sqlx::query("DELETE FROM notifications WHERE user_id = $1")
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(res.rows_affected())
}

pub async fn delete_expired(db: &PgPool) -> Result<u64, StoreError> {
    let res = sqlx::query("DELETE FROM notifications WHERE expires_at < now()")
        .execute(db)
        .await?;
    Ok(res.rows_affected())
}
