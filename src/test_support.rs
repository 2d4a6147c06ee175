//! Fixtures for tests that run the real SQL. They need a Postgres reachable
//! through `DATABASE_URL`; without it `pg_state` returns `None` and the
//! calling test returns early.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::FromRef,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    auth::{
        claims::Role,
        jwt::JwtKeys,
        repo::{NewUser, PgUserStore, User, UserStore},
    },
    state::AppState,
};

pub async fn pg_state() -> Option<AppState> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping Postgres-backed test");
        return None;
    };
    let db = PgPoolOptions::new()
        .max_connections(12)
        .connect(&url)
        .await
        .expect("connect to test database");
    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("apply migrations");

    let mut state = AppState::fake();
    state.users = Arc::new(PgUserStore::new(db.clone()));
    state.db = db;
    Some(state)
}

/// Stored account with unique identifiers, plus a bearer token for it.
pub async fn seed_user(state: &AppState, role: Role) -> (User, String) {
    let digits = format!("{:011}", Uuid::new_v4().as_u128() % 100_000_000_000);
    let email = format!("{}@example.com", Uuid::new_v4().simple());
    let user = state
        .users
        .create(NewUser {
            name: "Test Mother",
            phone: &digits,
            email: &email,
            password_hash: "$argon2id$unused",
            role,
        })
        .await
        .expect("seed user");
    let token = JwtKeys::from_ref(state)
        .issue(user.id, role)
        .expect("issue token");
    (user, token)
}

/// Sends one request through the full router and returns status and JSON body
/// (`Null` when the body is not JSON).
pub async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));
    let body = match body {
        Some(json) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}
