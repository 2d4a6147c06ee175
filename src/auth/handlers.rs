use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, MessageResponse, SignupRequest},
        jwt::JwtKeys,
        services,
        validation::{validate_login, validate_signup},
    },
    error::ApiError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(payload) = payload?;
    let input = validate_signup(payload)?;
    services::signup(state.users.as_ref(), input).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User created successfully")),
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let Json(payload) = payload?;
    let input = validate_login(payload)?;
    let keys = JwtKeys::from_ref(&state);
    let token = services::login(state.users.as_ref(), &keys, &input.identifier, &input.password).await?;

    let jar = jar.add(keys.session_cookie(token.clone()));
    Ok((
        jar,
        Json(LoginResponse {
            message: "Login successful",
            token,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo::{MemoryUserStore, UserStore};
    use axum::{
        body::Body,
        http::{header, Request},
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(state: AppState) -> Router {
        auth_routes().with_state(state)
    }

    async fn post_json(state: &AppState, uri: &str, body: Value) -> (StatusCode, Value, Option<String>) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let res = app(state.clone()).oneshot(req).await.unwrap();
        let status = res.status();
        let cookie = res
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap(), cookie)
    }

    fn jane() -> Value {
        json!({
            "name": "Jane Doe",
            "phone": "12345678901",
            "email": "jane@example.com",
            "password": "secret1"
        })
    }

    fn state_with_store() -> (AppState, Arc<MemoryUserStore>) {
        let store = Arc::new(MemoryUserStore::default());
        let mut state = AppState::fake();
        state.users = store.clone();
        (state, store)
    }

    #[tokio::test]
    async fn signup_then_duplicate_phone() {
        let (state, store) = state_with_store();

        let (status, body, _) = post_json(&state, "/signup", jane()).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "User created successfully");

        let stored = store.find_by_phone("12345678901").await.unwrap().unwrap();
        let same = store.find_by_email("jane@example.com").await.unwrap().unwrap();
        assert_eq!(stored.id, same.id);
        assert_ne!(stored.password_hash, "secret1");

        let (status, body, _) = post_json(&state, "/signup", jane()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "message": "phone_already_exists" }));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn signup_duplicate_email() {
        let (state, store) = state_with_store();
        post_json(&state, "/signup", jane()).await;

        let mut other = jane();
        other["phone"] = json!("10987654321");
        let (status, body, _) = post_json(&state, "/signup", other).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "email_already_exists");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn signup_validation_is_400() {
        let (state, store) = state_with_store();
        let mut bad = jane();
        bad["phone"] = json!("123");
        let (status, body, _) = post_json(&state, "/signup", bad).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Phone number must be 11 digits");
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn login_with_email_sets_token_and_cookie() {
        let (state, store) = state_with_store();
        post_json(&state, "/signup", jane()).await;

        let (status, body, cookie) = post_json(
            &state,
            "/login",
            json!({ "identifier": "jane@example.com", "password": "secret1" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Login successful");

        let token = body["token"].as_str().unwrap();
        let claims = JwtKeys::from_ref(&state).verify(token).unwrap();
        let jane = store.find_by_email("jane@example.com").await.unwrap().unwrap();
        assert_eq!(claims.sub, jane.id);

        let cookie = cookie.expect("session cookie");
        assert!(cookie.starts_with(&format!("token={token}")));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Secure"));
    }

    #[tokio::test]
    async fn login_with_phone() {
        let (state, _) = state_with_store();
        post_json(&state, "/signup", jane()).await;
        let (status, body, _) = post_json(
            &state,
            "/login",
            json!({ "identifier": "12345678901", "password": "secret1" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].is_string());
    }

    #[tokio::test]
    async fn login_failures_are_400() {
        let (state, _) = state_with_store();
        post_json(&state, "/signup", jane()).await;

        let (status, body, cookie) = post_json(
            &state,
            "/login",
            json!({ "identifier": "jane@example.com", "password": "wrong-pass" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Password is incorrect" }));
        assert!(cookie.is_none());

        let (status, body, _) = post_json(
            &state,
            "/login",
            json!({ "identifier": "nobody@example.com", "password": "secret1" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Phone or Email is incorrect");

        let (status, body, _) =
            post_json(&state, "/login", json!({ "identifier": "jane@example.com" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Password is required");
    }

    #[tokio::test]
    async fn unreadable_body_is_json_400() {
        let (state, store) = state_with_store();
        for (uri, content_type) in [("/signup", None), ("/login", Some("application/json"))] {
            let mut req = Request::builder().method("POST").uri(uri);
            if let Some(ct) = content_type {
                req = req.header(header::CONTENT_TYPE, ct);
            }
            let res = app(state.clone())
                .oneshot(req.body(Body::from("name=jane")).unwrap())
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{uri}");
            let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
            let body: Value = serde_json::from_slice(&bytes).unwrap();
            assert!(body["error"].is_string(), "{uri}");
        }
        assert_eq!(store.len().await, 0);
    }
}
