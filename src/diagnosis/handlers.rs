use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use super::client::ImageUpload;
use crate::{auth::Identity, error::ApiError, state::AppState};

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/conditions", get(conditions))
        .route("/health", get(health))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(analyze))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES))
}

#[instrument(skip(state))]
pub async fn conditions(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.diagnosis.conditions().await.map(Json).map_err(|e| {
        error!(error = ?e, "fetching conditions failed");
        ApiError::Upstream("Failed to fetch conditions from AI service")
    })
}

#[instrument(skip(state))]
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.diagnosis.health().await.map(Json).map_err(|e| {
        error!(error = ?e, "AI health check failed");
        ApiError::Upstream("AI service is not available")
    })
}

/// Accepts the first file part of a multipart body and forwards it for
/// classification. Only `image/*` uploads are accepted.
#[instrument(skip(state, multipart), fields(user_id = %identity.user_id))]
pub async fn analyze(
    State(state): State<AppState>,
    identity: Identity,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        warn!(error = %e, "analyze without multipart body");
        ApiError::bad_request("No image uploaded")
    })?;

    let image = read_image(&mut multipart).await?;
    info!(size = image.body.len(), content_type = %image.content_type, "forwarding image");

    state.diagnosis.predict(image).await.map(Json).map_err(|e| {
        error!(error = ?e, "image analysis failed");
        ApiError::Upstream("Failed to process the image")
    })
}

async fn read_image(multipart: &mut Multipart) -> Result<ImageUpload, ApiError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(ApiError::bad_request("No image uploaded")),
            Err(e) => return Err(multipart_error(e.status(), &e.body_text())),
        };
        if field.file_name().is_none() {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            warn!(%content_type, "rejected non-image upload");
            return Err(ApiError::bad_request("Only image files are allowed"));
        }
        let file_name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!("image_{}.jpg", OffsetDateTime::now_utc().unix_timestamp())
            });

        let body = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e.status(), &e.body_text()))?;
        if body.is_empty() {
            return Err(ApiError::bad_request("No image uploaded"));
        }

        return Ok(ImageUpload {
            body,
            file_name,
            content_type,
        });
    }
}

fn multipart_error(status: StatusCode, detail: &str) -> ApiError {
    warn!(%status, %detail, "multipart read failed");
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Image exceeds the 10MB limit")
    } else {
        ApiError::bad_request("Invalid multipart body")
    }
}
