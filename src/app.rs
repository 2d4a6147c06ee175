use std::net::SocketAddr;

use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::state::AppState;
use crate::{auth, diagnosis, health, notifications, profile, saved};

/// Routes that require a verified identity.
fn protected(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/personalInfo", profile::router())
        .nest("/healthInfo", health::router())
        .nest("/savedDiseases", saved::diseases_router())
        .nest("/savedWeeks", saved::weeks_router())
        .nest("/savedBabyNames", saved::baby_names_router())
        .nest("/notifications", notifications::router())
        .nest("/ai-diagnosis", diagnosis::protected_routes())
        .route_layer(from_fn_with_state(state.clone(), auth::require_identity))
}

pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::router())
        .nest("/ai-diagnosis", diagnosis::public_routes())
        .merge(protected(&state));

    Router::new()
        .route("/", get(|| async { "Backend is running" }))
        .nest("/api", api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
