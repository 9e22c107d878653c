//! HTTP routes. `/` hands view data to the render layer; everything else is
//! plain JSON that passes through it untouched.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::middleware::map_response;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::error;

use grime_view::{Locals, Pipeline, RenderFailure, RenderLayer};

pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Diagnostic view of the process config, served by `/health`.
    pub config: Value,
}

pub fn router(views: RenderLayer, config: Value) -> Router {
    let state = Arc::new(AppState {
        pipeline: Arc::clone(views.pipeline()),
        config,
    });

    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .layer(views)
        .layer(map_response(render_failure_page))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn home(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let settings = state.pipeline.settings();
    let mut view_data = json!({
        "title": "grime",
        "name": "world",
        "sections": ["filters", "helpers", "templates"],
    });
    view_data[settings.template_property()] = json!("example");
    (Locals::new().with(settings.source_property(), view_data), "")
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "watching": state.pipeline.is_watching(),
        "config": state.config,
    }))
}

/// Turn a render failure left by the view layer into a readable error page.
async fn render_failure_page(response: Response) -> Response {
    let Some(failure) = response.extensions().get::<RenderFailure>().cloned() else {
        return response;
    };
    error!(
        template = failure.template.as_deref().unwrap_or("<none>"),
        error = %failure.error,
        "view render failed"
    );
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("Failed to render view: {}", failure.error),
    )
        .into_response()
}
