//! HTTP middleware: renders view data that handlers attach to responses.
//!
//! A handler opts in by returning [`Locals`] as a response part:
//!
//! ```ignore
//! async fn home() -> impl IntoResponse {
//!     Locals::new().with("viewData", json!({ "template": "home", "title": "Hi" }))
//! }
//! ```
//!
//! [`RenderLayer`] then renders `viewData.template` with `viewData` as the
//! context and replaces the body with the output.

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, IntoResponseParts, Response, ResponseParts};
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tower::{Layer, Service};
use tracing::{debug, error, warn};

use crate::error::ViewError;
use crate::pipeline::Pipeline;
use crate::settings::Settings;

const HTML: &str = "text/html; charset=utf-8";

/// Per-response properties, the counterpart of a response's locals object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Locals(Map<String, Value>);

impl Locals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl From<Map<String, Value>> for Locals {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl IntoResponseParts for Locals {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        res.extensions_mut().insert(self);
        Ok(res)
    }
}

/// Error response produced when view data could not be rendered.
///
/// The rendered body is never written; the failure travels in the response
/// extensions so an outer layer can replace the response.
#[derive(Debug, Clone)]
pub struct RenderFailure {
    pub template: Option<String>,
    pub error: Arc<ViewError>,
}

impl IntoResponse for RenderFailure {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render view").into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// Tower layer applying a [`Pipeline`] to every response.
#[derive(Clone)]
pub struct RenderLayer {
    pipeline: Arc<Pipeline>,
}

impl RenderLayer {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    /// The pipeline that produced this layer.
    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }
}

impl<S> Layer<S> for RenderLayer {
    type Service = RenderService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RenderService {
            inner,
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

#[derive(Clone)]
pub struct RenderService<S> {
    inner: S,
    pipeline: Arc<Pipeline>,
}

impl<S> Service<Request> for RenderService<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let pipeline = Arc::clone(&self.pipeline);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let response = inner.call(req).await?;
            let Some(data) = view_data(pipeline.settings(), &response) else {
                return Ok(response);
            };

            // Rendering holds the engine's read lock; keep it off the async workers.
            match tokio::task::spawn_blocking(move || render_view(&pipeline, response, data))
                .await
            {
                Ok(rendered) => Ok(rendered),
                Err(e) => {
                    error!(error = %e, "view render task failed");
                    Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response())
                }
            }
        })
    }
}

/// Render the view data attached to `response`, if any.
pub fn render_response(pipeline: &Pipeline, response: Response) -> Response {
    match view_data(pipeline.settings(), &response) {
        Some(data) => render_view(pipeline, response, data),
        None => response,
    }
}

/// The source property of the response's [`Locals`], when it is truthy.
/// `null`, `false`, `0` and `""` count as absent.
fn view_data(settings: &Settings, response: &Response) -> Option<Value> {
    response
        .extensions()
        .get::<Locals>()
        .and_then(|locals| locals.get(settings.source_property()))
        .filter(|data| is_truthy(data))
        .cloned()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn render_view(pipeline: &Pipeline, response: Response, view_data: Value) -> Response {
    let settings = pipeline.settings();
    let template_property = settings.template_property();
    let Some(template) = view_data.get(template_property).and_then(Value::as_str) else {
        warn!(property = %template_property, "view data names no template");
        return RenderFailure {
            template: None,
            error: Arc::new(ViewError::MissingTemplateName(template_property.to_string())),
        }
        .into_response();
    };

    match pipeline.render(template, &view_data) {
        Ok(output) => {
            debug!(template = %template, bytes = output.len(), "rendered view");
            let (mut parts, _) = response.into_parts();
            parts.headers.remove(header::CONTENT_LENGTH);
            parts
                .headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(HTML));
            Response::from_parts(parts, Body::from(output))
        }
        Err(e) => {
            warn!(template = %template, error = %e, "failed to render view");
            RenderFailure {
                template: Some(template.to_string()),
                error: Arc::new(ViewError::Render(e)),
            }
            .into_response()
        }
    }
}
