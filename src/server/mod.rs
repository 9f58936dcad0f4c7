//! HTTP surface: single-video and bulk transcript endpoints.
//!
//! GET /api/transcript?videoId=..&lang=..&mode=plain|vtt
//! GET /api/bulk/channel?handle=@..&lang=..&max=..
//! GET /api/bulk/playlist?list=..&lang=..&max=..
//!
//! Every route is also served without the `/api` prefix. Unknown paths answer 200 with
//! the route directory.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::transcribe::TranscriptPipeline;
use crate::ServiceError;

pub const ROUTES: [&str; 3] = ["/api/transcript", "/api/bulk/channel", "/api/bulk/playlist"];

type AppState = Arc<TranscriptPipeline>;

#[derive(Debug, Default, Deserialize)]
pub struct TranscriptQuery {
    #[serde(rename = "videoId")]
    pub video_id: Option<String>,
    pub v: Option<String>,
    pub lang: Option<String>,
    pub mode: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChannelQuery {
    pub handle: Option<String>,
    pub lang: Option<String>,
    pub max: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlaylistQuery {
    pub list: Option<String>,
    pub lang: Option<String>,
    pub max: Option<String>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the application router
pub fn build_app(pipeline: Arc<TranscriptPipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS]);

    Router::new()
        .route("/api/transcript", get(transcript_handler))
        .route("/transcript", get(transcript_handler))
        .route("/api/bulk/channel", get(bulk_channel_handler))
        .route("/bulk/channel", get(bulk_channel_handler))
        .route("/api/bulk/playlist", get(bulk_playlist_handler))
        .route("/bulk/playlist", get(bulk_playlist_handler))
        .route("/health", get(health))
        .fallback(directory)
        .with_state(pipeline)
        .layer(axum::middleware::from_fn(log_request))
        .layer(cors)
}

/// Bind and serve until the process is stopped
pub async fn serve(pipeline: Arc<TranscriptPipeline>, bind_address: &str) -> crate::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    tracing::info!("Server running at http://{}", listener.local_addr()?);
    for route in ROUTES {
        tracing::info!("  route: {}", route);
    }

    axum::serve(listener, build_app(pipeline)).await?;
    Ok(())
}

async fn log_request(request: Request<Body>, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = std::time::Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        %request_id,
        %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Request handled"
    );
    response
}

async fn health() -> &'static str {
    "OK"
}

async fn directory() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true, "routes": ROUTES }))
}

async fn transcript_handler(
    State(pipeline): State<AppState>,
    Query(query): Query<TranscriptQuery>,
) -> Result<Response, ServiceError> {
    let video_id = query
        .video_id
        .or(query.v)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ServiceError::InvalidRequest("Missing videoId".to_string()))?;
    let language = pipeline.language_or_default(query.lang.as_deref());
    let mode = query.mode.as_deref().unwrap_or("plain").to_ascii_lowercase();

    if mode == "vtt" {
        let body = pipeline.caption_markup(&video_id, &language).await;
        return Ok(Json(body).into_response());
    }

    let body = pipeline.transcript(&video_id, &language).await;
    Ok(Json(body).into_response())
}

async fn bulk_channel_handler(
    State(pipeline): State<AppState>,
    Query(query): Query<ChannelQuery>,
) -> Result<Response, ServiceError> {
    let language = pipeline.language_or_default(query.lang.as_deref());
    let max = pipeline.clamp_max(parse_max(query.max.as_deref()));

    let result = pipeline
        .bulk_channel(query.handle.as_deref(), &language, max)
        .await?;
    Ok(Json(result).into_response())
}

async fn bulk_playlist_handler(
    State(pipeline): State<AppState>,
    Query(query): Query<PlaylistQuery>,
) -> Result<Response, ServiceError> {
    let language = pipeline.language_or_default(query.lang.as_deref());
    let max = pipeline.clamp_max(parse_max(query.max.as_deref()));

    let result = pipeline
        .bulk_playlist(query.list.as_deref(), &language, max)
        .await?;
    Ok(Json(result).into_response())
}

/// `max` query value; absent or unparseable means "use the default"
fn parse_max(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|value| value.trim().parse::<usize>().ok())
}
