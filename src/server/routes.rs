//! HTTP endpoints.

use super::state::AppState;
use crate::pipeline::{AnalysisResult, AnalyzeError, AudioBlob, to_envelope};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Multipart framing allowance on top of the audio limit.
const BODY_SLACK_BYTES: usize = 64 * 1024;

/// Name of the multipart field carrying the recording.
pub const AUDIO_FIELD: &str = "audio";

/// Build the application router.
pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    let body_limit = usize::try_from(state.pipeline.max_upload_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(BODY_SLACK_BYTES);
    let audio_dir = ServeDir::new(state.pipeline.upload_dir());

    Router::new()
        .route("/api/analyze", post(analyze))
        .route("/api/health", get(health))
        .nest_service("/api/audio", audio_dir)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}

/// `POST /api/analyze`
async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let outcome = match multipart {
        Ok(multipart) => match read_audio_field(multipart, state.pipeline.max_upload_bytes()).await
        {
            Ok(blob) => run_pipeline(&state, blob).await,
            Err(e) => Err(e),
        },
        Err(rejection) => {
            tracing::warn!("malformed upload: {rejection}");
            Err(AnalyzeError::missing_audio().with_details(rejection.body_text()))
        }
    };

    if let Err(e) = &outcome {
        tracing::warn!(code = %e.code, "analysis failed: {}", e.details.as_deref().unwrap_or(&e.message));
    }

    envelope_response(outcome)
}

/// Collect the `audio` field, rejecting as soon as it outgrows `max_bytes`.
async fn read_audio_field(
    mut multipart: Multipart,
    max_bytes: u64,
) -> Result<AudioBlob, AnalyzeError> {
    let limit = usize::try_from(max_bytes).unwrap_or(usize::MAX);

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }

        let declared = declared_length(field.headers());
        if declared.is_some_and(|size| size > max_bytes) {
            return Err(AnalyzeError::oversize(max_bytes));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?
        {
            if bytes.len().saturating_add(chunk.len()) > limit {
                return Err(AnalyzeError::oversize(max_bytes));
            }
            bytes.extend_from_slice(&chunk);
        }
        return Ok(match declared {
            Some(size) => AudioBlob::with_declared_size(bytes, size),
            None => AudioBlob::new(bytes),
        });
    }

    Err(AnalyzeError::missing_audio())
}

/// `Content-Length` of a multipart part, when the client sent one.
fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn multipart_error(err: axum::extract::multipart::MultipartError, max_bytes: u64) -> AnalyzeError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AnalyzeError::oversize(max_bytes)
    } else {
        AnalyzeError::missing_audio().with_details(err.body_text())
    }
}

/// Run the pipeline on the blocking pool; a panic becomes `PARSE_ERROR`.
async fn run_pipeline(state: &AppState, blob: AudioBlob) -> Result<AnalysisResult, AnalyzeError> {
    let pipeline = state.pipeline.clone();
    match tokio::task::spawn_blocking(move || pipeline.analyze(blob)).await {
        Ok(outcome) => outcome,
        Err(join_error) => {
            tracing::error!("analysis worker failed: {join_error}");
            Err(AnalyzeError::internal(format!(
                "analysis worker failed: {join_error}"
            )))
        }
    }
}

fn envelope_response(outcome: Result<AnalysisResult, AnalyzeError>) -> Response {
    let (status, body) = to_envelope(outcome);
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}

#[derive(Debug, Serialize)]
struct HealthServices {
    whisper: &'static str,
    ollama: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    services: HealthServices,
    uptime: u64,
}

/// `GET /api/health`
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let pipeline = state.pipeline.clone();
    let connected = tokio::task::spawn_blocking(move || pipeline.chat_connected())
        .await
        .unwrap_or(false);

    Json(HealthResponse {
        status: "ok",
        services: HealthServices {
            whisper: if state.pipeline.whisper_loaded() {
                "loaded"
            } else {
                "not_loaded"
            },
            ollama: if connected {
                "connected"
            } else {
                "disconnected"
            },
        },
        uptime: state.uptime_secs(),
    })
}
