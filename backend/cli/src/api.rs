use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use cropdoc_core::{DiagnosisError, ImageRef};
use cropdoc_diagnosis::DiseaseDetector;
use cropdoc_understanding::detect_image_mime;

/// Shared application state for API handlers.
pub struct AppState {
    pub detector: DiseaseDetector,
}

/// Body of a detection request, as handed over by the upload layer.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRequest {
    pub image: Option<String>,
    pub mime_type: Option<String>,
}

impl DetectionRequest {
    /// The image reference, if one was actually supplied.
    ///
    /// A missing MIME type is inferred from the reference's extension.
    pub fn image_ref(self) -> Option<ImageRef> {
        let reference = self.image.filter(|r| !r.trim().is_empty())?;
        let mime_type = self
            .mime_type
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| detect_image_mime(&reference).to_string());
        Some(ImageRef::new(reference, mime_type))
    }
}

/// Build the Axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/detect", post(detect_disease))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "cropdoc",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Diagnose an uploaded image and return the stored advisory.
///
/// An unreadable body is treated the same as a missing image.
async fn detect_disease(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: DetectionRequest = serde_json::from_slice(&body).unwrap_or_default();

    match state.detector.diagnose(request.image_ref()).await {
        Ok(record) => (StatusCode::OK, Json(json!({ "analysis": record }))).into_response(),
        Err(e) => error_response(&e),
    }
}

fn error_response(err: &DiagnosisError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "error": err.public_message() }))).into_response()
}
