use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::classifier::{display_labels, ClassificationResult};
use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;
use crate::upload::TempUpload;
use crate::utils::is_allowed_image;

pub const HOME_TEXT: &str = "Potato Disease Classifier Backend is Running.";

pub async fn home() -> &'static str {
    HOME_TEXT
}

fn bad_request(message: &str) -> ApiError {
    tracing::warn!("{}", message);
    ApiError::BadRequest(message.to_string())
}

/// POST /api/classify - multipart upload with an `image` file field
pub async fn classify_handler(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<ClassificationResult>> {
    let mut multipart = multipart.map_err(|_| bad_request("No file part"))?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        // A plain form value under the same name is not a file part.
        let Some(filename) = field.file_name().map(str::to_owned) else {
            continue;
        };
        let bytes = field.bytes().await?;
        upload = Some((filename, bytes));
        break;
    }

    let (filename, image_data) = upload.ok_or_else(|| bad_request("No file part"))?;
    if filename.is_empty() {
        return Err(bad_request("No selected file"));
    }
    if !is_allowed_image(&filename) {
        return Err(bad_request("Unsupported file type"));
    }
    if image_data.is_empty() {
        return Err(bad_request("Empty file"));
    }

    let temp_file = TempUpload::persist(&state.upload_dir, &filename, &image_data)
        .await
        .map_err(|e| {
            tracing::error!("Failed to store upload: {}", e);
            ApiError::from(e)
        })?;

    let result = state
        .classifier
        .classify_file(temp_file.path())
        .await
        .map_err(|e| {
            tracing::error!("Error in /api/classify route: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct SolutionRequest {
    pub disease: Option<String>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SolutionResponse {
    pub solution: String,
    pub disease: String,
    pub confidence: f64,
}

/// POST /api/solution - remediation text for a diagnosed disease
pub async fn solution_handler(
    State(state): State<SharedState>,
    body: Bytes,
) -> ApiResult<Json<SolutionResponse>> {
    let request: SolutionRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!("Rejected solution request body: {}", e);
        ApiError::BadRequest("Invalid JSON body".to_string())
    })?;

    let (disease, confidence) = match (request.disease, request.confidence) {
        (Some(disease), Some(confidence)) if !disease.is_empty() => (disease, confidence),
        _ => return Err(bad_request("Invalid input (disease or confidence missing)")),
    };

    let solution = state.solutions.solution(&disease, confidence).await;

    Ok(Json(SolutionResponse {
        solution,
        disease,
        confidence,
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub labels: Vec<&'static str>,
}

/// GET /api/health
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model_loaded: state.classifier.model().is_loaded(),
        labels: display_labels(),
    })
}
