//! Extraction endpoints
//! The heuristic and model-assisted paths both accept pasted content plus
//! image descriptors and answer with a question record and usage stats.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::models::{ImageUpload, QuestionRecord};
use crate::services::Resolution;

use super::{ApiError, ApiResponse, AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractRequest {
    pub content: String,
    pub images: Vec<ImageUpload>,
    pub generate_resolution: bool,
    pub custom_instructions: Option<String>,
}

/// POST /api/questions/extract
///
/// Heuristic extraction. Resolution generation is attempted only when asked
/// for and a model client is configured; its failure never fails the request.
pub async fn extract_question(
    State(state): State<AppState>,
    Json(request): Json<ExtractRequest>,
) -> Result<Json<ApiResponse<QuestionRecord>>, ApiError> {
    if request.content.trim().is_empty() {
        return Err(ApiError::bad_request("Content is required"));
    }

    log::info!(
        "extracting question ({} chars, {} images)",
        request.content.len(),
        request.images.len()
    );

    let (mut record, mut usage) = state
        .extractor
        .extract(&request.content, &request.images)
        .await;

    if request.generate_resolution && state.extractor.has_model() {
        match state.extractor.resolve(&record, &request.images, None).await {
            Ok((resolution, call_usage)) => {
                usage.add(call_usage);
                record.correct_answer = resolution.correct_answer;
                record.resolution = Some(resolution.resolution);
            }
            Err(err) => {
                log::warn!("resolution generation failed: {:#}", err);
                record.resolution = None;
            }
        }
    }

    Ok(ApiResponse::with_usage(record, usage))
}

/// POST /api/questions/extract-model
///
/// Model-assisted extraction; a resolution is always attempted afterwards
/// and degrades to null on failure.
pub async fn extract_question_with_model(
    State(state): State<AppState>,
    Json(request): Json<ExtractRequest>,
) -> Result<Json<ApiResponse<QuestionRecord>>, ApiError> {
    if request.content.trim().is_empty() {
        return Err(ApiError::bad_request("Content is required"));
    }
    if !state.extractor.has_model() {
        return Err(ApiError::internal(anyhow::anyhow!(
            "model API key not configured"
        )));
    }

    let (mut record, mut usage) = state
        .extractor
        .extract_with_model(
            &request.content,
            &request.images,
            request.custom_instructions.as_deref(),
        )
        .await
        .map_err(ApiError::internal)?;

    match state.extractor.resolve(&record, &request.images, None).await {
        Ok((resolution, call_usage)) => {
            usage.add(call_usage);
            record.correct_answer = resolution.correct_answer;
            record.resolution = Some(resolution.resolution);
        }
        Err(err) => {
            log::warn!("resolution generation failed: {:#}", err);
            record.resolution = None;
            record.correct_answer = None;
        }
    }

    Ok(ApiResponse::with_usage(record, usage))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionRequest {
    pub question: QuestionRecord,
    #[serde(default)]
    pub images: Vec<ImageUpload>,
    #[serde(default)]
    pub custom_instructions: Option<String>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionDto {
    pub resolution: String,
    pub correct_answer: Option<String>,
}

impl From<Resolution> for ResolutionDto {
    fn from(resolution: Resolution) -> Self {
        Self {
            resolution: resolution.resolution,
            correct_answer: resolution.correct_answer,
        }
    }
}

/// POST /api/questions/resolution
pub async fn generate_resolution(
    State(state): State<AppState>,
    Json(request): Json<ResolutionRequest>,
) -> Result<Json<ApiResponse<ResolutionDto>>, ApiError> {
    if request.question.content.trim().is_empty() {
        return Err(ApiError::bad_request("Question content is required"));
    }

    let (resolution, usage) = state
        .extractor
        .resolve(
            &request.question,
            &request.images,
            request.custom_instructions.as_deref(),
        )
        .await
        .map_err(ApiError::internal)?;

    Ok(ApiResponse::with_usage(ResolutionDto::from(resolution), usage))
}
