//! Question persistence endpoints
//! Saving, fetching, and listing records, plus the raster-to-SVG converter.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::QuestionRecord;
use crate::services::{QuestionSummary, Tracer};

use super::{ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQuestion {
    pub id: String,
    pub database_id: i64,
}

/// POST /api/questions
///
/// Writes the record to the JSON store and the database.
pub async fn save_question(
    State(state): State<AppState>,
    Json(record): Json<QuestionRecord>,
) -> Result<Json<ApiResponse<SavedQuestion>>, ApiError> {
    if record.content.trim().is_empty() {
        return Err(ApiError::bad_request("Question data is required"));
    }

    let id = state.questions.save(&record).map_err(ApiError::internal)?;
    let database_id = state
        .db
        .insert_question(&record)
        .map_err(ApiError::internal)?;

    log::info!("saved question {} (db row {})", id, database_id);
    Ok(ApiResponse::ok(SavedQuestion { id, database_id }))
}

/// GET /api/questions/:id
///
/// UUIDs address the JSON store, integer ids the database.
pub async fn get_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<QuestionRecord>>, ApiError> {
    let record = if Uuid::parse_str(&id).is_ok() {
        state.questions.load(&id).map_err(ApiError::internal)?
    } else if let Ok(row_id) = id.parse::<i64>() {
        state.db.get_question(row_id).map_err(ApiError::internal)?
    } else {
        return Err(ApiError::bad_request("Invalid question id"));
    };

    match record {
        Some(record) => Ok(ApiResponse::ok(record)),
        None => Err(ApiError::not_found("Question not found")),
    }
}

/// GET /api/questions
pub async fn list_questions(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<QuestionSummary>>>, ApiError> {
    let summaries = state.db.list_questions().map_err(ApiError::internal)?;
    Ok(ApiResponse::ok(summaries))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRequest {
    pub image: Option<String>,
    pub media_type: Option<String>,
    #[serde(default)]
    pub color: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertedImage {
    pub svg: String,
    pub original_type: String,
    pub conversion_mode: String,
}

/// POST /api/questions/convert-to-svg
pub async fn convert_to_svg(
    State(state): State<AppState>,
    Json(request): Json<ConvertRequest>,
) -> Result<Json<ApiResponse<ConvertedImage>>, ApiError> {
    let Some(image) = request.image.as_deref().filter(|img| !img.is_empty()) else {
        return Err(ApiError::bad_request(
            "Image data is required (base64 encoded)",
        ));
    };
    let Some(media_type) = request.media_type.as_deref().filter(|mt| !mt.is_empty()) else {
        return Err(ApiError::bad_request(
            "mediaType is required (e.g., \"image/png\", \"image/gif\", \"image/jpeg\")",
        ));
    };

    let bytes = Tracer::decode_payload(image).map_err(|err| {
        log::warn!("convert-to-svg rejected payload: {:#}", err);
        ApiError::bad_request("Image data is not valid base64")
    })?;

    let svg = if request.color {
        state.tracer.posterize(&bytes).await
    } else {
        state.tracer.trace(&bytes).await
    }
    .map_err(ApiError::internal)?;

    Ok(ApiResponse::ok(ConvertedImage {
        svg,
        original_type: media_type.to_string(),
        conversion_mode: if request.color { "color" } else { "monochrome" }.to_string(),
    }))
}
