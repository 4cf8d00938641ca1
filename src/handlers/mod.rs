// HTTP handler modules
// The route surface over the services, one module per resource

pub mod extract;
pub mod questions;
pub mod users;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::models::ApiUsage;
use crate::services::{DatabaseService, ExtractionService, QuestionStore, Tracer, UserStore};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub extractor: ExtractionService,
    pub tracer: Arc<Tracer>,
    pub db: Arc<DatabaseService>,
    pub questions: Arc<QuestionStore>,
    pub users: Arc<UserStore>,
}

/// Build the full route surface.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api", get(api_info))
        .route("/api/questions/extract", post(extract::extract_question))
        .route(
            "/api/questions/extract-model",
            post(extract::extract_question_with_model),
        )
        .route("/api/questions/resolution", post(extract::generate_resolution))
        .route(
            "/api/questions/convert-to-svg",
            post(questions::convert_to_svg),
        )
        .route(
            "/api/questions",
            get(questions::list_questions).post(questions::save_question),
        )
        .route("/api/questions/:id", get(questions::get_question))
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/users/:id",
            get(users::get_user).put(users::update_user),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// JSON envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageDto>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: None,
            usage: None,
        })
    }

    pub fn with_usage(data: T, usage: ApiUsage) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: None,
            usage: Some(UsageDto::from(usage)),
        })
    }
}

/// Usage block in responses, in the wire casing the UI expects.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageDto {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub images_analyzed: u32,
}

impl From<ApiUsage> for UsageDto {
    fn from(usage: ApiUsage) -> Self {
        Self {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            images_analyzed: usage.images_analyzed,
        }
    }
}

/// Handler error mapped onto the JSON envelope.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        log::error!("internal error: {:#}", err);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{}", err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK", "message": "Server is running" }))
}

async fn api_info(State(_state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "message": "API is working",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "questions": "/api/questions",
            "extractQuestion": "/api/questions/extract",
            "extractQuestionWithModel": "/api/questions/extract-model",
            "convertToSvg": "/api/questions/convert-to-svg",
            "users": "/api/users",
        },
    }))
}
