//! # qbank
//!
//! Question bank web service: turns free-form pasted exam text plus images
//! into structured question records and persists them.
//!
//! ## Module structure
//!
//! - `config`: environment-driven configuration
//! - `handlers`: HTTP route surface
//! - `models`: shared record types
//! - `services`: segmentation, extraction, model API client, tracing,
//!   persistence

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;

pub use config::AppConfig;
pub use handlers::{router, AppState};
pub use models::{ApiUsage, ImageUpload, QuestionRecord};
pub use services::segmenter::{segment, SegmentedQuestion};
