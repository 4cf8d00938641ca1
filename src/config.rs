//! Environment-driven configuration
//! Values come from the process environment, with a `.env` file loaded first
//! when present.

use std::env;
use std::path::PathBuf;

use crate::services::model::DEFAULT_MODEL;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address for the HTTP server.
    pub addr: String,
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Directory for saved question JSON files and the users file.
    pub data_dir: PathBuf,
    /// Model API key. Absent means the model-assisted paths are disabled.
    pub api_key: Option<String>,
    /// Model id used for every model API call.
    pub model: String,
    /// External tracer binary.
    pub tracer_binary: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let addr = env::var("QBANK_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let db_path = env::var("QBANK_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/questions.db"));
        let data_dir = env::var("QBANK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/questions"));
        let api_key = env::var("ANTHROPIC_API_KEY").ok().filter(|key| !key.is_empty());
        let model = env::var("QBANK_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let tracer_binary = env::var("QBANK_TRACER_BIN")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("potrace"));

        Self {
            addr,
            db_path,
            data_dir,
            api_key,
            model,
            tracer_binary,
        }
    }
}
