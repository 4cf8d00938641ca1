use std::sync::Arc;

use anyhow::{Context, Result};
use qbank::config::AppConfig;
use qbank::handlers::{router, AppState};
use qbank::services::model::{ModelClient, ModelConfig};
use qbank::services::{DatabaseService, ExtractionService, QuestionStore, Tracer, TracerConfig, UserStore};

fn setup_logger() -> Result<()> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logger()?;
    let config = AppConfig::from_env();

    let db = Arc::new(DatabaseService::new(&config.db_path)?);
    let questions = Arc::new(QuestionStore::new(&config.data_dir)?);
    let users = Arc::new(UserStore::new(&config.data_dir)?);

    let tracer = Arc::new(Tracer::new(TracerConfig {
        binary: config.tracer_binary.clone(),
        ..TracerConfig::default()
    }));

    let model = config.api_key.as_ref().map(|key| {
        let mut model_config = ModelConfig::new(key.clone());
        model_config.model = config.model.clone();
        Arc::new(ModelClient::new(model_config))
    });
    if model.is_none() {
        log::warn!("ANTHROPIC_API_KEY not set; model-assisted extraction is disabled");
    }

    let state = AppState {
        extractor: ExtractionService::new(model, tracer.clone()),
        tracer,
        db,
        questions,
        users,
    };

    let app = router(state);

    log::info!("listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("could not bind {}", config.addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
