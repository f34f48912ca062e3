use anyhow::Result;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ochem_academy::{
    api::{create_router, AppState},
    chapter_service::ChapterService,
    config::Config,
    database::Database,
    grading_service::GradingService,
    question_service::QuestionService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging with console and rotating file output
    let _guard = setup_logging()?;

    let config = Config::from_env()?;
    config.validate()?;

    info!("Starting ochem-academy content service...");

    // Initialize database
    let db = Database::new(&config.database.url).await?;
    info!("Database initialized successfully");

    // Initialize services
    let chapter_service = ChapterService::new(db.clone());
    let question_service = QuestionService::new(db.clone());
    let grading_service = GradingService::new(db);

    let state = AppState {
        chapter_service,
        question_service,
        grading_service,
    };

    // Build the application router
    let app = create_router(state).layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn setup_logging() -> Result<WorkerGuard> {
    use std::fs;
    use tracing_subscriber::fmt;

    // Create logs directory if it doesn't exist
    fs::create_dir_all("logs").unwrap_or_else(|e| {
        eprintln!("Warning: Could not create logs directory: {}", e);
    });

    // Configure log level from environment variable
    let default_log_level = "info,ochem_academy=debug";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_log_level));

    // Set up file appender with daily rotation
    let file_appender = tracing_appender::rolling::daily("logs", "ochem-academy.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    // Configure console output
    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true);

    // Configure file output (no ANSI colors for files)
    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(non_blocking_file);

    // Initialize subscriber with both console and file outputs
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized - writing to logs/ochem-academy.log with daily rotation");

    Ok(guard)
}
