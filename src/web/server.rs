//! Web server module
//!
//! Configures and starts the Actix-Web HTTP server exposing the
//! scheduling API with CORS and request logging.

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use std::sync::Arc;
use tracing::info;

use crate::application::services::StageLockRegistry;
use crate::infrastructure::repositories::SqliteSchedulerRepository;
use crate::web::{config::WebConfig, handlers};

/// Starts the web server with the given configuration
///
/// Opens the scheduler database, builds the process-wide lock registry,
/// and serves the API routes under `/api`.
pub async fn start_web_server(config: WebConfig) -> std::io::Result<()> {
    info!("Starting scheduler API on {}:{}", config.host, config.port);
    info!("Database: {}", config.database_path);

    let repo = Arc::new(
        SqliteSchedulerRepository::new(&config.database_path)
            .expect("Failed to open scheduler database"),
    );
    let locks = Arc::new(StageLockRegistry::new());

    let state = web::Data::new(handlers::AppState {
        repo: repo.clone(),
        locks: locks.clone(),
    });

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(state.clone())
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(handlers::health_check))
                    .route("/schedule", web::post().to(handlers::schedule_job))
                    .route("/recalculate", web::post().to(handlers::recalculate))
                    .route("/reorder", web::post().to(handlers::reorder_day))
                    .route(
                        "/tentative-due-dates",
                        web::post().to(handlers::tentative_due_dates),
                    )
                    .route(
                        "/manual-reschedule",
                        web::post().to(handlers::manual_reschedule),
                    )
                    .route("/capacity/{stage_id}", web::get().to(handlers::stage_capacity))
                    .route("/dashboard/stats", web::get().to(handlers::dashboard_stats)),
            )
    })
    .bind((config.host.as_str(), config.port))?;

    info!("Scheduler API started");
    server.run().await
}
