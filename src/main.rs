use actix_cors::Cors;
use actix_web::{middleware::{DefaultHeaders, Logger}, web, App, HttpResponse, HttpServer, Responder};
use clap::Parser;
use lexicon_backend::{
    config::Config,
    engine::{events::LogPublisher, ModerationEngine},
    models::db_operations::SqliteStore,
    routes, AppState, Engine,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// A simple handler for the root URL.
async fn root_handler() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain").body("OK")
}

#[derive(Parser, Debug)]
#[command(name = "lexicon_server", author, version, about = "Starts the dictionary moderation server.")]
struct Cli {
    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

/// Runs the expiry sweep and outbox flush on a fixed interval.
fn spawn_maintenance(engine: Arc<Engine>, every: Duration) {
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(every);
        loop {
            interval.tick().await;
            let engine = engine.clone();
            match web::block(move || engine.run_maintenance()).await {
                Ok(Ok(report)) => log::debug!("maintenance tick: {:?}", report),
                Ok(Err(e)) => log::error!("maintenance tick failed: {}", e),
                Err(e) => log::error!("maintenance tick could not run: {}", e),
            }
        }
    });
}

fn build_cors(allowed_origins: &str) -> Cors {
    let methods = vec!["GET", "POST"];
    let headers = vec![
        actix_web::http::header::ACCEPT,
        actix_web::http::header::CONTENT_TYPE,
        actix_web::http::header::HeaderName::from_static("x-actor-id"),
        actix_web::http::header::HeaderName::from_static("x-actor-role"),
    ];
    if allowed_origins.trim() == "*" {
        return Cors::default()
            .allow_any_origin()
            .allowed_methods(methods)
            .allowed_headers(headers)
            .max_age(3600);
    }
    let mut cors = Cors::default();
    for origin in allowed_origins.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        cors = cors.allowed_origin(origin);
    }
    cors.allowed_methods(methods).allowed_headers(headers).max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    let db_path = config.moderation_db_path();
    if let Some(parent_dir) = db_path.parent() {
        fs::create_dir_all(parent_dir).expect("Failed to create database directory");
    }

    let store = SqliteStore::open(&db_path)
        .expect("FATAL: Failed to create Rusqlite connection pool.");
    store
        .initialize()
        .expect("FATAL: Could not prepare the moderation database schema.");

    let engine: Arc<Engine> = Arc::new(ModerationEngine::new(
        store,
        Arc::new(LogPublisher),
        config.moderation.clone(),
    ));

    match engine.flush_outbox() {
        Ok(0) => {}
        Ok(n) => log::info!("Delivered {} events left over from the previous run.", n),
        Err(e) => log::warn!("Could not flush the event outbox at startup: {}", e),
    }
    spawn_maintenance(engine.clone(), Duration::from_secs(config.sweep_interval_secs));

    let app_state = web::Data::new(AppState {
        engine,
        trusted_gateway_ips: config.trusted_gateway_ips.clone(),
    });

    let server_address = format!("{}:{}", config.web.host, config.web.port);
    log::info!("Server starting at http://{}", server_address);

    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&config.allowed_origins))
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY")),
            )
            .app_data(app_state.clone())
            .app_data(web::JsonConfig::default().limit(64 * 1024))
            .route("/", web::get().to(root_handler))
            .configure(routes::public::config_public)
            .configure(routes::moderation::config_api)
    })
    .bind(server_address)?
    .run()
    .await
}
