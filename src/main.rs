//! CareControl service
//!
//! Main entry point for the CareControl medication-tracking backend.

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use carecontrol::{api, config, store::CareStore, AppState};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let settings = config::load_config().context("failed to load configuration")?;

    // Connect to the document store
    let store = CareStore::connect(&settings.database.url)
        .await
        .context("failed to open the patient store")?;

    let bind_addr = (settings.server.host.clone(), settings.server.port);
    let state = web::Data::new(AppState { store, settings });

    tracing::info!(host = %bind_addr.0, port = bind_addr.1, "starting CareControl server");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(TracingLogger::default())
            .wrap(Cors::permissive())
            .configure(api::configure)
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}
